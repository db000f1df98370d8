//! Portrait animation command-line interface.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vivify_inference::{fetch_weights, WeightRepoType};
use vivify_media::{load_image, persist, unique_output_path};
use vivify_models::{AnimationOptions, Ratio};
use vivify_pipeline::{animate, PipelineConfig, PipelineContext, RetargetSession};

#[derive(Parser)]
#[command(name = "vivify", about = "Animate a still portrait with the motion of a driving video")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Animate a source portrait with a driving video
    Animate {
        /// Source portrait image
        source: PathBuf,
        /// Driving video
        driving: PathBuf,
        /// Use each driving frame's absolute pose instead of motion relative
        /// to the first frame
        #[arg(long)]
        absolute_motion: bool,
        /// Feed whole frames to the extractors instead of face crops
        #[arg(long)]
        no_crop: bool,
        /// Return raw face renders instead of compositing into the source
        #[arg(long)]
        no_paste_back: bool,
        /// Drive every frame's eye-open ratio toward this target
        #[arg(long)]
        eye_ratio: Option<f32>,
        /// Drive every frame's lip-open ratio toward this target
        #[arg(long)]
        lip_ratio: Option<f32>,
    },
    /// Re-render a portrait with adjusted eye/lip apertures
    Retarget {
        /// Source portrait image
        source: PathBuf,
        /// Target eye-open ratio (defaults to the measured value)
        #[arg(long)]
        eye_ratio: Option<f32>,
        /// Target lip-open ratio (defaults to the measured value)
        #[arg(long)]
        lip_ratio: Option<f32>,
    },
    /// Download model weights from the Hugging Face hub
    FetchWeights {
        /// Repository id, e.g. `acme/portrait-onnx`
        repo: String,
        /// Repository namespace
        #[arg(long, default_value = "model")]
        repo_type: WeightRepoType,
        /// Destination directory (defaults to the configured model dir)
        #[arg(long)]
        dest: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    if let Err(e) = run(Cli::parse()).await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vivify=info".parse().unwrap())
        .add_directive("ort=warn".parse().unwrap())
        .add_directive("onnxruntime=warn".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = PipelineConfig::from_env();

    match cli.command {
        Command::Animate {
            source,
            driving,
            absolute_motion,
            no_crop,
            no_paste_back,
            eye_ratio,
            lip_ratio,
        } => {
            let ctx = PipelineContext::with_onnx(config).context("loading models")?;
            let image = load_image(&source)
                .with_context(|| format!("loading source image {}", source.display()))?;

            let use_target_ratios = eye_ratio.is_some() || lip_ratio.is_some();
            let options = AnimationOptions {
                relative_motion: !absolute_motion,
                do_crop: !no_crop,
                paste_back: !no_paste_back,
                use_target_ratios,
                target_eye_ratio: eye_ratio.map(Ratio::new).unwrap_or_default(),
                target_lip_ratio: lip_ratio.map(Ratio::new).unwrap_or_default(),
            };

            let outcome = animate(&ctx, &image, &driving, &options)
                .await
                .context("animation failed")?;
            println!("animated video:  {}", outcome.video.display());
            println!("comparison view: {}", outcome.concat_video.display());
            if outcome.held_frames > 0 {
                println!(
                    "note: {}/{} driving frames reused the previous motion",
                    outcome.held_frames, outcome.frame_count
                );
            }
        }

        Command::Retarget {
            source,
            eye_ratio,
            lip_ratio,
        } => {
            let output_dir = config.output_dir.clone();
            let ctx = Arc::new(PipelineContext::with_onnx(config).context("loading models")?);
            let image = load_image(&source)
                .with_context(|| format!("loading source image {}", source.display()))?;

            let mut session = RetargetSession::new(ctx);
            let (defaults, _preview) = session
                .prepare(image)
                .await
                .context("preparing source portrait")?;
            info!(
                eye = defaults.eye_ratio.value(),
                lip = defaults.lip_ratio.value(),
                "measured apertures"
            );

            let eye = eye_ratio.map(Ratio::new).unwrap_or(defaults.eye_ratio);
            let lip = lip_ratio.map(Ratio::new).unwrap_or(defaults.lip_ratio);
            let outcome = session.retarget(eye, lip).await.context("retargeting")?;

            let out = save_image(&outcome.composited, &output_dir, "retargeted").await?;
            let crop_out = save_image(&outcome.crop, &output_dir, "retargeted-crop").await?;
            println!("retargeted portrait: {}", out.display());
            println!("face crop:           {}", crop_out.display());
        }

        Command::FetchWeights {
            repo,
            repo_type,
            dest,
        } => {
            let dest = dest.unwrap_or(config.model_dir);
            let report = fetch_weights(&repo, repo_type, &dest)
                .await
                .with_context(|| format!("fetching {repo}"))?;
            println!(
                "downloaded {} files ({} failed) into {}",
                report.downloaded,
                report.failed,
                dest.display()
            );
        }
    }

    Ok(())
}

/// Write an image to `{dir}/{stem}-{uuid}.png` via a temp file.
async fn save_image(
    image: &image::RgbImage,
    dir: &std::path::Path,
    stem: &str,
) -> anyhow::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let final_path = unique_output_path(dir, stem, "png");
    let tmp_path = final_path.with_extension("png.tmp");
    image
        .save_with_format(&tmp_path, image::ImageFormat::Png)
        .with_context(|| format!("writing {}", tmp_path.display()))?;
    persist(&tmp_path, &final_path).await?;
    Ok(final_path)
}
