//! 68-point facial landmarks and open-ratio math.
//!
//! # Landmarks Layout (68-point model)
//!
//! - 0-16: Jaw outline
//! - 17-21: Right eyebrow
//! - 22-26: Left eyebrow
//! - 27-35: Nose
//! - 36-41: Right eye
//! - 42-47: Left eye
//! - 48-59: Outer lip
//! - 60-67: Inner lip

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Number of points in the landmark set.
pub const LANDMARK_COUNT: usize = 68;

/// Eyelid pairs (upper, lower) and corner pairs (outer, inner) per eye.
const RIGHT_EYE_LIDS: [(usize, usize); 2] = [(37, 41), (38, 40)];
const RIGHT_EYE_CORNERS: (usize, usize) = (36, 39);
const LEFT_EYE_LIDS: [(usize, usize); 2] = [(43, 47), (44, 46)];
const LEFT_EYE_CORNERS: (usize, usize) = (42, 45);

/// Inner-lip pairs (upper, lower) and mouth corners.
const INNER_LIP_PAIRS: [(usize, usize); 3] = [(61, 67), (62, 66), (63, 65)];
const MOUTH_CORNERS: (usize, usize) = (60, 64);

/// 68-point facial landmarks in source pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FaceLandmarks {
    /// Landmark coordinates in (x, y) format
    pub points: Vec<(f32, f32)>,
}

impl FaceLandmarks {
    pub fn new(points: Vec<(f32, f32)>) -> Self {
        Self { points }
    }

    fn dist(&self, a: usize, b: usize) -> f32 {
        let (ax, ay) = self.points[a];
        let (bx, by) = self.points[b];
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    }

    /// Vertical aperture over horizontal width for one eye.
    fn eye_aspect(&self, lids: &[(usize, usize)], corners: (usize, usize)) -> f32 {
        let width = self.dist(corners.0, corners.1);
        if width < f32::EPSILON {
            return 0.0;
        }
        let aperture: f32 =
            lids.iter().map(|&(u, l)| self.dist(u, l)).sum::<f32>() / lids.len() as f32;
        aperture / width
    }

    /// Eye-open ratio averaged over both eyes (0.0 = closed).
    pub fn eye_open_ratio(&self) -> f32 {
        if self.points.len() < LANDMARK_COUNT {
            return 0.0;
        }
        let right = self.eye_aspect(&RIGHT_EYE_LIDS, RIGHT_EYE_CORNERS);
        let left = self.eye_aspect(&LEFT_EYE_LIDS, LEFT_EYE_CORNERS);
        (right + left) / 2.0
    }

    /// Lip-open ratio: inner-lip aperture over mouth width (0.0 = closed).
    pub fn lip_open_ratio(&self) -> f32 {
        if self.points.len() < LANDMARK_COUNT {
            return 0.0;
        }
        let width = self.dist(MOUTH_CORNERS.0, MOUTH_CORNERS.1);
        if width < f32::EPSILON {
            return 0.0;
        }
        let aperture: f32 = INNER_LIP_PAIRS
            .iter()
            .map(|&(u, l)| self.dist(u, l))
            .sum::<f32>()
            / INNER_LIP_PAIRS.len() as f32;
        aperture / width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Landmark set with configurable eye and lip apertures.
    fn synthetic(eye_gap: f32, lip_gap: f32) -> FaceLandmarks {
        let mut points = vec![(0.0f32, 0.0f32); LANDMARK_COUNT];
        // Right eye: corners 10px apart, lids eye_gap apart.
        points[36] = (0.0, 50.0);
        points[39] = (10.0, 50.0);
        for &(u, l) in &RIGHT_EYE_LIDS {
            points[u] = (5.0, 50.0 - eye_gap / 2.0);
            points[l] = (5.0, 50.0 + eye_gap / 2.0);
        }
        // Left eye mirrors it.
        points[42] = (30.0, 50.0);
        points[45] = (40.0, 50.0);
        for &(u, l) in &LEFT_EYE_LIDS {
            points[u] = (35.0, 50.0 - eye_gap / 2.0);
            points[l] = (35.0, 50.0 + eye_gap / 2.0);
        }
        // Mouth: corners 20px apart, inner lips lip_gap apart.
        points[60] = (10.0, 80.0);
        points[64] = (30.0, 80.0);
        for &(u, l) in &INNER_LIP_PAIRS {
            points[u] = (20.0, 80.0 - lip_gap / 2.0);
            points[l] = (20.0, 80.0 + lip_gap / 2.0);
        }
        FaceLandmarks::new(points)
    }

    #[test]
    fn closed_face_ratios_are_zero() {
        let lm = synthetic(0.0, 0.0);
        assert_eq!(lm.eye_open_ratio(), 0.0);
        assert_eq!(lm.lip_open_ratio(), 0.0);
    }

    #[test]
    fn ratios_scale_with_aperture() {
        let narrow = synthetic(1.0, 2.0);
        let wide = synthetic(4.0, 8.0);
        assert!(wide.eye_open_ratio() > narrow.eye_open_ratio());
        assert!(wide.lip_open_ratio() > narrow.lip_open_ratio());
        // 10px eye width, 3px aperture -> 0.3.
        let lm = synthetic(3.0, 0.0);
        assert!((lm.eye_open_ratio() - 0.3).abs() < 1e-5);
        // 20px mouth width, 8px aperture -> 0.4.
        let lm = synthetic(0.0, 8.0);
        assert!((lm.lip_open_ratio() - 0.4).abs() < 1e-5);
    }

    #[test]
    fn short_point_list_is_harmless() {
        let lm = FaceLandmarks::new(vec![(0.0, 0.0); 5]);
        assert_eq!(lm.eye_open_ratio(), 0.0);
        assert_eq!(lm.lip_open_ratio(), 0.0);
    }
}
