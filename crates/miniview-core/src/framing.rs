//! Camera framing around the scene's world bounds

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

/// Distance from the bounds center, as a multiple of the bounds diagonal
const RADIUS_SCALE: f32 = 1.2;

/// Axis-aligned bounding box in world space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing all points, or `None` for an empty iterator
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        points.into_iter().fold(None, |acc: Option<Bounds>, p| {
            Some(match acc {
                Some(b) => Bounds::new(b.min.min(p), b.max.max(p)),
                None => Bounds::new(p, p),
            })
        })
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds::new(self.min.min(other.min), self.max.max(other.max))
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        self.min + self.size() * 0.5
    }
}

/// Orbit camera parameters derived from the scene bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraFraming {
    pub target: Vec3,
    pub radius: f32,
    pub alpha: f32,
    pub beta: f32,
    pub lower_radius_limit: f32,
    pub upper_radius_limit: f32,
    pub wheel_precision: f32,
    pub pinch_precision: f32,
    pub wheel_delta_percentage: f32,
    pub pinch_delta_percentage: f32,
    pub min_z: f32,
    pub max_z: f32,
    pub speed: f32,
    pub auto_rotate: bool,
    /// Box the framing behavior zooms onto, when the scene has content
    pub focus: Option<Bounds>,
}

impl CameraFraming {
    /// Frame the given bounds, or fall back to a unit radius around the
    /// origin for an empty scene or degenerate bounds.
    pub fn from_bounds(bounds: Option<Bounds>) -> Self {
        let (radius, target, focus) = match bounds {
            Some(b) => {
                let radius = b.size().length() * RADIUS_SCALE;
                if radius.is_finite() && radius > f32::EPSILON {
                    (radius, b.center(), Some(b))
                } else {
                    (1.0, Vec3::ZERO, None)
                }
            }
            None => (1.0, Vec3::ZERO, None),
        };

        Self {
            target,
            radius,
            alpha: FRAC_PI_2,
            beta: FRAC_PI_2,
            lower_radius_limit: radius * 0.01,
            upper_radius_limit: radius * 5.0,
            wheel_precision: 100.0 / radius,
            pinch_precision: 200.0 / radius,
            wheel_delta_percentage: 0.01,
            pinch_delta_percentage: 0.01,
            min_z: radius * 0.01,
            max_z: radius * 1000.0,
            speed: radius * 0.2,
            auto_rotate: true,
            focus,
        }
    }

    /// Distance between the near and far clip planes
    pub fn depth_range(&self) -> f32 {
        self.max_z - self.min_z
    }
}

impl Default for CameraFraming {
    fn default() -> Self {
        Self::from_bounds(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_framing_for_empty_scene() {
        let framing = CameraFraming::from_bounds(None);
        assert_eq!(framing.radius, 1.0);
        assert_eq!(framing.target, Vec3::ZERO);
        assert_eq!(framing.upper_radius_limit, 5.0);
        assert_eq!(framing.max_z, 1000.0);
        assert!(framing.focus.is_none());
        assert!(framing.auto_rotate);
    }

    #[test]
    fn test_framing_scales_with_bounds() {
        let bounds = Bounds::new(Vec3::new(-1.0, 0.0, -1.0), Vec3::new(1.0, 2.0, 1.0));
        let framing = CameraFraming::from_bounds(Some(bounds));

        let expected_radius = bounds.size().length() * 1.2;
        assert!((framing.radius - expected_radius).abs() < 1e-5);
        assert_eq!(framing.target, Vec3::new(0.0, 1.0, 0.0));
        assert!((framing.min_z - expected_radius * 0.01).abs() < 1e-6);
        assert!((framing.wheel_precision - 100.0 / expected_radius).abs() < 1e-4);
        assert_eq!(framing.focus, Some(bounds));
    }

    #[test]
    fn test_degenerate_bounds_fall_back_to_unit_radius() {
        let point = Bounds::new(Vec3::ONE, Vec3::ONE);
        assert_eq!(CameraFraming::from_bounds(Some(point)).radius, 1.0);

        let infinite = Bounds::new(Vec3::splat(f32::NEG_INFINITY), Vec3::splat(f32::INFINITY));
        let framing = CameraFraming::from_bounds(Some(infinite));
        assert_eq!(framing.radius, 1.0);
        assert_eq!(framing.target, Vec3::ZERO);
    }

    #[test]
    fn test_bounds_from_points() {
        assert!(Bounds::from_points(Vec::<Vec3>::new()).is_none());

        let bounds = Bounds::from_points([
            Vec3::new(1.0, -2.0, 0.5),
            Vec3::new(-3.0, 4.0, 0.0),
        ])
        .unwrap();
        assert_eq!(bounds.min, Vec3::new(-3.0, -2.0, 0.0));
        assert_eq!(bounds.max, Vec3::new(1.0, 4.0, 0.5));
        assert_eq!(bounds.center(), Vec3::new(-1.0, 1.0, 0.25));
    }
}
