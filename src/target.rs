//! Target point the flock seeks.
//!
//! A deployment picks one source: the pointer mapped onto a world-space
//! rectangle in the z = 0 plane, or the position of a tracked object. Bad
//! input never fails; it falls back to the screen center or the origin.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Default world rectangle the viewport maps onto.
pub const DEFAULT_WORLD_SIZE: [f32; 2] = [20.0, 11.0];

/// Where the target position comes from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum TargetSource {
    /// Pointer position mapped onto a `world_size` rectangle centered on the origin.
    Pointer { world_size: [f32; 2] },
    /// World position of an external object.
    Tracked,
}

impl Default for TargetSource {
    fn default() -> Self {
        TargetSource::Pointer {
            world_size: DEFAULT_WORLD_SIZE,
        }
    }
}

/// Raw pointer position in pixels together with the viewport size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerSample {
    pub position: Vec2,
    pub viewport: Vec2,
}

impl PointerSample {
    pub fn new(position: Vec2, viewport: Vec2) -> Self {
        Self { position, viewport }
    }

    /// Position in `[0, 1] x [0, 1]`, or the center `(0.5, 0.5)` when the
    /// pointer is outside the viewport or the viewport is empty.
    pub fn normalized(&self) -> Vec2 {
        if self.viewport.x <= 0.0 || self.viewport.y <= 0.0 {
            return Vec2::splat(0.5);
        }
        let n = self.position / self.viewport;
        if !n.is_finite() || n.x < 0.0 || n.x > 1.0 || n.y < 0.0 || n.y > 1.0 {
            Vec2::splat(0.5)
        } else {
            n
        }
    }
}

/// Per-tick input from the target collaborators.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TargetInput {
    pub pointer: Option<PointerSample>,
    pub tracked: Option<Vec3>,
}

impl TargetInput {
    pub fn pointer(sample: PointerSample) -> Self {
        Self {
            pointer: Some(sample),
            tracked: None,
        }
    }

    pub fn tracked(position: Vec3) -> Self {
        Self {
            pointer: None,
            tracked: Some(position),
        }
    }
}

/// Map a normalized pointer position onto the world rectangle.
#[inline]
pub fn pointer_to_world(normalized: Vec2, world_size: Vec2) -> Vec3 {
    let centered = (normalized - Vec2::splat(0.5)) * world_size;
    centered.extend(0.0)
}

/// Target position for this tick.
pub fn resolve_target(source: &TargetSource, input: &TargetInput) -> Vec3 {
    match source {
        TargetSource::Pointer { world_size } => {
            let normalized = input
                .pointer
                .map_or(Vec2::splat(0.5), |sample| sample.normalized());
            pointer_to_world(normalized, Vec2::from_array(*world_size))
        }
        TargetSource::Tracked => input.tracked.unwrap_or(Vec3::ZERO),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Vec2 = Vec2::new(1280.0, 720.0);

    fn pointer_source() -> TargetSource {
        TargetSource::Pointer {
            world_size: [20.0, 11.0],
        }
    }

    #[test]
    fn test_center_maps_to_origin() {
        let input = TargetInput::pointer(PointerSample::new(VIEWPORT * 0.5, VIEWPORT));
        assert_eq!(resolve_target(&pointer_source(), &input), Vec3::ZERO);
    }

    #[test]
    fn test_corner_maps_to_rectangle_corner() {
        let input = TargetInput::pointer(PointerSample::new(Vec2::ZERO, VIEWPORT));
        assert_eq!(
            resolve_target(&pointer_source(), &input),
            Vec3::new(-10.0, -5.5, 0.0)
        );

        let input = TargetInput::pointer(PointerSample::new(VIEWPORT, VIEWPORT));
        assert_eq!(
            resolve_target(&pointer_source(), &input),
            Vec3::new(10.0, 5.5, 0.0)
        );
    }

    #[test]
    fn test_out_of_bounds_pointer_defaults_to_center() {
        for pos in [
            Vec2::new(-1.0, 10.0),
            Vec2::new(2000.0, 10.0),
            Vec2::new(10.0, -0.5),
            Vec2::new(10.0, 721.0),
        ] {
            let sample = PointerSample::new(pos, VIEWPORT);
            assert_eq!(sample.normalized(), Vec2::splat(0.5));
        }
    }

    #[test]
    fn test_empty_viewport_defaults_to_center() {
        let sample = PointerSample::new(Vec2::new(10.0, 10.0), Vec2::ZERO);
        assert_eq!(sample.normalized(), Vec2::splat(0.5));
    }

    #[test]
    fn test_missing_pointer_targets_origin() {
        assert_eq!(
            resolve_target(&pointer_source(), &TargetInput::default()),
            Vec3::ZERO
        );
    }

    #[test]
    fn test_tracked_source() {
        let pos = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(
            resolve_target(&TargetSource::Tracked, &TargetInput::tracked(pos)),
            pos
        );
        // Pointer input is ignored by the tracked strategy
        let input = TargetInput::pointer(PointerSample::new(Vec2::ZERO, VIEWPORT));
        assert_eq!(resolve_target(&TargetSource::Tracked, &input), Vec3::ZERO);
    }

    #[test]
    fn test_pointer_to_world_custom_rect() {
        let p = pointer_to_world(Vec2::new(0.75, 0.25), Vec2::new(4.0, 2.0));
        assert_eq!(p, Vec3::new(1.0, -0.5, 0.0));
    }
}
