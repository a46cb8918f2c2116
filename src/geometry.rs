/*
 * Geometry Module
 *
 * Pure helpers for placing bubbles inside their space.
 *
 * Space coordinates are y-down with the origin at the space's top-left. A
 * bubble's position is the top-left corner of its bounding box and its size
 * is the diameter, so its centre is position + size / 2.
 */

use crate::config::BubbleConfig;

/// A point in space coordinates. Positions, offsets and interpolation all use
/// glam's vector type, the one nannou's Vec2 is built on.
pub type Position = glam::Vec2;

// The rectangle a bubble is allowed to live in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpaceRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl SpaceRect {
    pub const fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self { left, top, width, height }
    }

    pub fn from_size(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn contains(&self, point: Position) -> bool {
        point.x >= self.left && point.x <= self.right() && point.y >= self.top && point.y <= self.bottom()
    }
}

// Centre of a circle whose bounding box starts at `position`
#[inline]
pub fn center_of(position: Position, size: f32) -> Position {
    position + Position::splat(size / 2.0)
}

/// Two circles overlap when the distance between their centres is strictly
/// less than the sum of their radii.
#[inline]
pub fn circles_overlap(a: Position, size_a: f32, b: Position, size_b: f32) -> bool {
    let reach = (size_a + size_b) / 2.0;
    center_of(a, size_a).distance_squared(center_of(b, size_b)) < reach * reach
}

// Admissible range for one axis; collapses to the lower bound when the space is too small
#[inline]
fn axis_range(start: f32, length: f32, size: f32, padding: f32) -> (f32, f32) {
    let lo = start + padding;
    let hi = start + length - padding - size;
    if hi < lo {
        (lo, lo)
    } else {
        (lo, hi)
    }
}

/// Clamp `position` so a bubble of diameter `size` stays inside `rect`
/// shrunk by `padding` on every side.
pub fn clamp_to_space(position: Position, size: f32, rect: &SpaceRect, padding: f32) -> Position {
    let (min_x, max_x) = axis_range(rect.left, rect.width, size, padding);
    let (min_y, max_y) = axis_range(rect.top, rect.height, size, padding);
    position.clamp(Position::new(min_x, min_y), Position::new(max_x, max_y))
}

pub fn is_within_space(position: Position, size: f32, rect: &SpaceRect, padding: f32) -> bool {
    const EPSILON: f32 = 1e-3;
    clamp_to_space(position, size, rect, padding).abs_diff_eq(position, EPSILON)
}

// 0.0 at min_size, 1.0 at max_size
pub fn size_ratio(size: f32, config: &BubbleConfig) -> f32 {
    let span = config.max_size - config.min_size;
    if span <= f32::EPSILON {
        return 0.0;
    }
    ((size - config.min_size) / span).clamp(0.0, 1.0)
}

/// Bounds of the birth band for a bubble of `size`: `(min, max)` corners of
/// the top-left positions it may be born at.
pub fn birth_region(size: f32, rect: &SpaceRect, config: &BubbleConfig) -> (Position, Position) {
    let padding = config.space_padding;
    let (min_x, max_x) = axis_range(rect.left, rect.width, size, padding);
    let (min_y, max_y) = axis_range(rect.top, rect.height, size, padding);
    let band_top = (rect.bottom() - rect.height * config.birth_region_ratio).clamp(min_y, max_y);
    (Position::new(min_x, band_top), Position::new(max_x, max_y))
}

/// Where a bubble of `size` rests: the bigger it is, the higher it floats,
/// from the top of the birth band (smallest) up to the top padding (largest).
pub fn idle_position(current: Position, size: f32, rect: &SpaceRect, config: &BubbleConfig) -> Position {
    let (band_min, _) = birth_region(size, rect, config);
    let ceiling = rect.top + config.space_padding;
    let ratio = size_ratio(size, config);
    let y = band_min.y - ratio * (band_min.y - ceiling);
    clamp_to_space(Position::new(current.x, y), size, rect, config.space_padding)
}

pub fn top_position(current: Position, size: f32, rect: &SpaceRect, config: &BubbleConfig) -> Position {
    clamp_to_space(
        Position::new(current.x, rect.top + config.space_padding),
        size,
        rect,
        config.space_padding,
    )
}
