//! Geometry for hit detection
//!
//! Axis-aligned arena rectangles, blade segments, and the distance queries the
//! combat resolver runs every tick.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle (top-left origin, y down)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn left(&self) -> f32 {
        self.x
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    #[inline]
    pub fn top(&self) -> f32 {
        self.y
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Shrink every side inward by `amount`
    pub fn inset(&self, amount: f32) -> Self {
        Self::new(
            self.x + amount,
            self.y + amount,
            self.width - amount * 2.0,
            self.height - amount * 2.0,
        )
    }

    /// Scale about the center, never below `floor` on either side
    pub fn scaled(&self, scale: f32, floor: f32) -> Self {
        let c = self.center();
        let w = (self.width * scale).max(floor);
        let h = (self.height * scale).max(floor);
        Self::new(c.x - w / 2.0, c.y - h / 2.0, w, h)
    }

    /// Clamp a circle's center so the circle lies inside the rectangle
    pub fn clamp_circle(&self, center: Vec2, radius: f32) -> Vec2 {
        let min_x = self.left() + radius;
        let max_x = (self.right() - radius).max(min_x);
        let min_y = self.top() + radius;
        let max_y = (self.bottom() - radius).max(min_y);
        Vec2::new(center.x.clamp(min_x, max_x), center.y.clamp(min_y, max_y))
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.left() && p.x <= self.right() && p.y >= self.top() && p.y <= self.bottom()
    }
}

/// A line segment (sword blade from base to tip)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub a: Vec2,
    pub b: Vec2,
}

impl Segment {
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self { a, b }
    }

    /// Point at fraction `t` from `a` to `b`
    #[inline]
    pub fn lerp(&self, t: f32) -> Vec2 {
        self.a + (self.b - self.a) * t
    }

    /// Closest point on the segment to `p`
    pub fn closest_point(&self, p: Vec2) -> Vec2 {
        let line = self.b - self.a;
        let len_sq = line.length_squared();
        if len_sq < 0.0001 {
            return self.a; // Degenerate segment
        }
        let t = ((p - self.a).dot(line) / len_sq).clamp(0.0, 1.0);
        self.a + line * t
    }

    pub fn distance_to_point(&self, p: Vec2) -> f32 {
        (p - self.closest_point(p)).length()
    }

    /// Minimum distance between two segments
    pub fn distance_to_segment(&self, other: &Segment) -> f32 {
        if segments_intersect(self, other) {
            return 0.0;
        }
        // Non-crossing segments: the minimum is at an endpoint
        self.distance_to_point(other.a)
            .min(self.distance_to_point(other.b))
            .min(other.distance_to_point(self.a))
            .min(other.distance_to_point(self.b))
    }
}

#[inline]
fn cross(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Proper or touching intersection test
fn segments_intersect(s1: &Segment, s2: &Segment) -> bool {
    let r = s1.b - s1.a;
    let s = s2.b - s2.a;
    let denom = cross(r, s);
    if denom.abs() < 1e-6 {
        return false; // Parallel; endpoint distances cover overlap
    }
    let qp = s2.a - s1.a;
    let t = cross(qp, s) / denom;
    let u = cross(qp, r) / denom;
    (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u)
}

/// Circle-circle overlap: (normal from a to b, penetration depth)
pub fn circle_overlap(a: Vec2, ra: f32, b: Vec2, rb: f32) -> Option<(Vec2, f32)> {
    let delta = b - a;
    let dist = delta.length();
    let reach = ra + rb;
    if dist >= reach {
        return None;
    }
    let normal = if dist > 1e-4 { delta / dist } else { Vec2::X };
    Some((normal, reach - dist))
}
