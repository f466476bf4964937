//! Colour + depth surfaces and the scanline-free triangle rasterizer.
//!
//! Pixels are sampled at their centres. A pixel whose centre lies exactly on
//! a shared edge belongs to the triangle for which that edge is a top or
//! left edge, so meshes cover every pixel once.

use glam::{Vec3, Vec4};
use tiler_core::{PixelBuffer, Point, Range, Rgba};

/// Colour and depth storage for the window or an offscreen target.
pub(crate) struct Surface {
    pub color: PixelBuffer,
    pub depth: Vec<f32>,
    /// Whether every write is forced opaque, as on a window framebuffer.
    pub opaque: bool,
}

impl Surface {
    pub fn new(size: Point, opaque: bool) -> Self {
        let (w, h) = (size.x.max(0) as usize, size.y.max(0) as usize);
        Self {
            color: PixelBuffer::new(w, h),
            depth: vec![1.0; w * h],
            opaque,
        }
    }

    #[inline]
    pub fn bounds(&self) -> Range {
        self.color.bounds()
    }

    pub fn clear_color(&mut self, color: Rgba) {
        self.color.fill(self.store(color));
    }

    pub fn clear_depth(&mut self) {
        self.depth.fill(1.0);
    }

    #[inline]
    fn store(&self, color: Rgba) -> Rgba {
        if self.opaque { color.opaque() } else { color }
    }

    /// Write `color` at `p` without a depth test.
    pub fn put(&mut self, p: Point, color: Rgba) {
        let color = self.store(color);
        self.color.set(p, color);
    }

    /// Write `color` at `p` if `z` is in range and nearer than the stored depth.
    pub fn plot(&mut self, p: Point, z: f32, color: Rgba) {
        if !(0.0..=1.0).contains(&z) {
            return;
        }
        let i = p.y as usize * self.color.width() + p.x as usize;
        if z < self.depth[i] {
            self.depth[i] = z;
            let color = self.store(color);
            self.color.set(p, color);
        }
    }
}

#[inline]
fn edge(a: Vec3, b: Vec3, px: f32, py: f32) -> f32 {
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

/// Top or left edge of a triangle with positive [`edge`] orientation
/// (screen y down).
#[inline]
fn is_top_left(from: Vec3, to: Vec3) -> bool {
    let (dx, dy) = (to.x - from.x, to.y - from.y);
    (dy == 0.0 && dx > 0.0) || dy < 0.0
}

#[inline]
fn covers(w: f32, from: Vec3, to: Vec3) -> bool {
    w > 0.0 || (w == 0.0 && is_top_left(from, to))
}

/// Call `plot(pixel, depth)` for every pixel of `clip` whose centre lies in
/// the screen-space triangle `tri` (`x`, `y` in pixels, `z` depth).
pub(crate) fn rasterize(tri: [Vec3; 3], clip: Range, mut plot: impl FnMut(Point, f32)) {
    let [a, mut b, mut c] = tri;
    let area = edge(a, b, c.x, c.y);
    if area == 0.0 || !area.is_finite() {
        return;
    }
    if area < 0.0 {
        std::mem::swap(&mut b, &mut c);
    }
    let area = area.abs();

    let min = a.min(b).min(c);
    let max = a.max(b).max(c);
    let bbox = Range::new(
        min.x.floor() as i32,
        min.y.floor() as i32,
        max.x.ceil() as i32 + 1,
        max.y.ceil() as i32 + 1,
    )
    .intersect(clip);

    for p in bbox {
        let (px, py) = (p.x as f32 + 0.5, p.y as f32 + 0.5);
        let w0 = edge(b, c, px, py);
        let w1 = edge(c, a, px, py);
        let w2 = edge(a, b, px, py);
        if covers(w0, b, c) && covers(w1, c, a) && covers(w2, a, b) {
            let z = (w0 * a.z + w1 * b.z + w2 * c.z) / area;
            plot(p, z);
        }
    }
}

/// Clip a polygon in homogeneous clip space against the near plane
/// (`z >= -w`).
pub(crate) fn clip_near(poly: &[Vec4]) -> Vec<Vec4> {
    let dist = |v: Vec4| v.z + v.w;
    let mut out = Vec::with_capacity(poly.len() + 1);
    for (i, &cur) in poly.iter().enumerate() {
        let prev = poly[(i + poly.len() - 1) % poly.len()];
        let (dc, dp) = (dist(cur), dist(prev));
        if dc >= 0.0 {
            if dp < 0.0 {
                out.push(prev.lerp(cur, dp / (dp - dc)));
            }
            out.push(cur);
        } else if dp >= 0.0 {
            out.push(prev.lerp(cur, dp / (dp - dc)));
        }
    }
    out
}
