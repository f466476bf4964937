//! Projection frusta and their per-tile subdivision.
//!
//! A [`Frustum`] holds the six clipping-plane extents a `glFrustum` or
//! `glOrtho` call takes. Tiling never touches the view matrix: each tile is
//! rendered with [`Frustum::subdivide`], which narrows the left/right and
//! top/bottom extents to the tile's share of the image.

use glam::{Mat4, Vec4};

use crate::geom::{Point, Range};

/// Whether a frustum describes a perspective or an orthographic projection.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProjectionKind {
    #[default]
    Perspective,
    Orthographic,
}

/// Depth range of the host's normalized device coordinates.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ClipDepth {
    /// OpenGL convention, `z` in `[-1, 1]`.
    #[default]
    NegativeOneToOne,
    /// Vulkan/Metal/D3D/wgpu convention, `z` in `[0, 1]`.
    ZeroToOne,
}

/// Off-axis projection volume.
///
/// `top` and `bottom` are taken as given: for a y-up camera `top > bottom`,
/// for a pixel-space ortho (`top = 0`, `bottom = height`) the reverse. The
/// signed [`height`](Self::height) makes subdivision work for both.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Frustum {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    pub near: f32,
    pub far: f32,
    pub kind: ProjectionKind,
}

impl Frustum {
    /// A perspective frustum, arguments in `glFrustum` order.
    pub const fn perspective(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        Self {
            left,
            right,
            bottom,
            top,
            near,
            far,
            kind: ProjectionKind::Perspective,
        }
    }

    /// An orthographic box, arguments in `glOrtho` order.
    pub const fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        Self {
            left,
            right,
            bottom,
            top,
            near,
            far,
            kind: ProjectionKind::Orthographic,
        }
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    /// `bottom - top`, signed: image rows grow from `top` towards `bottom`.
    #[inline]
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    #[inline]
    pub fn is_perspective(&self) -> bool {
        self.kind == ProjectionKind::Perspective
    }

    /// The sub-frustum covering `tile` of an `image`-sized render.
    ///
    /// Linear in both axes, so rendering every tile of a grid with its
    /// sub-frustum into a tile-sized viewport reproduces the full render.
    /// `near`, `far` and the projection kind are kept.
    pub fn subdivide(&self, tile: Range, image: Point) -> Frustum {
        let (iw, ih) = (image.x as f64, image.y as f64);
        let (fw, fh) = (self.width() as f64, self.height() as f64);

        let left = self.left as f64 + tile.min.x as f64 / iw * fw;
        let right = left + tile.width() as f64 / iw * fw;
        let top = self.top as f64 + tile.min.y as f64 / ih * fh;
        let bottom = top + tile.height() as f64 / ih * fh;

        Frustum {
            left: left as f32,
            right: right as f32,
            bottom: bottom as f32,
            top: top as f32,
            ..*self
        }
    }

    /// The projection matrix for this frustum (right-handed, camera looks
    /// down `-z`), with depth mapped to the host's `clip_depth` range.
    pub fn matrix(&self, clip_depth: ClipDepth) -> Mat4 {
        let (l, r, b, t, n, f) = (self.left, self.right, self.bottom, self.top, self.near, self.far);
        let gl = match self.kind {
            ProjectionKind::Perspective => Mat4::from_cols(
                Vec4::new(2.0 * n / (r - l), 0.0, 0.0, 0.0),
                Vec4::new(0.0, 2.0 * n / (t - b), 0.0, 0.0),
                Vec4::new((r + l) / (r - l), (t + b) / (t - b), -(f + n) / (f - n), -1.0),
                Vec4::new(0.0, 0.0, -2.0 * f * n / (f - n), 0.0),
            ),
            ProjectionKind::Orthographic => Mat4::from_cols(
                Vec4::new(2.0 / (r - l), 0.0, 0.0, 0.0),
                Vec4::new(0.0, 2.0 / (t - b), 0.0, 0.0),
                Vec4::new(0.0, 0.0, -2.0 / (f - n), 0.0),
                Vec4::new(-(r + l) / (r - l), -(t + b) / (t - b), -(f + n) / (f - n), 1.0),
            ),
        };
        match clip_depth {
            ClipDepth::NegativeOneToOne => gl,
            // z' = (z + w) / 2
            ClipDepth::ZeroToOne => {
                let remap = Mat4::from_cols(Vec4::X, Vec4::Y, Vec4::new(0.0, 0.0, 0.5, 0.0), Vec4::new(0.0, 0.0, 0.5, 1.0));
                remap * gl
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    /// Project a view-space point to pixel coordinates (top-left origin) of
    /// a `size` viewport.
    fn to_pixel(m: Mat4, p: Vec3, size: Point) -> (f32, f32) {
        let clip = m * p.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        (
            (ndc.x + 1.0) * 0.5 * size.x as f32,
            (1.0 - ndc.y) * 0.5 * size.y as f32,
        )
    }

    #[test]
    fn width_and_signed_height() {
        let f = Frustum::perspective(-2.0, 2.0, -1.0, 1.0, 1.0, 10.0);
        assert_eq!(f.width(), 4.0);
        assert_eq!(f.height(), -2.0);
        let o = Frustum::orthographic(0.0, 640.0, 480.0, 0.0, -1.0, 1.0);
        assert_eq!(o.height(), 480.0);
        assert!(!o.is_perspective());
    }

    #[test]
    fn full_tile_is_identity() {
        let f = Frustum::perspective(-0.4, 0.6, -0.3, 0.5, 0.1, 100.0);
        let image = Point::new(512, 512);
        assert_eq!(f.subdivide(Range::from_size(image), image), f);
    }

    #[test]
    fn subdivide_example_grid() {
        let f = Frustum::perspective(-1.0, 1.0, -0.6, 0.6, 1.0, 10.0);
        let image = Point::new(1000, 600);

        let t = f.subdivide(Range::new(512, 0, 1000, 512), image);
        assert!(approx(t.left, -1.0 + 0.512 * 2.0));
        assert!(approx(t.right, 1.0));
        assert!(approx(t.top, 0.6));
        assert!(approx(t.bottom, 0.6 - 512.0 / 600.0 * 1.2));
        assert_eq!((t.near, t.far, t.kind), (1.0, 10.0, ProjectionKind::Perspective));

        let t = f.subdivide(Range::new(0, 512, 512, 600), image);
        assert!(approx(t.bottom, -0.6));
        assert!(approx(t.left, -1.0));
    }

    #[test]
    fn neighbouring_tiles_share_planes() {
        let f = Frustum::orthographic(0.0, 1000.0, 600.0, 0.0, -1.0, 1.0);
        let image = Point::new(1000, 600);
        let a = f.subdivide(Range::new(0, 0, 384, 256), image);
        let b = f.subdivide(Range::new(384, 0, 768, 256), image);
        let c = f.subdivide(Range::new(0, 256, 384, 512), image);
        assert_eq!(a.right, b.left);
        assert_eq!(a.bottom, c.top);
        // pixel-space ortho: sub-frustum extents are the tile rectangle
        assert_eq!((b.left, b.right, b.top, b.bottom), (384.0, 768.0, 0.0, 256.0));
    }

    #[test]
    fn perspective_matrix_maps_corners() {
        let f = Frustum::perspective(-2.0, 1.0, -1.0, 3.0, 1.0, 50.0);
        let m = f.matrix(ClipDepth::NegativeOneToOne);
        let near_tl = m * Vec4::new(-2.0, 3.0, -1.0, 1.0);
        let ndc = near_tl.truncate() / near_tl.w;
        assert!(approx(ndc.x, -1.0) && approx(ndc.y, 1.0) && approx(ndc.z, -1.0));

        let far_br = m * Vec4::new(50.0, -50.0, -50.0, 1.0);
        let ndc = far_br.truncate() / far_br.w;
        assert!(approx(ndc.x, 1.0) && approx(ndc.y, -1.0) && approx(ndc.z, 1.0));
    }

    #[test]
    fn zero_to_one_depth() {
        for f in [
            Frustum::perspective(-1.0, 1.0, -1.0, 1.0, 2.0, 20.0),
            Frustum::orthographic(-1.0, 1.0, -1.0, 1.0, 2.0, 20.0),
        ] {
            let m = f.matrix(ClipDepth::ZeroToOne);
            let near = m * Vec4::new(0.0, 0.0, -2.0, 1.0);
            let far = m * Vec4::new(0.0, 0.0, -20.0, 1.0);
            assert!(approx(near.z / near.w, 0.0), "{f:?}");
            assert!(approx(far.z / far.w, 1.0), "{f:?}");
        }
    }

    #[test]
    fn tile_projection_matches_full_projection() {
        let image = Point::new(1000, 600);
        let full = Frustum::perspective(-0.8, 0.8, -0.48, 0.48, 1.0, 100.0);
        let full_m = full.matrix(ClipDepth::NegativeOneToOne);
        let tile = Range::new(512, 0, 1000, 512);
        let tile_m = full.subdivide(tile, image).matrix(ClipDepth::NegativeOneToOne);

        for p in [Vec3::new(0.5, 0.3, -3.0), Vec3::new(2.0, -0.1, -7.5), Vec3::new(0.01, 0.4, -1.2)] {
            let (fx, fy) = to_pixel(full_m, p, image);
            let (tx, ty) = to_pixel(tile_m, p, tile.size());
            assert!((fx - (tx + tile.min.x as f32)).abs() < 1e-2, "x for {p}");
            assert!((fy - (ty + tile.min.y as f32)).abs() < 1e-2, "y for {p}");
        }
    }
}
