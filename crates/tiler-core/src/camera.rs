//! A minimal camera: a view matrix plus a lens that yields a [`Frustum`].

use glam::{Mat4, Vec2, Vec3};

use crate::frustum::Frustum;

/// How a camera projects. The perspective lens follows the usual
/// vertical-field-of-view model with an optional lens shift.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Lens {
    Perspective {
        /// Vertical field of view, in radians.
        fov_y: f32,
        /// Width over height.
        aspect: f32,
        near: f32,
        far: f32,
        /// Off-axis shift in units of half the frustum extent; `(1, 0)`
        /// moves the view window right by half its width.
        lens_shift: Vec2,
    },
    Orthographic(Frustum),
}

impl Lens {
    /// A centred perspective lens, `fov_y` in radians.
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Lens::Perspective {
            fov_y,
            aspect,
            near,
            far,
            lens_shift: Vec2::ZERO,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Camera {
    /// World → eye transform.
    pub view: Mat4,
    pub lens: Lens,
}

impl Camera {
    pub fn new(view: Mat4, lens: Lens) -> Self {
        Self { view, lens }
    }

    /// A right-handed camera at `eye` looking at `target`.
    pub fn look_at(eye: Vec3, target: Vec3, up: Vec3, lens: Lens) -> Self {
        Self {
            view: Mat4::look_at_rh(eye, target, up),
            lens,
        }
    }

    /// A perspective camera over a `width × height` pixel plane at `z = 0`:
    /// the eye sits above the plane's centre, at the distance where the plane
    /// exactly fills the vertical field of view. World y points up.
    pub fn window_perspective(width: f32, height: f32, fov_deg: f32, near: f32, far: f32) -> Self {
        let fov_y = fov_deg.to_radians();
        let (cx, cy) = (width / 2.0, height / 2.0);
        let dist = cy / (fov_y / 2.0).tan();
        Self::look_at(
            Vec3::new(cx, cy, dist),
            Vec3::new(cx, cy, 0.0),
            Vec3::Y,
            Lens::perspective(fov_y, width / height, near, far),
        )
    }

    #[inline]
    pub fn is_perspective(&self) -> bool {
        matches!(self.lens, Lens::Perspective { .. })
    }

    /// The six frustum planes of the lens.
    pub fn frustum(&self) -> Frustum {
        match self.lens {
            Lens::Perspective {
                fov_y,
                aspect,
                near,
                far,
                lens_shift,
            } => {
                let top = near * (fov_y / 2.0).tan();
                let right = top * aspect;
                let dx = right * lens_shift.x;
                let dy = top * lens_shift.y;
                Frustum::perspective(-right + dx, right + dx, -top + dy, top + dy, near, far)
            }
            Lens::Orthographic(frustum) => frustum,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frustum::{ClipDepth, ProjectionKind};
    use glam::Vec4;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn perspective_frustum_extents() {
        let cam = Camera::new(
            Mat4::IDENTITY,
            Lens::perspective(90f32.to_radians(), 2.0, 1.0, 10.0),
        );
        let f = cam.frustum();
        assert_eq!(f.kind, ProjectionKind::Perspective);
        assert!(approx(f.top, 1.0) && approx(f.bottom, -1.0));
        assert!(approx(f.right, 2.0) && approx(f.left, -2.0));
        assert_eq!((f.near, f.far), (1.0, 10.0));
    }

    #[test]
    fn lens_shift_moves_window() {
        let lens = Lens::Perspective {
            fov_y: 90f32.to_radians(),
            aspect: 1.0,
            near: 1.0,
            far: 10.0,
            lens_shift: Vec2::new(1.0, -0.5),
        };
        let f = Camera::new(Mat4::IDENTITY, lens).frustum();
        assert!(approx(f.left, 0.0) && approx(f.right, 2.0));
        assert!(approx(f.bottom, -1.5) && approx(f.top, 0.5));
    }

    #[test]
    fn orthographic_lens_passes_through() {
        let box_ = Frustum::orthographic(-5.0, 5.0, -3.0, 3.0, 0.1, 50.0);
        let cam = Camera::new(Mat4::IDENTITY, Lens::Orthographic(box_));
        assert!(!cam.is_perspective());
        assert_eq!(cam.frustum(), box_);
    }

    #[test]
    fn window_perspective_fills_view() {
        let (w, h) = (800.0, 600.0);
        let cam = Camera::window_perspective(w, h, 60.0, 1.0, 5000.0);
        let m = cam.frustum().matrix(ClipDepth::NegativeOneToOne) * cam.view;

        let ndc = |x: f32, y: f32| {
            let c = m * Vec4::new(x, y, 0.0, 1.0);
            (c.x / c.w, c.y / c.w)
        };
        let (x, y) = ndc(0.0, 0.0);
        assert!(approx(x, -1.0) && approx(y, -1.0), "({x}, {y})");
        let (x, y) = ndc(w, h);
        assert!(approx(x, 1.0) && approx(y, 1.0), "({x}, {y})");
        let (x, y) = ndc(w / 2.0, h / 2.0);
        assert!(approx(x, 0.0) && approx(y, 0.0));
    }
}
