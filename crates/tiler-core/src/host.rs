//! The rendering host the tiler drives.
//!
//! A host is whatever actually produces pixels: a window with a GPU context,
//! a headless wgpu device, or the CPU rasterizer in `tiler-soft`. The tiler
//! only needs three capabilities, split into the traits below:
//!
//! * [`SurfaceProvider`]: viewport size and readback of the presented frame.
//! * [`OffscreenProvider`]: an off-window colour target whose alpha survives readback.
//! * [`TransformStack`]: scoped viewport/projection/view state.
//!
//! [`RenderHost`] is implemented for every type that has all three.

use glam::Mat4;

use crate::frustum::ClipDepth;
use crate::geom::{Point, Range};
use crate::pixels::{PixelBuffer, Rgba};

/// Viewport size and readback of the window surface.
pub trait SurfaceProvider {
    /// Error type for every host operation.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Current viewport size in device pixels.
    fn viewport_size(&self) -> Point;

    /// Device pixels per logical pixel.
    fn scale_factor(&self) -> f32 {
        1.0
    }

    /// NDC depth range the host's projection matrices must target.
    fn clip_depth(&self) -> ClipDepth {
        ClipDepth::NegativeOneToOne
    }

    /// Read back `rect` (top-left origin, device pixels) of the last rendered
    /// window frame.
    fn copy_region(&mut self, rect: Range) -> Result<PixelBuffer, Self::Error>;
}

/// Off-window colour targets.
pub trait OffscreenProvider: SurfaceProvider {
    type Target;

    /// Create a target of `size` device pixels with `samples` samples per pixel.
    fn create_offscreen(&mut self, size: Point, samples: u32) -> Result<Self::Target, Self::Error>;

    /// Redirect drawing into `target`.
    fn bind_offscreen(&mut self, target: &Self::Target) -> Result<(), Self::Error>;

    /// Restore drawing to the window surface.
    fn unbind_offscreen(&mut self, target: &Self::Target) -> Result<(), Self::Error>;

    /// Clear the currently bound target's colour (and depth, if any).
    fn clear(&mut self, color: Rgba) -> Result<(), Self::Error>;

    /// Read back `rect` of `target`, alpha included.
    fn read_offscreen(&mut self, target: &Self::Target, rect: Range) -> Result<PixelBuffer, Self::Error>;
}

/// Viewport, projection and view matrices, saved and restored together.
pub trait TransformStack: SurfaceProvider {
    fn push_state(&mut self);

    /// Restore the state saved by the matching [`push_state`](Self::push_state).
    fn pop_state(&mut self) -> Result<(), Self::Error>;

    /// Viewport rectangle in device pixels, top-left origin.
    fn set_viewport(&mut self, rect: Range);

    fn set_projection(&mut self, projection: Mat4);

    fn set_view(&mut self, view: Mat4);
}

/// Everything the tiler needs from a host.
pub trait RenderHost: SurfaceProvider + OffscreenProvider + TransformStack {}

impl<H> RenderHost for H where H: SurfaceProvider + OffscreenProvider + TransformStack + ?Sized {}

/// Run `f` between `push_state` and `pop_state`. The state is popped even
/// when `f` fails; `f`'s error wins over a pop error.
pub fn with_pushed_state<H, T, F>(host: &mut H, f: F) -> Result<T, H::Error>
where
    H: TransformStack + ?Sized,
    F: FnOnce(&mut H) -> Result<T, H::Error>,
{
    host.push_state();
    let out = f(host);
    let popped = host.pop_state();
    let out = out?;
    popped?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// &mut H forwarding, so a tiler can borrow a host instead of owning it.
// ---------------------------------------------------------------------------

impl<H: SurfaceProvider + ?Sized> SurfaceProvider for &mut H {
    type Error = H::Error;

    fn viewport_size(&self) -> Point {
        (**self).viewport_size()
    }

    fn scale_factor(&self) -> f32 {
        (**self).scale_factor()
    }

    fn clip_depth(&self) -> ClipDepth {
        (**self).clip_depth()
    }

    fn copy_region(&mut self, rect: Range) -> Result<PixelBuffer, Self::Error> {
        (**self).copy_region(rect)
    }
}

impl<H: OffscreenProvider + ?Sized> OffscreenProvider for &mut H {
    type Target = H::Target;

    fn create_offscreen(&mut self, size: Point, samples: u32) -> Result<Self::Target, Self::Error> {
        (**self).create_offscreen(size, samples)
    }

    fn bind_offscreen(&mut self, target: &Self::Target) -> Result<(), Self::Error> {
        (**self).bind_offscreen(target)
    }

    fn unbind_offscreen(&mut self, target: &Self::Target) -> Result<(), Self::Error> {
        (**self).unbind_offscreen(target)
    }

    fn clear(&mut self, color: Rgba) -> Result<(), Self::Error> {
        (**self).clear(color)
    }

    fn read_offscreen(&mut self, target: &Self::Target, rect: Range) -> Result<PixelBuffer, Self::Error> {
        (**self).read_offscreen(target, rect)
    }
}

impl<H: TransformStack + ?Sized> TransformStack for &mut H {
    fn push_state(&mut self) {
        (**self).push_state()
    }

    fn pop_state(&mut self) -> Result<(), Self::Error> {
        (**self).pop_state()
    }

    fn set_viewport(&mut self, rect: Range) {
        (**self).set_viewport(rect)
    }

    fn set_projection(&mut self, projection: Mat4) {
        (**self).set_projection(projection)
    }

    fn set_view(&mut self, view: Mat4) {
        (**self).set_view(view)
    }
}
