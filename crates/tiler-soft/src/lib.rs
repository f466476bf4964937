//! CPU render host for `tiler-core`.
//!
//! [`SoftHost`] plays the part of a window with a GL-style context: an opaque
//! RGBA8 framebuffer with a depth buffer, a viewport/projection/view stack and
//! any number of offscreen targets that keep their alpha. Scene callbacks
//! draw through [`SoftHost::draw_triangle`], [`SoftHost::draw_quad`] and
//! [`SoftHost::fill_rect`].
//!
//! Rendering is deterministic, which makes it the reference host for
//! checking that a tiled render matches a single full-size render.

mod raster;

use std::fmt;

use glam::{Mat4, Vec3, Vec4};
use log::{debug, trace};

use tiler_core::{
    OffscreenProvider, PixelBuffer, Point, Range, Rgba, SurfaceProvider, TransformStack,
};

use raster::Surface;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for [`SoftHost`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SoftHostConfig {
    /// Framebuffer width in device pixels.
    pub width: i32,
    /// Framebuffer height in device pixels.
    pub height: i32,
    /// Device pixels per logical pixel reported to the tiler.
    pub scale_factor: f32,
    /// Initial framebuffer colour.
    pub clear_color: Rgba,
}

impl Default for SoftHostConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            scale_factor: 1.0,
            clear_color: Rgba::BLACK,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from [`SoftHost`].
#[derive(Debug, Clone, PartialEq)]
pub enum SoftHostError {
    /// A readback rectangle is not inside the surface.
    RegionOutOfBounds { rect: Range, bounds: Range },
    /// The target handle does not belong to this host.
    NoSuchTarget,
    /// `pop_state` without a matching `push_state`.
    UnbalancedPop,
}

impl fmt::Display for SoftHostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegionOutOfBounds { rect, bounds } => {
                write!(f, "region {rect} is outside the surface {bounds}")
            }
            Self::NoSuchTarget => write!(f, "no such offscreen target"),
            Self::UnbalancedPop => write!(f, "pop_state without matching push_state"),
        }
    }
}

impl std::error::Error for SoftHostError {}

// ---------------------------------------------------------------------------
// SoftHost
// ---------------------------------------------------------------------------

/// Handle to an offscreen target created by [`SoftHost`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SoftTarget {
    index: usize,
    size: Point,
    samples: u32,
}

impl SoftTarget {
    pub fn size(&self) -> Point {
        self.size
    }

    /// Requested samples per pixel. Rasterization is single-sample.
    pub fn samples(&self) -> u32 {
        self.samples
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct State {
    viewport: Range,
    projection: Mat4,
    view: Mat4,
}

/// A software "window" with a GL-like drawing model.
pub struct SoftHost {
    scale_factor: f32,
    window: Surface,
    targets: Vec<Surface>,
    bound: Option<usize>,
    state: State,
    stack: Vec<State>,
    frames: u64,
}

impl SoftHost {
    pub fn new(config: SoftHostConfig) -> Self {
        let size = Point::new(config.width, config.height);
        let mut window = Surface::new(size, true);
        window.clear_color(config.clear_color);
        debug!("soft host: {size} framebuffer, scale {}", config.scale_factor);
        Self {
            scale_factor: config.scale_factor,
            window,
            targets: Vec::new(),
            bound: None,
            state: State {
                viewport: Range::from_size(size),
                projection: Mat4::IDENTITY,
                view: Mat4::IDENTITY,
            },
            stack: Vec::new(),
            frames: 0,
        }
    }

    /// The window framebuffer.
    pub fn framebuffer(&self) -> &PixelBuffer {
        &self.window.color
    }

    /// Pixels of an offscreen target.
    pub fn target_pixels(&self, target: &SoftTarget) -> Option<&PixelBuffer> {
        self.targets.get(target.index).map(|s| &s.color)
    }

    /// Whether drawing currently goes to an offscreen target.
    pub fn is_offscreen_bound(&self) -> bool {
        self.bound.is_some()
    }

    /// Mark the end of a frame and return the window framebuffer.
    pub fn present(&mut self) -> &PixelBuffer {
        self.frames += 1;
        trace!("soft host: frame {}", self.frames);
        &self.window.color
    }

    /// Number of [`present`](Self::present) calls so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn viewport(&self) -> Range {
        self.state.viewport
    }

    pub fn projection(&self) -> Mat4 {
        self.state.projection
    }

    pub fn view(&self) -> Mat4 {
        self.state.view
    }

    /// Depth of the transform stack.
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    fn surface_mut(&mut self) -> &mut Surface {
        match self.bound.and_then(|i| self.targets.get_mut(i)) {
            Some(target) => target,
            None => &mut self.window,
        }
    }

    fn surface(&self) -> &Surface {
        match self.bound.and_then(|i| self.targets.get(i)) {
            Some(target) => target,
            None => &self.window,
        }
    }

    /// Drawable pixels: the viewport clipped to the bound surface.
    fn clip_rect(&self) -> Range {
        self.state.viewport.intersect(self.surface().bounds())
    }

    /// Fill the bound surface's colour buffer.
    pub fn clear_color(&mut self, color: Rgba) {
        self.surface_mut().clear_color(color);
    }

    /// Reset the bound surface's depth buffer to the far plane.
    pub fn clear_depth(&mut self) {
        self.surface_mut().clear_depth();
    }

    /// Fill `rect`, given relative to the viewport origin, ignoring the
    /// matrices and the depth buffer.
    pub fn fill_rect(&mut self, rect: Range, color: Rgba) {
        self.fill_rect_with(rect, |_| color);
    }

    /// Fill `rect` (viewport-relative) with a colour computed per pixel.
    /// `shade` receives viewport-relative pixel coordinates.
    pub fn fill_rect_with(&mut self, rect: Range, mut shade: impl FnMut(Point) -> Rgba) {
        let origin = self.state.viewport.min;
        let area = (rect + origin).intersect(self.clip_rect());
        let surface = self.surface_mut();
        for p in area {
            surface.put(p, shade(p - origin));
        }
    }

    /// Draw a flat-coloured world-space triangle with the current matrices,
    /// depth-tested against the bound surface.
    pub fn draw_triangle(&mut self, vertices: [Vec3; 3], color: Rgba) {
        let mvp = self.state.projection * self.state.view;
        let clip: Vec<Vec4> = vertices.iter().map(|v| mvp * v.extend(1.0)).collect();
        let poly = raster::clip_near(&clip);
        if poly.len() < 3 {
            return;
        }

        let vp = self.state.viewport;
        let (vw, vh) = (vp.width() as f32, vp.height() as f32);
        let screen: Vec<Vec3> = poly
            .iter()
            .map(|c| {
                let ndc = c.truncate() / c.w;
                Vec3::new(
                    vp.min.x as f32 + (ndc.x + 1.0) * 0.5 * vw,
                    vp.min.y as f32 + (1.0 - ndc.y) * 0.5 * vh,
                    ndc.z * 0.5 + 0.5,
                )
            })
            .collect();

        let clip_rect = self.clip_rect();
        let surface = self.surface_mut();
        for i in 1..screen.len() - 1 {
            raster::rasterize([screen[0], screen[i], screen[i + 1]], clip_rect, |p, z| {
                surface.plot(p, z, color)
            });
        }
    }

    /// Draw the quad `v0 v1 v2 v3` as the triangles `v0 v1 v2` and `v0 v2 v3`.
    pub fn draw_quad(&mut self, vertices: [Vec3; 4], color: Rgba) {
        let [a, b, c, d] = vertices;
        self.draw_triangle([a, b, c], color);
        self.draw_triangle([a, c, d], color);
    }

    fn check_region(rect: Range, bounds: Range) -> Result<(), SoftHostError> {
        if rect.is_empty() || !rect.in_range(bounds) {
            return Err(SoftHostError::RegionOutOfBounds { rect, bounds });
        }
        Ok(())
    }
}

impl Default for SoftHost {
    fn default() -> Self {
        Self::new(SoftHostConfig::default())
    }
}

impl SurfaceProvider for SoftHost {
    type Error = SoftHostError;

    fn viewport_size(&self) -> Point {
        self.window.bounds().size()
    }

    fn scale_factor(&self) -> f32 {
        self.scale_factor
    }

    fn copy_region(&mut self, rect: Range) -> Result<PixelBuffer, SoftHostError> {
        Self::check_region(rect, self.window.bounds())?;
        Ok(self.window.color.region(rect))
    }
}

impl OffscreenProvider for SoftHost {
    type Target = SoftTarget;

    fn create_offscreen(&mut self, size: Point, samples: u32) -> Result<SoftTarget, SoftHostError> {
        self.targets.push(Surface::new(size, false));
        let index = self.targets.len() - 1;
        debug!("soft host: offscreen target {index}, {size}, {samples} samples");
        Ok(SoftTarget {
            index,
            size,
            samples,
        })
    }

    fn bind_offscreen(&mut self, target: &SoftTarget) -> Result<(), SoftHostError> {
        if target.index >= self.targets.len() {
            return Err(SoftHostError::NoSuchTarget);
        }
        self.bound = Some(target.index);
        Ok(())
    }

    fn unbind_offscreen(&mut self, target: &SoftTarget) -> Result<(), SoftHostError> {
        if self.bound != Some(target.index) {
            return Err(SoftHostError::NoSuchTarget);
        }
        self.bound = None;
        Ok(())
    }

    fn clear(&mut self, color: Rgba) -> Result<(), SoftHostError> {
        let surface = self.surface_mut();
        surface.clear_color(color);
        surface.clear_depth();
        Ok(())
    }

    fn read_offscreen(&mut self, target: &SoftTarget, rect: Range) -> Result<PixelBuffer, SoftHostError> {
        let surface = self.targets.get(target.index).ok_or(SoftHostError::NoSuchTarget)?;
        Self::check_region(rect, surface.bounds())?;
        Ok(surface.color.region(rect))
    }
}

impl TransformStack for SoftHost {
    fn push_state(&mut self) {
        self.stack.push(self.state);
    }

    fn pop_state(&mut self) -> Result<(), SoftHostError> {
        self.state = self.stack.pop().ok_or(SoftHostError::UnbalancedPop)?;
        Ok(())
    }

    fn set_viewport(&mut self, rect: Range) {
        self.state.viewport = rect;
    }

    fn set_projection(&mut self, projection: Mat4) {
        self.state.projection = projection;
    }

    fn set_view(&mut self, view: Mat4) {
        self.state.view = view;
    }
}
