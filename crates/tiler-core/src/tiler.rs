//! The tile grid and the [`Tiler`] state machine.
//!
//! A pass renders every tile of the grid once. [`Tiler::advance`] renders one
//! tile per call and reads the *previous* tile back on the next call, so a
//! host that presents frames between calls spreads the GPU stalls of
//! readback over many frames. [`Tiler::image`] drains a whole pass at once.

use glam::Mat4;
use log::{debug, trace, warn};

use crate::camera::Camera;
use crate::drawer::{Callbacks, TileCorners, TileDrawer};
use crate::error::{Result, TilerError};
use crate::frustum::Frustum;
use crate::geom::{Point, Range};
use crate::host::{RenderHost, with_pushed_state};
use crate::pixels::{PixelBuffer, Rgba};

const NO_PROJECTION: &str = "no projection set; call set_projection, set_frustum or set_ortho before advancing";

// ---------------------------------------------------------------------------
// TilerConfig
// ---------------------------------------------------------------------------

/// Construction parameters. Sizes are in logical pixels; the tiler scales
/// them by the host's scale factor.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TilerConfig {
    pub image_width: i32,
    pub image_height: i32,
    /// Requested tile size; clamped to the host viewport.
    pub tile_width: i32,
    pub tile_height: i32,
    /// Render into an offscreen target so the result keeps its alpha.
    pub alpha: bool,
    /// Samples per pixel of the offscreen target.
    pub samples: u32,
    /// Colour the window is cleared to before each tile when not in alpha
    /// mode. `None` leaves clearing to the background callback.
    pub clear_color: Option<Rgba>,
}

impl Default for TilerConfig {
    fn default() -> Self {
        Self {
            image_width: 1024,
            image_height: 1024,
            tile_width: 512,
            tile_height: 512,
            alpha: false,
            samples: 1,
            clear_color: Some(Rgba::BLACK),
        }
    }
}

impl TilerConfig {
    /// A config for an `image_width × image_height` image with default tiles.
    pub fn new(image_width: i32, image_height: i32) -> Self {
        Self {
            image_width,
            image_height,
            ..Self::default()
        }
    }

    pub fn with_tile_size(mut self, tile_width: i32, tile_height: i32) -> Self {
        self.tile_width = tile_width;
        self.tile_height = tile_height;
        self
    }

    pub fn with_alpha(mut self, alpha: bool) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_samples(mut self, samples: u32) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_clear_color(mut self, color: Option<Rgba>) -> Self {
        self.clear_color = color;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.image_width <= 0 {
            return Err(TilerError::invalid("image_width", self.image_width));
        }
        if self.image_height <= 0 {
            return Err(TilerError::invalid("image_height", self.image_height));
        }
        if self.tile_width <= 0 {
            return Err(TilerError::invalid("tile_width", self.tile_width));
        }
        if self.tile_height <= 0 {
            return Err(TilerError::invalid("tile_height", self.tile_height));
        }
        if self.samples == 0 {
            return Err(TilerError::invalid("samples", self.samples));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TileGrid
// ---------------------------------------------------------------------------

/// Tile geometry of an image: which pixels each tile index covers.
///
/// Tiles are numbered row-major. The last column and row hold the remainder
/// when the image is not a multiple of the tile size.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TileGrid {
    image: Point,
    tile: Point,
    columns: usize,
    rows: usize,
}

impl TileGrid {
    /// Grid for an `image`-sized picture cut into `tile`-sized pieces. Both
    /// sizes must be positive.
    pub fn new(image: Point, tile: Point) -> Result<Self> {
        if !image.is_positive() {
            return Err(TilerError::invalid("image size", image));
        }
        if !tile.is_positive() {
            return Err(TilerError::invalid("tile size", tile));
        }
        Ok(Self {
            image,
            tile,
            columns: (image.x as u32).div_ceil(tile.x as u32) as usize,
            rows: (image.y as u32).div_ceil(tile.y as u32) as usize,
        })
    }

    #[inline]
    pub fn image_size(&self) -> Point {
        self.image
    }

    /// Nominal tile size.
    #[inline]
    pub fn tile_size(&self) -> Point {
        self.tile
    }

    #[inline]
    pub fn columns(&self) -> usize {
        self.columns
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Total number of tiles.
    #[inline]
    pub fn len(&self) -> usize {
        self.columns * self.rows
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pixel rectangle of tile `index`, or `None` past the last tile.
    pub fn tile_rect(&self, index: usize) -> Option<Range> {
        (index < self.len()).then(|| self.rect_of(index))
    }

    fn rect_of(&self, index: usize) -> Range {
        let (tx, ty) = (index % self.columns, index / self.columns);

        let width = if tx == self.columns - 1 && self.image.x % self.tile.x != 0 {
            self.image.x % self.tile.x
        } else {
            self.tile.x
        };
        let height = if ty == self.rows - 1 && self.image.y % self.tile.y != 0 {
            self.image.y % self.tile.y
        } else {
            self.tile.y
        };

        let origin = Point::new(tx as i32 * self.tile.x, ty as i32 * self.tile.y);
        Range::sized(origin, Point::new(width, height))
    }

    /// Normalized corners of `rect` within the image.
    pub fn corners(&self, rect: Range) -> TileCorners {
        TileCorners::new(rect, self.image)
    }

    /// All tile rectangles, in render order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = Range> + use<> {
        let grid = *self;
        (0..grid.len()).map(move |i| grid.rect_of(i))
    }
}

// ---------------------------------------------------------------------------
// Tiler
// ---------------------------------------------------------------------------

/// Renders an image larger than the host viewport, one tile at a time.
///
/// The tiler owns its host (pass `&mut host` to borrow one instead) and a
/// [`TileDrawer`] that issues the actual drawing.
pub struct Tiler<H: RenderHost, D = Callbacks<H>> {
    host: H,
    drawer: D,
    grid: TileGrid,
    alpha: bool,
    clear_color: Option<Rgba>,
    offscreen: Option<H::Target>,
    frustum: Option<Frustum>,
    view: Mat4,
    /// Next tile to render while a pass is running.
    cursor: Option<usize>,
    /// Area of the most recently rendered tile, awaiting readback.
    area: Range,
    image: Option<PixelBuffer>,
    complete: bool,
}

impl<H: RenderHost> Tiler<H> {
    /// A tiler drawing through closures, see [`set_scene_fn`](Self::set_scene_fn).
    pub fn new(host: H, config: TilerConfig) -> Result<Self> {
        Self::with_drawer(host, config, Callbacks::new())
    }

    /// Draw before the scene; receives the tile corners.
    pub fn set_background_fn<F>(&mut self, f: F)
    where
        F: FnMut(&mut H, TileCorners) -> std::result::Result<(), H::Error> + 'static,
    {
        self.drawer.set_background(f);
    }

    /// Draw the scene exactly as for a single full-size render.
    pub fn set_scene_fn<F>(&mut self, f: F)
    where
        F: FnMut(&mut H) -> std::result::Result<(), H::Error> + 'static,
    {
        self.drawer.set_scene(f);
    }

    /// Draw after the tile's matrices were restored; receives the tile corners.
    pub fn set_overlay_fn<F>(&mut self, f: F)
    where
        F: FnMut(&mut H, TileCorners) -> std::result::Result<(), H::Error> + 'static,
    {
        self.drawer.set_overlay(f);
    }
}

impl<H: RenderHost, D: TileDrawer<H>> Tiler<H, D> {
    /// A tiler drawing through `drawer`.
    ///
    /// Sizes are converted to device pixels and the tile size is clamped to
    /// the host viewport. In alpha mode the offscreen target is created here,
    /// sized to the viewport, and cleared to transparent.
    pub fn with_drawer(mut host: H, config: TilerConfig, drawer: D) -> Result<Self> {
        config.validate()?;

        let scale = host.scale_factor();
        if !(scale.is_finite() && scale > 0.0) {
            return Err(TilerError::invalid("scale_factor", scale));
        }
        let viewport = host.viewport_size();
        if !viewport.is_positive() {
            return Err(TilerError::invalid("viewport size", viewport));
        }

        let image = Point::new(config.image_width, config.image_height).to_pixels(scale);
        let requested = Point::new(config.tile_width, config.tile_height).to_pixels(scale);
        let tile = requested.min(viewport);
        if tile != requested {
            warn!("tile size {requested} exceeds viewport {viewport}, clamped to {tile}");
        }
        let grid = TileGrid::new(image, tile)?;

        let offscreen = if config.alpha {
            let target = host
                .create_offscreen(viewport, config.samples)
                .map_err(TilerError::host)?;
            host.bind_offscreen(&target).map_err(TilerError::host)?;
            let cleared = host.clear(Rgba::TRANSPARENT);
            host.unbind_offscreen(&target).map_err(TilerError::host)?;
            cleared.map_err(TilerError::host)?;
            Some(target)
        } else {
            None
        };

        debug!(
            "tiler: image {image}, tile {tile}, grid {}x{}, scale {scale}, alpha {}",
            grid.columns(),
            grid.rows(),
            config.alpha
        );

        Ok(Self {
            host,
            drawer,
            grid,
            alpha: config.alpha,
            clear_color: config.clear_color,
            offscreen,
            frustum: None,
            view: Mat4::IDENTITY,
            cursor: None,
            area: Range::default(),
            image: None,
            complete: false,
        })
    }

    // -- projection ---------------------------------------------------------

    /// Use `camera`'s frustum and view matrix for the next pass.
    pub fn set_projection(&mut self, camera: &Camera) {
        self.frustum = Some(camera.frustum());
        self.view = camera.view;
    }

    /// Perspective frustum, `glFrustum` argument order. The view is kept.
    pub fn set_frustum(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        self.frustum = Some(Frustum::perspective(left, right, bottom, top, near, far));
    }

    /// Orthographic box, `glOrtho` argument order. The view is kept.
    pub fn set_ortho(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        self.frustum = Some(Frustum::orthographic(left, right, bottom, top, near, far));
    }

    /// Pixel-space orthographic projection over a `width × height` window,
    /// origin top-left, with an identity view.
    pub fn set_window_ortho(&mut self, width: f32, height: f32) {
        self.set_ortho(0.0, width, height, 0.0, -1.0, 1.0);
        self.view = Mat4::IDENTITY;
    }

    /// Perspective camera framing a `width × height` pixel plane, see
    /// [`Camera::window_perspective`].
    pub fn set_window_perspective(&mut self, width: f32, height: f32, fov_deg: f32, near: f32, far: f32) {
        self.set_projection(&Camera::window_perspective(width, height, fov_deg, near, far));
    }

    /// Replace the view matrix, keeping the frustum.
    pub fn set_view(&mut self, view: Mat4) {
        self.view = view;
    }

    /// The full-image frustum, if one was set.
    pub fn frustum(&self) -> Option<Frustum> {
        self.frustum
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    // -- iteration ----------------------------------------------------------

    /// Render the next tile, reading back the previous one.
    ///
    /// Returns `true` while tiles remain. The call that reads back the last
    /// tile returns `false` and leaves the tiler idle with a complete image;
    /// the call after that starts a new pass. Any error abandons the pass.
    pub fn advance(&mut self) -> Result<bool> {
        let res = self.step();
        if let Err(e) = &res {
            warn!("tiled pass abandoned: {e}");
            self.cursor = None;
            self.complete = false;
        }
        res
    }

    /// Same as [`advance`](Self::advance).
    pub fn next_tile(&mut self) -> Result<bool> {
        self.advance()
    }

    fn step(&mut self) -> Result<bool> {
        let next = match self.cursor {
            None => {
                if self.frustum.is_none() {
                    return Err(TilerError::PreconditionViolation(NO_PROJECTION));
                }
                self.begin_pass();
                0
            }
            Some(next) => {
                self.read_back()?;
                if next >= self.grid.len() {
                    self.finish_pass();
                    return Ok(false);
                }
                next
            }
        };

        self.render_tile(next)?;
        self.cursor = Some(next + 1);
        Ok(true)
    }

    fn begin_pass(&mut self) {
        let size = self.grid.image_size();
        match &mut self.image {
            Some(buf) if buf.size() == size => {}
            slot => *slot = Some(PixelBuffer::new(size.x as usize, size.y as usize)),
        }
        self.complete = false;
        debug!("tiled pass started: {} tiles", self.grid.len());
    }

    fn finish_pass(&mut self) {
        if !self.alpha {
            if let Some(image) = &mut self.image {
                image.force_opaque();
            }
        }
        self.cursor = None;
        self.complete = true;
        debug!("tiled pass finished");
    }

    fn render_tile(&mut self, index: usize) -> Result<()> {
        let area = self
            .grid
            .tile_rect(index)
            .ok_or(TilerError::PreconditionViolation("tile index out of range"))?;
        let frustum = self.frustum.ok_or(TilerError::PreconditionViolation(NO_PROJECTION))?;
        self.area = area;

        let corners = self.grid.corners(area);
        let projection = frustum
            .subdivide(area, self.grid.image_size())
            .matrix(self.host.clip_depth());
        trace!("tile {index}/{} at {area}", self.grid.len());

        if let Some(target) = &self.offscreen {
            self.host.bind_offscreen(target).map_err(TilerError::host)?;
        }
        let drawn = self.draw_tile(Range::from_size(area.size()), corners, projection);
        let unbound = match &self.offscreen {
            Some(target) => self.host.unbind_offscreen(target),
            None => Ok(()),
        };
        drawn.map_err(TilerError::host)?;
        unbound.map_err(TilerError::host)
    }

    fn draw_tile(
        &mut self,
        viewport: Range,
        corners: TileCorners,
        projection: Mat4,
    ) -> std::result::Result<(), H::Error> {
        let clear = if self.offscreen.is_some() {
            Some(Rgba::TRANSPARENT)
        } else {
            self.clear_color
        };
        if let Some(color) = clear {
            self.host.clear(color)?;
        }

        let view = self.view;
        let drawer = &mut self.drawer;
        with_pushed_state(&mut self.host, |host| {
            host.set_viewport(viewport);
            drawer.draw_background(host, corners)?;
            with_pushed_state(host, |host| {
                host.set_projection(projection);
                host.set_view(view);
                drawer.draw_scene(host)
            })
        })?;

        self.drawer.draw_overlay(&mut self.host, corners)
    }

    fn read_back(&mut self) -> Result<()> {
        let area = self.area;
        let rect = Range::from_size(area.size());
        let tile = match &self.offscreen {
            Some(target) => self.host.read_offscreen(target, rect),
            None => self.host.copy_region(rect),
        }
        .map_err(TilerError::host)?;

        if tile.width() < area.width() as usize || tile.height() < area.height() as usize {
            return Err(TilerError::PreconditionViolation("host readback is smaller than the tile"));
        }
        let image = self
            .image
            .as_mut()
            .ok_or(TilerError::PreconditionViolation("no destination buffer"))?;
        image.copy_from(&tile, rect, area.min);
        Ok(())
    }

    // -- results ------------------------------------------------------------

    /// Finish the running pass, or run a whole new one when idle, and return
    /// the stitched image. Blocks for every remaining tile.
    pub fn image(&mut self) -> Result<&PixelBuffer> {
        while self.advance()? {}
        self.image
            .as_ref()
            .ok_or(TilerError::PreconditionViolation("no destination buffer"))
    }

    /// Like [`image`](Self::image), consuming the tiler.
    pub fn into_image(mut self) -> Result<PixelBuffer> {
        while self.advance()? {}
        self.image
            .take()
            .ok_or(TilerError::PreconditionViolation("no destination buffer"))
    }

    /// The image of the last completed pass, if the tiler is idle and the
    /// pass ran to the end.
    pub fn last_image(&self) -> Option<&PixelBuffer> {
        if self.complete && self.cursor.is_none() {
            self.image.as_ref()
        } else {
            None
        }
    }

    /// The image as stitched so far; tiles not yet read back hold stale or
    /// transparent pixels.
    pub fn partial_image(&self) -> Option<&PixelBuffer> {
        self.image.as_ref()
    }

    // -- accessors ----------------------------------------------------------

    /// Image area of the most recently rendered tile.
    pub fn current_tile_rect(&self) -> Range {
        self.area
    }

    /// Index of the most recently rendered tile while a pass runs.
    pub fn current_tile(&self) -> Option<usize> {
        self.cursor.map(|next| next - 1)
    }

    /// Whether a pass is running.
    pub fn is_active(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn tile_count(&self) -> usize {
        self.grid.len()
    }

    /// Fraction of tiles read back in the current pass; `1.0` once a pass
    /// completed and no new one started.
    pub fn progress(&self) -> f32 {
        match self.cursor {
            Some(next) => (next - 1) as f32 / self.grid.len() as f32,
            None if self.complete => 1.0,
            None => 0.0,
        }
    }

    /// Image width in device pixels.
    pub fn image_width(&self) -> i32 {
        self.grid.image_size().x
    }

    /// Image height in device pixels.
    pub fn image_height(&self) -> i32 {
        self.grid.image_size().y
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.image_width() as f32 / self.image_height() as f32
    }

    pub fn alpha(&self) -> bool {
        self.alpha
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn drawer_mut(&mut self) -> &mut D {
        &mut self.drawer
    }

    /// Give the host back.
    pub fn into_host(self) -> H {
        self.host
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawer::NoopDrawer;
    use crate::frustum::ClipDepth;
    use crate::host::{OffscreenProvider, SurfaceProvider, TransformStack};
    use glam::Vec4;
    use std::fmt;

    #[derive(Debug, PartialEq)]
    enum FakeError {
        Unbalanced,
        NoTarget,
        Refused,
    }

    impl fmt::Display for FakeError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{self:?}")
        }
    }

    impl std::error::Error for FakeError {}

    #[derive(Clone, Debug, PartialEq)]
    enum Call {
        Create(Point, u32),
        Bind,
        Unbind,
        Clear(Rgba),
        Push,
        Pop,
        Viewport(Range),
        Projection(Mat4),
        View(Mat4),
        Copy(Range),
        ReadOffscreen(Range),
        Background(TileCorners),
        Scene,
        Overlay(TileCorners),
    }

    /// Records every call and "renders" by writing pixels whose colour is
    /// the image coordinate they unproject to.
    struct FakeHost {
        size: Point,
        scale: f32,
        window: PixelBuffer,
        targets: Vec<PixelBuffer>,
        bound: Option<usize>,
        viewport: Range,
        projection: Mat4,
        view: Mat4,
        stack: Vec<(Range, Mat4, Mat4)>,
        calls: Vec<Call>,
        refuse_copy: bool,
        short_copy: bool,
        refuse_unbind: bool,
    }

    impl FakeHost {
        fn new(w: i32, h: i32) -> Self {
            Self {
                size: Point::new(w, h),
                scale: 1.0,
                window: PixelBuffer::new(w as usize, h as usize),
                targets: Vec::new(),
                bound: None,
                viewport: Range::new(0, 0, w, h),
                projection: Mat4::IDENTITY,
                view: Mat4::IDENTITY,
                stack: Vec::new(),
                calls: Vec::new(),
                refuse_copy: false,
                short_copy: false,
                refuse_unbind: false,
            }
        }

        fn target_mut(&mut self) -> &mut PixelBuffer {
            match self.bound {
                Some(i) => &mut self.targets[i],
                None => &mut self.window,
            }
        }

        /// Colour every viewport pixel with the (x, y) world position under
        /// its centre, modulo 256.
        fn paint_positions(&mut self) {
            let inv = (self.projection * self.view).inverse();
            let vp = self.viewport;
            let (vw, vh) = (vp.width() as f32, vp.height() as f32);
            let mut pixels = Vec::new();
            for p in Range::from_size(vp.size()) {
                let ndc_x = (p.x as f32 + 0.5) / vw * 2.0 - 1.0;
                let ndc_y = 1.0 - (p.y as f32 + 0.5) / vh * 2.0;
                let w = inv * Vec4::new(ndc_x, ndc_y, 0.0, 1.0);
                let (x, y) = ((w.x / w.w).floor() as i32, (w.y / w.w).floor() as i32);
                pixels.push((
                    p + vp.min,
                    Rgba::rgb(x.rem_euclid(256) as u8, y.rem_euclid(256) as u8, 7),
                ));
            }
            let target = self.target_mut();
            for (p, c) in pixels {
                target.set(p, c);
            }
        }
    }

    impl SurfaceProvider for FakeHost {
        type Error = FakeError;

        fn viewport_size(&self) -> Point {
            self.size
        }

        fn scale_factor(&self) -> f32 {
            self.scale
        }

        fn copy_region(&mut self, rect: Range) -> std::result::Result<PixelBuffer, FakeError> {
            self.calls.push(Call::Copy(rect));
            if self.refuse_copy {
                return Err(FakeError::Refused);
            }
            if self.short_copy {
                return Ok(PixelBuffer::new(1, 1));
            }
            Ok(self.window.region(rect))
        }
    }

    impl OffscreenProvider for FakeHost {
        type Target = usize;

        fn create_offscreen(&mut self, size: Point, samples: u32) -> std::result::Result<usize, FakeError> {
            self.calls.push(Call::Create(size, samples));
            // Garbage content so that a missing clear shows up.
            self.targets
                .push(PixelBuffer::filled(size.x as usize, size.y as usize, Rgba::rgb(1, 2, 3)));
            Ok(self.targets.len() - 1)
        }

        fn bind_offscreen(&mut self, target: &usize) -> std::result::Result<(), FakeError> {
            self.calls.push(Call::Bind);
            if *target >= self.targets.len() {
                return Err(FakeError::NoTarget);
            }
            self.bound = Some(*target);
            Ok(())
        }

        fn unbind_offscreen(&mut self, _: &usize) -> std::result::Result<(), FakeError> {
            self.calls.push(Call::Unbind);
            self.bound = None;
            if self.refuse_unbind {
                return Err(FakeError::NoTarget);
            }
            Ok(())
        }

        fn clear(&mut self, color: Rgba) -> std::result::Result<(), FakeError> {
            self.calls.push(Call::Clear(color));
            self.target_mut().fill(color);
            Ok(())
        }

        fn read_offscreen(&mut self, target: &usize, rect: Range) -> std::result::Result<PixelBuffer, FakeError> {
            self.calls.push(Call::ReadOffscreen(rect));
            let buf = self.targets.get(*target).ok_or(FakeError::NoTarget)?;
            Ok(buf.region(rect))
        }
    }

    impl TransformStack for FakeHost {
        fn push_state(&mut self) {
            self.calls.push(Call::Push);
            self.stack.push((self.viewport, self.projection, self.view));
        }

        fn pop_state(&mut self) -> std::result::Result<(), FakeError> {
            self.calls.push(Call::Pop);
            let (viewport, projection, view) = self.stack.pop().ok_or(FakeError::Unbalanced)?;
            self.viewport = viewport;
            self.projection = projection;
            self.view = view;
            Ok(())
        }

        fn set_viewport(&mut self, rect: Range) {
            self.calls.push(Call::Viewport(rect));
            self.viewport = rect;
        }

        fn set_projection(&mut self, projection: Mat4) {
            self.calls.push(Call::Projection(projection));
            self.projection = projection;
        }

        fn set_view(&mut self, view: Mat4) {
            self.calls.push(Call::View(view));
            self.view = view;
        }
    }

    /// Logs the three hooks and paints positions in the scene.
    struct Recorder;

    impl TileDrawer<FakeHost> for Recorder {
        fn draw_background(&mut self, host: &mut FakeHost, corners: TileCorners) -> std::result::Result<(), FakeError> {
            host.calls.push(Call::Background(corners));
            Ok(())
        }

        fn draw_scene(&mut self, host: &mut FakeHost) -> std::result::Result<(), FakeError> {
            host.calls.push(Call::Scene);
            host.paint_positions();
            Ok(())
        }

        fn draw_overlay(&mut self, host: &mut FakeHost, corners: TileCorners) -> std::result::Result<(), FakeError> {
            host.calls.push(Call::Overlay(corners));
            Ok(())
        }
    }

    fn poster_tiler(alpha: bool) -> Tiler<FakeHost, Recorder> {
        let config = TilerConfig::new(1000, 600).with_alpha(alpha);
        let mut tiler = Tiler::with_drawer(FakeHost::new(512, 512), config, Recorder).unwrap();
        tiler.set_window_ortho(1000.0, 600.0);
        tiler
    }

    #[test]
    fn example_grid() {
        let grid = TileGrid::new(Point::new(1000, 600), Point::new(512, 512)).unwrap();
        assert_eq!((grid.columns(), grid.rows(), grid.len()), (2, 2, 4));
        assert_eq!(grid.tile_rect(0), Some(Range::new(0, 0, 512, 512)));
        assert_eq!(grid.tile_rect(1), Some(Range::new(512, 0, 1000, 512)));
        assert_eq!(grid.tile_rect(2), Some(Range::new(0, 512, 512, 600)));
        assert_eq!(grid.tile_rect(3), Some(Range::new(512, 512, 1000, 600)));
        assert_eq!(grid.tile_rect(4), None);

        let single = TileGrid::new(Point::new(512, 512), Point::new(512, 512)).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single.tile_rect(0), Some(Range::new(0, 0, 512, 512)));
    }

    #[test]
    fn tiles_partition_the_image() {
        let cases = [
            (1000, 600, 512, 512),
            (1024, 1024, 256, 256),
            (7, 5, 3, 2),
            (1, 1, 512, 512),
            (300, 1, 7, 1),
            (513, 511, 512, 512),
        ];
        for (w, h, tw, th) in cases {
            let grid = TileGrid::new(Point::new(w, h), Point::new(tw, th)).unwrap();
            assert_eq!(grid.columns(), (w as f32 / tw as f32).ceil() as usize);
            assert_eq!(grid.rows(), (h as f32 / th as f32).ceil() as usize);

            let image = Range::new(0, 0, w, h);
            let mut cover = vec![0u8; (w * h) as usize];
            for (i, rect) in grid.iter().enumerate() {
                assert!(rect.in_range(image), "{rect} outside {image}");
                assert!(!rect.is_empty());

                let (tx, ty) = (i % grid.columns(), i / grid.columns());
                let last_col = tx == grid.columns() - 1;
                let last_row = ty == grid.rows() - 1;
                let ew = if last_col && w % tw != 0 { w % tw } else { tw.min(w) };
                let eh = if last_row && h % th != 0 { h % th } else { th.min(h) };
                assert_eq!(rect.size(), Point::new(ew, eh), "tile {i} of {w}x{h}/{tw}x{th}");

                for p in rect {
                    cover[(p.y * w + p.x) as usize] += 1;
                }
            }
            assert!(cover.iter().all(|&n| n == 1), "{w}x{h}/{tw}x{th}");

            let rects: Vec<Range> = grid.iter().collect();
            for (i, a) in rects.iter().enumerate() {
                assert!(rects[i + 1..].iter().all(|b| !a.overlaps(*b)), "tile {i} overlaps");
            }
        }
    }

    #[test]
    fn edge_tiles_near_i32_max() {
        let image = Point::new(i32::MAX - 10, 1);
        let grid = TileGrid::new(image, Point::new(512, 1)).unwrap();
        assert_eq!(grid.len(), 1 << 22);
        let last = grid.tile_rect(grid.len() - 1).unwrap();
        assert_eq!(last, Range::new(i32::MAX - 10 - 501, 0, i32::MAX - 10, 1));
        assert_eq!(grid.tile_rect(grid.len() - 2).map(|r| r.width()), Some(512));

        let tall = TileGrid::new(Point::new(3, i32::MAX), Point::new(3, 1024)).unwrap();
        let bottom = tall.tile_rect(tall.len() - 1).unwrap();
        assert_eq!(bottom.height(), 1023);
        assert_eq!(bottom.max.y, i32::MAX);
    }

    #[test]
    fn invalid_sizes_are_rejected() {
        let bad = [
            TilerConfig::new(0, 10),
            TilerConfig::new(10, -1),
            TilerConfig::new(10, 10).with_tile_size(0, 10),
            TilerConfig::new(10, 10).with_tile_size(10, -5),
            TilerConfig::new(10, 10).with_samples(0),
        ];
        for config in bad {
            let res = Tiler::with_drawer(FakeHost::new(64, 64), config.clone(), NoopDrawer);
            assert!(
                matches!(res, Err(TilerError::InvalidArgument { .. })),
                "{config:?}"
            );
        }
        let res = Tiler::with_drawer(FakeHost::new(0, 64), TilerConfig::new(10, 10), NoopDrawer);
        assert!(matches!(res, Err(TilerError::InvalidArgument { name: "viewport size", .. })));
    }

    #[test]
    fn tiles_are_clamped_to_viewport() {
        let config = TilerConfig::new(1000, 600).with_tile_size(512, 512);
        let tiler = Tiler::with_drawer(FakeHost::new(300, 200), config, NoopDrawer).unwrap();
        assert_eq!(tiler.grid().tile_size(), Point::new(300, 200));
        assert_eq!((tiler.grid().columns(), tiler.grid().rows()), (4, 3));
        assert_eq!(tiler.tile_count(), 12);
    }

    #[test]
    fn sizes_scale_to_device_pixels() {
        let mut host = FakeHost::new(512, 512);
        host.scale = 2.0;
        let config = TilerConfig::new(500, 300).with_tile_size(128, 100);
        let tiler = Tiler::with_drawer(host, config, NoopDrawer).unwrap();
        assert_eq!((tiler.image_width(), tiler.image_height()), (1000, 600));
        assert_eq!(tiler.grid().tile_size(), Point::new(256, 200));
        assert!((tiler.aspect_ratio() - 1000.0 / 600.0).abs() < 1e-6);
    }

    #[test]
    fn advance_counts_tiles_then_stops() {
        let mut tiler = poster_tiler(false);
        for _pass in 0..2 {
            let mut trues = 0;
            while tiler.advance().unwrap() {
                trues += 1;
                assert!(trues <= 4);
            }
            assert_eq!(trues, 4);
            assert!(!tiler.is_active());
            assert!(tiler.last_image().is_some());
        }
    }

    #[test]
    fn missing_projection_fails_fast() {
        let mut tiler =
            Tiler::with_drawer(FakeHost::new(64, 64), TilerConfig::new(100, 100), NoopDrawer).unwrap();
        let err = tiler.advance().unwrap_err();
        assert!(matches!(err, TilerError::PreconditionViolation(_)));
        assert!(!tiler.is_active());
        assert!(tiler.host().calls.is_empty());

        tiler.set_ortho(-1.0, 1.0, -1.0, 1.0, -1.0, 1.0);
        assert!(tiler.advance().unwrap());
    }

    #[test]
    fn stitched_image_matches_single_render() {
        let mut tiler = poster_tiler(false);
        let image = tiler.image().unwrap();
        assert_eq!(image.size(), Point::new(1000, 600));
        for p in Range::new(0, 0, 1000, 600) {
            let expected = Rgba::rgb((p.x % 256) as u8, (p.y % 256) as u8, 7);
            assert_eq!(image.get(p), Some(expected), "pixel {p}");
        }
        assert!(image.is_opaque());
    }

    #[test]
    fn tile_projection_is_subdivided_frustum() {
        let mut tiler = poster_tiler(false);
        let full = tiler.frustum().unwrap();
        tiler.image().unwrap();

        let projections: Vec<Mat4> = tiler
            .host()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Projection(m) => Some(*m),
                _ => None,
            })
            .collect();
        let expected: Vec<Mat4> = tiler
            .grid()
            .iter()
            .map(|r| full.subdivide(r, Point::new(1000, 600)).matrix(ClipDepth::NegativeOneToOne))
            .collect();
        assert_eq!(projections, expected);
    }

    #[test]
    fn per_tile_call_order() {
        let mut tiler = poster_tiler(false);
        assert!(tiler.advance().unwrap());
        assert!(tiler.advance().unwrap());

        let first = Range::new(0, 0, 512, 512);
        let second = Range::new(512, 0, 1000, 512);
        let corners = |r| TileCorners::new(r, Point::new(1000, 600));
        let frustum = tiler.frustum().unwrap();
        let proj = |r| frustum.subdivide(r, Point::new(1000, 600)).matrix(ClipDepth::NegativeOneToOne);

        let tile_calls = |r: Range| {
            vec![
                Call::Clear(Rgba::BLACK),
                Call::Push,
                Call::Viewport(Range::from_size(r.size())),
                Call::Background(corners(r)),
                Call::Push,
                Call::Projection(proj(r)),
                Call::View(Mat4::IDENTITY),
                Call::Scene,
                Call::Pop,
                Call::Pop,
                Call::Overlay(corners(r)),
            ]
        };
        let mut expected = tile_calls(first);
        expected.push(Call::Copy(Range::new(0, 0, 512, 512)));
        expected.extend(tile_calls(second));

        assert_eq!(tiler.host().calls, expected);
        assert_eq!(tiler.current_tile(), Some(1));
        assert_eq!(tiler.current_tile_rect(), second);
        assert!(tiler.host().stack.is_empty());
    }

    #[test]
    fn alpha_mode_uses_cleared_offscreen_target() {
        let config = TilerConfig::new(1000, 600).with_alpha(true).with_samples(4);
        let mut tiler = Tiler::with_drawer(FakeHost::new(512, 512), config, NoopDrawer).unwrap();
        assert!(tiler.alpha());
        assert_eq!(
            tiler.host().calls,
            [
                Call::Create(Point::new(512, 512), 4),
                Call::Bind,
                Call::Clear(Rgba::TRANSPARENT),
                Call::Unbind
            ]
        );
        tiler.set_window_ortho(1000.0, 600.0);

        let image = tiler.image().unwrap().clone();
        assert!(image.pixels().iter().all(|p| p.a() == 0));

        let calls = &tiler.host().calls;
        let binds = calls.iter().filter(|c| **c == Call::Bind).count();
        let unbinds = calls.iter().filter(|c| **c == Call::Unbind).count();
        assert_eq!((binds, unbinds), (5, 5));
        assert!(!calls.iter().any(|c| matches!(c, Call::Copy(_))));
        let reads = calls.iter().filter(|c| matches!(c, Call::ReadOffscreen(_))).count();
        assert_eq!(reads, 4);
        assert_eq!(tiler.host().bound, None);
    }

    #[test]
    fn alpha_mode_keeps_drawn_pixels() {
        let mut tiler = poster_tiler(true);
        let image = tiler.image().unwrap();
        assert_eq!(image.get(Point::new(999, 599)), Some(Rgba::rgb(231, 87, 7)));
        assert!(image.is_opaque());
    }

    #[test]
    fn window_mode_is_opaque() {
        let config = TilerConfig::new(300, 300).with_clear_color(None);
        let mut tiler = Tiler::with_drawer(FakeHost::new(128, 128), config, NoopDrawer).unwrap();
        tiler.set_window_ortho(300.0, 300.0);
        // the fake window starts transparent and nothing draws into it
        assert!(tiler.image().unwrap().is_opaque());
    }

    #[test]
    fn draining_twice_is_identical() {
        let mut tiler = poster_tiler(false);
        let first = tiler.image().unwrap().clone();
        let second = tiler.image().unwrap().clone();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn image_finishes_running_pass() {
        let mut tiler = poster_tiler(false);
        tiler.advance().unwrap();
        tiler.advance().unwrap();
        assert!(tiler.last_image().is_none());
        assert!((tiler.progress() - 0.25).abs() < 1e-6);
        tiler.image().unwrap();
        let scenes = tiler.host().calls.iter().filter(|c| **c == Call::Scene).count();
        assert_eq!(scenes, 4);
        assert_eq!(tiler.progress(), 1.0);
    }

    #[test]
    fn host_errors_abandon_the_pass() {
        let mut tiler = poster_tiler(false);
        tiler.host_mut().refuse_copy = true;
        assert!(tiler.advance().unwrap());
        let err = tiler.advance().unwrap_err();
        assert!(matches!(err, TilerError::Host(_)));
        assert_eq!(err.to_string(), "render host error: Refused");
        assert!(!tiler.is_active());

        tiler.host_mut().refuse_copy = false;
        tiler.host_mut().short_copy = true;
        assert!(tiler.advance().unwrap());
        assert!(matches!(tiler.advance(), Err(TilerError::PreconditionViolation(_))));
    }

    #[test]
    fn draw_error_wins_over_unbind_error() {
        let mut host = FakeHost::new(512, 512);
        host.refuse_unbind = true;
        let mut tiler = Tiler::new(host, TilerConfig::new(1000, 600).with_alpha(true)).unwrap();
        tiler.set_window_ortho(1000.0, 600.0);
        tiler.set_scene_fn(|_| Err(FakeError::Refused));

        let err = tiler.advance().unwrap_err();
        assert_eq!(err.to_string(), "render host error: Refused");
        assert!(!tiler.is_active());
        let calls = &tiler.host().calls;
        let count = |call: Call| calls.iter().filter(|c| **c == call).count();
        assert_eq!(count(Call::Unbind), 1);
        assert_eq!(count(Call::Push), count(Call::Pop));

        tiler.set_scene_fn(|_| Ok(()));
        assert_eq!(tiler.advance().unwrap_err().to_string(), "render host error: NoTarget");
    }

    #[test]
    fn callbacks_drive_a_borrowed_host() {
        let mut host = FakeHost::new(256, 256);
        {
            let mut tiler = Tiler::new(&mut host, TilerConfig::new(512, 256).with_tile_size(256, 256)).unwrap();
            tiler.set_window_ortho(512.0, 256.0);
            tiler.set_scene_fn(|h| {
                h.paint_positions();
                Ok(())
            });
            let mut seen = Vec::new();
            tiler.set_overlay_fn(move |h, c| {
                seen.push(c.ul);
                h.calls.push(Call::Overlay(c));
                Ok(())
            });
            let image = tiler.into_image().unwrap();
            assert_eq!(image.get(Point::new(300, 10)), Some(Rgba::rgb(44, 10, 7)));
        }
        let overlays = host.calls.iter().filter(|c| matches!(c, Call::Overlay(_))).count();
        assert_eq!(overlays, 2);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn config_from_json() {
        let config: TilerConfig =
            serde_json::from_str(r#"{ "image_width": 4000, "image_height": 3000, "alpha": true }"#).unwrap();
        assert_eq!(config, TilerConfig::new(4000, 3000).with_alpha(true));
    }
}
