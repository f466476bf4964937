//! What gets drawn into each tile.
//!
//! The tiler calls a [`TileDrawer`] three times per tile: background, scene
//! and overlay. Background and overlay receive the tile's [`TileCorners`] so
//! they can place image-relative content (a poster-wide gradient, a
//! watermark) correctly inside each tile; the scene is drawn exactly as it
//! would be for a single full-size render.

use std::fmt;

use glam::Vec2;

use crate::geom::{Point, Range};
use crate::host::SurfaceProvider;

/// Corners of a tile as fractions of the full image, y down.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TileCorners {
    /// Upper left.
    pub ul: Vec2,
    /// Upper right.
    pub ur: Vec2,
    /// Lower right.
    pub lr: Vec2,
    /// Lower left.
    pub ll: Vec2,
}

impl TileCorners {
    /// Corners of `tile` within an `image`-sized picture.
    pub fn new(tile: Range, image: Point) -> Self {
        let (iw, ih) = (image.x as f32, image.y as f32);
        let sx = tile.min.x as f32 / iw;
        let sy = tile.min.y as f32 / ih;
        let ex = tile.max.x as f32 / iw;
        let ey = tile.max.y as f32 / ih;
        Self {
            ul: Vec2::new(sx, sy),
            ur: Vec2::new(ex, sy),
            lr: Vec2::new(ex, ey),
            ll: Vec2::new(sx, ey),
        }
    }

    /// Map a point given as a fraction of the full image into pixel
    /// coordinates of the tile's viewport (`tile_size` pixels, top-left origin).
    pub fn image_to_tile(&self, uv: Vec2, tile_size: Point) -> Vec2 {
        let extent = self.lr - self.ul;
        (uv - self.ul) / extent * Vec2::new(tile_size.x as f32, tile_size.y as f32)
    }
}

/// Per-tile drawing hooks. Every method defaults to drawing nothing.
pub trait TileDrawer<H: SurfaceProvider + ?Sized> {
    /// Drawn first, with the viewport set to the tile and no projection
    /// change.
    fn draw_background(&mut self, host: &mut H, corners: TileCorners) -> Result<(), H::Error> {
        let _ = (host, corners);
        Ok(())
    }

    /// Drawn with the tile's sub-frustum projection and the camera view.
    fn draw_scene(&mut self, host: &mut H) -> Result<(), H::Error> {
        let _ = host;
        Ok(())
    }

    /// Drawn last, after the tile's viewport and matrices were restored.
    fn draw_overlay(&mut self, host: &mut H, corners: TileCorners) -> Result<(), H::Error> {
        let _ = (host, corners);
        Ok(())
    }
}

impl<H, D> TileDrawer<H> for &mut D
where
    H: SurfaceProvider + ?Sized,
    D: TileDrawer<H> + ?Sized,
{
    fn draw_background(&mut self, host: &mut H, corners: TileCorners) -> Result<(), H::Error> {
        (**self).draw_background(host, corners)
    }

    fn draw_scene(&mut self, host: &mut H) -> Result<(), H::Error> {
        (**self).draw_scene(host)
    }

    fn draw_overlay(&mut self, host: &mut H, corners: TileCorners) -> Result<(), H::Error> {
        (**self).draw_overlay(host, corners)
    }
}

/// Draws nothing.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopDrawer;

impl<H: SurfaceProvider + ?Sized> TileDrawer<H> for NoopDrawer {}

type CornerFn<H> = Box<dyn FnMut(&mut H, TileCorners) -> Result<(), <H as SurfaceProvider>::Error>>;
type SceneFn<H> = Box<dyn FnMut(&mut H) -> Result<(), <H as SurfaceProvider>::Error>>;

/// A drawer built from optional closures.
pub struct Callbacks<H: SurfaceProvider> {
    background: Option<CornerFn<H>>,
    scene: Option<SceneFn<H>>,
    overlay: Option<CornerFn<H>>,
}

impl<H: SurfaceProvider> Callbacks<H> {
    pub fn new() -> Self {
        Self {
            background: None,
            scene: None,
            overlay: None,
        }
    }

    pub fn set_background<F>(&mut self, f: F)
    where
        F: FnMut(&mut H, TileCorners) -> Result<(), H::Error> + 'static,
    {
        self.background = Some(Box::new(f));
    }

    pub fn set_scene<F>(&mut self, f: F)
    where
        F: FnMut(&mut H) -> Result<(), H::Error> + 'static,
    {
        self.scene = Some(Box::new(f));
    }

    pub fn set_overlay<F>(&mut self, f: F)
    where
        F: FnMut(&mut H, TileCorners) -> Result<(), H::Error> + 'static,
    {
        self.overlay = Some(Box::new(f));
    }

    /// Remove all callbacks.
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

impl<H: SurfaceProvider> Default for Callbacks<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: SurfaceProvider> fmt::Debug for Callbacks<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("background", &self.background.is_some())
            .field("scene", &self.scene.is_some())
            .field("overlay", &self.overlay.is_some())
            .finish()
    }
}

impl<H: SurfaceProvider> TileDrawer<H> for Callbacks<H> {
    fn draw_background(&mut self, host: &mut H, corners: TileCorners) -> Result<(), H::Error> {
        match &mut self.background {
            Some(f) => f(host, corners),
            None => Ok(()),
        }
    }

    fn draw_scene(&mut self, host: &mut H) -> Result<(), H::Error> {
        match &mut self.scene {
            Some(f) => f(host),
            None => Ok(()),
        }
    }

    fn draw_overlay(&mut self, host: &mut H, corners: TileCorners) -> Result<(), H::Error> {
        match &mut self.overlay {
            Some(f) => f(host, corners),
            None => Ok(()),
        }
    }
}
