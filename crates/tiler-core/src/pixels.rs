//! CPU-side pixel storage: [`Rgba`] and [`PixelBuffer`].
//!
//! A [`PixelBuffer`] is tight, top-down RGBA8: row 0 is the top row of the
//! image and every pixel takes exactly four bytes. Hosts return readbacks in
//! this layout and the tiler stitches them into the destination buffer.

use bytemuck::{Pod, Zeroable};

use crate::error::{Result, TilerError};
use crate::geom::{Point, Range};

const BYTES_PER_PIXEL: usize = 4;

// ---------------------------------------------------------------------------
// Rgba
// ---------------------------------------------------------------------------

/// An 8-bit RGBA colour, non-premultiplied.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const TRANSPARENT: Self = Self([0, 0, 0, 0]);
    pub const BLACK: Self = Self([0, 0, 0, 255]);

    /// Opaque colour from RGB components.
    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    /// Colour from RGBA components.
    #[inline]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }

    /// Alpha component.
    #[inline]
    pub const fn a(self) -> u8 {
        self.0[3]
    }

    /// The same colour with alpha forced to 255.
    #[inline]
    pub const fn opaque(self) -> Self {
        Self([self.0[0], self.0[1], self.0[2], 255])
    }

    /// Components as normalized floats, for GPU clear values.
    #[inline]
    pub fn to_f64(self) -> [f64; 4] {
        self.0.map(|c| c as f64 / 255.0)
    }
}

// ---------------------------------------------------------------------------
// PixelBuffer
// ---------------------------------------------------------------------------

/// A `width × height` RGBA8 image in CPU memory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// A fully transparent buffer.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * BYTES_PER_PIXEL],
        }
    }

    /// A buffer filled with `color`.
    pub fn filled(width: usize, height: usize, color: Rgba) -> Self {
        let mut buf = Self::new(width, height);
        buf.fill(color);
        buf
    }

    /// Wrap tight RGBA8 bytes. Fails if `data` is not exactly
    /// `width * height * 4` bytes long.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self> {
        let expected = width * height * BYTES_PER_PIXEL;
        if data.len() != expected {
            return Err(TilerError::invalid(
                "pixel data length",
                format!("{} (expected {expected})", data.len()),
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Size as a [`Point`].
    #[inline]
    pub fn size(&self) -> Point {
        Point::new(self.width as i32, self.height as i32)
    }

    /// The whole buffer as a range anchored at the origin.
    #[inline]
    pub fn bounds(&self) -> Range {
        Range::from_size(self.size())
    }

    /// Raw RGBA8 bytes, row-major, top row first.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Typed view of the pixels.
    #[inline]
    pub fn pixels(&self) -> &[Rgba] {
        bytemuck::cast_slice(&self.data)
    }

    /// Mutable typed view of the pixels.
    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [Rgba] {
        bytemuck::cast_slice_mut(&mut self.data)
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height {
            Some((y as usize) * self.width + (x as usize))
        } else {
            None
        }
    }

    /// The pixel at `p`, or `None` outside the buffer.
    pub fn get(&self, p: Point) -> Option<Rgba> {
        self.index(p.x, p.y).map(|i| self.pixels()[i])
    }

    /// Set the pixel at `p`. No-op outside the buffer.
    pub fn set(&mut self, p: Point, color: Rgba) {
        if let Some(i) = self.index(p.x, p.y) {
            self.pixels_mut()[i] = color;
        }
    }

    /// Fill every pixel with `color`.
    pub fn fill(&mut self, color: Rgba) {
        self.pixels_mut().fill(color);
    }

    /// Copy `src_rect` of `src` into `self` with its top-left corner at
    /// `dest`. Both sides are clipped; returns the size actually copied.
    pub fn copy_from(&mut self, src: &PixelBuffer, src_rect: Range, dest: Point) -> Point {
        let src_rect = src_rect.intersect(src.bounds());
        if src_rect.is_empty() {
            return Point::ZERO;
        }
        let dest_rect = Range::sized(dest, src_rect.size()).intersect(self.bounds());
        if dest_rect.is_empty() {
            return Point::ZERO;
        }
        // Clipping on the destination side may cut the top/left of the source too.
        let src_origin = src_rect.min + (dest_rect.min - dest);
        let row_bytes = dest_rect.width() as usize * BYTES_PER_PIXEL;

        for row in 0..dest_rect.height() as usize {
            let sy = src_origin.y as usize + row;
            let dy = dest_rect.min.y as usize + row;
            let s = (sy * src.width + src_origin.x as usize) * BYTES_PER_PIXEL;
            let d = (dy * self.width + dest_rect.min.x as usize) * BYTES_PER_PIXEL;
            self.data[d..d + row_bytes].copy_from_slice(&src.data[s..s + row_bytes]);
        }

        dest_rect.size()
    }

    /// Extract `rect` (clipped to the buffer) as a new buffer.
    pub fn region(&self, rect: Range) -> PixelBuffer {
        let rect = rect.intersect(self.bounds());
        let mut out = PixelBuffer::new(rect.width() as usize, rect.height() as usize);
        out.copy_from(self, rect, Point::ZERO);
        out
    }

    /// Force every pixel's alpha to 255.
    pub fn force_opaque(&mut self) {
        for px in self.pixels_mut() {
            px.0[3] = 255;
        }
    }

    /// Whether every pixel has alpha 255.
    pub fn is_opaque(&self) -> bool {
        self.pixels().iter().all(|px| px.a() == 255)
    }
}

// ---------------------------------------------------------------------------
// image interop
// ---------------------------------------------------------------------------

#[cfg(feature = "image")]
impl PixelBuffer {
    /// Copy into an [`image::RgbaImage`].
    pub fn to_rgba_image(&self) -> Result<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width as u32, self.height as u32, self.data.clone())
            .ok_or_else(|| TilerError::invalid("image size", format!("{}x{}", self.width, self.height)))
    }

    /// Write the buffer to `path`; the format follows the file extension.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let path = path.as_ref();
        self.to_rgba_image()?
            .save(path)
            .map_err(|e| TilerError::Io(format!("{}: {e}", path.display())))?;
        log::info!("wrote {}x{} image to {}", self.width, self.height, path.display());
        Ok(())
    }
}
