//! **tiler-core**: render images larger than the framebuffer, one tile at a time.
//!
//! The image is cut into a grid of tiles no bigger than the host viewport.
//! Each tile is rendered with a narrowed projection frustum so that the
//! stitched result matches a single full-size render, then read back into a
//! CPU-side [`PixelBuffer`]. The rendering host itself (window, GPU, software
//! rasterizer) sits behind the traits in [`host`].

pub mod camera;
pub mod drawer;
pub mod error;
pub mod frustum;
pub mod geom;
pub mod host;
pub mod pixels;
pub mod tiler;

pub use camera::{Camera, Lens};
pub use drawer::{Callbacks, NoopDrawer, TileCorners, TileDrawer};
pub use error::{Result, TilerError};
pub use frustum::{ClipDepth, Frustum, ProjectionKind};
pub use geom::{Point, Range};
pub use host::{OffscreenProvider, RenderHost, SurfaceProvider, TransformStack, with_pushed_state};
pub use pixels::{PixelBuffer, Rgba};
pub use tiler::{TileGrid, Tiler, TilerConfig};
