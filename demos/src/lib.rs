//! A poster scene shared by the demo binaries: a sky gradient drawn per tile
//! from the tile corners, a small perspective city, and a frame overlay.
//!
//! The scene draws through [`Canvas`], which both the CPU and the GPU host
//! implement, so every binary renders the same picture.

use std::path::PathBuf;

use glam::Vec3;

use tiler_core::{Camera, Lens, Point, Range, Rgba, SurfaceProvider, TileCorners, TileDrawer};
use tiler_soft::SoftHost;
use tiler_wgpu::WgpuHost;

pub const DEFAULT_SIZE: Point = Point::new(2048, 1536);

const SKY_TOP: Rgba = Rgba::rgb(24, 32, 78);
const SKY_BOTTOM: Rgba = Rgba::rgb(236, 150, 96);
const GROUND: Rgba = Rgba::rgb(38, 44, 40);
const FRAME: Rgba = Rgba::rgb(245, 240, 228);
const FRAME_WIDTH: i32 = 12;

// ---------------------------------------------------------------------------
// Canvas
// ---------------------------------------------------------------------------

/// The drawing primitives the poster needs from a host.
pub trait Canvas: SurfaceProvider {
    /// Current viewport, device pixels.
    fn drawable(&self) -> Range;

    /// Fill `rect`, relative to the viewport origin, over everything.
    fn fill(&mut self, rect: Range, color: Rgba);

    /// Depth-tested world-space quad.
    fn quad(&mut self, corners: [Vec3; 4], color: Rgba);
}

impl Canvas for SoftHost {
    fn drawable(&self) -> Range {
        self.viewport()
    }

    fn fill(&mut self, rect: Range, color: Rgba) {
        self.fill_rect(rect, color);
    }

    fn quad(&mut self, corners: [Vec3; 4], color: Rgba) {
        self.draw_quad(corners, color);
    }
}

impl Canvas for WgpuHost {
    fn drawable(&self) -> Range {
        self.viewport()
    }

    fn fill(&mut self, rect: Range, color: Rgba) {
        self.fill_rect(rect, color);
    }

    fn quad(&mut self, corners: [Vec3; 4], color: Rgba) {
        self.draw_quad(corners, color);
    }
}

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

fn mix(a: Rgba, b: Rgba, t: f32) -> Rgba {
    let t = t.clamp(0.0, 1.0);
    let c = |i: usize| (a.0[i] as f32 + (b.0[i] as f32 - a.0[i] as f32) * t).round() as u8;
    Rgba::rgba(c(0), c(1), c(2), c(3))
}

fn shade(color: Rgba, k: f32) -> Rgba {
    mix(Rgba::BLACK, color, k)
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct Building {
    min: Vec3,
    max: Vec3,
    color: Rgba,
}

impl Building {
    /// The six faces, lit from above and the left.
    fn faces(&self) -> [([Vec3; 4], Rgba); 6] {
        let (a, b) = (self.min, self.max);
        let v = |x: f32, y: f32, z: f32| Vec3::new(x, y, z);
        [
            ([v(a.x, b.y, a.z), v(b.x, b.y, a.z), v(b.x, b.y, b.z), v(a.x, b.y, b.z)], shade(self.color, 1.0)),
            ([v(a.x, a.y, b.z), v(b.x, a.y, b.z), v(b.x, b.y, b.z), v(a.x, b.y, b.z)], shade(self.color, 0.8)),
            ([v(a.x, a.y, a.z), v(b.x, a.y, a.z), v(b.x, b.y, a.z), v(a.x, b.y, a.z)], shade(self.color, 0.5)),
            ([v(a.x, a.y, a.z), v(a.x, a.y, b.z), v(a.x, b.y, b.z), v(a.x, b.y, a.z)], shade(self.color, 0.9)),
            ([v(b.x, a.y, a.z), v(b.x, a.y, b.z), v(b.x, b.y, b.z), v(b.x, b.y, a.z)], shade(self.color, 0.6)),
            ([v(a.x, a.y, a.z), v(b.x, a.y, a.z), v(b.x, a.y, b.z), v(a.x, a.y, b.z)], shade(self.color, 0.3)),
        ]
    }
}

/// A city block poster of `image` pixels.
#[derive(Clone, Debug)]
pub struct Poster {
    image: Point,
    buildings: Vec<Building>,
}

impl Poster {
    pub fn new(image: Point) -> Self {
        let palette = [
            Rgba::rgb(180, 188, 204),
            Rgba::rgb(206, 170, 140),
            Rgba::rgb(140, 160, 176),
            Rgba::rgb(214, 204, 180),
        ];
        let mut buildings = Vec::new();
        for row in 0..5 {
            for col in 0..7 {
                let x = -31.5 + col as f32 * 9.0;
                let z = -42.0 + row as f32 * 9.0;
                let height = 4.0 + ((col * 7 + row * 13) % 11) as f32 * 1.8;
                buildings.push(Building {
                    min: Vec3::new(x, 0.0, z),
                    max: Vec3::new(x + 5.5, height, z + 5.5),
                    color: palette[(col + row) % palette.len()],
                });
            }
        }
        Self { image, buildings }
    }

    pub fn image_size(&self) -> Point {
        self.image
    }

    pub fn camera(&self) -> Camera {
        let aspect = self.image.x as f32 / self.image.y as f32;
        Camera::look_at(
            Vec3::new(6.0, 22.0, 38.0),
            Vec3::new(0.0, 3.0, -14.0),
            Vec3::Y,
            Lens::perspective(50f32.to_radians(), aspect, 1.0, 250.0),
        )
    }

    /// Frame bars in image pixels.
    fn frame(&self) -> [Range; 4] {
        let (w, h, t) = (self.image.x, self.image.y, FRAME_WIDTH);
        [
            Range::new(0, 0, w, t),
            Range::new(0, h - t, w, h),
            Range::new(0, t, t, h - t),
            Range::new(w - t, t, w, h - t),
        ]
    }
}

impl<H: Canvas> TileDrawer<H> for Poster {
    fn draw_background(&mut self, host: &mut H, corners: TileCorners) -> Result<(), H::Error> {
        let size = host.drawable().size();
        for y in 0..size.y {
            let v = corners.ul.y + (y as f32 + 0.5) / size.y as f32 * (corners.ll.y - corners.ul.y);
            host.fill(Range::new(0, y, size.x, y + 1), mix(SKY_TOP, SKY_BOTTOM, v));
        }
        Ok(())
    }

    fn draw_scene(&mut self, host: &mut H) -> Result<(), H::Error> {
        host.quad(
            [
                Vec3::new(-90.0, 0.0, -120.0),
                Vec3::new(90.0, 0.0, -120.0),
                Vec3::new(90.0, 0.0, 40.0),
                Vec3::new(-90.0, 0.0, 40.0),
            ],
            GROUND,
        );
        for building in &self.buildings {
            for (quad, color) in building.faces() {
                host.quad(quad, color);
            }
        }
        Ok(())
    }

    fn draw_overlay(&mut self, host: &mut H, corners: TileCorners) -> Result<(), H::Error> {
        let origin = Point::new(
            (corners.ul.x * self.image.x as f32).round() as i32,
            (corners.ul.y * self.image.y as f32).round() as i32,
        );
        for bar in self.frame() {
            host.fill(bar - origin, FRAME);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// `[OUTPUT] [WIDTHxHEIGHT]`
#[derive(Clone, Debug, PartialEq)]
pub struct Args {
    pub output: PathBuf,
    pub size: Point,
}

impl Args {
    pub fn parse(mut args: impl Iterator<Item = String>, default_output: &str) -> Result<Self, String> {
        let output = args.next().unwrap_or_else(|| default_output.to_owned()).into();
        let size = match args.next() {
            Some(s) => parse_size(&s).ok_or_else(|| format!("bad size {s:?}, expected WIDTHxHEIGHT"))?,
            None => DEFAULT_SIZE,
        };
        Ok(Self { output, size })
    }
}

fn parse_size(s: &str) -> Option<Point> {
    let (w, h) = s.split_once('x')?;
    let size = Point::new(w.trim().parse().ok()?, h.trim().parse().ok()?);
    size.is_positive().then_some(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiler_core::{Tiler, TilerConfig};
    use tiler_soft::SoftHostConfig;

    fn render(image: Point, viewport: Point) -> tiler_core::PixelBuffer {
        let host = SoftHost::new(SoftHostConfig {
            width: viewport.x,
            height: viewport.y,
            ..SoftHostConfig::default()
        });
        let poster = Poster::new(image);
        let camera = poster.camera();
        let mut tiler = Tiler::with_drawer(host, TilerConfig::new(image.x, image.y), poster).unwrap();
        tiler.set_projection(&camera);
        tiler.into_image().unwrap()
    }

    #[test]
    fn tiled_poster_matches_single_render() {
        let image = Point::new(160, 120);
        let reference = render(image, image);
        let tiled = render(image, Point::new(50, 45));
        let differing = reference
            .pixels()
            .iter()
            .zip(tiled.pixels())
            .filter(|(a, b)| a != b)
            .count();
        assert!(differing <= reference.pixels().len() / 50, "{differing} pixels differ");
        // frame is continuous across tile seams
        for p in [Point::new(0, 0), Point::new(159, 119), Point::new(49, 3), Point::new(3, 90)] {
            assert_eq!(tiled.get(p), Some(FRAME), "{p}");
        }
    }

    #[test]
    fn sky_gradient_spans_the_image() {
        let image = Point::new(64, 200);
        let sky = render(image, Point::new(64, 64));
        let top = sky.get(Point::new(FRAME_WIDTH + 1, FRAME_WIDTH)).unwrap();
        assert_eq!(top, mix(SKY_TOP, SKY_BOTTOM, (FRAME_WIDTH as f32 + 0.5) / 200.0));
    }

    #[test]
    fn mix_endpoints() {
        assert_eq!(mix(SKY_TOP, SKY_BOTTOM, 0.0), SKY_TOP);
        assert_eq!(mix(SKY_TOP, SKY_BOTTOM, 1.0), SKY_BOTTOM);
        assert_eq!(shade(Rgba::rgb(200, 100, 50), 0.5), Rgba::rgb(100, 50, 25));
    }

    #[test]
    fn args() {
        let parse = |v: &[&str]| Args::parse(v.iter().map(|s| s.to_string()), "poster.png");
        assert_eq!(
            parse(&[]).unwrap(),
            Args {
                output: "poster.png".into(),
                size: DEFAULT_SIZE
            }
        );
        assert_eq!(parse(&["out.png", "640x480"]).unwrap().size, Point::new(640, 480));
        assert!(parse(&["out.png", "640"]).is_err());
        assert!(parse(&["out.png", "0x10"]).is_err());
    }
}
