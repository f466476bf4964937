//! Watch the poster being assembled: one tile per redraw, the stitched image
//! so far scaled into a window. The finished poster is saved as a PNG.
//!
//! Run: cargo run --bin poster-live -- [OUTPUT] [WIDTHxHEIGHT]

use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;

use log::{error, info};
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

use tiler_core::{PixelBuffer, Point, Tiler, TilerConfig};
use tiler_demos::{Args, Poster};
use tiler_soft::{SoftHost, SoftHostConfig};

// ---------------------------------------------------------------------------
// LiveApp: ApplicationHandler
// ---------------------------------------------------------------------------

struct LiveApp {
    tiler: Tiler<SoftHost, Poster>,
    output: PathBuf,
    done: bool,
    state: Option<LiveState>,
}

struct LiveState {
    window: Arc<Window>,
    surface: softbuffer::Surface<Arc<Window>, Arc<Window>>,
    pixel_width: u32,
    pixel_height: u32,
}

/// Nearest-neighbour blit of `image`, letterboxed into a `0RGB` buffer.
fn blit_scaled(image: &PixelBuffer, buf: &mut [u32], width: usize, height: usize) {
    buf.fill(0);
    let (iw, ih) = (image.width(), image.height());
    if iw == 0 || ih == 0 || width == 0 || height == 0 {
        return;
    }
    let scale = (width as f32 / iw as f32).min(height as f32 / ih as f32);
    let (dw, dh) = ((iw as f32 * scale) as usize, (ih as f32 * scale) as usize);
    let (ox, oy) = ((width - dw) / 2, (height - dh) / 2);
    for y in 0..dh {
        let sy = ((y as f32 + 0.5) / scale) as i32;
        for x in 0..dw {
            let sx = ((x as f32 + 0.5) / scale) as i32;
            if let Some(px) = image.get(Point::new(sx, sy)) {
                let [r, g, b, _] = px.0;
                buf[(oy + y) * width + ox + x] = (r as u32) << 16 | (g as u32) << 8 | b as u32;
            }
        }
    }
}

fn non_zero(v: u32) -> NonZeroU32 {
    NonZeroU32::new(v).unwrap_or(NonZeroU32::MIN)
}

impl LiveApp {
    fn step(&mut self, event_loop: &ActiveEventLoop) {
        if self.done {
            return;
        }
        match self.tiler.advance() {
            Ok(true) => info!(
                "tile {}/{}",
                self.tiler.current_tile().map_or(0, |t| t + 1),
                self.tiler.tile_count()
            ),
            Ok(false) => {
                self.done = true;
                if let Some(image) = self.tiler.last_image() {
                    match image.save(&self.output) {
                        Ok(()) => info!("poster complete"),
                        Err(e) => error!("{e}"),
                    }
                }
            }
            Err(e) => {
                error!("{e}");
                event_loop.exit();
            }
        }
    }

    fn render(&mut self) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        let Some(image) = self.tiler.partial_image() else {
            return;
        };
        let (width, height) = (state.pixel_width as usize, state.pixel_height as usize);
        let Ok(mut buf) = state.surface.buffer_mut() else {
            return;
        };
        blit_scaled(image, &mut buf, width, height);
        buf.present().ok();
    }
}

impl ApplicationHandler for LiveApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title("tiler poster")
            .with_inner_size(LogicalSize::new(960, 720))
            .with_resizable(true);
        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                error!("failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };
        let surface = softbuffer::Context::new(window.clone())
            .and_then(|context| softbuffer::Surface::new(&context, window.clone()));
        let mut surface = match surface {
            Ok(surface) => surface,
            Err(e) => {
                error!("failed to create softbuffer surface: {e}");
                event_loop.exit();
                return;
            }
        };

        let PhysicalSize { width, height } = window.inner_size();
        surface.resize(non_zero(width), non_zero(height)).ok();
        window.request_redraw();
        self.state = Some(LiveState {
            window,
            surface,
            pixel_width: width,
            pixel_height: height,
        });
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::Resized(PhysicalSize { width, height }) => {
                if let Some(state) = self.state.as_mut() {
                    state.pixel_width = width;
                    state.pixel_height = height;
                    state.surface.resize(non_zero(width), non_zero(height)).ok();
                }
                self.render();
            }

            WindowEvent::RedrawRequested => {
                self.step(event_loop);
                self.render();
                if !self.done {
                    if let Some(state) = &self.state {
                        state.window.request_redraw();
                    }
                }
            }

            _ => {}
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let host = SoftHost::new(SoftHostConfig {
        width: 256,
        height: 256,
        ..SoftHostConfig::default()
    });
    let poster = Poster::new(args.size);
    let camera = poster.camera();
    let mut tiler = Tiler::with_drawer(host, TilerConfig::new(args.size.x, args.size.y), poster)?;
    tiler.set_projection(&camera);

    let mut app = LiveApp {
        tiler,
        output: args.output,
        done: false,
        state: None,
    };
    let event_loop = EventLoop::new()?;
    event_loop.run_app(&mut app)?;
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match Args::parse(std::env::args().skip(1), "poster-live.png") {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };
    if let Err(e) = run(args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
