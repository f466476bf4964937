//! Render the poster on the GPU and save it as a PNG. The poster may be far
//! larger than the window texture.
//!
//! Run: cargo run --bin poster-wgpu -- [OUTPUT] [WIDTHxHEIGHT]

use log::info;
use tiler_core::{Tiler, TilerConfig};
use tiler_demos::{Args, Poster};
use tiler_wgpu::{WgpuHost, WgpuHostConfig};

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let host = WgpuHost::new(WgpuHostConfig {
        width: 1024,
        height: 1024,
        ..WgpuHostConfig::default()
    })?;
    let poster = Poster::new(args.size);
    let camera = poster.camera();
    let config = TilerConfig::new(args.size.x, args.size.y).with_samples(4).with_alpha(true);

    let mut tiler = Tiler::with_drawer(host, config, poster)?;
    tiler.set_projection(&camera);
    info!("rendering {} tiles of {}", tiler.tile_count(), tiler.grid().tile_size());
    let image = tiler.image()?;
    image.save(&args.output)?;
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match Args::parse(std::env::args().skip(1), "poster-wgpu.png") {
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
