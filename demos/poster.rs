//! Render the poster on the CPU host and save it as a PNG.
//!
//! Run: cargo run --bin poster -- [OUTPUT] [WIDTHxHEIGHT]

use log::info;
use tiler_core::{Tiler, TilerConfig};
use tiler_demos::{Args, Poster};
use tiler_soft::{SoftHost, SoftHostConfig};

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let host = SoftHost::new(SoftHostConfig {
        width: 512,
        height: 512,
        ..SoftHostConfig::default()
    });
    let poster = Poster::new(args.size);
    let camera = poster.camera();
    let config = TilerConfig::new(args.size.x, args.size.y).with_tile_size(512, 512);

    let mut tiler = Tiler::with_drawer(host, config, poster)?;
    tiler.set_projection(&camera);
    while tiler.advance()? {
        info!("tile {}/{} ({:.0}%)", tiler.current_tile().map_or(0, |t| t + 1), tiler.tile_count(), tiler.progress() * 100.0);
    }
    let image = tiler.last_image().ok_or("tiled pass did not complete")?;
    image.save(&args.output)?;
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match Args::parse(std::env::args().skip(1), "poster.png") {
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
