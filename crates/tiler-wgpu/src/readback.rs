//! Texture to CPU copies.

use tiler_core::{PixelBuffer, Range};

use crate::WgpuHostError;

const BYTES_PER_PIXEL: usize = 4;

/// Bytes per row of a `width`-pixel RGBA8 copy, rounded up to wgpu's
/// buffer row alignment.
pub(crate) fn padded_bytes_per_row(width: usize) -> usize {
    (width * BYTES_PER_PIXEL).next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize)
}

/// Strip the row padding from a mapped copy.
pub(crate) fn depad(data: &[u8], width: usize, height: usize, padded_row: usize) -> Vec<u8> {
    let row = width * BYTES_PER_PIXEL;
    let mut out = Vec::with_capacity(row * height);
    for chunk in data.chunks(padded_row).take(height) {
        out.extend_from_slice(&chunk[..row]);
    }
    out
}

/// Copy `rect` of a single-sample RGBA8 `texture` into a [`PixelBuffer`],
/// blocking until the GPU is done.
pub(crate) fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    rect: Range,
) -> Result<PixelBuffer, WgpuHostError> {
    let (width, height) = (rect.width() as usize, rect.height() as usize);
    let padded = padded_bytes_per_row(width);

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("tiler readback"),
        size: (padded * height) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("tiler readback"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d {
                x: rect.min.x as u32,
                y: rect.min.y as u32,
                z: 0,
            },
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded as u32),
                rows_per_image: Some(height as u32),
            },
        },
        wgpu::Extent3d {
            width: width as u32,
            height: height as u32,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(Some(encoder.finish()));

    let slice = buffer.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device
        .poll(wgpu::PollType::wait_indefinitely())
        .map_err(|e| WgpuHostError::Poll(e.to_string()))?;
    receiver
        .recv()
        .map_err(|e| WgpuHostError::Map(e.to_string()))?
        .map_err(|e| WgpuHostError::Map(e.to_string()))?;

    let data = depad(&slice.get_mapped_range(), width, height, padded);
    buffer.unmap();

    PixelBuffer::from_raw(width, height, data).map_err(|e| WgpuHostError::Map(e.to_string()))
}
