use image::RgbaImage;

use crate::error::RenderError;
use crate::geometry::Viewport;
use crate::types::SurfaceSize;

use super::context::GpuContext;

const BYTES_PER_PIXEL: u32 = 4;

/// Records one cleared pass with a single six-vertex draw.
fn encode_draw(
    encoder: &mut wgpu::CommandEncoder,
    view: &wgpu::TextureView,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
    viewport: Option<(Viewport, SurfaceSize)>,
) {
    let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("effect pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        occlusion_query_set: None,
        timestamp_writes: None,
    });
    render_pass.set_pipeline(pipeline);
    render_pass.set_bind_group(0, bind_group, &[]);
    if let Some((viewport, target)) = viewport {
        let viewport = clamp_viewport(viewport, target);
        render_pass.set_viewport(
            viewport.x,
            viewport.y,
            viewport.width,
            viewport.height,
            0.0,
            1.0,
        );
    }
    render_pass.draw(0..6, 0..1);
}

/// Keeps the viewport inside the render target; rounding can push it a
/// pixel past the edge.
fn clamp_viewport(viewport: Viewport, target: SurfaceSize) -> Viewport {
    let target_width = target.width as f32;
    let target_height = target.height as f32;
    let x = viewport.x.clamp(0.0, (target_width - 1.0).max(0.0));
    let y = viewport.y.clamp(0.0, (target_height - 1.0).max(0.0));
    Viewport {
        x,
        y,
        width: viewport.width.min(target_width - x).max(1.0),
        height: viewport.height.min(target_height - y).max(1.0),
    }
}

/// Draws into the next surface texture and presents it.
///
/// Lost or outdated surfaces are reconfigured and the frame is skipped.
pub(crate) fn render_to_surface(
    context: &GpuContext,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
    viewport: Viewport,
) -> Result<(), RenderError> {
    let frame = match context.surface.get_current_texture() {
        Ok(frame) => frame,
        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
            tracing::debug!("surface lost or outdated; reconfiguring");
            context.reconfigure();
            return Ok(());
        }
        Err(wgpu::SurfaceError::Timeout) => {
            tracing::debug!("timed out acquiring surface texture; skipping frame");
            return Ok(());
        }
        Err(err) => return Err(RenderError::Surface(err.to_string())),
    };

    let view = frame
        .texture
        .create_view(&wgpu::TextureViewDescriptor::default());
    let target = SurfaceSize::new(context.config.width, context.config.height);
    let mut encoder = context
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame encoder"),
        });
    encode_draw(
        &mut encoder,
        &view,
        pipeline,
        bind_group,
        Some((viewport, target)),
    );
    context.queue.submit(std::iter::once(encoder.finish()));
    frame.present();
    Ok(())
}

/// Renders offscreen at `size` and reads the result back as RGBA8.
pub(crate) fn capture(
    context: &GpuContext,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
    size: SurfaceSize,
) -> Result<RgbaImage, RenderError> {
    let bgra = readback_is_bgra(context.surface_format)?;
    let size = size.non_zero();
    let extent = wgpu::Extent3d {
        width: size.width,
        height: size.height,
        depth_or_array_layers: 1,
    };
    let target = context.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("export target"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: context.surface_format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());

    let padded_row = padded_bytes_per_row(size.width);
    let readback = context.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("export readback"),
        size: u64::from(padded_row) * u64::from(size.height),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = context
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("export encoder"),
        });
    encode_draw(&mut encoder, &view, pipeline, bind_group, None);
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: &target,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &readback,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_row),
                rows_per_image: Some(size.height),
            },
        },
        extent,
    );
    context.queue.submit(std::iter::once(encoder.finish()));

    let slice = readback.slice(..);
    let (tx, rx) = crossbeam_channel::bounded(1);
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    context
        .device
        .poll(wgpu::PollType::Wait)
        .map_err(|err| RenderError::Readback(err.to_string()))?;
    rx.recv()
        .map_err(|_| RenderError::Readback("map_async callback never fired".into()))?
        .map_err(|err| RenderError::Readback(err.to_string()))?;

    let pixels = {
        let data = slice.get_mapped_range();
        unpad_rows(
            &data,
            size,
            padded_row,
            bgra,
        )
    };
    readback.unmap();
    target.destroy();

    RgbaImage::from_raw(size.width, size.height, pixels)
        .ok_or_else(|| RenderError::Readback("readback size mismatch".into()))
}

fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * BYTES_PER_PIXEL;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Channel order of a 4-byte surface format; other layouts cannot be exported.
fn readback_is_bgra(format: wgpu::TextureFormat) -> Result<bool, RenderError> {
    match format {
        wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => Ok(false),
        wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb => Ok(true),
        other => Err(RenderError::Readback(format!(
            "unsupported export format {other:?}"
        ))),
    }
}

/// Strips row padding and converts to RGBA byte order.
fn unpad_rows(data: &[u8], size: SurfaceSize, padded_row: u32, bgra: bool) -> Vec<u8> {
    let tight_row = (size.width * BYTES_PER_PIXEL) as usize;
    let mut pixels = Vec::with_capacity(tight_row * size.height as usize);
    for row in data.chunks(padded_row as usize).take(size.height as usize) {
        pixels.extend_from_slice(&row[..tight_row]);
    }
    if bgra {
        for pixel in pixels.chunks_exact_mut(BYTES_PER_PIXEL as usize) {
            pixel.swap(0, 2);
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_copy_alignment() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
    }

    #[test]
    fn unpadding_drops_row_tails_and_swaps_bgra() {
        let size = SurfaceSize::new(2, 2);
        let mut data = vec![0u8; 256 * 2];
        data[..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        data[256..264].copy_from_slice(&[9, 10, 11, 12, 13, 14, 15, 16]);

        assert_eq!(
            unpad_rows(&data, size, 256, false),
            vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]
        );
        assert_eq!(
            unpad_rows(&data, size, 256, true),
            vec![3, 2, 1, 4, 7, 6, 5, 8, 11, 10, 9, 12, 15, 14, 13, 16]
        );
    }

    #[test]
    fn only_8_bit_rgba_layouts_are_read_back() {
        assert_eq!(readback_is_bgra(wgpu::TextureFormat::Rgba8Unorm), Ok(false));
        assert_eq!(readback_is_bgra(wgpu::TextureFormat::Bgra8UnormSrgb), Ok(true));
        assert!(matches!(
            readback_is_bgra(wgpu::TextureFormat::Rgba16Float),
            Err(RenderError::Readback(_))
        ));
        assert!(matches!(
            readback_is_bgra(wgpu::TextureFormat::Rgb10a2Unorm),
            Err(RenderError::Readback(_))
        ));
    }

    #[test]
    fn viewport_is_clamped_to_the_target() {
        let clamped = clamp_viewport(
            Viewport {
                x: 1.0,
                y: 0.0,
                width: 800.0,
                height: 400.0,
            },
            SurfaceSize::new(800, 400),
        );
        assert_eq!(
            clamped,
            Viewport {
                x: 1.0,
                y: 0.0,
                width: 799.0,
                height: 400.0,
            }
        );
    }
}
