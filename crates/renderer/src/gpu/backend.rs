use image::RgbaImage;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::backend::RenderBackend;
use crate::error::{DeviceLoss, RenderError};
use crate::geometry::Viewport;
use crate::types::{GpuPowerPreference, SurfaceSize};
use crate::uniforms::UniformBlock;

use super::context::GpuContext;
use super::frame;
use super::pipeline::{self, PipelineLayouts, ShaderPipeline};
use super::texture::{self, SourceTexture};

/// Acquired device plus the layouts every effect pipeline shares.
pub struct WgpuDevice {
    context: GpuContext,
    layouts: PipelineLayouts,
}

/// wgpu implementation of [`RenderBackend`] drawing into a window.
///
/// `W` is any cloneable window handle (typically `Arc<winit::window::Window>`);
/// each acquisition creates a fresh instance and surface from it.
pub struct WgpuBackend<W> {
    target: W,
    power: GpuPowerPreference,
}

impl<W> WgpuBackend<W>
where
    W: HasWindowHandle + HasDisplayHandle + Send + Sync + Clone + 'static,
{
    pub fn new(target: W, power: GpuPowerPreference) -> Self {
        Self { target, power }
    }

    pub fn target(&self) -> &W {
        &self.target
    }
}

impl<W> RenderBackend for WgpuBackend<W>
where
    W: HasWindowHandle + HasDisplayHandle + Send + Sync + Clone + 'static,
{
    type Device = WgpuDevice;
    type Sampler = wgpu::Sampler;
    type Texture = SourceTexture;
    type UniformBuffer = wgpu::Buffer;
    type Pipeline = ShaderPipeline;
    type BindGroup = wgpu::BindGroup;

    fn acquire(&mut self, size: SurfaceSize) -> Result<WgpuDevice, RenderError> {
        let context = GpuContext::new(self.target.clone(), size, self.power)?;
        let layouts = PipelineLayouts::new(&context.device);
        Ok(WgpuDevice { context, layouts })
    }

    fn create_sampler(&mut self, device: &WgpuDevice) -> wgpu::Sampler {
        texture::create_sampler(&device.context.device)
    }

    fn max_texture_dimension(&self, device: &WgpuDevice) -> u32 {
        device.context.max_texture_dimension
    }

    fn create_texture(
        &mut self,
        device: &WgpuDevice,
        image: &RgbaImage,
    ) -> Result<SourceTexture, RenderError> {
        Ok(SourceTexture::upload(
            &device.context.device,
            &device.context.queue,
            image,
        ))
    }

    fn create_uniform_buffer(&mut self, device: &WgpuDevice) -> wgpu::Buffer {
        pipeline::create_uniform_buffer(&device.context.device)
    }

    fn build_pipeline(
        &mut self,
        device: &WgpuDevice,
        fragment_source: &str,
    ) -> Result<ShaderPipeline, RenderError> {
        ShaderPipeline::new(
            &device.context.device,
            &device.layouts,
            device.context.surface_format,
            fragment_source,
        )
    }

    fn create_bind_group(
        &mut self,
        device: &WgpuDevice,
        _pipeline: &ShaderPipeline,
        sampler: &wgpu::Sampler,
        texture: &SourceTexture,
        uniforms: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        pipeline::create_bind_group(
            &device.context.device,
            &device.layouts,
            sampler,
            &texture.view,
            uniforms,
        )
    }

    fn write_uniforms(&mut self, device: &WgpuDevice, buffer: &wgpu::Buffer, block: &UniformBlock) {
        device.context.queue.write_buffer(buffer, 0, block.as_bytes());
    }

    fn configure_surface(&mut self, device: &mut WgpuDevice, size: SurfaceSize) {
        device.context.resize(size);
    }

    fn render(
        &mut self,
        device: &mut WgpuDevice,
        pipeline: &ShaderPipeline,
        bind_group: &wgpu::BindGroup,
        viewport: Viewport,
    ) -> Result<(), RenderError> {
        frame::render_to_surface(&device.context, &pipeline.pipeline, bind_group, viewport)
    }

    fn capture(
        &mut self,
        device: &WgpuDevice,
        pipeline: &ShaderPipeline,
        bind_group: &wgpu::BindGroup,
        size: SurfaceSize,
    ) -> Result<RgbaImage, RenderError> {
        frame::capture(&device.context, &pipeline.pipeline, bind_group, size)
    }

    fn poll_device_lost(&mut self, device: &WgpuDevice) -> Option<DeviceLoss> {
        device.context.poll_lost()
    }

    fn release_texture(&mut self, texture: SourceTexture) {
        texture.destroy();
    }

    fn release_uniform_buffer(&mut self, buffer: wgpu::Buffer) {
        buffer.destroy();
    }

    fn release_device(&mut self, device: WgpuDevice) {
        device.context.device.destroy();
    }
}
