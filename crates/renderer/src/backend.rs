use image::RgbaImage;

use crate::error::{DeviceLoss, RenderError};
use crate::geometry::Viewport;
use crate::types::SurfaceSize;
use crate::uniforms::UniformBlock;

/// GPU operations the orchestrator sequences.
///
/// Every handle type is owned by the orchestrator and handed back through a
/// `release_*` call; implementations never keep their own references to
/// per-session resources. All calls are synchronous: implementations block
/// on device requests and shader compilation before returning.
pub trait RenderBackend {
    /// Device, queue and configured drawable surface.
    type Device;
    type Sampler;
    type Texture;
    type UniformBuffer;
    type Pipeline;
    type BindGroup;

    /// Acquires a device and configures the surface at `size`.
    fn acquire(&mut self, size: SurfaceSize) -> Result<Self::Device, RenderError>;

    fn create_sampler(&mut self, device: &Self::Device) -> Self::Sampler;

    /// Largest width or height a texture may have on this device.
    fn max_texture_dimension(&self, device: &Self::Device) -> u32;

    /// Uploads an RGBA8 image into a texture sized to the image.
    fn create_texture(
        &mut self,
        device: &Self::Device,
        image: &RgbaImage,
    ) -> Result<Self::Texture, RenderError>;

    fn create_uniform_buffer(&mut self, device: &Self::Device) -> Self::UniformBuffer;

    /// Compiles the full-screen quad plus `fragment_source` into a pipeline.
    fn build_pipeline(
        &mut self,
        device: &Self::Device,
        fragment_source: &str,
    ) -> Result<Self::Pipeline, RenderError>;

    /// Binds sampler@0, texture@1 and uniforms@2 for `pipeline`.
    fn create_bind_group(
        &mut self,
        device: &Self::Device,
        pipeline: &Self::Pipeline,
        sampler: &Self::Sampler,
        texture: &Self::Texture,
        uniforms: &Self::UniformBuffer,
    ) -> Self::BindGroup;

    /// Overwrites the whole uniform buffer.
    fn write_uniforms(
        &mut self,
        device: &Self::Device,
        buffer: &Self::UniformBuffer,
        block: &UniformBlock,
    );

    /// Reconfigures the drawable surface to cover the whole container.
    fn configure_surface(&mut self, device: &mut Self::Device, size: SurfaceSize);

    /// Clears to black and draws the quad once into `viewport` of the surface.
    fn render(
        &mut self,
        device: &mut Self::Device,
        pipeline: &Self::Pipeline,
        bind_group: &Self::BindGroup,
        viewport: Viewport,
    ) -> Result<(), RenderError>;

    /// Renders into an offscreen target of `size` and reads it back as RGBA.
    fn capture(
        &mut self,
        device: &Self::Device,
        pipeline: &Self::Pipeline,
        bind_group: &Self::BindGroup,
        size: SurfaceSize,
    ) -> Result<RgbaImage, RenderError>;

    /// Returns a pending device-loss notification, if any.
    fn poll_device_lost(&mut self, device: &Self::Device) -> Option<DeviceLoss>;

    fn release_texture(&mut self, texture: Self::Texture);
    fn release_uniform_buffer(&mut self, buffer: Self::UniformBuffer);
    fn release_device(&mut self, device: Self::Device);
}
