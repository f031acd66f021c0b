//! Render orchestrator.
//!
//! Owns one GPU session and sequences it through
//! `Uninitialized → Initializing → Ready ⇄ Rebuilding`, with `Error` reachable
//! from initialisation and `TornDown` terminal. Every public call is
//! synchronous; by the time it returns the surface shows a frame built from
//! the latest committed effect, parameters, shader override and image.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use effects::{EffectId, ParamError, ParamValue};
use image::RgbaImage;

use crate::backend::RenderBackend;
use crate::clock::AnimationClock;
use crate::error::RenderError;
use crate::geometry::DisplayGeometry;
use crate::loader::{ImageLoader, LoadedImage, Ticket};
use crate::session::{Phase, SessionEvent, SessionState};
use crate::types::ImageSource;
use crate::uniforms::{pack, UniformBlock};

/// Logical container size plus the display's pixel density.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Container {
    size: (f32, f32),
    scale_factor: f64,
}

/// Resources of one acquired device. Optional members are absent mid-swap;
/// the frame renderer skips drawing until they are all present again.
struct GpuSession<B: RenderBackend> {
    device: B::Device,
    sampler: B::Sampler,
    uniform_buffer: B::UniformBuffer,
    texture: Option<B::Texture>,
    texture_size: (u32, u32),
    texture_generation: u64,
    pipeline: Option<B::Pipeline>,
    /// Source text the live pipeline was compiled from.
    pipeline_source: Option<String>,
    bind_group: Option<B::BindGroup>,
    /// Texture generation the live bind group references.
    bound_generation: Option<u64>,
    geometry: DisplayGeometry,
}

enum ShaderOutcome {
    Unchanged,
    Compiled,
    Failed(String),
}

pub struct Orchestrator<B: RenderBackend> {
    backend: B,
    phase: Phase,
    session: SessionState,
    clock: AnimationClock,
    loader: Option<ImageLoader>,
    image: Option<Arc<RgbaImage>>,
    container: Option<Container>,
    gpu: Option<GpuSession<B>>,
    uniforms: UniformBlock,
    error: Option<RenderError>,
    shader_error: Option<String>,
}

impl<B: RenderBackend> Orchestrator<B> {
    pub fn new(backend: B, effect: EffectId, clock: AnimationClock) -> Self {
        Self {
            backend,
            phase: Phase::Uninitialized,
            session: SessionState::new(effect),
            clock,
            loader: Some(ImageLoader::new()),
            image: None,
            container: None,
            gpu: None,
            uniforms: UniformBlock::default(),
            error: None,
            shader_error: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        self.session.subscribe()
    }

    /// Error that put the orchestrator into [`Phase::Error`].
    pub fn error(&self) -> Option<&RenderError> {
        self.error.as_ref()
    }

    /// Diagnostic of the last failed shader build, until a build succeeds.
    pub fn shader_error(&self) -> Option<&str> {
        self.shader_error.as_deref()
    }

    pub fn image_size(&self) -> Option<(u32, u32)> {
        self.image.as_ref().map(|image| image.dimensions())
    }

    /// Last uniform block written to the GPU.
    pub fn uniforms(&self) -> &UniformBlock {
        &self.uniforms
    }

    pub fn animation_time(&self) -> f32 {
        self.clock.seconds()
    }

    /// Records the drawable container; initialises once an image is present.
    pub fn resize(&mut self, size: (f32, f32), scale_factor: f64) {
        if self.phase == Phase::TornDown {
            return;
        }
        self.container = Some(Container { size, scale_factor });
        if self.gpu.is_some() {
            self.refresh_geometry();
            self.render();
        } else if let Err(error) = self.try_initialize() {
            tracing::debug!(%error, "initialisation after resize failed");
        }
    }

    /// Replaces the source image.
    ///
    /// While `Ready`, the old texture is released before the new one is
    /// created and the pipeline is rebuilt against it. An image that exceeds
    /// the device's texture limit is rejected and the previous one kept.
    pub fn set_image(&mut self, image: Arc<RgbaImage>) -> Result<(), RenderError> {
        match self.phase {
            Phase::TornDown => Ok(()),
            Phase::Ready => self.replace_image(image),
            Phase::Error => {
                let recoverable = self.error.as_ref().map_or(true, |error| !error.is_fatal());
                self.commit_image(image);
                if recoverable {
                    self.error = None;
                    self.set_phase(Phase::Uninitialized);
                    self.try_initialize()
                } else {
                    Ok(())
                }
            }
            _ => {
                self.commit_image(image);
                self.try_initialize()
            }
        }
    }

    /// Starts decoding `source` in the background; the result is applied on
    /// a later [`Orchestrator::tick`] if no newer request supersedes it.
    pub fn load_image(&mut self, source: ImageSource) -> Option<Ticket> {
        self.loader.as_mut().map(|loader| loader.request(source))
    }

    /// Blocks until the newest image request decodes, then applies it.
    pub fn wait_for_image(&mut self, timeout: Duration) -> Result<(), RenderError> {
        let loaded = self
            .loader
            .as_mut()
            .and_then(|loader| loader.wait_latest(timeout))
            .ok_or(RenderError::NotReady)?;
        self.apply_loaded(loaded)
    }

    pub fn select_effect(&mut self, effect: EffectId) {
        if self.phase == Phase::TornDown || !self.session.select_effect(effect) {
            return;
        }
        tracing::debug!(effect = %effect, "effect selected");
        self.rebuild();
    }

    pub fn set_param(&mut self, key: &str, value: ParamValue) -> Result<ParamValue, ParamError> {
        let stored = self.session.set_param(key, value)?;
        self.commit_params();
        Ok(stored)
    }

    pub fn set_param_from_str(&mut self, key: &str, text: &str) -> Result<ParamValue, ParamError> {
        let stored = self.session.set_param_from_str(key, text)?;
        self.commit_params();
        Ok(stored)
    }

    pub fn step_param(&mut self, key: &str, direction: i32) -> Result<ParamValue, ParamError> {
        let stored = self.session.step_param(key, direction)?;
        self.commit_params();
        Ok(stored)
    }

    /// Installs or clears the custom fragment source.
    pub fn set_shader_override(&mut self, source: Option<String>) {
        if self.phase == Phase::TornDown || !self.session.set_shader_override(source) {
            return;
        }
        self.rebuild();
    }

    /// Re-resolves the shader source and rebuilds whatever is stale.
    ///
    /// With unchanged effect, override and texture the live pipeline and bind
    /// group are kept and the uniforms are rewritten unchanged.
    pub fn rebuild(&mut self) {
        if self.phase != Phase::Ready {
            return;
        }
        self.set_phase(Phase::Rebuilding);
        self.finish_rebuild();
    }

    /// Advances one display refresh.
    pub fn tick(&mut self) {
        if self.phase == Phase::TornDown {
            return;
        }
        self.pump_images();
        self.check_device();

        self.clock.tick();
        if self.session.effect().descriptor().animated {
            self.upload_uniforms();
        }
        self.render();
    }

    /// Renders the current frame offscreen at canvas size and reads it back.
    pub fn export_frame(&mut self) -> Result<RgbaImage, RenderError> {
        if self.phase != Phase::Ready {
            return Err(RenderError::NotReady);
        }
        let Some(gpu) = self.gpu.as_ref() else {
            return Err(RenderError::NotReady);
        };
        let (Some(pipeline), Some(bind_group)) = (gpu.pipeline.as_ref(), gpu.bind_group.as_ref())
        else {
            return Err(RenderError::NotReady);
        };
        self.backend
            .capture(&gpu.device, pipeline, bind_group, gpu.geometry.physical)
    }

    /// Releases every GPU resource and stops the clock. Terminal.
    pub fn teardown(&mut self) {
        if self.phase == Phase::TornDown {
            return;
        }
        self.release_gpu();
        self.clock.stop();
        self.loader = None;
        self.set_phase(Phase::TornDown);
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase == phase {
            return;
        }
        tracing::debug!(from = ?self.phase, to = ?phase, "renderer phase");
        self.phase = phase;
        self.session.emit(SessionEvent::PhaseChanged(phase));
    }

    fn commit_image(&mut self, image: Arc<RgbaImage>) {
        let (width, height) = image.dimensions();
        self.image = Some(image);
        self.session
            .emit(SessionEvent::ImageChanged { width, height });
    }

    fn commit_params(&mut self) {
        if self.phase == Phase::Ready {
            self.upload_uniforms();
            self.render();
        }
    }

    fn try_initialize(&mut self) -> Result<(), RenderError> {
        if self.phase != Phase::Uninitialized {
            return Ok(());
        }
        let (Some(image), Some(container)) = (self.image.clone(), self.container) else {
            return Ok(());
        };

        self.set_phase(Phase::Initializing);
        match self.initialize(&image, container) {
            Ok(gpu) => {
                tracing::debug!(
                    effect = %self.session.effect(),
                    width = image.width(),
                    height = image.height(),
                    "renderer initialised"
                );
                self.gpu = Some(gpu);
                self.error = None;
                self.set_phase(Phase::Ready);
                self.upload_uniforms();
                self.render();
                Ok(())
            }
            Err(error) => {
                tracing::error!(%error, "renderer initialisation failed");
                self.error = Some(error.clone());
                self.set_phase(Phase::Error);
                Err(error)
            }
        }
    }

    /// Acquires everything in dependency order. On failure, whatever this
    /// attempt created is released before returning.
    fn initialize(
        &mut self,
        image: &RgbaImage,
        container: Container,
    ) -> Result<GpuSession<B>, RenderError> {
        let geometry =
            DisplayGeometry::compute(container.size, image.dimensions(), container.scale_factor);
        let device = self.backend.acquire(geometry.container)?;
        let sampler = self.backend.create_sampler(&device);

        let texture = check_texture_limit(self.backend.max_texture_dimension(&device), image)
            .and_then(|()| self.backend.create_texture(&device, image));
        let texture = match texture {
            Ok(texture) => texture,
            Err(error) => {
                drop(sampler);
                self.backend.release_device(device);
                return Err(error);
            }
        };

        let uniform_buffer = self.backend.create_uniform_buffer(&device);
        let (pipeline, pipeline_source) = match self.initial_pipeline(&device) {
            Ok(built) => built,
            Err(error) => {
                self.backend.release_uniform_buffer(uniform_buffer);
                self.backend.release_texture(texture);
                drop(sampler);
                self.backend.release_device(device);
                return Err(error);
            }
        };
        let bind_group = self.backend.create_bind_group(
            &device,
            &pipeline,
            &sampler,
            &texture,
            &uniform_buffer,
        );

        Ok(GpuSession {
            device,
            sampler,
            uniform_buffer,
            texture: Some(texture),
            texture_size: image.dimensions(),
            texture_generation: 0,
            pipeline: Some(pipeline),
            pipeline_source: Some(pipeline_source),
            bind_group: Some(bind_group),
            bound_generation: Some(0),
            geometry,
        })
    }

    /// Builds the requested source, falling back to the catalog shader when
    /// a broken override would otherwise block initialisation.
    fn initial_pipeline(
        &mut self,
        device: &B::Device,
    ) -> Result<(B::Pipeline, String), RenderError> {
        let requested = self.session.shader_source().to_owned();
        match self.backend.build_pipeline(device, &requested) {
            Ok(pipeline) => {
                self.report_shader(ShaderOutcome::Compiled);
                Ok((pipeline, requested))
            }
            Err(error) if self.session.shader_override().is_some() => {
                self.report_shader(ShaderOutcome::Failed(diagnostic(error)));
                let fallback = self.session.effect().descriptor().shader_source;
                let pipeline = self.backend.build_pipeline(device, fallback)?;
                Ok((pipeline, fallback.to_owned()))
            }
            Err(error) => Err(error),
        }
    }

    fn replace_image(&mut self, image: Arc<RgbaImage>) -> Result<(), RenderError> {
        let limit = match self.gpu.as_ref() {
            Some(gpu) => self.backend.max_texture_dimension(&gpu.device),
            None => return Ok(()),
        };
        if let Err(error) = check_texture_limit(limit, &image) {
            tracing::warn!(%error, "keeping previous image");
            self.session.emit(SessionEvent::ImageError(error.to_string()));
            return Err(error);
        }

        self.set_phase(Phase::Rebuilding);
        if let Err(error) = self.swap_texture(&image) {
            tracing::error!(%error, "texture upload failed");
            self.release_gpu();
            self.error = Some(error.clone());
            self.set_phase(Phase::Error);
            return Err(error);
        }
        self.commit_image(image);
        self.finish_rebuild();
        Ok(())
    }

    /// Destroys the old texture, then creates the replacement.
    fn swap_texture(&mut self, image: &RgbaImage) -> Result<(), RenderError> {
        let Some(gpu) = self.gpu.as_mut() else {
            return Ok(());
        };
        gpu.bind_group = None;
        gpu.bound_generation = None;
        if let Some(old) = gpu.texture.take() {
            self.backend.release_texture(old);
        }
        let texture = self.backend.create_texture(&gpu.device, image)?;
        gpu.texture = Some(texture);
        gpu.texture_size = image.dimensions();
        gpu.texture_generation += 1;
        Ok(())
    }

    fn finish_rebuild(&mut self) {
        let outcome = self.rebuild_bindings();
        self.report_shader(outcome);
        self.refresh_geometry();
        self.set_phase(Phase::Ready);
        self.upload_uniforms();
        self.render();
    }

    /// Rebuilds the pipeline when its source or the texture changed, then
    /// rebinds. A failed compile keeps the live pipeline.
    fn rebuild_bindings(&mut self) -> ShaderOutcome {
        let requested = self.session.shader_source().to_owned();
        let Some(gpu) = self.gpu.as_mut() else {
            return ShaderOutcome::Unchanged;
        };
        let source_changed = gpu.pipeline_source.as_deref() != Some(requested.as_str());
        let texture_changed = gpu.bound_generation != Some(gpu.texture_generation);
        if !source_changed && !texture_changed {
            tracing::debug!("bindings up to date; skipping rebuild");
            return ShaderOutcome::Unchanged;
        }

        let outcome = match self.backend.build_pipeline(&gpu.device, &requested) {
            Ok(pipeline) => {
                gpu.bind_group = None;
                gpu.pipeline = Some(pipeline);
                gpu.pipeline_source = Some(requested);
                ShaderOutcome::Compiled
            }
            Err(error) => ShaderOutcome::Failed(diagnostic(error)),
        };
        if matches!(outcome, ShaderOutcome::Failed(_)) && !texture_changed {
            return outcome;
        }

        if let (Some(pipeline), Some(texture)) = (gpu.pipeline.as_ref(), gpu.texture.as_ref()) {
            gpu.bind_group = Some(self.backend.create_bind_group(
                &gpu.device,
                pipeline,
                &gpu.sampler,
                texture,
                &gpu.uniform_buffer,
            ));
            gpu.bound_generation = Some(gpu.texture_generation);
        }
        outcome
    }

    fn report_shader(&mut self, outcome: ShaderOutcome) {
        match outcome {
            ShaderOutcome::Unchanged | ShaderOutcome::Compiled => {
                if self.shader_error.take().is_some() {
                    self.session.emit(SessionEvent::ShaderError(None));
                }
            }
            ShaderOutcome::Failed(message) => {
                tracing::warn!(effect = %self.session.effect(), "shader build failed:\n{message}");
                self.shader_error = Some(message.clone());
                self.session.emit(SessionEvent::ShaderError(Some(message)));
            }
        }
    }

    /// Recomputes canvas geometry; reconfigures the surface if its size moved.
    fn refresh_geometry(&mut self) {
        let (Some(gpu), Some(container)) = (self.gpu.as_mut(), self.container) else {
            return;
        };
        let geometry =
            DisplayGeometry::compute(container.size, gpu.texture_size, container.scale_factor);
        if geometry.container != gpu.geometry.container {
            self.backend
                .configure_surface(&mut gpu.device, geometry.container);
        }
        gpu.geometry = geometry;
    }

    fn upload_uniforms(&mut self) {
        let Some(gpu) = self.gpu.as_ref() else {
            return;
        };
        let descriptor = self.session.effect().descriptor();
        match pack(
            descriptor,
            self.session.params(),
            gpu.texture_size,
            self.clock.seconds(),
        ) {
            Ok(block) => {
                self.backend
                    .write_uniforms(&gpu.device, &gpu.uniform_buffer, &block);
                self.uniforms = block;
            }
            Err(error) => {
                tracing::error!(effect = %descriptor.id, %error, "failed to pack uniforms");
            }
        }
    }

    /// Draws one frame; silently does nothing while resources are missing.
    fn render(&mut self) {
        if !matches!(self.phase, Phase::Ready | Phase::Rebuilding) {
            return;
        }
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        let (Some(pipeline), Some(bind_group)) = (gpu.pipeline.as_ref(), gpu.bind_group.as_ref())
        else {
            return;
        };
        if let Err(error) =
            self.backend
                .render(&mut gpu.device, pipeline, bind_group, gpu.geometry.viewport)
        {
            tracing::warn!(%error, "frame dropped");
        }
    }

    fn pump_images(&mut self) {
        let Some(loaded) = self.loader.as_mut().and_then(ImageLoader::try_take_latest) else {
            return;
        };
        if let Err(error) = self.apply_loaded(loaded) {
            tracing::debug!(%error, "image request not applied");
        }
    }

    fn apply_loaded(&mut self, loaded: LoadedImage) -> Result<(), RenderError> {
        match loaded.result {
            Ok(image) => {
                tracing::info!(source = %loaded.source, width = image.width(), height = image.height(), "image loaded");
                self.set_image(image)
            }
            Err(error) => {
                tracing::warn!(source = %loaded.source, %error, "keeping previous image");
                self.session.emit(SessionEvent::ImageError(error.to_string()));
                Err(error)
            }
        }
    }

    fn check_device(&mut self) {
        let Some(gpu) = self.gpu.as_ref() else {
            return;
        };
        let Some(loss) = self.backend.poll_device_lost(&gpu.device) else {
            return;
        };
        if loss.is_expected() {
            tracing::debug!(message = %loss.message, "device destroyed");
            return;
        }

        tracing::error!(reason = ?loss.reason, message = %loss.message, "GPU device lost; restarting session");
        self.release_gpu();
        self.set_phase(Phase::Uninitialized);
        if let Err(error) = self.try_initialize() {
            tracing::error!(%error, "failed to restart after device loss");
            self.error = Some(RenderError::from(loss));
        }
    }

    fn release_gpu(&mut self) {
        let Some(gpu) = self.gpu.take() else {
            return;
        };
        let GpuSession {
            device,
            sampler,
            uniform_buffer,
            texture,
            pipeline,
            bind_group,
            ..
        } = gpu;
        drop(bind_group);
        drop(pipeline);
        if let Some(texture) = texture {
            self.backend.release_texture(texture);
        }
        self.backend.release_uniform_buffer(uniform_buffer);
        drop(sampler);
        self.backend.release_device(device);
    }
}

impl<B: RenderBackend> Drop for Orchestrator<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn check_texture_limit(limit: u32, image: &RgbaImage) -> Result<(), RenderError> {
    let (width, height) = image.dimensions();
    if width > limit || height > limit {
        return Err(RenderError::TextureTooLarge {
            width,
            height,
            limit,
        });
    }
    Ok(())
}

fn diagnostic(error: RenderError) -> String {
    match error {
        RenderError::ShaderCompile { message } => message,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualTimeSource;
    use crate::compile::validate_fragment_shader;
    use crate::error::{DeviceLoss, DeviceLossReason};
    use crate::geometry::Viewport;
    use crate::loader::tests::png_bytes;
    use crate::types::SurfaceSize;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Acquire(SurfaceSize),
        Sampler,
        Texture { id: u32, size: (u32, u32) },
        UniformBuffer,
        Pipeline(u32),
        PipelineFailed,
        BindGroup { pipeline: u32, texture: u32 },
        WriteUniforms,
        Configure(SurfaceSize),
        Render {
            pipeline: u32,
            texture: u32,
            viewport: Viewport,
        },
        Capture(SurfaceSize),
        ReleaseTexture(u32),
        ReleaseUniformBuffer,
        ReleaseDevice,
    }

    struct FakeDevice;
    struct FakeBuffer;
    struct FakeTexture(u32);
    struct FakePipeline(u32);
    struct FakeBindGroup {
        pipeline: u32,
        texture: u32,
    }

    /// Records every call; fails where told to.
    struct FakeBackend {
        calls: Vec<Call>,
        next_id: u32,
        live_textures: Vec<u32>,
        peak_textures: usize,
        live_devices: usize,
        live_buffers: usize,
        texture_limit: u32,
        fail_acquire: Option<RenderError>,
        device_loss: Option<DeviceLoss>,
    }

    impl Default for FakeBackend {
        fn default() -> Self {
            Self {
                calls: Vec::new(),
                next_id: 0,
                live_textures: Vec::new(),
                peak_textures: 0,
                live_devices: 0,
                live_buffers: 0,
                texture_limit: 8192,
                fail_acquire: None,
                device_loss: None,
            }
        }
    }

    impl FakeBackend {
        fn id(&mut self) -> u32 {
            self.next_id += 1;
            self.next_id
        }
    }

    impl RenderBackend for FakeBackend {
        type Device = FakeDevice;
        type Sampler = ();
        type Texture = FakeTexture;
        type UniformBuffer = FakeBuffer;
        type Pipeline = FakePipeline;
        type BindGroup = FakeBindGroup;

        fn acquire(&mut self, size: SurfaceSize) -> Result<FakeDevice, RenderError> {
            self.calls.push(Call::Acquire(size));
            if let Some(error) = self.fail_acquire.clone() {
                return Err(error);
            }
            self.live_devices += 1;
            Ok(FakeDevice)
        }

        fn create_sampler(&mut self, _: &FakeDevice) {
            self.calls.push(Call::Sampler);
        }

        fn max_texture_dimension(&self, _: &FakeDevice) -> u32 {
            self.texture_limit
        }

        fn create_texture(
            &mut self,
            _: &FakeDevice,
            image: &RgbaImage,
        ) -> Result<FakeTexture, RenderError> {
            let id = self.id();
            self.calls.push(Call::Texture {
                id,
                size: image.dimensions(),
            });
            self.live_textures.push(id);
            self.peak_textures = self.peak_textures.max(self.live_textures.len());
            Ok(FakeTexture(id))
        }

        fn create_uniform_buffer(&mut self, _: &FakeDevice) -> FakeBuffer {
            self.calls.push(Call::UniformBuffer);
            self.live_buffers += 1;
            FakeBuffer
        }

        fn build_pipeline(
            &mut self,
            _: &FakeDevice,
            fragment_source: &str,
        ) -> Result<FakePipeline, RenderError> {
            if let Err(error) = validate_fragment_shader(fragment_source) {
                self.calls.push(Call::PipelineFailed);
                return Err(error);
            }
            let id = self.id();
            self.calls.push(Call::Pipeline(id));
            Ok(FakePipeline(id))
        }

        fn create_bind_group(
            &mut self,
            _: &FakeDevice,
            pipeline: &FakePipeline,
            _: &(),
            texture: &FakeTexture,
            _: &FakeBuffer,
        ) -> FakeBindGroup {
            self.calls.push(Call::BindGroup {
                pipeline: pipeline.0,
                texture: texture.0,
            });
            FakeBindGroup {
                pipeline: pipeline.0,
                texture: texture.0,
            }
        }

        fn write_uniforms(&mut self, _: &FakeDevice, _: &FakeBuffer, _: &UniformBlock) {
            self.calls.push(Call::WriteUniforms);
        }

        fn configure_surface(&mut self, _: &mut FakeDevice, size: SurfaceSize) {
            self.calls.push(Call::Configure(size));
        }

        fn render(
            &mut self,
            _: &mut FakeDevice,
            pipeline: &FakePipeline,
            bind_group: &FakeBindGroup,
            viewport: Viewport,
        ) -> Result<(), RenderError> {
            assert_eq!(pipeline.0, bind_group.pipeline, "bind group built for another pipeline");
            assert!(
                self.live_textures.contains(&bind_group.texture),
                "bind group references a released texture"
            );
            self.calls.push(Call::Render {
                pipeline: pipeline.0,
                texture: bind_group.texture,
                viewport,
            });
            Ok(())
        }

        fn capture(
            &mut self,
            _: &FakeDevice,
            _: &FakePipeline,
            _: &FakeBindGroup,
            size: SurfaceSize,
        ) -> Result<RgbaImage, RenderError> {
            self.calls.push(Call::Capture(size));
            Ok(RgbaImage::new(size.width, size.height))
        }

        fn poll_device_lost(&mut self, _: &FakeDevice) -> Option<DeviceLoss> {
            self.device_loss.take()
        }

        fn release_texture(&mut self, texture: FakeTexture) {
            self.calls.push(Call::ReleaseTexture(texture.0));
            self.live_textures.retain(|id| *id != texture.0);
        }

        fn release_uniform_buffer(&mut self, _: FakeBuffer) {
            self.calls.push(Call::ReleaseUniformBuffer);
            self.live_buffers -= 1;
        }

        fn release_device(&mut self, _: FakeDevice) {
            self.calls.push(Call::ReleaseDevice);
            self.live_devices -= 1;
        }
    }

    const NO_ENTRY_POINT: &str = "@fragment fn main() -> @location(0) vec4f { return vec4f(1.0); }";

    fn image(width: u32, height: u32) -> Arc<RgbaImage> {
        Arc::new(RgbaImage::new(width, height))
    }

    fn orchestrator(effect: EffectId) -> (Orchestrator<FakeBackend>, ManualTimeSource) {
        let time = ManualTimeSource::new(0.0);
        let clock = AnimationClock::new(Box::new(time.clone()));
        (Orchestrator::new(FakeBackend::default(), effect, clock), time)
    }

    fn ready(effect: EffectId) -> (Orchestrator<FakeBackend>, ManualTimeSource) {
        let (mut orchestrator, time) = orchestrator(effect);
        orchestrator.resize((800.0, 600.0), 1.0);
        orchestrator.set_image(image(1000, 500)).unwrap();
        assert_eq!(orchestrator.phase(), Phase::Ready);
        orchestrator.backend.calls.clear();
        (orchestrator, time)
    }

    fn pipeline_id(orchestrator: &Orchestrator<FakeBackend>) -> u32 {
        orchestrator
            .gpu
            .as_ref()
            .and_then(|gpu| gpu.pipeline.as_ref())
            .map(|pipeline| pipeline.0)
            .unwrap()
    }

    fn last_render(orchestrator: &Orchestrator<FakeBackend>) -> Call {
        orchestrator
            .backend
            .calls
            .iter()
            .rev()
            .find(|call| matches!(call, Call::Render { .. }))
            .cloned()
            .unwrap()
    }

    #[test]
    fn initialisation_follows_dependency_order() {
        let (mut orchestrator, _) = orchestrator(EffectId::Halftone);
        let events = orchestrator.subscribe();
        orchestrator.resize((800.0, 600.0), 1.0);
        orchestrator.set_image(image(1000, 500)).unwrap();

        assert_eq!(orchestrator.phase(), Phase::Ready);
        assert_eq!(
            orchestrator.backend.calls,
            vec![
                Call::Acquire(SurfaceSize::new(800, 600)),
                Call::Sampler,
                Call::Texture {
                    id: 1,
                    size: (1000, 500)
                },
                Call::UniformBuffer,
                Call::Pipeline(2),
                Call::BindGroup {
                    pipeline: 2,
                    texture: 1
                },
                Call::WriteUniforms,
                Call::Render {
                    pipeline: 2,
                    texture: 1,
                    viewport: Viewport {
                        x: 0.0,
                        y: 100.0,
                        width: 800.0,
                        height: 400.0,
                    },
                },
            ]
        );
        assert_eq!(
            events.try_iter().collect::<Vec<_>>(),
            vec![
                SessionEvent::ImageChanged {
                    width: 1000,
                    height: 500
                },
                SessionEvent::PhaseChanged(Phase::Initializing),
                SessionEvent::PhaseChanged(Phase::Ready),
            ]
        );
        assert_eq!(orchestrator.uniforms().texture_size(), (1000.0, 500.0));
    }

    #[test]
    fn waits_for_both_image_and_surface() {
        let (mut orchestrator, _) = orchestrator(EffectId::Pixelate);
        orchestrator.set_image(image(10, 10)).unwrap();
        orchestrator.tick();
        assert_eq!(orchestrator.phase(), Phase::Uninitialized);
        assert!(orchestrator.backend.calls.is_empty());

        orchestrator.resize((100.0, 100.0), 1.0);
        assert_eq!(orchestrator.phase(), Phase::Ready);
    }

    #[test]
    fn acquisition_failure_enters_error_without_leaks() {
        let (mut orchestrator, _) = orchestrator(EffectId::Pixelate);
        orchestrator.backend.fail_acquire = Some(RenderError::NoAdapter("none".into()));
        orchestrator.resize((100.0, 100.0), 1.0);
        let error = orchestrator.set_image(image(10, 10)).unwrap_err();

        assert_eq!(error, RenderError::NoAdapter("none".into()));
        assert_eq!(orchestrator.phase(), Phase::Error);
        assert_eq!(orchestrator.error(), Some(&error));
        assert_eq!(orchestrator.backend.live_devices, 0);

        // fatal errors are not retried
        orchestrator.backend.fail_acquire = None;
        orchestrator.set_image(image(10, 10)).unwrap();
        assert_eq!(orchestrator.phase(), Phase::Error);
    }

    #[test]
    fn partial_initialisation_is_rolled_back_and_recoverable() {
        let (mut orchestrator, _) = orchestrator(EffectId::Pixelate);
        orchestrator.backend.texture_limit = 512;
        orchestrator.resize((100.0, 100.0), 1.0);
        let error = orchestrator.set_image(image(1000, 500)).unwrap_err();

        assert!(matches!(error, RenderError::TextureTooLarge { limit: 512, .. }));
        assert_eq!(orchestrator.phase(), Phase::Error);
        assert_eq!(orchestrator.backend.live_devices, 0);
        assert!(orchestrator.backend.live_textures.is_empty());
        assert_eq!(orchestrator.backend.calls.last(), Some(&Call::ReleaseDevice));

        orchestrator.set_image(image(400, 200)).unwrap();
        assert_eq!(orchestrator.phase(), Phase::Ready);
        assert_eq!(orchestrator.error(), None);
    }

    #[test]
    fn compile_failure_keeps_the_previous_pipeline() {
        let (mut orchestrator, _) = ready(EffectId::Halftone);
        let events = orchestrator.subscribe();
        let before = pipeline_id(&orchestrator);

        orchestrator.set_shader_override(Some(NO_ENTRY_POINT.into()));
        assert_eq!(orchestrator.phase(), Phase::Ready);
        assert_eq!(pipeline_id(&orchestrator), before);
        let message = orchestrator.shader_error().unwrap().to_string();
        assert!(message.contains("fragmentMain"), "{message}");
        assert!(events
            .try_iter()
            .any(|event| event == SessionEvent::ShaderError(Some(message.clone()))));

        orchestrator.backend.calls.clear();
        orchestrator
            .set_param("angle", ParamValue::Number(10.0))
            .unwrap();
        assert_eq!(orchestrator.backend.calls[0], Call::WriteUniforms);
        let Call::Render { pipeline, .. } = last_render(&orchestrator) else {
            unreachable!()
        };
        assert_eq!(pipeline, before);
        assert_eq!(orchestrator.uniforms().slots()[3], 10.0);

        orchestrator.set_shader_override(None);
        assert_eq!(orchestrator.shader_error(), None);
        assert_eq!(pipeline_id(&orchestrator), before);
        assert!(events
            .try_iter()
            .any(|event| event == SessionEvent::ShaderError(None)));
    }

    #[test]
    fn valid_override_replaces_the_pipeline_and_survives_effect_switch() {
        let (mut orchestrator, _) = ready(EffectId::Pixelate);
        let before = pipeline_id(&orchestrator);
        let custom = EffectId::Dither.descriptor().shader_source.to_string();

        orchestrator.set_shader_override(Some(custom.clone()));
        let overridden = pipeline_id(&orchestrator);
        assert_ne!(overridden, before);
        assert_eq!(orchestrator.session().shader_source(), custom);

        orchestrator.select_effect(EffectId::Glass);
        assert_eq!(pipeline_id(&orchestrator), overridden);
        assert_eq!(orchestrator.session().params(), &EffectId::Glass.descriptor().defaults());
    }

    #[test]
    fn rebuild_with_unchanged_inputs_is_idempotent() {
        let (mut orchestrator, _) = ready(EffectId::Dither);
        orchestrator.rebuild();
        let first = *orchestrator.uniforms();
        let pipeline = pipeline_id(&orchestrator);

        orchestrator.rebuild();
        assert!(orchestrator.uniforms().bits_eq(&first));
        assert_eq!(pipeline_id(&orchestrator), pipeline);
        assert!(!orchestrator
            .backend
            .calls
            .iter()
            .any(|call| matches!(call, Call::Pipeline(_) | Call::BindGroup { .. })));
    }

    #[test]
    fn animated_rebuild_keeps_elapsed_time() {
        let (mut orchestrator, time) = ready(EffectId::Noise);
        let descriptor = EffectId::Noise.descriptor();
        time.advance(1.5);
        orchestrator.tick();
        assert_eq!(orchestrator.uniforms().time(descriptor), Some(1.5));

        orchestrator.rebuild();
        let first = *orchestrator.uniforms();
        let pipeline = pipeline_id(&orchestrator);
        orchestrator.backend.calls.clear();

        orchestrator.rebuild();
        assert!(orchestrator.uniforms().bits_eq(&first));
        assert_eq!(orchestrator.uniforms().time(descriptor), Some(1.5));
        assert_eq!(pipeline_id(&orchestrator), pipeline);
        assert!(!orchestrator
            .backend
            .calls
            .iter()
            .any(|call| matches!(call, Call::Pipeline(_) | Call::BindGroup { .. })));
    }

    #[test]
    fn effect_switch_resets_parameters_and_rebuilds() {
        let (mut orchestrator, _) = ready(EffectId::Pixelate);
        orchestrator
            .set_param("pixelSize", ParamValue::Number(20.0))
            .unwrap();
        let before = pipeline_id(&orchestrator);

        orchestrator.select_effect(EffectId::Dither);
        assert_eq!(orchestrator.session().effect(), EffectId::Dither);
        assert_eq!(
            orchestrator.session().params(),
            &EffectId::Dither.descriptor().defaults()
        );
        assert_ne!(pipeline_id(&orchestrator), before);
        assert_eq!(&orchestrator.uniforms().slots()[2..6], &[3.0, 4.0, 4.0, 1.0]);
        assert_eq!(orchestrator.phase(), Phase::Ready);
    }

    #[test]
    fn parameter_edits_only_repack_and_render() {
        let (mut orchestrator, _) = ready(EffectId::Glass);
        orchestrator
            .set_param_from_str("chromaticAberration", "off")
            .unwrap();
        orchestrator.step_param("glassScale", 1).unwrap();

        assert_eq!(orchestrator.backend.calls.len(), 4);
        assert!(orchestrator
            .backend
            .calls
            .iter()
            .all(|call| matches!(call, Call::WriteUniforms | Call::Render { .. })));
        assert_eq!(orchestrator.uniforms().slots()[3], 25.0);
        assert_eq!(orchestrator.uniforms().slots()[5], 0.0);
    }

    #[test]
    fn image_replacement_mid_animation_keeps_time() {
        let (mut orchestrator, time) = ready(EffectId::Fragments);
        let descriptor = EffectId::Fragments.descriptor();
        time.advance(2.0);
        orchestrator.tick();
        assert_eq!(orchestrator.uniforms().time(descriptor), Some(2.0));
        let old_pipeline = pipeline_id(&orchestrator);

        orchestrator.backend.calls.clear();
        orchestrator.set_image(image(300, 600)).unwrap();
        let calls = orchestrator.backend.calls.clone();
        let released = calls
            .iter()
            .position(|call| *call == Call::ReleaseTexture(1))
            .unwrap();
        let created = calls
            .iter()
            .position(|call| matches!(call, Call::Texture { size: (300, 600), .. }))
            .unwrap();
        assert!(released < created);
        assert_eq!(orchestrator.backend.peak_textures, 1);
        assert_ne!(pipeline_id(&orchestrator), old_pipeline);

        time.advance(0.5);
        orchestrator.tick();
        let Call::Render { texture, .. } = last_render(&orchestrator) else {
            unreachable!()
        };
        let Call::Texture { id, .. } = &calls[created] else {
            unreachable!()
        };
        assert_eq!(texture, *id);
        assert_eq!(orchestrator.uniforms().time(descriptor), Some(2.5));
        assert_eq!(orchestrator.uniforms().texture_size(), (300.0, 600.0));
    }

    #[test]
    fn oversized_replacement_keeps_the_previous_image() {
        let (mut orchestrator, _) = ready(EffectId::Mirror);
        let events = orchestrator.subscribe();
        orchestrator.backend.texture_limit = 2048;

        let error = orchestrator.set_image(image(4096, 16)).unwrap_err();
        assert!(matches!(error, RenderError::TextureTooLarge { .. }));
        assert_eq!(orchestrator.phase(), Phase::Ready);
        assert_eq!(orchestrator.image_size(), Some((1000, 500)));
        assert!(orchestrator.backend.calls.is_empty());
        assert!(matches!(
            events.try_iter().next(),
            Some(SessionEvent::ImageError(_))
        ));
    }

    #[test]
    fn decode_failure_keeps_the_previous_image() {
        let (mut orchestrator, _) = ready(EffectId::Pixelate);
        orchestrator.load_image(ImageSource::Bytes(vec![0, 1, 2, 3]));
        let error = orchestrator
            .wait_for_image(Duration::from_secs(10))
            .unwrap_err();

        assert!(matches!(error, RenderError::ImageDecode { .. }));
        assert_eq!(orchestrator.phase(), Phase::Ready);
        assert_eq!(orchestrator.image_size(), Some((1000, 500)));
    }

    #[test]
    fn decoded_images_are_applied() {
        let (mut orchestrator, _) = ready(EffectId::Pixelate);
        orchestrator.load_image(ImageSource::Bytes(png_bytes(4, 2)));
        orchestrator.wait_for_image(Duration::from_secs(10)).unwrap();
        assert_eq!(orchestrator.image_size(), Some((4, 2)));
        assert_eq!(orchestrator.uniforms().texture_size(), (4.0, 2.0));
    }

    #[test]
    fn teardown_releases_everything_and_ignores_late_work() {
        let (mut orchestrator, time) = ready(EffectId::Noise);
        orchestrator.load_image(ImageSource::Bytes(png_bytes(2, 2)));
        orchestrator.teardown();

        assert_eq!(orchestrator.phase(), Phase::TornDown);
        assert_eq!(orchestrator.backend.live_devices, 0);
        assert_eq!(orchestrator.backend.live_buffers, 0);
        assert!(orchestrator.backend.live_textures.is_empty());

        orchestrator.backend.calls.clear();
        time.advance(1.0);
        orchestrator.tick();
        orchestrator.set_image(image(8, 8)).unwrap();
        orchestrator.select_effect(EffectId::Glass);
        assert!(orchestrator.backend.calls.is_empty());
        assert_eq!(orchestrator.animation_time(), 0.0);
        assert!(matches!(orchestrator.export_frame(), Err(RenderError::NotReady)));
        assert_eq!(orchestrator.load_image(ImageSource::Bytes(Vec::new())), None);
    }

    #[test]
    fn unexpected_device_loss_restarts_the_session() {
        let (mut orchestrator, _) = ready(EffectId::Halftone);
        let events = orchestrator.subscribe();
        orchestrator.backend.device_loss = Some(DeviceLoss {
            reason: DeviceLossReason::Unknown,
            message: "driver reset".into(),
        });
        orchestrator.tick();

        let calls = &orchestrator.backend.calls;
        let released = calls
            .iter()
            .position(|call| *call == Call::ReleaseDevice)
            .unwrap();
        assert!(matches!(calls[released + 1], Call::Acquire(_)));
        assert_eq!(orchestrator.phase(), Phase::Ready);
        assert_eq!(orchestrator.backend.live_devices, 1);
        assert!(events
            .try_iter()
            .any(|event| event == SessionEvent::PhaseChanged(Phase::Uninitialized)));
    }

    #[test]
    fn failed_restart_reports_the_device_loss() {
        let (mut orchestrator, _) = ready(EffectId::Halftone);
        orchestrator.backend.device_loss = Some(DeviceLoss {
            reason: DeviceLossReason::Unknown,
            message: "driver reset".into(),
        });
        orchestrator.backend.fail_acquire = Some(RenderError::NoAdapter("gone".into()));
        orchestrator.tick();

        assert_eq!(orchestrator.phase(), Phase::Error);
        assert_eq!(orchestrator.backend.live_devices, 0);
        let error = orchestrator.error().unwrap();
        assert_eq!(
            error,
            &RenderError::DeviceLost {
                reason: DeviceLossReason::Unknown,
                message: "driver reset".into(),
            }
        );
        assert!(error.is_fatal());
    }

    #[test]
    fn intentional_device_destruction_is_ignored() {
        let (mut orchestrator, _) = ready(EffectId::Halftone);
        orchestrator.backend.device_loss = Some(DeviceLoss {
            reason: DeviceLossReason::Destroyed,
            message: String::new(),
        });
        orchestrator.tick();
        assert!(!orchestrator
            .backend
            .calls
            .iter()
            .any(|call| *call == Call::ReleaseDevice));
        assert_eq!(orchestrator.phase(), Phase::Ready);
    }

    #[test]
    fn export_needs_ready_and_captures_canvas_size() {
        let (mut fresh, _) = orchestrator(EffectId::Pixelate);
        assert!(matches!(fresh.export_frame(), Err(RenderError::NotReady)));

        let (mut orchestrator, _) = ready(EffectId::Pixelate);
        let frame = orchestrator.export_frame().unwrap();
        assert_eq!(frame.dimensions(), (800, 400));
        assert_eq!(
            orchestrator.backend.calls,
            vec![Call::Capture(SurfaceSize::new(800, 400))]
        );
    }

    #[test]
    fn resize_reconfigures_surface_and_viewport() {
        let (mut orchestrator, _) = ready(EffectId::Pixelate);
        orchestrator.resize((400.0, 800.0), 2.0);

        assert_eq!(
            orchestrator.backend.calls[0],
            Call::Configure(SurfaceSize::new(800, 1600))
        );
        let Call::Render { viewport, .. } = last_render(&orchestrator) else {
            unreachable!()
        };
        assert_eq!(
            viewport,
            Viewport {
                x: 0.0,
                y: 600.0,
                width: 800.0,
                height: 400.0,
            }
        );
    }

    #[test]
    fn broken_override_at_startup_falls_back_to_catalog_shader() {
        let (mut orchestrator, _) = orchestrator(EffectId::Glass);
        orchestrator.set_shader_override(Some(NO_ENTRY_POINT.into()));
        orchestrator.resize((100.0, 100.0), 1.0);
        orchestrator.set_image(image(10, 10)).unwrap();

        assert_eq!(orchestrator.phase(), Phase::Ready);
        assert!(orchestrator.shader_error().is_some());
        assert_eq!(
            orchestrator.backend.calls[4..6],
            [Call::PipelineFailed, Call::Pipeline(2)]
        );
    }

    #[test]
    fn ticks_without_a_session_do_nothing() {
        let (mut orchestrator, time) = orchestrator(EffectId::Noise);
        time.advance(1.0);
        orchestrator.tick();
        assert!(orchestrator.backend.calls.is_empty());
        assert_eq!(orchestrator.animation_time(), 1.0);
    }
}
