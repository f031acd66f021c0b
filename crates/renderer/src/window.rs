use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::Receiver;
use effects::EffectId;
use image::{Rgba, RgbaImage};
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::keyboard::ModifiersState;
use winit::window::{Window, WindowBuilder};

use tracing::{error, info, warn};

use crate::clock::AnimationClock;
use crate::controls::{action_for, Action, ParamCursor};
use crate::export::{save_png, snapshot_path};
use crate::gpu::WgpuBackend;
use crate::orchestrator::Orchestrator;
use crate::session::{Phase, SessionEvent};
use crate::types::{ImageSource, RendererConfig};

const IMAGE_TIMEOUT: Duration = Duration::from_secs(30);
const PLACEHOLDER_SIZE: (u32, u32) = (1024, 768);

type WindowOrchestrator = Orchestrator<WgpuBackend<Arc<Window>>>;

/// Event-loop side state of the preview window.
struct WindowDriver {
    window: Arc<Window>,
    orchestrator: WindowOrchestrator,
    events: Receiver<SessionEvent>,
    config: RendererConfig,
    cursor: ParamCursor,
    modifiers: ModifiersState,
    failure: Option<anyhow::Error>,
}

/// What the session ended with, for the caller to persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub effect: EffectId,
}

/// Opens the preview window and runs until it closes.
///
/// With [`RendererConfig::export`] set, the window stays hidden and the
/// driver exits after writing a single frame.
pub fn run(config: RendererConfig) -> Result<RunSummary> {
    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let (width, height) = config.window_size;
    let mut builder = WindowBuilder::new()
        .with_title(config.title.clone())
        .with_inner_size(LogicalSize::new(width as f64, height as f64));
    if config.export.is_some() {
        builder = builder.with_visible(false);
    }
    let window = Arc::new(
        builder
            .build(&event_loop)
            .map_err(|err| anyhow!("failed to create window: {err}"))?,
    );

    let backend = WgpuBackend::new(window.clone(), config.power);
    let mut orchestrator = Orchestrator::new(backend, config.effect, AnimationClock::system());
    let events = orchestrator.subscribe();

    for (key, value) in &config.params {
        if let Err(err) = orchestrator.set_param_from_str(key, value) {
            warn!(param = %key, "ignoring parameter override: {err}");
        }
    }
    if let Some(path) = &config.shader_override {
        match read_shader(path) {
            Ok(source) => orchestrator.set_shader_override(Some(source)),
            Err(err) => warn!("{err:#}"),
        }
    }

    let mut driver = WindowDriver {
        window,
        orchestrator,
        events,
        config,
        cursor: ParamCursor::default(),
        modifiers: ModifiersState::default(),
        failure: None,
    };
    driver.load_initial_image()?;
    driver.sync_container();
    info!(
        effect = %driver.orchestrator.session().effect(),
        "1-7 select effect, tab/shift+tab pick parameter, up/down adjust, \
         r reload shader, backspace clear shader, s snapshot, esc quit"
    );

    event_loop
        .run(|event, elwt| driver.handle(event, elwt))
        .map_err(|err| anyhow!("window event loop error: {err}"))?;

    let effect = driver.orchestrator.session().effect();
    driver.orchestrator.teardown();
    match driver.failure.take() {
        Some(err) => Err(err),
        None => Ok(RunSummary { effect }),
    }
}

impl WindowDriver {
    fn load_initial_image(&mut self) -> Result<()> {
        let Some(path) = self.config.image.clone() else {
            info!("no image given; using a generated placeholder");
            self.orchestrator
                .set_image(Arc::new(placeholder_image()))
                .context("failed to initialise renderer")?;
            return Ok(());
        };
        self.orchestrator.load_image(ImageSource::Path(path.clone()));
        self.orchestrator
            .wait_for_image(IMAGE_TIMEOUT)
            .with_context(|| format!("failed to load {}", path.display()))
    }

    fn sync_container(&mut self) {
        let scale = self.window.scale_factor();
        let logical: LogicalSize<f32> = self.window.inner_size().to_logical(scale);
        self.orchestrator
            .resize((logical.width, logical.height), scale);
    }

    fn handle(&mut self, event: Event<()>, elwt: &EventLoopWindowTarget<()>) {
        match event {
            Event::WindowEvent { window_id, event } if window_id == self.window.id() => {
                self.handle_window_event(event, elwt)
            }
            Event::AboutToWait => {
                self.drain_events();
                if self.config.export.is_some() {
                    self.export_and_exit(elwt);
                } else {
                    self.window.request_redraw();
                    elwt.set_control_flow(ControlFlow::Wait);
                }
            }
            _ => {}
        }
    }

    fn handle_window_event(&mut self, event: WindowEvent, elwt: &EventLoopWindowTarget<()>) {
        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                self.orchestrator.teardown();
                elwt.exit();
            }
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                self.sync_container();
            }
            WindowEvent::DroppedFile(path) => {
                info!(path = %path.display(), "loading dropped image");
                self.orchestrator.load_image(ImageSource::Path(path));
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                self.modifiers = modifiers.state();
            }
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(event, elwt),
            WindowEvent::RedrawRequested => {
                self.orchestrator.tick();
                if self.orchestrator.phase() == Phase::Error {
                    if let Some(err) = self.orchestrator.error().filter(|err| err.is_fatal()) {
                        error!("renderer failed: {err}");
                        self.failure = Some(anyhow!("renderer failed: {err}"));
                        elwt.exit();
                    }
                }
            }
            _ => {}
        }
    }

    fn handle_key(&mut self, event: KeyEvent, elwt: &EventLoopWindowTarget<()>) {
        if event.state != ElementState::Pressed {
            return;
        }
        let Some(action) = action_for(&event.logical_key, self.modifiers.shift_key()) else {
            return;
        };
        // Holding a key repeats steps only.
        if event.repeat && !matches!(action, Action::Step(_)) {
            return;
        }

        let descriptor = self.orchestrator.session().effect().descriptor();
        match action {
            Action::SelectEffect(effect) => {
                if effect != descriptor.id {
                    self.orchestrator.select_effect(effect);
                    self.cursor.reset();
                }
                self.announce_param();
            }
            Action::NextParam => {
                self.cursor.advance(descriptor, 1);
                self.announce_param();
            }
            Action::PreviousParam => {
                self.cursor.advance(descriptor, -1);
                self.announce_param();
            }
            Action::Step(direction) => {
                let Some(key) = self.cursor.key(descriptor) else {
                    return;
                };
                if let Err(err) = self.orchestrator.step_param(key, direction) {
                    warn!(param = key, "{err}");
                }
            }
            Action::ReloadShader => self.reload_shader(),
            Action::ClearShader => {
                if self.orchestrator.session().shader_override().is_some() {
                    info!("shader override cleared");
                }
                self.orchestrator.set_shader_override(None);
            }
            Action::Snapshot => self.snapshot(),
            Action::Close => {
                self.orchestrator.teardown();
                elwt.exit();
            }
        }
    }

    fn announce_param(&self) {
        let session = self.orchestrator.session();
        let descriptor = session.effect().descriptor();
        let Some(def) = self.cursor.key(descriptor).and_then(|key| descriptor.param(key)) else {
            info!(effect = descriptor.name, "effect has no parameters");
            return;
        };
        if let Some(value) = session.params().get(def.key) {
            info!(
                effect = descriptor.name,
                param = def.label,
                "{}",
                def.describe(value)
            );
        }
    }

    fn reload_shader(&mut self) {
        let Some(path) = self.config.shader_override.clone() else {
            warn!("no shader file to reload; pass --shader");
            return;
        };
        match read_shader(&path) {
            Ok(source) => {
                info!(path = %path.display(), "reloading shader override");
                self.orchestrator.set_shader_override(Some(source));
            }
            Err(err) => warn!("{err:#}"),
        }
    }

    fn snapshot(&mut self) {
        let path = snapshot_path(&self.config.export_dir);
        let result = self
            .orchestrator
            .export_frame()
            .map_err(anyhow::Error::from)
            .and_then(|frame| save_png(&frame, &path));
        if let Err(err) = result {
            warn!("snapshot failed: {err:#}");
        }
    }

    fn export_and_exit(&mut self, elwt: &EventLoopWindowTarget<()>) {
        let Some(target) = self.config.export.clone() else {
            return;
        };
        match self.orchestrator.phase() {
            Phase::Ready => {
                self.orchestrator.tick();
                let result = self
                    .orchestrator
                    .export_frame()
                    .map_err(anyhow::Error::from)
                    .and_then(|frame| save_png(&frame, &target.path));
                if let Err(err) = result {
                    self.failure = Some(err.context("headless export failed"));
                }
                elwt.exit();
            }
            Phase::Error => {
                let reason = self
                    .orchestrator
                    .error()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "unknown error".to_string());
                self.failure = Some(anyhow!("renderer failed: {reason}"));
                elwt.exit();
            }
            Phase::TornDown => elwt.exit(),
            _ => {
                self.sync_container();
                elwt.set_control_flow(ControlFlow::Poll);
            }
        }
    }

    /// Logs session notifications the console is the only surface for.
    fn drain_events(&mut self) {
        for event in self.events.try_iter() {
            match event {
                SessionEvent::ShaderError(Some(message)) => {
                    error!("shader failed to compile; keeping previous pipeline\n{message}");
                }
                SessionEvent::ShaderError(None) => {}
                SessionEvent::ImageError(message) => {
                    warn!("image not replaced: {message}");
                }
                SessionEvent::ImageChanged { width, height } => {
                    info!(width, height, "image loaded");
                }
                SessionEvent::EffectChanged(effect) => {
                    let descriptor = effect.descriptor();
                    info!(effect = %effect, "{}: {}", descriptor.name, descriptor.description);
                }
                SessionEvent::PhaseChanged(Phase::Error) => {
                    if let Some(err) = self.orchestrator.error() {
                        error!("renderer entered error state: {err}");
                    }
                }
                SessionEvent::ParameterChanged { .. }
                | SessionEvent::ShaderOverrideChanged { .. }
                | SessionEvent::PhaseChanged(_) => {}
            }
        }
    }
}

fn read_shader(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("failed to read shader override {}", path.display()))
}

/// Diagonal gradient with a coarse checker, shown when no image is given.
fn placeholder_image() -> RgbaImage {
    let (width, height) = PLACEHOLDER_SIZE;
    RgbaImage::from_fn(width, height, |x, y| {
        let u = x as f32 / (width - 1) as f32;
        let v = y as f32 / (height - 1) as f32;
        let checker = if (x / 64 + y / 64) % 2 == 0 { 1.0 } else { 0.85 };
        let r = (40.0 + 200.0 * u) * checker;
        let g = (60.0 + 150.0 * v) * checker;
        let b = (220.0 - 160.0 * u * v) * checker;
        Rgba([r as u8, g as u8, b as u8, 255])
    })
}
