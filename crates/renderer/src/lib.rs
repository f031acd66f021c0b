//! Renderer crate for shadefx.
//!
//! Applies one catalog effect (or a user-supplied WGSL fragment shader) to a
//! source image with `wgpu`, and keeps the result on screen while the user
//! switches effects, edits parameters, swaps images and resizes the window.
//! The overall flow is:
//!
//! ```text
//!   CLI / shadefx
//!          │ RendererConfig
//!          ▼
//!   window::run ──▶ WindowDriver ──▶ winit event loop ──▶ Orchestrator::tick()
//!                        │                                   │
//!                        └─ keys, drops, resizes ─▶ Orchestrator ─▶ RenderBackend
//!                                                            │
//!                                              pack() ─▶ uniform buffer ─▶ GPU
//! ```
//!
//! [`Orchestrator`] owns every GPU resource and drives the
//! `Uninitialized → Initializing → Ready ⇄ Rebuilding` state machine. It talks
//! to the GPU only through [`RenderBackend`]; [`WgpuBackend`] is the real
//! implementation, and the orchestrator tests substitute a recording fake.

mod backend;
mod clock;
mod compile;
mod controls;
mod error;
mod export;
mod geometry;
mod gpu;
mod loader;
mod orchestrator;
mod session;
mod types;
mod uniforms;
mod window;

pub use backend::RenderBackend;
pub use clock::{AnimationClock, BoxedTimeSource, ManualTimeSource, SystemTimeSource, TimeSource};
pub use compile::{validate_fragment_shader, validate_wgsl};
pub use controls::{action_for, Action, ParamCursor};
pub use error::{DeviceLoss, DeviceLossReason, RenderError};
pub use export::{save_png, snapshot_file_name, snapshot_path};
pub use geometry::{fit_to_container, DisplayGeometry, Viewport};
pub use gpu::{ShaderPipeline, SourceTexture, WgpuBackend, WgpuDevice};
pub use loader::{decode, ImageLoader, LoadedImage, Ticket};
pub use orchestrator::Orchestrator;
pub use session::{Phase, SessionEvent, SessionState};
pub use types::{
    ExportTarget, GpuPowerPreference, ImageSource, RendererConfig, SurfaceSize,
};
pub use uniforms::{pack, unpack, UniformBlock, UNIFORM_BYTES, UNIFORM_SLOTS};
pub use window::{run, RunSummary};
