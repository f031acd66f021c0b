//! wgpu implementation of the render backend.
//!
//! - `context` acquires the adapter, device and surface, and forwards device
//!   loss into a channel the orchestrator polls.
//! - `pipeline` owns the fixed bind group layout (sampler@0, texture@1,
//!   uniforms@2) and compiles the quad plus an effect fragment into a
//!   render pipeline.
//! - `texture` uploads decoded images and creates the shared sampler.
//! - `frame` draws one pass into the surface, or offscreen for export.
//! - `backend` ties these together behind [`crate::RenderBackend`].

mod backend;
mod context;
mod frame;
mod pipeline;
mod texture;

pub use backend::{WgpuBackend, WgpuDevice};
pub use pipeline::ShaderPipeline;
pub use texture::SourceTexture;
