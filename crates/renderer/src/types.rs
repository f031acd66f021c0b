use std::path::PathBuf;

use effects::EffectId;

/// Size of a drawable surface in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Clamps both dimensions to at least one pixel.
    pub fn non_zero(self) -> Self {
        Self::new(self.width.max(1), self.height.max(1))
    }
}

/// Adapter power preference forwarded to wgpu.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GpuPowerPreference {
    #[default]
    Low,
    High,
}

/// Where a replacement image comes from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl ImageSource {
    pub fn describe(&self) -> String {
        match self {
            ImageSource::Path(path) => path.display().to_string(),
            ImageSource::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
        }
    }
}

/// Where a headless run writes its single exported frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTarget {
    pub path: PathBuf,
}

/// Configuration handed to the window driver by the CLI.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Initial inner window size in logical pixels.
    pub window_size: (u32, u32),
    pub title: String,
    pub effect: EffectId,
    /// `key=value` overrides applied on top of the effect defaults.
    pub params: Vec<(String, String)>,
    /// File whose WGSL replaces the catalog shader; reloadable at runtime.
    pub shader_override: Option<PathBuf>,
    pub image: Option<PathBuf>,
    /// Directory for interactive snapshots.
    pub export_dir: PathBuf,
    /// When set, render one frame into this file and exit.
    pub export: Option<ExportTarget>,
    pub power: GpuPowerPreference,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            window_size: (1280, 800),
            title: "shadefx".to_string(),
            effect: EffectId::default(),
            params: Vec::new(),
            shader_override: None,
            image: None,
            export_dir: PathBuf::from("."),
            export: None,
            power: GpuPowerPreference::default(),
        }
    }
}
