//! Static catalog of WGSL image effects.
//!
//! Every effect is a single fragment shader sampling one source image. The
//! shaders share a binding contract the renderer relies on:
//!
//! - `@group(0) @binding(0)`: filtering sampler
//! - `@group(0) @binding(1)`: `texture_2d<f32>` holding the source image
//! - `@group(0) @binding(2)`: uniform struct starting with
//!   `textureSize: vec2f`, followed by one `f32` per parameter in declared
//!   order, followed by `time: f32` for animated effects
//!
//! The fragment entry point is always `fragmentMain` and receives the
//! interpolated texture coordinate at `@location(0)`.

mod catalog;
mod params;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use catalog::CATALOG;
pub use params::{ParamDef, ParamError, ParamKind, ParamSpec, ParamValue, ParameterValues};

/// Name of the fragment entry point every effect shader must export.
pub const FRAGMENT_ENTRY: &str = "fragmentMain";

/// Largest parameter count across the catalog.
pub const MAX_PARAMS: usize = max_param_count(CATALOG);

const fn max_param_count(catalog: &[EffectDescriptor]) -> usize {
    let mut max = 0;
    let mut i = 0;
    while i < catalog.len() {
        if catalog[i].params.len() > max {
            max = catalog[i].params.len();
        }
        i += 1;
    }
    max
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum EffectId {
    Pixelate,
    Dither,
    #[default]
    Halftone,
    Glass,
    Fragments,
    Mirror,
    Noise,
}

impl EffectId {
    /// Catalog order; also the order of the numeric selection keys.
    pub const ALL: [EffectId; 7] = [
        EffectId::Pixelate,
        EffectId::Dither,
        EffectId::Halftone,
        EffectId::Glass,
        EffectId::Fragments,
        EffectId::Mirror,
        EffectId::Noise,
    ];

    pub fn key(self) -> &'static str {
        match self {
            EffectId::Pixelate => "pixelate",
            EffectId::Dither => "dither",
            EffectId::Halftone => "halftone",
            EffectId::Glass => "glass",
            EffectId::Fragments => "fragments",
            EffectId::Mirror => "mirror",
            EffectId::Noise => "noise",
        }
    }

    pub fn from_key(key: &str) -> Result<Self, ParamError> {
        let wanted = key.trim();
        Self::ALL
            .into_iter()
            .find(|id| id.key().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ParamError::UnknownEffect(wanted.to_string()))
    }

    pub fn descriptor(self) -> &'static EffectDescriptor {
        &CATALOG[self as usize]
    }

    /// Zero-based position in [`EffectId::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for EffectId {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s)
    }
}

/// Immutable description of one catalog effect.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EffectDescriptor {
    pub id: EffectId,
    pub name: &'static str,
    pub description: &'static str,
    /// Ordered; the order defines the uniform field layout.
    pub params: &'static [ParamDef],
    #[serde(skip)]
    pub shader_source: &'static str,
    /// Animated effects receive elapsed seconds after their parameters.
    pub animated: bool,
}

impl EffectDescriptor {
    pub fn param(&self, key: &str) -> Option<&'static ParamDef> {
        self.params.iter().find(|def| def.key == key)
    }

    pub fn defaults(&self) -> ParameterValues {
        ParameterValues::defaults_for(self)
    }
}

pub fn descriptors() -> impl Iterator<Item = &'static EffectDescriptor> {
    CATALOG.iter()
}
