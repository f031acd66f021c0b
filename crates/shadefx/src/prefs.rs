//! Preferences persisted between runs.
//!
//! Only the last selected effect and the snapshot directory are stored;
//! images, parameters and shader overrides always start fresh.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use effects::EffectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prefs {
    /// Kept as the raw key so an unknown value can be reported and replaced
    /// instead of failing the whole file.
    pub effect: Option<String>,
    pub export_dir: Option<PathBuf>,
}

impl Prefs {
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read preferences at {}", path.display()))?;
            let prefs: Self = toml::from_str(&contents)
                .with_context(|| format!("failed to parse preferences at {}", path.display()))?;
            Ok(prefs)
        } else {
            Ok(Self::default())
        }
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("preferences path has no parent: {}", path.display()))?;
        fs::create_dir_all(dir).with_context(|| {
            format!(
                "failed to prepare directory for preferences at {}",
                dir.display()
            )
        })?;
        let serialized =
            toml::to_string_pretty(self).context("failed to serialize preferences to TOML")?;
        fs::write(path, serialized)
            .with_context(|| format!("failed to write preferences to {}", path.display()))?;
        Ok(())
    }

    /// Stored effect, or the default when missing or unrecognised.
    pub fn effect(&self) -> EffectId {
        let Some(key) = self.effect.as_deref() else {
            return EffectId::default();
        };
        match EffectId::from_key(key) {
            Ok(effect) => effect,
            Err(err) => {
                tracing::warn!(
                    "{err} in preferences; falling back to {}",
                    EffectId::default()
                );
                EffectId::default()
            }
        }
    }

    pub fn set_effect(&mut self, effect: EffectId) {
        self.effect = Some(effect.key().to_string());
    }
}
