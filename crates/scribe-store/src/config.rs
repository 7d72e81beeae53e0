//! Store configuration.
//!
//! Everything the store needs arrives through this struct, constructed in
//! code or loaded from an explicit TOML path; nothing is read from
//! ambient process state. The limits section feeds the chunker directly.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use scribe_core::chunk::ChunkLimits;

/// Longest possible chunk envelope header: prefix + uuid + positions +
/// suffix. The margin must at least cover this.
const MIN_MARGIN: usize = 96;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScribeConfig {
    pub limits: LimitsSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsSection {
    /// Platform's hard maximum body size per post, in bytes.
    pub max_post_bytes: usize,
    /// Safety buffer reserved for chunk envelope markers.
    pub margin: usize,
}

impl Default for LimitsSection {
    fn default() -> Self {
        let defaults = ChunkLimits::default();
        Self {
            max_post_bytes: defaults.max_post_bytes,
            margin: defaults.margin,
        }
    }
}

impl ScribeConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file at {}", path.display()))?;
        let config: Self = toml::from_str(&contents).context("failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize and write the config file, creating parent dirs as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create config directory {}", dir.display()))?;
        }
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write config file at {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.limits.margin < MIN_MARGIN {
            bail!(
                "limits.margin must be at least {MIN_MARGIN} bytes to cover the chunk envelope \
                 (got {})",
                self.limits.margin
            );
        }
        if self.limits.margin >= self.limits.max_post_bytes {
            bail!(
                "limits.margin ({}) must be smaller than limits.max_post_bytes ({})",
                self.limits.margin,
                self.limits.max_post_bytes
            );
        }
        Ok(())
    }

    pub fn chunk_limits(&self) -> ChunkLimits {
        ChunkLimits::new(self.limits.max_post_bytes, self.limits.margin)
    }
}
