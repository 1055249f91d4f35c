use crate::defaults;
use crate::error::{ChunkwaveError, Result};
use crate::pipeline::types::Resolution;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineSection,
    pub resolution: ResolutionConfig,
    pub transform: TransformConfig,
    pub daemon: DaemonConfig,
}

/// Worker pool and emitter configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSection {
    pub workers: usize,
    pub poll_interval_ms: u64,
}

/// Resolution name → chunk count table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResolutionConfig {
    pub fine: usize,
    pub medium: usize,
    pub coarse: usize,
    /// Resolution used when a request does not name one.
    pub default: Resolution,
}

/// Transform selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransformConfig {
    pub kind: TransformKind,
    pub max_points: usize,
}

/// Which transform the workers apply
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    #[default]
    Waveform,
    Spectrum,
}

impl std::str::FromStr for TransformKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "waveform" => Ok(TransformKind::Waveform),
            "spectrum" => Ok(TransformKind::Spectrum),
            other => Err(format!(
                "unknown transform '{other}' (expected waveform or spectrum)"
            )),
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DaemonConfig {
    pub socket: Option<PathBuf>,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            workers: defaults::WORKER_COUNT,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
        }
    }
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            fine: defaults::FINE_CHUNKS,
            medium: defaults::MEDIUM_CHUNKS,
            coarse: defaults::COARSE_CHUNKS,
            default: Resolution::Medium,
        }
    }
}

impl ResolutionConfig {
    /// Chunk count for a resolution.
    pub fn chunk_count(&self, resolution: Resolution) -> usize {
        match resolution {
            Resolution::Fine => self.fine,
            Resolution::Medium => self.medium,
            Resolution::Coarse => self.coarse,
        }
    }
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            kind: TransformKind::Waveform,
            max_points: defaults::MAX_POINTS_PER_CHUNK,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values. The result is validated.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Only a missing file yields defaults; invalid TOML or values are errors.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e)
                if e.downcast_ref::<std::io::Error>()
                    .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound) =>
            {
                Ok(Self::default())
            }
            Err(e) => Err(e.context(format!("Failed to load config from {}", path.display()))),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - CHUNKWAVE_WORKERS → pipeline.workers
    /// - CHUNKWAVE_RESOLUTION → resolution.default
    /// - CHUNKWAVE_TRANSFORM → transform.kind
    ///
    /// Empty or unparseable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(workers) = std::env::var("CHUNKWAVE_WORKERS")
            && let Ok(workers) = workers.trim().parse::<usize>()
        {
            self.pipeline.workers = workers;
        }

        if let Ok(resolution) = std::env::var("CHUNKWAVE_RESOLUTION")
            && !resolution.is_empty()
        {
            self.resolution.default = Resolution::parse_or_medium(&resolution);
        }

        if let Ok(kind) = std::env::var("CHUNKWAVE_TRANSFORM")
            && let Ok(kind) = kind.parse::<TransformKind>()
        {
            self.transform.kind = kind;
        }

        self
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("pipeline.workers", self.pipeline.workers as u64),
            ("pipeline.poll_interval_ms", self.pipeline.poll_interval_ms),
            ("resolution.fine", self.resolution.fine as u64),
            ("resolution.medium", self.resolution.medium as u64),
            ("resolution.coarse", self.resolution.coarse as u64),
            ("transform.max_points", self.transform.max_points as u64),
        ];

        for (key, value) in positive {
            if value == 0 {
                return Err(ChunkwaveError::ConfigInvalidValue {
                    key: key.to_string(),
                    message: "must be positive".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/chunkwave/config.toml on Linux
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chunkwave").join("config.toml"))
    }
}
