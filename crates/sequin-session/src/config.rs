//! Configuration for attack sessions.
//!
//! [`SequinConfig`] holds the settings a session starts from: where cases
//! live, the attack defaults handed to the solver and the replay/highlight
//! timing. It is stored in `~/.sequin/config.toml`; every section is
//! `#[serde(default)]` so a partial file only overrides what it names.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::highlight::HighlightAnimation;
use crate::history::AttackMode;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SequinConfig {
    /// Case files and history.
    pub core: CoreConfig,

    /// Attack defaults handed to the solver.
    pub attack: AttackConfig,

    /// Replay and highlight timing.
    pub playback: PlaybackConfig,
}

/// Case file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Default directory for opening case files.
    pub default_case_dir: Option<PathBuf>,

    /// Recently opened cases, most recent first.
    pub recent_files: Vec<PathBuf>,

    /// Maximum entries in the recent files list.
    pub max_recent: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            default_case_dir: None,
            recent_files: Vec::new(),
            max_recent: 10,
        }
    }
}

/// Attack defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackConfig {
    /// Maximum number of lines in one attack sequence.
    pub budget: usize,

    /// Generator ramp bound (fraction of the reference setpoint).
    pub ramp_bound: f64,

    /// Inner solver name passed through to the engine.
    pub inner_solver: String,

    /// History that metrics read from when a session opens.
    pub default_mode: AttackMode,

    /// Fixed seed for the random strategy; entropy when unset.
    pub random_seed: Option<u64>,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            budget: 3,
            ramp_bound: 0.2,
            inner_solver: "gurobi".to_string(),
            default_mode: AttackMode::Sequential,
            random_seed: None,
        }
    }
}

/// Replay and highlight timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Delay between replay steps in milliseconds.
    pub replay_delay_ms: u64,

    /// Length of one highlight animation tick in milliseconds.
    pub highlight_tick_ms: u64,

    /// Number of times the highlight animation repeats.
    pub highlight_repeat: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            replay_delay_ms: 1000,
            highlight_tick_ms: 100,
            highlight_repeat: 2,
        }
    }
}

impl PlaybackConfig {
    pub fn replay_delay(&self) -> Duration {
        Duration::from_millis(self.replay_delay_ms)
    }

    /// Highlight animation with the configured tick and repeat count.
    pub fn highlight_animation(&self) -> HighlightAnimation {
        HighlightAnimation {
            tick: Duration::from_millis(self.highlight_tick_ms),
            repeat: self.highlight_repeat,
            ..HighlightAnimation::default()
        }
    }
}

impl SequinConfig {
    /// Get the default config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".sequin"))
    }

    /// Get the default config file path.
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config.toml"))
    }

    /// Load configuration from the default location.
    ///
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()
            .ok_or_else(|| Error::Config("could not determine config directory".to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Add a file to the recent files list.
    pub fn add_recent_file(&mut self, path: PathBuf) {
        self.core.recent_files.retain(|p| p != &path);
        self.core.recent_files.insert(0, path);
        self.core.recent_files.truncate(self.core.max_recent);
    }

    /// Reject values the session cannot start from.
    pub fn validate(&self) -> Result<()> {
        if !self.attack.ramp_bound.is_finite() || self.attack.ramp_bound < 0.0 {
            return Err(Error::Config(format!(
                "attack.ramp_bound must be finite and non-negative, got {}",
                self.attack.ramp_bound
            )));
        }
        if self.playback.highlight_tick_ms == 0 {
            return Err(Error::Config(
                "playback.highlight_tick_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
