//! Configuration for the level bracket balancer.
//!
//! Loaded from `bracket_config.json` with support for an environment variable
//! override. The engine itself only ever sees the resolved [`BracketConfig`].

use std::{
    collections::HashSet,
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::faction::Faction;

pub const BUILTIN_BRACKET_CONFIG: &str = include_str!("data/bracket_config.json");

/// Raw bracket bounds and share as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeConfig {
    pub lower: u8,
    pub upper: u8,
    pub pct: u32,
}

impl RangeConfig {
    pub const fn new(lower: u8, upper: u8, pct: u32) -> Self {
        Self { lower, upper, pct }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BracketConfig {
    pub enabled: bool,
    pub min_level: u8,
    pub max_level: u8,
    pub num_ranges: usize,
    pub alliance_ranges: Vec<RangeConfig>,
    pub horde_ranges: Vec<RangeConfig>,
    pub check_frequency_secs: u32,
    pub flagged_check_frequency_secs: u32,
    pub guild_refresh_frequency_secs: u32,
    pub dynamic_distribution: bool,
    pub real_player_weight: f64,
    pub sync_factions: bool,
    pub ignore_friend_listed: bool,
    pub ignore_guild_with_real_player: bool,
    /// Entries attempted per drain, 0 for unlimited.
    pub flagged_process_limit: usize,
    /// Unsafe drain attempts before an entry is dropped, 0 for unlimited.
    pub flagged_max_attempts: u32,
    /// Comma separated character names that are never managed.
    pub excluded_names: String,
    pub debug_full: bool,
    pub debug_lite: bool,
    /// RNG seed for level rolls, 0 draws from entropy.
    pub seed: u64,
}

fn default_ranges() -> Vec<RangeConfig> {
    vec![
        RangeConfig::new(1, 10, 14),
        RangeConfig::new(11, 20, 12),
        RangeConfig::new(21, 30, 12),
        RangeConfig::new(31, 40, 12),
        RangeConfig::new(41, 50, 12),
        RangeConfig::new(51, 60, 12),
        RangeConfig::new(61, 70, 12),
        RangeConfig::new(71, 80, 14),
    ]
}

impl Default for BracketConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_level: 1,
            max_level: 80,
            num_ranges: 8,
            alliance_ranges: default_ranges(),
            horde_ranges: default_ranges(),
            check_frequency_secs: 300,
            flagged_check_frequency_secs: 15,
            guild_refresh_frequency_secs: 600,
            dynamic_distribution: false,
            real_player_weight: 1.0,
            sync_factions: false,
            ignore_friend_listed: true,
            ignore_guild_with_real_player: true,
            flagged_process_limit: 5,
            flagged_max_attempts: 0,
            excluded_names: String::new(),
            debug_full: false,
            debug_lite: false,
            seed: 0,
        }
    }
}

impl BracketConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_BRACKET_CONFIG)
                .expect("builtin bracket config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, BracketConfigError> {
        let contents =
            fs::read_to_string(path).map_err(|source| BracketConfigError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        let config = BracketConfig::from_json_str(&contents)?;
        Ok(config)
    }

    pub fn ranges(&self, faction: Faction) -> &[RangeConfig] {
        match faction {
            Faction::Alliance => &self.alliance_ranges,
            Faction::Horde => &self.horde_ranges,
        }
    }

    /// Same bracket layout for both factions.
    pub fn with_ranges(mut self, ranges: Vec<RangeConfig>) -> Self {
        self.num_ranges = ranges.len();
        self.alliance_ranges = ranges.clone();
        self.horde_ranges = ranges;
        self
    }

    /// Lower-cased, trimmed names from `excluded_names`.
    pub fn excluded_name_set(&self) -> HashSet<String> {
        self.excluded_names
            .split(',')
            .map(|name| name.trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .collect()
    }

    pub fn verbosity(&self) -> LogVerbosity {
        LogVerbosity {
            full: self.debug_full,
            lite: self.debug_lite,
        }
    }

    pub fn check_interval_ms(&self) -> u64 {
        u64::from(self.check_frequency_secs) * 1000
    }

    pub fn flagged_interval_ms(&self) -> u64 {
        u64::from(self.flagged_check_frequency_secs) * 1000
    }

    pub fn guild_refresh_interval_ms(&self) -> u64 {
        u64::from(self.guild_refresh_frequency_secs) * 1000
    }

    /// Structural checks that must hold before any table is built.
    ///
    /// A synced-faction bound mismatch is a contract violation and is never
    /// repaired here.
    pub fn validate(&self) -> Result<(), BracketConfigError> {
        for faction in Faction::ALL {
            let found = self.ranges(faction).len();
            if found != self.num_ranges {
                return Err(BracketConfigError::RangeCountMismatch {
                    faction,
                    expected: self.num_ranges,
                    found,
                });
            }
        }
        if self.sync_factions {
            let pairs = self.alliance_ranges.iter().zip(&self.horde_ranges);
            for (index, (alliance, horde)) in pairs.enumerate() {
                if (alliance.lower, alliance.upper) != (horde.lower, horde.upper) {
                    return Err(BracketConfigError::SyncedBoundsMismatch {
                        index,
                        alliance: (alliance.lower, alliance.upper),
                        horde: (horde.lower, horde.upper),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Independent verbosity switches for decision logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogVerbosity {
    pub full: bool,
    pub lite: bool,
}

impl LogVerbosity {
    /// Summary lines: load summary, per-bracket counts, drain summaries.
    pub fn summaries(&self) -> bool {
        self.full || self.lite
    }

    /// Per-agent lines: skips, moves, flags.
    pub fn per_agent(&self) -> bool {
        self.full
    }
}

#[derive(Debug, Error)]
pub enum BracketConfigError {
    #[error("failed to parse bracket config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read bracket config from {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{faction} declares {found} ranges but num_ranges is {expected}")]
    RangeCountMismatch {
        faction: Faction,
        expected: usize,
        found: usize,
    },
    #[error(
        "synced factions require identical bounds; range {index} is {alliance:?} for alliance and {horde:?} for horde"
    )]
    SyncedBoundsMismatch {
        index: usize,
        alliance: (u8, u8),
        horde: (u8, u8),
    },
}

impl BracketConfigError {
    /// Errors that must stop the process rather than fall back to defaults.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BracketConfigError::SyncedBoundsMismatch { .. })
    }
}

#[derive(Resource, Debug, Clone)]
pub struct BracketConfigHandle(pub Arc<BracketConfig>);

impl BracketConfigHandle {
    pub fn new(config: Arc<BracketConfig>) -> Self {
        Self(config)
    }

    pub fn get(&self) -> Arc<BracketConfig> {
        Arc::clone(&self.0)
    }

    pub fn config(&self) -> &BracketConfig {
        &self.0
    }

    pub fn replace(&mut self, config: Arc<BracketConfig>) {
        self.0 = config;
    }
}

#[derive(Resource, Debug, Clone)]
pub struct BracketConfigMetadata {
    path: Option<PathBuf>,
}

impl BracketConfigMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

/// Resolve the config from `BRACKET_CONFIG_PATH`, the crate data file, or the
/// builtin copy, in that order.
pub fn load_bracket_config_from_env() -> (Arc<BracketConfig>, BracketConfigMetadata) {
    let override_path = env::var("BRACKET_CONFIG_PATH").ok().map(PathBuf::from);
    let default_path =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src/data/bracket_config.json");

    let candidates: Vec<PathBuf> = match override_path {
        Some(ref path) => vec![path.clone()],
        None => vec![default_path],
    };

    for path in candidates {
        match BracketConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!(
                    target: "level_brackets::config",
                    path = %path.display(),
                    "bracket_config.loaded=file"
                );
                return (Arc::new(config), BracketConfigMetadata::new(Some(path)));
            }
            Err(err) => {
                tracing::warn!(
                    target: "level_brackets::config",
                    path = %path.display(),
                    error = %err,
                    "bracket_config.load_failed"
                );
            }
        }
    }

    let config = BracketConfig::builtin();
    tracing::info!(
        target: "level_brackets::config",
        "bracket_config.loaded=builtin"
    );
    (config, BracketConfigMetadata::new(None))
}
