// Copyright: Metro Conquest organisers
// Removal of the attribution is not allowed

use ahash::AHashSet;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub static TDX_LINES_TAIPEI: &str =
    "https://tdx.transportdata.tw/api/basic/v2/Rail/Metro/StationOfLine/TRTC?$format=JSON";
pub static TDX_LINES_NEW_TAIPEI: &str =
    "https://tdx.transportdata.tw/api/basic/v2/Rail/Metro/StationOfLine/NTMC?$format=JSON";
pub static TDX_LOCATIONS_TAIPEI: &str =
    "https://tdx.transportdata.tw/api/basic/v2/Rail/Metro/Station/TRTC?$format=JSON";
pub static TDX_LOCATIONS_NEW_TAIPEI: &str =
    "https://tdx.transportdata.tw/api/basic/v2/Rail/Metro/Station/NTMC?$format=JSON";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{field} must be within [0, 1], got {value}")]
    Probability { field: &'static str, value: f64 },
    #[error("start_station must not be empty")]
    EmptyStartStation,
}

/// Remote endpoints, tried in order. Each list mirrors one dataset kind.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    pub location_urls: Vec<String>,
    pub line_urls: Vec<String>,
    pub timeout_secs: u64,
    /// Merge successful remote responses back into the fallback files.
    pub cache_remote_data: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            location_urls: vec![
                TDX_LOCATIONS_TAIPEI.to_string(),
                TDX_LOCATIONS_NEW_TAIPEI.to_string(),
            ],
            line_urls: vec![
                TDX_LINES_TAIPEI.to_string(),
                TDX_LINES_NEW_TAIPEI.to_string(),
            ],
            timeout_secs: 30,
            cache_remote_data: false,
        }
    }
}

/// Values applied to stations that have no entry in the mission sheet.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MissionDefaults {
    pub mission: String,
    pub exit: String,
    pub difficult: i32,
    pub tips: String,
}

impl Default for MissionDefaults {
    fn default() -> Self {
        Self {
            mission: "無".to_string(),
            exit: "不限".to_string(),
            difficult: 0,
            tips: "無".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GameConfig {
    pub start_station: String,
    pub delete_stations: Vec<String>,
    pub special_probability: f64,
    pub hidden_probability: f64,
    /// difficulty level -> points awarded
    pub station_points: BTreeMap<i32, i32>,
    pub prison_marker: String,
    pub mission_defaults: MissionDefaults,
    pub sources: SourceConfig,
    pub data_dir: PathBuf,
    pub seed: Option<u64>,
    pub save_interval_secs: u64,
    /// team names hidden from public listings
    pub reserved_teams: Vec<String>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            start_station: "台北車站".to_string(),
            delete_stations: vec![],
            special_probability: 0.1,
            hidden_probability: 0.1,
            station_points: BTreeMap::from([(0, 0), (1, 10), (2, 20), (3, 30)]),
            prison_marker: "監獄".to_string(),
            mission_defaults: MissionDefaults::default(),
            sources: SourceConfig::default(),
            data_dir: PathBuf::from("data"),
            seed: None,
            save_interval_secs: 60,
            reserved_teams: vec!["admins".to_string()],
        }
    }
}

impl GameConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: GameConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("special_probability", self.special_probability),
            ("hidden_probability", self.hidden_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Probability { field, value });
            }
        }

        if self.start_station.trim().is_empty() {
            return Err(ConfigError::EmptyStartStation);
        }

        Ok(())
    }

    pub fn deletion_set(&self) -> AHashSet<String> {
        self.delete_stations.iter().cloned().collect()
    }

    pub fn points_for(&self, difficult: i32) -> i32 {
        self.station_points.get(&difficult).copied().unwrap_or(0)
    }
}
