// Copyright: Metro Conquest organisers
// Removal of the attribution is not allowed

use crate::feed::{LineRecord, LocationRecord, MissionInfo};
use ahash::AHashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const STATION_INFO_FILE: &str = "station_info.json";
pub const LINES_FALLBACK_FILE: &str = "api_data.json";
pub const LOCATIONS_FALLBACK_FILE: &str = "station_location.json";

#[derive(Error, Debug)]
pub enum LocalDataError {
    #[error("I/O error accessing '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed data file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Everything read from the data directory: the mission sheet and the cached
/// copies of the remote datasets.
#[derive(Debug, Clone, Default)]
pub struct LocalData {
    pub station_info: AHashMap<String, MissionInfo>,
    pub fallback_lines: Option<Vec<LineRecord>>,
    pub fallback_locations: Option<Vec<LocationRecord>>,
    dir: Option<PathBuf>,
}

impl LocalData {
    pub fn new(
        station_info: AHashMap<String, MissionInfo>,
        fallback_lines: Option<Vec<LineRecord>>,
        fallback_locations: Option<Vec<LocationRecord>>,
    ) -> Self {
        Self {
            station_info,
            fallback_lines,
            fallback_locations,
            dir: None,
        }
    }

    pub fn load_from_dir(dir: &Path) -> Result<Self, LocalDataError> {
        let station_info = match read_json_file(&dir.join(STATION_INFO_FILE))? {
            Some(info) => info,
            None => {
                warn!(
                    "No {} in {}, every station gets the default mission",
                    STATION_INFO_FILE,
                    dir.display()
                );
                AHashMap::new()
            }
        };

        let fallback_lines = read_json_file(&dir.join(LINES_FALLBACK_FILE))?;
        let fallback_locations = read_json_file(&dir.join(LOCATIONS_FALLBACK_FILE))?;

        info!(
            "Loaded local data from {}: {} mission entries",
            dir.display(),
            station_info.len()
        );

        Ok(Self {
            station_info,
            fallback_lines,
            fallback_locations,
            dir: Some(dir.to_path_buf()),
        })
    }

    pub fn cache_lines(&mut self, fresh: &[LineRecord]) -> Result<(), LocalDataError> {
        let merged = merge_records(self.fallback_lines.take().unwrap_or_default(), fresh);
        if let Some(dir) = &self.dir {
            write_json_file(&dir.join(LINES_FALLBACK_FILE), &merged)?;
        }
        self.fallback_lines = Some(merged);
        Ok(())
    }

    pub fn cache_locations(&mut self, fresh: &[LocationRecord]) -> Result<(), LocalDataError> {
        let merged = merge_records(self.fallback_locations.take().unwrap_or_default(), fresh);
        if let Some(dir) = &self.dir {
            write_json_file(&dir.join(LOCATIONS_FALLBACK_FILE), &merged)?;
        }
        self.fallback_locations = Some(merged);
        Ok(())
    }
}

/// Appends every fresh record not already cached, keeping cached order.
fn merge_records<T: Clone + PartialEq>(mut cached: Vec<T>, fresh: &[T]) -> Vec<T> {
    for record in fresh {
        if !cached.contains(record) {
            cached.push(record.clone());
        }
    }
    cached
}

fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, LocalDataError> {
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(path).map_err(|source| LocalDataError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_reader(BufReader::new(file))
        .map(Some)
        .map_err(|source| LocalDataError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), LocalDataError> {
    let temp_path = path.with_extension("json.tmp");
    let io_err = |source| LocalDataError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(&temp_path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|source| LocalDataError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(io_err)?;

    std::fs::rename(&temp_path, path).map_err(io_err)
}
