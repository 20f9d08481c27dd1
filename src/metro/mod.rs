// Copyright: Metro Conquest organisers
// Removal of the attribution is not allowed

//! The playable metro network: stations merged with the mission sheet, the
//! adjacency graph teams move along, and the station state that is synced to
//! storage during a game.

pub mod graph;
pub mod station;

#[cfg(test)]
mod test_graph_construction;

pub use graph::{Graph, Neighbours};
pub use station::Station;

use crate::config::GameConfig;
use crate::feed::{LineRecord, LocationRecord, MissionInfo, TransitFeed, decode_records};
use crate::local_data::LocalData;
use crate::models::StationRow;
use crate::store::{GameStore, StoreError};
use ahash::{AHashMap, AHashSet};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("branch station {station_id} on line '{line}' has no base station on that line")]
    MissingBranchBase { line: String, station_id: String },
    #[error("line '{line}' has no stations")]
    EmptyLine { line: String },
    #[error("station #{index} on line '{line}' has an empty id or name")]
    MalformedStation { line: String, index: usize },
    #[error("{dataset} source unavailable and no local fallback is present")]
    NoFallback { dataset: &'static str },
}

#[derive(Debug, Default)]
pub struct MetroSystem {
    pub graph: Graph,
    pub station_info: AHashMap<String, MissionInfo>,
    pub station_location: AHashMap<String, String>,
    stations: AHashMap<String, Station>,
    deleted: AHashSet<String>,
    is_loaded: bool,
}

impl MetroSystem {
    /// Fetches every configured source (falling back to local copies when a
    /// source refuses or fails), then builds stations and the pruned graph.
    pub async fn build<F: TransitFeed>(
        config: &GameConfig,
        local: &mut LocalData,
        feed: &F,
    ) -> Result<Self, BuildError> {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut metro = MetroSystem {
            station_info: local.station_info.clone(),
            deleted: config.deletion_set(),
            ..Default::default()
        };

        for url in &config.sources.location_urls {
            metro.load_locations(url, config, local, feed).await?;
        }

        for url in &config.sources.line_urls {
            metro.load_lines(url, config, local, feed, &mut rng).await?;
        }

        metro.is_loaded = true;

        info!(
            "Metro system loaded. {} stations, {} with locations",
            metro.stations.len(),
            metro.station_location.len()
        );

        Ok(metro)
    }

    async fn load_locations<F: TransitFeed>(
        &mut self,
        url: &str,
        config: &GameConfig,
        local: &mut LocalData,
        feed: &F,
    ) -> Result<(), BuildError> {
        if !self.station_location.is_empty() {
            return Ok(());
        }

        let fetched = match feed.fetch(url).await {
            Ok(payload) => decode_records::<LocationRecord>(payload),
            Err(e) => Err(e),
        };

        let records = match fetched {
            Ok(records) => {
                if config.sources.cache_remote_data {
                    if let Err(e) = local.cache_locations(&records) {
                        warn!("Could not cache station locations: {}", e);
                    }
                }
                records
            }
            Err(e) => {
                error!("Location source {} unavailable: {}", url, e);
                local
                    .fallback_locations
                    .clone()
                    .ok_or(BuildError::NoFallback {
                        dataset: "station location",
                    })?
            }
        };

        self.station_location = records
            .into_iter()
            .map(|record| (record.station_name.zh_tw, record.station_position.geo_hash))
            .collect();

        Ok(())
    }

    async fn load_lines<F: TransitFeed, R: Rng>(
        &mut self,
        url: &str,
        config: &GameConfig,
        local: &mut LocalData,
        feed: &F,
        rng: &mut R,
    ) -> Result<(), BuildError> {
        if self.is_loaded {
            return Ok(());
        }

        let fetched = match feed.fetch(url).await {
            Ok(payload) => decode_records::<LineRecord>(payload),
            Err(e) => Err(e),
        };

        let lines = match fetched {
            Ok(lines) => {
                if config.sources.cache_remote_data {
                    if let Err(e) = local.cache_lines(&lines) {
                        warn!("Could not cache line data: {}", e);
                    }
                }
                lines
            }
            Err(e) => {
                error!("Line source {} unavailable: {}", url, e);
                // the fallback copy holds every line, later sources are skipped
                self.is_loaded = true;
                local.fallback_lines.clone().ok_or(BuildError::NoFallback {
                    dataset: "line",
                })?
            }
        };

        self.ingest_lines(&lines, config, rng)
    }

    /// Registers the stations of `lines`, links them and prunes deleted ones.
    pub(crate) fn ingest_lines<R: Rng>(
        &mut self,
        lines: &[LineRecord],
        config: &GameConfig,
        rng: &mut R,
    ) -> Result<(), BuildError> {
        for line in lines {
            graph::validate_line(line)?;
        }

        // a transfer station keeps the record of the last line listing it
        for line in lines {
            for record in &line.stations {
                let name = &record.station_name.zh_tw;
                let info = self
                    .station_info
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| default_mission(config));
                let geohash = self.station_location.get(name).cloned();

                let station = Station::from_record(record, &info, geohash, config, rng);
                self.stations.insert(name.clone(), station);
            }
        }

        for line in lines {
            graph::link_line(&mut self.graph, line, &self.deleted)?;
        }

        self.delete_stations();
        Ok(())
    }

    fn delete_stations(&mut self) {
        graph::prune(&mut self.graph, &self.deleted);
        for name in &self.deleted {
            self.stations.remove(name);
        }
    }

    pub fn find_station(&self, name: &str) -> Option<&Station> {
        self.stations.get(name)
    }

    pub fn find_station_mut(&mut self, name: &str) -> Option<&mut Station> {
        self.stations.get_mut(name)
    }

    /// Stations a team standing at `name` may move to next, or `None` for an
    /// unknown station.
    #[doc(alias = "move")]
    pub fn reachable(&self, name: &str) -> Option<&Neighbours> {
        self.graph.get(name)
    }

    pub fn stations(&self) -> impl Iterator<Item = &Station> {
        self.stations.values()
    }

    pub fn station_count(&self) -> usize {
        self.stations.len()
    }

    pub fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    /// The graph as a pretty-printed json document, name -> neighbour list.
    pub fn graph_snapshot(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.graph)
    }

    pub fn station_rows(&self) -> Vec<StationRow> {
        self.graph
            .keys()
            .filter_map(|name| self.find_station(name))
            .map(StationRow::from)
            .collect()
    }

    pub async fn save_stations<S: GameStore>(&self, store: &S) -> Result<usize, StoreError> {
        let rows = self.station_rows();
        store.upsert_stations(&rows).await?;
        Ok(rows.len())
    }

    /// Restores ownership and visibility from storage. Rows for stations that
    /// no longer exist in this build are skipped.
    pub async fn load_stations<S: GameStore>(&mut self, store: &S) -> Result<usize, StoreError> {
        let mut restored = 0;

        for row in store.load_stations().await? {
            let Some(station) = self.stations.get_mut(&row.name) else {
                debug!("Skipping stored station {} with no live counterpart", row.name);
                continue;
            };

            station.team = row.owner_team;
            station.hidden = row.hidden;
            station.is_special = row.is_special;
            restored += 1;
        }

        Ok(restored)
    }
}

fn default_mission(config: &GameConfig) -> MissionInfo {
    let defaults = &config.mission_defaults;
    MissionInfo {
        mission: defaults.mission.clone(),
        exit: defaults.exit.clone(),
        difficult: defaults.difficult,
        tips: defaults.tips.clone(),
    }
}
