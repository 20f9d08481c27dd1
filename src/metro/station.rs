// Copyright: Metro Conquest organisers
// Removal of the attribution is not allowed

use crate::config::GameConfig;
use crate::feed::{MissionInfo, StationRecord};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One metro stop merged with its mission sheet entry.
///
/// `name` is the canonical key everywhere (graph, ownership, storage), not
/// `id`: transfer stations share a name across lines but carry one id per line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Station {
    pub sequence: i32,
    pub id: String,
    pub name: String,
    pub english_name: String,
    /// cumulative distance from the start of the line, km
    pub distance: f64,
    pub difficult: i32,
    pub exit: String,
    pub mission: String,
    pub tips: String,
    pub is_special: bool,
    pub is_prison: bool,
    pub point: i32,
    pub geohash: Option<String>,
    pub hidden: bool,
    /// owning team
    pub team: Option<String>,
}

impl Station {
    /// Builds the station and rolls its special and hidden flags.
    ///
    /// The hidden roll is only drawn when the station is neither special nor a
    /// prison, so a seeded generator replays the same sequence of draws.
    pub fn from_record<R: Rng>(
        record: &StationRecord,
        info: &MissionInfo,
        geohash: Option<String>,
        config: &GameConfig,
        rng: &mut R,
    ) -> Self {
        let is_special = rng.random_bool(config.special_probability);
        let is_prison = info.mission == config.prison_marker;
        let hidden = is_special || is_prison || rng.random_bool(config.hidden_probability);

        Station {
            sequence: record.sequence,
            id: record.station_id.clone(),
            name: record.station_name.zh_tw.clone(),
            english_name: record.station_name.en.clone(),
            distance: record.cumulative_distance,
            difficult: info.difficult,
            exit: info.exit.clone(),
            mission: info.mission.clone(),
            tips: info.tips.clone(),
            is_special,
            is_prison,
            point: config.points_for(info.difficult),
            geohash,
            hidden,
            team: None,
        }
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
