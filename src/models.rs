// Copyright: Metro Conquest organisers
// Removal of the attribution is not allowed

use crate::metro::Station;
use crate::team::{MissionState, Team};
use diesel::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Version written into every json column envelope.
pub const FIELD_SCHEMA_VERSION: u16 = 1;

#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::game::stations)]
pub struct StationRow {
    pub name: String,
    pub is_special: bool,
    pub hidden: bool,
    pub owner_team: Option<String>,
}

impl From<&Station> for StationRow {
    fn from(station: &Station) -> Self {
        StationRow {
            name: station.name.clone(),
            is_special: station.is_special,
            hidden: station.hidden,
            owner_team: station.team.clone(),
        }
    }
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::game::teams)]
pub struct TeamRow {
    pub name: String,
    pub players: Value,
    pub admins: Value,
    pub point: i32,
    pub start_location_defined: bool,
    pub location: String,
    pub target_location: String,
    pub point_log: Value,
    pub event_log: Value,
    pub step: i32,
    pub mission_state: String,
    pub current_card: Option<String>,
    pub imprisoned_time: i32,
    pub is_imprisoned: bool,
    pub stations: Value,
    pub owned_stations: Value,
    pub combos: Value,
    pub choice: Value,
}

/// Json column layout: `{"version": 1, "items": ...}`.
#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    version: u16,
    items: T,
}

#[derive(Error, Debug)]
pub enum RowError {
    #[error("team {team}: field {field} is not valid: {source}")]
    Field {
        team: String,
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("team {team}: field {field} was written by schema version {version}")]
    UnsupportedVersion {
        team: String,
        field: &'static str,
        version: u16,
    },
    #[error("team {team}: {source}")]
    MissionState {
        team: String,
        #[source]
        source: crate::team::UnknownMissionState,
    },
}

fn wrap<T: Serialize>(team: &str, field: &'static str, items: &T) -> Result<Value, RowError> {
    serde_json::to_value(Envelope {
        version: FIELD_SCHEMA_VERSION,
        items,
    })
    .map_err(|source| RowError::Field {
        team: team.to_string(),
        field,
        source,
    })
}

fn unwrap<T: DeserializeOwned>(team: &str, field: &'static str, value: Value) -> Result<T, RowError> {
    let envelope: Envelope<T> = serde_json::from_value(value).map_err(|source| RowError::Field {
        team: team.to_string(),
        field,
        source,
    })?;

    if envelope.version > FIELD_SCHEMA_VERSION {
        return Err(RowError::UnsupportedVersion {
            team: team.to_string(),
            field,
            version: envelope.version,
        });
    }

    Ok(envelope.items)
}

impl TryFrom<&Team> for TeamRow {
    type Error = RowError;

    fn try_from(team: &Team) -> Result<Self, Self::Error> {
        let name = team.name.as_str();

        Ok(TeamRow {
            name: team.name.clone(),
            players: wrap(name, "players", &team.players)?,
            admins: wrap(name, "admins", &team.admins)?,
            point: team.point,
            start_location_defined: team.start_location_defined,
            location: team.location.clone(),
            target_location: team.target_location.clone(),
            point_log: wrap(name, "point_log", &team.point_log)?,
            event_log: wrap(name, "event_log", &team.event_log)?,
            step: team.step,
            mission_state: team.mission_state.as_str().to_string(),
            current_card: team.current_card.clone(),
            imprisoned_time: team.imprisoned_time,
            is_imprisoned: team.is_imprisoned,
            stations: wrap(name, "stations", &team.stations)?,
            owned_stations: wrap(name, "owned_stations", &team.owned_stations)?,
            combos: wrap(name, "combos", &team.combos)?,
            choice: wrap(name, "choice", &team.choice)?,
        })
    }
}

impl TryFrom<TeamRow> for Team {
    type Error = RowError;

    fn try_from(row: TeamRow) -> Result<Self, Self::Error> {
        let name = row.name.as_str();
        let mission_state: MissionState =
            row.mission_state
                .parse()
                .map_err(|source| RowError::MissionState {
                    team: name.to_string(),
                    source,
                })?;

        Ok(Team {
            players: unwrap(name, "players", row.players)?,
            admins: unwrap(name, "admins", row.admins)?,
            point: row.point,
            start_location_defined: row.start_location_defined,
            location: row.location,
            target_location: row.target_location,
            point_log: unwrap(name, "point_log", row.point_log)?,
            event_log: unwrap(name, "event_log", row.event_log)?,
            step: row.step,
            mission_state,
            current_card: row.current_card,
            imprisoned_time: row.imprisoned_time,
            is_imprisoned: row.is_imprisoned,
            stations: unwrap(name, "stations", row.stations)?,
            owned_stations: unwrap(name, "owned_stations", row.owned_stations)?,
            combos: unwrap(name, "combos", row.combos)?,
            choice: unwrap(name, "choice", row.choice)?,
            name: row.name,
        })
    }
}
