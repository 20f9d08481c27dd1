// Copyright: Metro Conquest organisers
// Removal of the attribution is not allowed

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const STARTING_POINTS: i32 = 10;

/// Progress on the mission of the station a team is heading to or standing at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionState {
    /// mission of the current station is done, free to pick the next move
    #[default]
    Idle,
    InTransit,
    MissionPending,
}

impl MissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissionState::Idle => "idle",
            MissionState::InTransit => "in_transit",
            MissionState::MissionPending => "mission_pending",
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown mission state '{0}'")]
pub struct UnknownMissionState(pub String);

impl FromStr for MissionState {
    type Err = UnknownMissionState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(MissionState::Idle),
            "in_transit" => Ok(MissionState::InTransit),
            "mission_pending" => Ok(MissionState::MissionPending),
            other => Err(UnknownMissionState(other.to_string())),
        }
    }
}

/// Where a team is in the game loop, derived from its stored fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamState {
    Idle,
    InTransit,
    MissionPending,
    Imprisoned,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TeamError {
    #[error("team {team} is imprisoned")]
    Imprisoned { team: String },
    #[error("team {team} cannot do that while {state:?}")]
    WrongState { team: String, state: TeamState },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointRecord {
    pub point: i32,
    pub reason: String,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventRecord {
    pub event: String,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Team {
    pub name: String,
    pub location: String,
    pub target_location: String,
    pub start_location_defined: bool,
    pub players: Vec<String>,
    pub admins: Vec<String>,
    pub point_log: Vec<PointRecord>,
    pub event_log: Vec<EventRecord>,
    pub point: i32,
    pub step: i32,
    pub mission_state: MissionState,
    pub current_card: Option<String>,
    pub imprisoned_time: i32,
    pub is_imprisoned: bool,
    /// visited stations in arrival order
    pub stations: Vec<String>,
    pub owned_stations: Vec<String>,
    pub combos: Vec<String>,
    /// candidate stations offered for the next move
    pub choice: Vec<String>,
}

impl Team {
    pub fn new(
        name: impl Into<String>,
        players: Vec<String>,
        admins: Vec<String>,
        location: Option<String>,
        start_station: &str,
    ) -> Self {
        let start_location_defined = location.is_some();
        let location = location.unwrap_or_else(|| start_station.to_string());

        Team {
            name: name.into(),
            target_location: location.clone(),
            location,
            start_location_defined,
            players,
            admins,
            point_log: Vec::new(),
            event_log: Vec::new(),
            point: STARTING_POINTS,
            step: 0,
            mission_state: MissionState::Idle,
            current_card: None,
            imprisoned_time: 0,
            is_imprisoned: false,
            stations: Vec::new(),
            owned_stations: Vec::new(),
            combos: Vec::new(),
            choice: Vec::new(),
        }
    }

    /// Records a point change. The caller applies `point` separately.
    pub fn add_point_log(&mut self, point: i32, reason: impl Into<String>) {
        self.point_log.push(PointRecord {
            point,
            reason: reason.into(),
            time: Utc::now(),
        });
    }

    pub fn add_event_log(&mut self, event: impl Into<String>) {
        self.event_log.push(EventRecord {
            event: event.into(),
            time: Utc::now(),
        });
    }

    /// Changes the score and logs why.
    pub fn apply_points(&mut self, delta: i32, reason: impl Into<String>) {
        self.point = self.point.saturating_add(delta);
        self.add_point_log(delta, reason);
    }

    pub fn state(&self) -> TeamState {
        if self.is_imprisoned {
            TeamState::Imprisoned
        } else if self.mission_state == MissionState::InTransit
            || self.location != self.target_location
        {
            TeamState::InTransit
        } else if self.mission_state == MissionState::MissionPending {
            TeamState::MissionPending
        } else {
            TeamState::Idle
        }
    }

    fn require(&self, expected: TeamState) -> Result<(), TeamError> {
        match self.state() {
            state if state == expected => Ok(()),
            TeamState::Imprisoned => Err(TeamError::Imprisoned {
                team: self.name.clone(),
            }),
            state => Err(TeamError::WrongState {
                team: self.name.clone(),
                state,
            }),
        }
    }

    pub fn depart(&mut self, target: impl Into<String>) -> Result<(), TeamError> {
        self.require(TeamState::Idle)?;

        let target = target.into();
        self.add_event_log(format!("departed {} for {}", self.location, target));
        self.target_location = target;
        self.mission_state = MissionState::InTransit;
        self.choice.clear();
        Ok(())
    }

    pub fn arrive(&mut self) -> Result<(), TeamError> {
        self.require(TeamState::InTransit)?;

        self.location = self.target_location.clone();
        self.step += 1;
        self.stations.push(self.location.clone());
        self.mission_state = MissionState::MissionPending;
        self.add_event_log(format!("arrived at {}", self.location));
        Ok(())
    }

    pub fn finish_mission(&mut self) -> Result<(), TeamError> {
        self.require(TeamState::MissionPending)?;

        self.mission_state = MissionState::Idle;
        self.add_event_log(format!("finished the mission at {}", self.location));
        Ok(())
    }

    /// Locks the team in place for `turns` turns; any move in progress is
    /// abandoned at the current location.
    pub fn imprison(&mut self, turns: i32) {
        self.is_imprisoned = true;
        self.imprisoned_time = turns;
        self.target_location = self.location.clone();
        self.mission_state = MissionState::Idle;
        self.add_event_log(format!("imprisoned for {} turns", turns));
    }

    /// Counts down one turn of imprisonment, returns true once released.
    pub fn serve_turn(&mut self) -> bool {
        if !self.is_imprisoned {
            return true;
        }

        self.imprisoned_time -= 1;
        if self.imprisoned_time <= 0 {
            self.release();
            return true;
        }
        false
    }

    pub fn release(&mut self) {
        self.is_imprisoned = false;
        self.imprisoned_time = 0;
        self.add_event_log("released");
    }

    /// Adds the station to the owned list once; false if already owned.
    pub fn claim_station(&mut self, station: &str) -> bool {
        if self.owned_stations.iter().any(|owned| owned == station) {
            return false;
        }
        self.owned_stations.push(station.to_string());
        true
    }

    pub fn release_station(&mut self, station: &str) -> bool {
        let before = self.owned_stations.len();
        self.owned_stations.retain(|owned| owned != station);
        before != self.owned_stations.len()
    }

    pub fn add_player(&mut self, player: &str) -> bool {
        push_unique(&mut self.players, player)
    }

    pub fn add_admin(&mut self, admin: &str) -> bool {
        push_unique(&mut self.admins, admin)
    }

    pub fn remove_player(&mut self, player: &str) -> bool {
        let before = self.players.len() + self.admins.len();
        self.players.retain(|p| p != player);
        self.admins.retain(|a| a != player);
        before != self.players.len() + self.admins.len()
    }

    pub fn is_admin(&self, user: &str) -> bool {
        self.admins.iter().any(|a| a == user)
    }

    pub fn is_member(&self, user: &str) -> bool {
        self.is_admin(user) || self.players.iter().any(|p| p == user)
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) -> bool {
    if list.iter().any(|v| v == value) {
        return false;
    }
    list.push(value.to_string());
    true
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
