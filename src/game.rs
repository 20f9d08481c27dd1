// Copyright: Metro Conquest organisers
// Removal of the attribution is not allowed

//! Shared game state for the server.
//!
//! Lock order: the metro lock is always taken before any team lock, and at
//! most one team lock is held at a time. Nothing acquires the metro lock while
//! holding a team lock.

use crate::config::GameConfig;
use crate::metro::MetroSystem;
use crate::models::TeamRow;
use crate::store::{GameStore, StoreError};
use crate::team::{MissionState, Team, TeamError};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GameError {
    #[error("no team named {0}")]
    UnknownTeam(String),
    #[error("no station named {0}")]
    UnknownStation(String),
    #[error("team {0} already exists")]
    TeamExists(String),
    #[error(transparent)]
    Team(#[from] TeamError),
}

pub type SharedTeam = Arc<Mutex<Team>>;

pub struct GameCore {
    pub config: GameConfig,
    metro: RwLock<MetroSystem>,
    teams: DashMap<String, SharedTeam>,
}

impl GameCore {
    pub fn new(config: GameConfig, metro: MetroSystem) -> Self {
        Self {
            config,
            metro: RwLock::new(metro),
            teams: DashMap::new(),
        }
    }

    pub async fn metro(&self) -> RwLockReadGuard<'_, MetroSystem> {
        self.metro.read().await
    }

    pub async fn metro_mut(&self) -> RwLockWriteGuard<'_, MetroSystem> {
        self.metro.write().await
    }

    pub fn team(&self, name: &str) -> Option<SharedTeam> {
        self.teams.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Team names shown to players, reserved teams left out.
    pub fn team_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .teams
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|name| !self.config.reserved_teams.contains(name))
            .collect();
        names.sort();
        names
    }

    pub async fn register_team(
        &self,
        name: &str,
        players: Vec<String>,
        admins: Vec<String>,
        location: Option<String>,
    ) -> Result<SharedTeam, GameError> {
        if let Some(location) = &location {
            if self.metro().await.reachable(location).is_none() {
                return Err(GameError::UnknownStation(location.clone()));
            }
        }

        let team = Team::new(name, players, admins, location, &self.config.start_station);

        match self.teams.entry(name.to_string()) {
            Entry::Occupied(_) => Err(GameError::TeamExists(name.to_string())),
            Entry::Vacant(slot) => {
                let shared = Arc::new(Mutex::new(team));
                slot.insert(Arc::clone(&shared));
                info!("Registered team {}", name);
                Ok(shared)
            }
        }
    }

    /// Finds the team a user plays for and whether they administer it.
    pub async fn check_player(&self, user: &str) -> Option<(String, bool)> {
        let shared: Vec<SharedTeam> = self
            .teams
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for team in shared {
            let team = team.lock().await;
            if team.is_member(user) {
                return Some((team.name.clone(), team.is_admin(user)));
            }
        }

        None
    }

    /// Offers the stations reachable from the team's location and stores them
    /// as the team's current choice. Imprisoned teams get no choice.
    pub async fn offer_moves(&self, team_name: &str) -> Result<Vec<String>, GameError> {
        let shared = self
            .team(team_name)
            .ok_or_else(|| GameError::UnknownTeam(team_name.to_string()))?;

        let metro = self.metro().await;
        let mut team = shared.lock().await;

        let choice: Vec<String> = if team.is_imprisoned {
            Vec::new()
        } else {
            metro
                .reachable(&team.location)
                .ok_or_else(|| GameError::UnknownStation(team.location.clone()))?
                .iter()
                .cloned()
                .collect()
        };

        team.choice = choice.clone();
        Ok(choice)
    }

    /// Hands a station to a team, taking it away from its previous owner.
    pub async fn claim_station(&self, team_name: &str, station: &str) -> Result<(), GameError> {
        let new_owner = self
            .team(team_name)
            .ok_or_else(|| GameError::UnknownTeam(team_name.to_string()))?;

        let mut metro = self.metro_mut().await;
        let slot = metro
            .find_station_mut(station)
            .ok_or_else(|| GameError::UnknownStation(station.to_string()))?;
        let previous = slot.team.replace(team_name.to_string());

        if let Some(previous) = previous.filter(|p| p != team_name) {
            if let Some(old_owner) = self.team(&previous) {
                old_owner.lock().await.release_station(station);
            }
        }

        let mut team = new_owner.lock().await;
        team.claim_station(station);
        team.add_event_log(format!("claimed {}", station));
        Ok(())
    }

    pub async fn save_all<S: GameStore>(&self, store: &S) -> Result<(), StoreError> {
        let station_count = self.metro().await.save_stations(store).await?;

        let shared: Vec<SharedTeam> = self
            .teams
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut rows = Vec::with_capacity(shared.len());
        for team in shared {
            rows.push(TeamRow::try_from(&*team.lock().await)?);
        }
        store.upsert_teams(&rows).await?;

        info!("Saved {} stations and {} teams", station_count, rows.len());
        Ok(())
    }

    /// Restores station state and teams. Teams standing on a station that is
    /// not part of this build are moved back to the start station, and a move
    /// towards such a station is cancelled.
    pub async fn load_all<S: GameStore>(&self, store: &S) -> Result<(), StoreError> {
        let mut metro = self.metro_mut().await;
        let restored = metro.load_stations(store).await?;

        let mut team_count = 0;
        for row in store.load_teams().await? {
            let mut team = Team::try_from(row)?;

            if metro.reachable(&team.location).is_none() {
                warn!(
                    "Team {} stood on unknown station {}, moving it to {}",
                    team.name, team.location, self.config.start_station
                );
                team.location = self.config.start_station.clone();
                team.target_location = self.config.start_station.clone();
            }

            if metro.reachable(&team.target_location).is_none() {
                warn!(
                    "Team {} was heading to unknown station {}, keeping it at {}",
                    team.name, team.target_location, team.location
                );
                team.target_location = team.location.clone();
                team.mission_state = MissionState::Idle;
            }

            self.teams
                .insert(team.name.clone(), Arc::new(Mutex::new(team)));
            team_count += 1;
        }

        info!(
            "Restored {} stations and {} teams from storage",
            restored, team_count
        );
        Ok(())
    }
}
