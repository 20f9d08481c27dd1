// Copyright: Metro Conquest organisers
// Removal of the attribution is not allowed

//! Persistence of station ownership and team state.

use crate::models::{RowError, StationRow, TeamRow};
use crate::postgres_tools::GamePostgresPool;
use crate::schema::game::{stations, teams};
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;
use diesel_async::pooled_connection::PoolError;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

const UPSERT_CHUNK: usize = 500;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("could not get a database connection: {0}")]
    Pool(#[from] bb8::RunError<PoolError>),
    #[error("query failed: {0}")]
    Query(#[from] diesel::result::Error),
    #[error(transparent)]
    Row(#[from] RowError),
}

/// Storage backend for the two persisted record kinds. Upserts are keyed by
/// name, so saving the same rows twice leaves the stored set unchanged.
#[allow(async_fn_in_trait)]
pub trait GameStore {
    async fn upsert_stations(&self, rows: &[StationRow]) -> Result<(), StoreError>;
    async fn load_stations(&self) -> Result<Vec<StationRow>, StoreError>;
    async fn upsert_teams(&self, rows: &[TeamRow]) -> Result<(), StoreError>;
    async fn load_teams(&self) -> Result<Vec<TeamRow>, StoreError>;
}

pub struct PgGameStore {
    pool: Arc<GamePostgresPool>,
}

impl PgGameStore {
    pub fn new(pool: Arc<GamePostgresPool>) -> Self {
        Self { pool }
    }
}

impl GameStore for PgGameStore {
    async fn upsert_stations(&self, rows: &[StationRow]) -> Result<(), StoreError> {
        let conn = &mut self.pool.get().await?;

        for chunk in rows.chunks(UPSERT_CHUNK) {
            diesel::insert_into(stations::table)
                .values(chunk)
                .on_conflict(stations::name)
                .do_update()
                .set((
                    stations::is_special.eq(excluded(stations::is_special)),
                    stations::hidden.eq(excluded(stations::hidden)),
                    stations::owner_team.eq(excluded(stations::owner_team)),
                    stations::updated_at.eq(diesel::dsl::now),
                ))
                .execute(conn)
                .await?;
        }

        Ok(())
    }

    async fn load_stations(&self) -> Result<Vec<StationRow>, StoreError> {
        let conn = &mut self.pool.get().await?;

        let rows = stations::table
            .select(StationRow::as_select())
            .load(conn)
            .await?;

        Ok(rows)
    }

    async fn upsert_teams(&self, rows: &[TeamRow]) -> Result<(), StoreError> {
        let conn = &mut self.pool.get().await?;

        for chunk in rows.chunks(UPSERT_CHUNK) {
            diesel::insert_into(teams::table)
                .values(chunk)
                .on_conflict(teams::name)
                .do_update()
                .set((
                    (
                        teams::players.eq(excluded(teams::players)),
                        teams::admins.eq(excluded(teams::admins)),
                        teams::point.eq(excluded(teams::point)),
                        teams::start_location_defined.eq(excluded(teams::start_location_defined)),
                        teams::location.eq(excluded(teams::location)),
                        teams::target_location.eq(excluded(teams::target_location)),
                        teams::point_log.eq(excluded(teams::point_log)),
                        teams::event_log.eq(excluded(teams::event_log)),
                        teams::step.eq(excluded(teams::step)),
                    ),
                    (
                        teams::mission_state.eq(excluded(teams::mission_state)),
                        teams::current_card.eq(excluded(teams::current_card)),
                        teams::imprisoned_time.eq(excluded(teams::imprisoned_time)),
                        teams::is_imprisoned.eq(excluded(teams::is_imprisoned)),
                        teams::stations.eq(excluded(teams::stations)),
                        teams::owned_stations.eq(excluded(teams::owned_stations)),
                        teams::combos.eq(excluded(teams::combos)),
                        teams::choice.eq(excluded(teams::choice)),
                        teams::updated_at.eq(diesel::dsl::now),
                    ),
                ))
                .execute(conn)
                .await?;
        }

        Ok(())
    }

    async fn load_teams(&self) -> Result<Vec<TeamRow>, StoreError> {
        let conn = &mut self.pool.get().await?;

        let rows = teams::table
            .select(TeamRow::as_select())
            .load(conn)
            .await?;

        Ok(rows)
    }
}

/// Keeps rows in memory; used when the server runs without a database and in
/// tests.
#[derive(Default)]
pub struct MemoryGameStore {
    stations: Mutex<BTreeMap<String, StationRow>>,
    teams: Mutex<BTreeMap<String, TeamRow>>,
}

impl GameStore for MemoryGameStore {
    async fn upsert_stations(&self, rows: &[StationRow]) -> Result<(), StoreError> {
        let mut stored = self.stations.lock().await;
        for row in rows {
            stored.insert(row.name.clone(), row.clone());
        }
        Ok(())
    }

    async fn load_stations(&self) -> Result<Vec<StationRow>, StoreError> {
        Ok(self.stations.lock().await.values().cloned().collect())
    }

    async fn upsert_teams(&self, rows: &[TeamRow]) -> Result<(), StoreError> {
        let mut stored = self.teams.lock().await;
        for row in rows {
            stored.insert(row.name.clone(), row.clone());
        }
        Ok(())
    }

    async fn load_teams(&self) -> Result<Vec<TeamRow>, StoreError> {
        Ok(self.teams.lock().await.values().cloned().collect())
    }
}

/// The backend picked at startup.
pub enum Storage {
    Postgres(PgGameStore),
    Memory(MemoryGameStore),
}

impl GameStore for Storage {
    async fn upsert_stations(&self, rows: &[StationRow]) -> Result<(), StoreError> {
        match self {
            Storage::Postgres(store) => store.upsert_stations(rows).await,
            Storage::Memory(store) => store.upsert_stations(rows).await,
        }
    }

    async fn load_stations(&self) -> Result<Vec<StationRow>, StoreError> {
        match self {
            Storage::Postgres(store) => store.load_stations().await,
            Storage::Memory(store) => store.load_stations().await,
        }
    }

    async fn upsert_teams(&self, rows: &[TeamRow]) -> Result<(), StoreError> {
        match self {
            Storage::Postgres(store) => store.upsert_teams(rows).await,
            Storage::Memory(store) => store.upsert_teams(rows).await,
        }
    }

    async fn load_teams(&self) -> Result<Vec<TeamRow>, StoreError> {
        match self {
            Storage::Postgres(store) => store.load_teams().await,
            Storage::Memory(store) => store.load_teams().await,
        }
    }
}
