//! Database models for game records.

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use diesel::prelude::*;

use crate::db::{DbError, schema};
use crate::error::ProtocolError;
use crate::rules::Position;
use crate::state::{GameId, GameState};

/// Persisted game record.
///
/// Owned exclusively by [`crate::db::GameStore`]; mutated only through
/// its transition path, never deleted. `version` backs the optimistic
/// concurrency check.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::games)]
pub struct GameRecord {
    id: i32,
    uuid: String,
    white: String,
    black: String,
    position: String,
    move_count: i32,
    active: bool,
    draw_claimed: bool,
    version: i32,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl GameRecord {
    /// Reassembles the domain state from the stored columns.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Storage`] if the stored columns are not
    /// a valid state (the store never writes one).
    pub fn to_state(&self) -> Result<GameState, ProtocolError> {
        let id: GameId = self
            .uuid
            .parse()
            .map_err(|_| DbError::new(format!("Corrupt game identity in record {}", self.id)))?;
        let move_count = u32::try_from(self.move_count)
            .map_err(|_| DbError::new(format!("Negative move count in record {}", self.id)))?;
        Ok(GameState::from_parts(
            id,
            Position::from_canonical(self.position.clone()),
            move_count,
            self.active,
            self.draw_claimed,
            self.white.clone(),
            self.black.clone(),
        ))
    }
}

/// Insertable model for creating a game record.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::games)]
pub struct NewGameRecord {
    uuid: String,
    white: String,
    black: String,
    position: String,
    move_count: i32,
    active: bool,
    draw_claimed: bool,
    version: i32,
}

impl From<&GameState> for NewGameRecord {
    fn from(state: &GameState) -> Self {
        Self::new(
            state.id().as_str().to_string(),
            state.white().clone(),
            state.black().clone(),
            state.position().as_str().to_string(),
            *state.move_count() as i32,
            *state.active(),
            *state.draw_claimed(),
            0,
        )
    }
}
