//! Game record store with optimistic concurrency control.

use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::{debug, info, instrument, warn};

use crate::db::{DbError, GameRecord, NewGameRecord, schema};
use crate::error::ProtocolError;
use crate::state::GameState;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Store owning all persisted game records.
///
/// Concurrency contract: two simultaneous transitions against the same
/// record never both succeed. Writes are guarded by the record's
/// `version` column; the loser of a race observes
/// [`ProtocolError::ConcurrencyConflict`] and must retry from a fresh
/// load.
#[derive(Debug, Clone)]
pub struct GameStore {
    db_path: String,
}

impl GameStore {
    /// Creates a store backed by the database file at the given path,
    /// applying pending schema migrations.
    ///
    /// Every operation opens its own connection, so the path must refer
    /// to a shared database file; an in-memory database would vanish
    /// with the migration connection. Tests use a temp file.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the path is `":memory:"`, or the database
    /// cannot be opened or migrated.
    #[instrument(skip(db_path), fields(db_path = %db_path))]
    pub fn new(db_path: String) -> Result<Self, DbError> {
        if db_path == ":memory:" {
            return Err(DbError::new(
                "In-memory databases are not supported: connections are per-operation, use a file path",
            ));
        }
        info!(path = %db_path, "Creating GameStore");
        let mut conn = SqliteConnection::establish(&db_path)?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| DbError::new(format!("Migration failed: {}", e)))?;
        Ok(Self { db_path })
    }

    /// Establishes a database connection.
    #[instrument(skip(self))]
    fn connection(&self) -> Result<SqliteConnection, DbError> {
        debug!(path = %self.db_path, "Establishing connection");
        let mut conn = SqliteConnection::establish(&self.db_path)
            .map_err(|e| DbError::new(format!("Failed to connect to '{}': {}", self.db_path, e)))?;
        // Writers queue instead of failing fast; the version guard still
        // decides which transition wins.
        diesel::sql_query("PRAGMA busy_timeout = 5000")
            .execute(&mut conn)
            .map_err(DbError::from)?;
        Ok(conn)
    }

    /// Creates the record for a freshly started game.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on database failure.
    #[instrument(skip(self, state), fields(game = %state.id()))]
    pub fn create(&self, state: &GameState) -> Result<GameRecord, DbError> {
        debug!("Creating game record");
        let mut conn = self.connection()?;

        let record = diesel::insert_into(schema::games::table)
            .values(NewGameRecord::from(state))
            .returning(GameRecord::as_returning())
            .get_result(&mut conn)?;

        info!(record_id = record.id(), game = %state.id(), "Game record created");
        Ok(record)
    }

    /// Gets a record by id. Returns `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on database failure.
    #[instrument(skip(self))]
    pub fn get(&self, id: i32) -> Result<Option<GameRecord>, DbError> {
        let mut conn = self.connection()?;

        let record = schema::games::table
            .find(id)
            .first::<GameRecord>(&mut conn)
            .optional()?;

        if record.is_none() {
            debug!(record_id = id, "Record not found");
        }
        Ok(record)
    }

    /// Runs a pure transition against the record and commits the result
    /// as a single atomic unit.
    ///
    /// Loads the record, applies `transition` to its state, and writes
    /// back guarded by the loaded `version`. If another writer committed
    /// in between, nothing is written. The returned record comes from
    /// the guarded statement itself, so it is exactly the row this call
    /// wrote even when a later writer commits immediately after.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::NotFound`] for an unknown id;
    /// - whatever rejection `transition` itself produces, with no write;
    /// - [`ProtocolError::ConcurrencyConflict`] when the version guard
    ///   fails; callers may retry from a fresh load.
    #[instrument(skip(self, transition))]
    pub fn apply_transition<F>(&self, id: i32, transition: F) -> Result<GameRecord, ProtocolError>
    where
        F: FnOnce(&GameState) -> Result<GameState, ProtocolError>,
    {
        let record = self
            .get(id)
            .map_err(ProtocolError::Storage)?
            .ok_or(ProtocolError::NotFound)?;
        let loaded_version = *record.version();

        let next = transition(&record.to_state()?)?;

        let mut conn = self.connection().map_err(ProtocolError::Storage)?;
        let committed = diesel::update(
            schema::games::table
                .filter(schema::games::id.eq(id))
                .filter(schema::games::version.eq(loaded_version)),
        )
        .set((
            schema::games::position.eq(next.position().as_str()),
            schema::games::move_count.eq(*next.move_count() as i32),
            schema::games::active.eq(*next.active()),
            schema::games::draw_claimed.eq(*next.draw_claimed()),
            schema::games::version.eq(loaded_version + 1),
            schema::games::updated_at.eq(chrono::Utc::now().naive_utc()),
        ))
        .returning(GameRecord::as_returning())
        .get_result::<GameRecord>(&mut conn)
        .optional()
        .map_err(|e| ProtocolError::Storage(DbError::from(e)))?;

        let Some(committed) = committed else {
            warn!(
                record_id = id,
                loaded_version, "Concurrent transition won the race"
            );
            return Err(ProtocolError::ConcurrencyConflict);
        };
        info!(
            record_id = id,
            move_count = committed.move_count(),
            active = committed.active(),
            "Transition committed"
        );
        Ok(committed)
    }
}
