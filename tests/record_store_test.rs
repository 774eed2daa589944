//! Tests for the game record store and its concurrency contract.

use std::sync::{Arc, Barrier};

use stateless_chess::{
    ChessRules, GameId, GameState, GameStore, ProtocolError, Rules,
};
use tempfile::NamedTempFile;

/// Creates a temporary database file, returns the file handle (must
/// stay in scope to keep the file alive) and a ready store.
fn setup_test_db() -> (NamedTempFile, GameStore) {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();
    let store = GameStore::new(db_path).expect("Failed to create store");
    (db_file, store)
}


/// Successor with only the move count bumped; enough to exercise the
/// store's write path.
fn bump(current: &GameState) -> GameState {
    GameState::from_parts(
        current.id().clone(),
        current.position().clone(),
        current.move_count() + 1,
        true,
        false,
        current.white().clone(),
        current.black().clone(),
    )
}

fn fresh_state() -> GameState {
    GameState::initial(
        GameId::fresh(),
        ChessRules::new().initial(),
        "a".to_string(),
        "b".to_string(),
    )
}

#[test]
fn test_create_and_get_round_trip() {
    let (_db, store) = setup_test_db();
    let state = fresh_state();

    let record = store.create(&state).expect("Create failed");
    assert!(*record.id() > 0);
    assert_eq!(*record.version(), 0);

    let loaded = store
        .get(*record.id())
        .expect("Get failed")
        .expect("Record missing");
    assert_eq!(loaded.to_state().expect("Corrupt state"), state);
}

#[test]
fn test_in_memory_path_is_rejected_at_construction() {
    // Connections are per-operation; an in-memory database would lose
    // its schema the moment the migration connection closes.
    assert!(GameStore::new(":memory:".to_string()).is_err());
}

#[test]
fn test_get_unknown_id_is_none() {
    let (_db, store) = setup_test_db();
    assert!(store.get(4321).expect("Get failed").is_none());
}

#[test]
fn test_apply_transition_commits_and_bumps_version() {
    let (_db, store) = setup_test_db();
    let rules = ChessRules::new();
    let state = fresh_state();
    let record = store.create(&state).expect("Create failed");

    let committed = store
        .apply_transition(*record.id(), |current| {
            let position = rules.apply(current.position(), "e2e4")?;
            Ok(GameState::from_parts(
                current.id().clone(),
                position,
                current.move_count() + 1,
                true,
                false,
                current.white().clone(),
                current.black().clone(),
            ))
        })
        .expect("Transition failed");

    assert_eq!(*committed.move_count(), 1);
    assert_eq!(*committed.version(), 1);
}

#[test]
fn test_committed_record_is_the_row_this_transition_wrote() {
    let (_db, store) = setup_test_db();
    let record = store.create(&fresh_state()).expect("Create failed");
    let id = *record.id();

    // Each call returns its own committed row, never a later one: the
    // first snapshot stays at version 1 after the second commit.
    let first = store
        .apply_transition(id, |c| Ok(bump(c)))
        .expect("First transition failed");
    let second = store
        .apply_transition(id, |c| Ok(bump(c)))
        .expect("Second transition failed");

    assert_eq!(*first.version(), 1);
    assert_eq!(*first.move_count(), 1);
    assert_eq!(*second.version(), 2);
    assert_eq!(*second.move_count(), 2);
    assert_eq!(
        first.to_state().expect("Corrupt state"),
        bump(&record.to_state().expect("Corrupt state"))
    );
}

#[test]
fn test_transition_against_unknown_id_is_not_found() {
    let (_db, store) = setup_test_db();
    let result = store.apply_transition(99, |current| Ok(current.clone()));
    assert!(matches!(result, Err(ProtocolError::NotFound)));
}

#[test]
fn test_rejected_transition_writes_nothing() {
    let (_db, store) = setup_test_db();
    let record = store.create(&fresh_state()).expect("Create failed");

    let result = store.apply_transition(*record.id(), |_| Err(ProtocolError::IllegalMove));
    assert!(matches!(result, Err(ProtocolError::IllegalMove)));

    let loaded = store.get(*record.id()).unwrap().unwrap();
    assert_eq!(*loaded.version(), 0);
    assert_eq!(*loaded.move_count(), 0);
}

#[test]
fn test_stale_writer_observes_concurrency_conflict() {
    let (_db, store) = setup_test_db();
    let record = store.create(&fresh_state()).expect("Create failed");
    let id = *record.id();

    // While the outer transition holds its loaded snapshot, an inner
    // transition commits against the same record.
    let inner_store = store.clone();
    let result = store.apply_transition(id, |current| {
        inner_store
            .apply_transition(id, |c| Ok(bump(c)))
            .expect("Inner transition commits first");
        Ok(bump(current))
    });

    assert!(matches!(result, Err(ProtocolError::ConcurrencyConflict)));
    let loaded = store.get(id).unwrap().unwrap();
    assert_eq!(*loaded.version(), 1, "exactly one transition committed");
}

#[test]
fn test_two_simultaneous_writers_exactly_one_commits() {
    let (_db, store) = setup_test_db();
    let record = store.create(&fresh_state()).expect("Create failed");
    let id = *record.id();

    let barrier = Arc::new(Barrier::new(2));
    let mut handles = Vec::new();
    for _ in 0..2 {
        let store = store.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(std::thread::spawn(move || {
            store.apply_transition(id, |current| {
                // Both writers hold their loaded snapshot before either
                // reaches the guarded write.
                barrier.wait();
                Ok(bump(current))
            })
        }));
    }

    let outcomes: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("Writer thread panicked"))
        .collect();

    let committed = outcomes.iter().filter(|r| r.is_ok()).count();
    let conflicted = outcomes
        .iter()
        .filter(|r| matches!(r, Err(ProtocolError::ConcurrencyConflict)))
        .count();
    assert_eq!(committed, 1, "exactly one writer commits");
    assert_eq!(conflicted, 1, "the loser observes the conflict");

    let loaded = store.get(id).unwrap().unwrap();
    assert_eq!(*loaded.version(), 1);
    assert_eq!(*loaded.move_count(), 1);
}
