//! Shakmaty-backed implementation of the rules contract.

use shakmaty::fen::Fen;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Outcome, Position as _};
use tracing::{debug, instrument};

use crate::error::ProtocolError;
use crate::rules::{GameResult, Position, Rules};
use crate::token::Side;

/// Production rules engine backed by the `shakmaty` move generator.
///
/// Canonical notation is FEN; move notation is UCI, matching what the
/// links carry.
#[derive(Debug, Clone, Default)]
pub struct ChessRules;

impl ChessRules {
    /// Creates the engine.
    pub fn new() -> Self {
        Self
    }

    fn decode(&self, position: &Position) -> Result<Chess, ProtocolError> {
        let fen: Fen = position
            .as_str()
            .parse()
            .map_err(|_| ProtocolError::MalformedPosition)?;
        fen.into_position(CastlingMode::Standard)
            .map_err(|_| ProtocolError::MalformedPosition)
    }

    fn encode(&self, board: Chess) -> Position {
        Position::from_canonical(Fen::from_position(board, EnPassantMode::Legal).to_string())
    }
}

impl Rules for ChessRules {
    fn initial(&self) -> Position {
        self.encode(Chess::default())
    }

    #[instrument(skip(self, notation))]
    fn parse(&self, notation: &str) -> Result<Position, ProtocolError> {
        let board = self.decode(&Position::from_canonical(notation.to_string()))?;
        Ok(self.encode(board))
    }

    fn side_to_move(&self, position: &Position) -> Result<Side, ProtocolError> {
        let board = self.decode(position)?;
        Ok(match board.turn() {
            Color::White => Side::White,
            Color::Black => Side::Black,
        })
    }

    #[instrument(skip(self, position))]
    fn legal_moves(&self, position: &Position) -> Result<Vec<String>, ProtocolError> {
        let board = self.decode(position)?;
        let mut moves: Vec<String> = board
            .legal_moves()
            .iter()
            .map(|m| m.to_uci(CastlingMode::Standard).to_string())
            .collect();
        // Fixed lexicographic order keeps enumeration reproducible.
        moves.sort_unstable();
        debug!(count = moves.len(), "Enumerated legal moves");
        Ok(moves)
    }

    #[instrument(skip(self, position), fields(notation = %notation))]
    fn apply(&self, position: &Position, notation: &str) -> Result<Position, ProtocolError> {
        let board = self.decode(position)?;
        let uci: UciMove = notation.parse().map_err(|_| ProtocolError::IllegalMove)?;
        let mv = uci
            .to_move(&board)
            .map_err(|_| ProtocolError::IllegalMove)?;
        let next = board.play(&mv).map_err(|_| ProtocolError::IllegalMove)?;
        Ok(self.encode(next))
    }

    fn outcome(
        &self,
        position: &Position,
        draw_claimed: bool,
    ) -> Result<Option<GameResult>, ProtocolError> {
        let board = self.decode(position)?;
        let result = match board.outcome() {
            Some(Outcome::Decisive {
                winner: Color::White,
            }) => Some(GameResult::WhiteWins),
            Some(Outcome::Decisive {
                winner: Color::Black,
            }) => Some(GameResult::BlackWins),
            Some(Outcome::Draw) => Some(GameResult::Draw),
            None if draw_claimed => Some(GameResult::Draw),
            None => None,
        };
        Ok(result)
    }

    fn can_claim_draw(&self, position: &Position) -> Result<bool, ProtocolError> {
        let board = self.decode(position)?;
        // Fifty-move rule. Repetition claims need game history, which the
        // canonical notation does not carry.
        Ok(board.halfmoves() >= 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn initial_is_the_standard_start() {
        let rules = ChessRules::new();
        assert_eq!(rules.initial().as_str(), START_FEN);
        assert_eq!(rules.side_to_move(&rules.initial()).unwrap(), Side::White);
    }

    #[test]
    fn parse_round_trips_reachable_positions() {
        let rules = ChessRules::new();
        let start = rules.initial();
        let after = rules.apply(&start, "e2e4").unwrap();
        for position in [&start, &after] {
            let parsed = rules.parse(position.as_str()).unwrap();
            assert_eq!(&parsed, position);
        }
    }

    #[test]
    fn parse_rejects_garbage() {
        let rules = ChessRules::new();
        assert!(matches!(
            rules.parse("not a position"),
            Err(ProtocolError::MalformedPosition)
        ));
        assert!(matches!(
            rules.parse(""),
            Err(ProtocolError::MalformedPosition)
        ));
    }

    #[test]
    fn twenty_opening_moves_in_sorted_order() {
        let rules = ChessRules::new();
        let moves = rules.legal_moves(&rules.initial()).unwrap();
        assert_eq!(moves.len(), 20);
        let mut sorted = moves.clone();
        sorted.sort_unstable();
        assert_eq!(moves, sorted);
        assert!(moves.contains(&"e2e4".to_string()));
    }

    #[test]
    fn enumeration_is_deterministic() {
        let rules = ChessRules::new();
        let position = rules.apply(&rules.initial(), "e2e4").unwrap();
        assert_eq!(
            rules.legal_moves(&position).unwrap(),
            rules.legal_moves(&position).unwrap()
        );
    }

    #[test]
    fn applying_e2e4_flips_the_turn() {
        let rules = ChessRules::new();
        let after = rules.apply(&rules.initial(), "e2e4").unwrap();
        assert_eq!(rules.side_to_move(&after).unwrap(), Side::Black);
        assert!(rules.outcome(&after, false).unwrap().is_none());
    }

    #[test]
    fn illegal_and_malformed_moves_are_rejected() {
        let rules = ChessRules::new();
        assert!(matches!(
            rules.apply(&rules.initial(), "e2e5"),
            Err(ProtocolError::IllegalMove)
        ));
        assert!(matches!(
            rules.apply(&rules.initial(), "nonsense"),
            Err(ProtocolError::IllegalMove)
        ));
    }

    #[test]
    fn fools_mate_is_reported_as_black_win() {
        let rules = ChessRules::new();
        let mut position = rules.initial();
        for mv in ["f2f3", "e7e5", "g2g4", "d8h4"] {
            position = rules.apply(&position, mv).unwrap();
        }
        assert_eq!(
            rules.outcome(&position, false).unwrap(),
            Some(GameResult::BlackWins)
        );
        assert!(rules.legal_moves(&position).unwrap().is_empty());
    }

    #[test]
    fn claimed_draw_terminates_a_running_game() {
        let rules = ChessRules::new();
        let start = rules.initial();
        assert_eq!(rules.outcome(&start, false).unwrap(), None);
        assert_eq!(
            rules.outcome(&start, true).unwrap(),
            Some(GameResult::Draw)
        );
    }

    #[test]
    fn draw_claim_follows_the_halfmove_clock() {
        let rules = ChessRules::new();
        assert!(!rules.can_claim_draw(&rules.initial()).unwrap());
        let stalled = rules
            .parse("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 100 80")
            .unwrap();
        assert!(rules.can_claim_draw(&stalled).unwrap());
    }
}
