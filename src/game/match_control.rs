//! Match Controller
//!
//! Wraps the board with score tracking and first-to-N match semantics.
//! Owns the turn order and the game-active flag; still pure state, no I/O.

use serde::{Deserialize, Serialize};

use crate::game::board::{Board, GameResult, IllegalMove, Mark};

/// Games needed to win a match.
pub const WINNING_SCORE: u32 = 5;

/// Why a play was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PlayError {
    /// The current game has concluded; call `new_game` first.
    #[error("Game already concluded")]
    GameOver,

    /// A mark tried to move out of turn.
    #[error("It is not {0}'s turn")]
    NotYourTurn(Mark),

    /// The board rejected the cell.
    #[error(transparent)]
    Illegal(#[from] IllegalMove),
}

/// Outcome of recording a game win against the match tally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WinRecord {
    /// Match already over; score untouched.
    Ignored,
    /// Score incremented, match continues.
    Scored(u32),
    /// Score incremented and reached the threshold; match is over.
    MatchWon(u32),
}

/// Per-mark game tally.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    /// Games won by X.
    pub x: u32,
    /// Games won by O.
    pub o: u32,
}

impl Scores {
    /// The tally for one mark.
    pub fn get(&self, mark: Mark) -> u32 {
        match mark {
            Mark::X => self.x,
            Mark::O => self.o,
        }
    }

    fn get_mut(&mut self, mark: Mark) -> &mut u32 {
        match mark {
            Mark::X => &mut self.x,
            Mark::O => &mut self.o,
        }
    }
}

/// Board plus running match state. X always opens a game.
#[derive(Clone, Debug)]
pub struct MatchController {
    board: Board,
    current: Mark,
    game_active: bool,
    scores: Scores,
    match_active: bool,
    winning_score: u32,
}

impl Default for MatchController {
    fn default() -> Self {
        Self::new(WINNING_SCORE)
    }
}

impl MatchController {
    /// Fresh match with the given win threshold.
    pub fn new(winning_score: u32) -> Self {
        Self {
            board: Board::new(),
            current: Mark::X,
            game_active: true,
            scores: Scores::default(),
            match_active: true,
            winning_score,
        }
    }

    /// Apply one move for `mark` and evaluate.
    ///
    /// Rejects plays on a concluded game and out-of-turn plays; otherwise
    /// runs the board pipeline. A terminal result freezes the game; an
    /// in-progress result passes the turn.
    pub fn play(&mut self, index: usize, mark: Mark) -> Result<GameResult, PlayError> {
        if !self.game_active {
            return Err(PlayError::GameOver);
        }
        if mark != self.current {
            return Err(PlayError::NotYourTurn(mark));
        }

        self.board.apply_move(index, mark)?;
        let result = self.board.evaluate();

        if result.is_over() {
            self.game_active = false;
        } else {
            self.current = self.current.opponent();
        }

        Ok(result)
    }

    /// Replace the board wholesale, typically from a peer's snapshot.
    ///
    /// The turn passes to the opponent of `last_mover` and the game-active
    /// flag follows the evaluated result.
    pub fn install_snapshot(&mut self, board: Board, last_mover: Mark) -> GameResult {
        self.board = board;
        let result = self.board.evaluate();
        self.game_active = !result.is_over();
        self.current = last_mover.opponent();
        result
    }

    /// Credit a game win to `mark`.
    ///
    /// No-op while the match is inactive, so late or duplicate results
    /// cannot drift the score. Reaching the threshold deactivates the match.
    pub fn record_win(&mut self, mark: Mark) -> WinRecord {
        if !self.match_active {
            return WinRecord::Ignored;
        }

        let score = self.scores.get_mut(mark);
        *score += 1;
        let score = *score;

        if score >= self.winning_score {
            self.match_active = false;
            WinRecord::MatchWon(score)
        } else {
            WinRecord::Scored(score)
        }
    }

    /// Start the next game of the match, keeping scores.
    ///
    /// Returns false (and changes nothing) once the match is over; a
    /// finished match only continues through [`new_match`](Self::new_match).
    pub fn new_game(&mut self) -> bool {
        if !self.match_active {
            return false;
        }
        self.board = Board::new();
        self.current = Mark::X;
        self.game_active = true;
        true
    }

    /// Zero both scores, reactivate the match, and start a game.
    pub fn new_match(&mut self) {
        self.scores = Scores::default();
        self.match_active = true;
        self.new_game();
    }

    /// The current board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Whose turn it is.
    pub fn current_player(&self) -> Mark {
        self.current
    }

    /// Whether the current game accepts moves.
    pub fn is_game_active(&self) -> bool {
        self.game_active
    }

    /// Whether the match accepts new games and score changes.
    pub fn is_match_active(&self) -> bool {
        self.match_active
    }

    /// Current tally.
    pub fn scores(&self) -> Scores {
        self.scores
    }
}
