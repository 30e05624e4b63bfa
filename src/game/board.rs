//! Board Engine
//!
//! Pure 3x3 board logic: applies marks, detects wins and draws.
//! No I/O, no clocks; deterministic by construction.

use serde::{Deserialize, Serialize};

/// Number of cells on the board.
pub const CELL_COUNT: usize = 9;

/// The eight winning triples, checked in fixed priority order.
///
/// A move is applied before evaluation and at most one mark changes per
/// call, so two patterns can never complete simultaneously for different
/// marks; first match wins.
pub const WIN_PATTERNS: [[usize; 3]; 8] = [
    // Rows
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    // Columns
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    // Diagonals
    [0, 4, 8],
    [2, 4, 6],
];

/// One of the two player marks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Mark {
    /// The host mark; always moves first.
    X,
    /// The guest mark.
    O,
}

impl Mark {
    /// The opposing mark.
    pub fn opponent(self) -> Mark {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

impl std::fmt::Display for Mark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mark::X => write!(f, "X"),
            Mark::O => write!(f, "O"),
        }
    }
}

/// Rejected move: the index is out of range or the cell is taken.
///
/// Never fatal; the board is left unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum IllegalMove {
    /// Cell index outside `0..CELL_COUNT`.
    #[error("Cell index {0} out of range")]
    OutOfRange(usize),

    /// Target cell already holds a mark.
    #[error("Cell {0} already occupied")]
    Occupied(usize),
}

/// Outcome of evaluating a board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    /// No winner yet and empty cells remain.
    InProgress,
    /// A mark completed a triple.
    Won {
        /// The winning mark.
        mark: Mark,
        /// The completed triple, as cell indices.
        line: [usize; 3],
    },
    /// All nine cells filled with no winner.
    Draw,
}

impl GameResult {
    /// Whether the game has concluded.
    pub fn is_over(&self) -> bool {
        !matches!(self, GameResult::InProgress)
    }
}

/// The 3x3 grid. Cells are row-major, index 0 at top-left.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    cells: [Option<Mark>; CELL_COUNT],
}

impl Board {
    /// An empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `mark` at `index`.
    ///
    /// Fails with [`IllegalMove`] on an out-of-range index or an occupied
    /// cell; the board is unchanged on failure.
    pub fn apply_move(&mut self, index: usize, mark: Mark) -> Result<(), IllegalMove> {
        let cell = self
            .cells
            .get_mut(index)
            .ok_or(IllegalMove::OutOfRange(index))?;
        if cell.is_some() {
            return Err(IllegalMove::Occupied(index));
        }
        *cell = Some(mark);
        Ok(())
    }

    /// Evaluate the board against the eight win patterns.
    pub fn evaluate(&self) -> GameResult {
        for line in WIN_PATTERNS {
            let [a, b, c] = line;
            if let Some(mark) = self.cells[a] {
                if self.cells[b] == Some(mark) && self.cells[c] == Some(mark) {
                    return GameResult::Won { mark, line };
                }
            }
        }

        if self.is_full() {
            GameResult::Draw
        } else {
            GameResult::InProgress
        }
    }

    /// The mark at `index`, if any. Out-of-range reads as empty.
    pub fn cell(&self, index: usize) -> Option<Mark> {
        self.cells.get(index).copied().flatten()
    }

    /// All nine cells, row-major.
    pub fn cells(&self) -> &[Option<Mark>; CELL_COUNT] {
        &self.cells
    }

    /// Whether every cell holds a mark.
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|c| c.is_some())
    }

    /// Number of marks on the board.
    pub fn mark_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn play(indices: &[usize]) -> Board {
        let mut board = Board::new();
        let mut mark = Mark::X;
        for &i in indices {
            board.apply_move(i, mark).unwrap();
            mark = mark.opponent();
        }
        board
    }

    #[test]
    fn test_empty_board_in_progress() {
        assert_eq!(Board::new().evaluate(), GameResult::InProgress);
    }

    #[test]
    fn test_top_row_win() {
        // X at 0, 1, 2; O at 3, 4
        let board = play(&[0, 3, 1, 4, 2]);
        assert_eq!(
            board.evaluate(),
            GameResult::Won {
                mark: Mark::X,
                line: [0, 1, 2]
            }
        );
    }

    #[test]
    fn test_column_and_diagonal_wins() {
        let board = play(&[0, 1, 3, 2, 6]);
        assert_eq!(
            board.evaluate(),
            GameResult::Won {
                mark: Mark::X,
                line: [0, 3, 6]
            }
        );

        let board = play(&[0, 1, 4, 2, 8]);
        assert_eq!(
            board.evaluate(),
            GameResult::Won {
                mark: Mark::X,
                line: [0, 4, 8]
            }
        );
    }

    #[test]
    fn test_full_board_draw() {
        let board = play(&[0, 1, 2, 4, 3, 5, 7, 6, 8]);
        assert_eq!(board.evaluate(), GameResult::Draw);
        assert!(board.is_full());
    }

    #[test]
    fn test_occupied_cell_rejected() {
        let mut board = Board::new();
        board.apply_move(4, Mark::X).unwrap();
        let before = board.clone();

        let err = board.apply_move(4, Mark::O).unwrap_err();
        assert_eq!(err, IllegalMove::Occupied(4));
        assert_eq!(board, before);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut board = Board::new();
        let before = board.clone();

        let err = board.apply_move(CELL_COUNT, Mark::X).unwrap_err();
        assert_eq!(err, IllegalMove::OutOfRange(CELL_COUNT));
        assert_eq!(board, before);
    }

    proptest! {
        /// Any prefix of a legal alternating game is InProgress until a
        /// triple completes or all nine cells fill.
        #[test]
        fn prop_in_progress_until_win_or_full(
            order in Just((0..CELL_COUNT).collect::<Vec<_>>()).prop_shuffle(),
        ) {
            let mut board = Board::new();
            let mut mark = Mark::X;
            for (n, &index) in order.iter().enumerate() {
                prop_assert_eq!(board.evaluate(), GameResult::InProgress);
                board.apply_move(index, mark).unwrap();
                mark = mark.opponent();

                match board.evaluate() {
                    GameResult::InProgress => {}
                    GameResult::Won { .. } => break,
                    GameResult::Draw => prop_assert_eq!(n, CELL_COUNT - 1),
                }
            }
        }

        /// Illegal moves never mutate the board.
        #[test]
        fn prop_illegal_move_leaves_board_unchanged(
            occupied in 0usize..CELL_COUNT,
            out_of_range in CELL_COUNT..64usize,
        ) {
            let mut board = Board::new();
            board.apply_move(occupied, Mark::X).unwrap();
            let before = board.clone();

            prop_assert!(board.apply_move(occupied, Mark::O).is_err());
            prop_assert!(board.apply_move(out_of_range, Mark::O).is_err());
            prop_assert_eq!(board, before);
        }
    }
}
