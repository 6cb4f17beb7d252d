//! Match state machine: turns, hands, actions, and victory detection

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::board::{Board, Hex};
use crate::pieces::{Color, Hand, Piece, Species, SPECIES};
use crate::rules;

/// A player must have placed their Queen by this personal turn.
pub const QUEEN_DEADLINE_TURN: u32 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Winner {
    White,
    Black,
    Draw,
}

impl From<Color> for Winner {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Winner::White,
            Color::Black => Winner::Black,
        }
    }
}

/// An action a player can commit on their turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Place { species: Species, at: Hex },
    Move { from: Hex, to: Hex },
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("the match is already decided")]
    MatchOver,
    #[error("it is not {0}'s turn")]
    NotYourTurn(Color),
    #[error("coordinate out of bounds")]
    OutOfBounds,
    #[error("no {0} left in hand")]
    EmptyHand(Species),
    #[error("that cell is not a legal placement")]
    IllegalPlacement,
    #[error("the Queen must be placed by the fourth turn")]
    QueenOverdue,
    #[error("no moving before the Queen is placed")]
    QueenNotPlaced,
    #[error("no piece at the source cell")]
    EmptySource,
    #[error("the top piece at the source is not yours")]
    NotYourPiece,
    #[error("that destination is not reachable")]
    IllegalMove,
}

/// Full game state. Cheap to clone, which is how the bot searches:
/// clone, apply, evaluate.
#[derive(Clone, Debug)]
pub struct GameState {
    pub board: Board,
    hands: [Hand; 2],
    pub turn_number: u32,
    pub current: Color,
    pub winner: Option<Winner>,
    next_piece_id: u32,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            board: Board::new(),
            hands: [Hand::new(), Hand::new()],
            turn_number: 1,
            current: Color::White,
            winner: None,
            next_piece_id: 1,
        }
    }

    pub fn hand(&self, color: Color) -> &Hand {
        &self.hands[color.index()]
    }

    pub fn queen_placed(&self, color: Color) -> bool {
        self.hand(color).queen_placed()
    }

    /// Personal turn index of the side to move.
    pub fn personal_turn(&self) -> u32 {
        (self.turn_number + 1) / 2
    }

    /// On the fourth personal turn with the Queen still in hand, placing her
    /// is the only legal action.
    pub fn must_place_queen(&self) -> bool {
        !self.queen_placed(self.current) && self.personal_turn() >= QUEEN_DEADLINE_TURN
    }

    /// Validate and commit an action for `color`. Nothing changes on `Err`.
    pub fn play(&mut self, color: Color, action: Action) -> Result<(), RuleError> {
        if self.winner.is_some() {
            return Err(RuleError::MatchOver);
        }
        if color != self.current {
            return Err(RuleError::NotYourTurn(color));
        }

        match action {
            Action::Place { species, at } => {
                if !at.in_bounds() {
                    return Err(RuleError::OutOfBounds);
                }
                if self.hand(color).count(species) == 0 {
                    return Err(RuleError::EmptyHand(species));
                }
                if self.must_place_queen() && species != Species::Queen {
                    return Err(RuleError::QueenOverdue);
                }
                if !rules::valid_placements(&self.board, color).contains(&at) {
                    return Err(RuleError::IllegalPlacement);
                }

                self.hands[color.index()].take(species);
                let piece = Piece {
                    id: self.next_piece_id,
                    species,
                    owner: color,
                };
                self.next_piece_id += 1;
                self.board.push(at, piece);
            }
            Action::Move { from, to } => {
                if !from.in_bounds() || !to.in_bounds() {
                    return Err(RuleError::OutOfBounds);
                }
                if !self.queen_placed(color) {
                    return Err(RuleError::QueenNotPlaced);
                }
                let top = self.board.top_at(from).ok_or(RuleError::EmptySource)?;
                if top.owner != color {
                    return Err(RuleError::NotYourPiece);
                }
                if !rules::piece_moves(&self.board, from).contains(&to) {
                    return Err(RuleError::IllegalMove);
                }

                if let Some(piece) = self.board.pop_top(from) {
                    self.board.push(to, piece);
                }
            }
        }

        self.commit();
        Ok(())
    }

    /// Commit a pass on behalf of the side to move (clock expiry, or a bot
    /// with nothing to do). The board and hands are untouched.
    pub fn pass(&mut self) {
        if self.winner.is_none() {
            self.current = self.current.opponent();
            self.turn_number += 1;
        }
    }

    /// Concede: the opponent wins on the spot.
    pub fn forfeit(&mut self, loser: Color) {
        if self.winner.is_none() {
            self.winner = Some(loser.opponent().into());
        }
    }

    /// Abandon a corrupted match. Used when an internal invariant breaks.
    pub fn declare_draw(&mut self) {
        self.winner = Some(Winner::Draw);
    }

    fn commit(&mut self) {
        self.check_victory();
        if self.winner.is_none() {
            self.current = self.current.opponent();
            self.turn_number += 1;
        }
    }

    /// Runs after every committed action, before the turn flips.
    fn check_victory(&mut self) {
        let white_surrounded = self.queen_surrounded(Color::White);
        let black_surrounded = self.queen_surrounded(Color::Black);
        self.winner = match (white_surrounded, black_surrounded) {
            // The mover caused the double surround and therefore loses.
            (true, true) => Some(self.current.opponent().into()),
            (true, false) => Some(Winner::Black),
            (false, true) => Some(Winner::White),
            (false, false) => None,
        };
    }

    /// All six neighbour cells occupied, whoever owns their tops. A Beetle
    /// stacked on the Queen's own cell does not count.
    pub fn queen_surrounded(&self, color: Color) -> bool {
        match self.board.queen_cell(color) {
            Some(cell) => cell
                .neighbors()
                .into_iter()
                .all(|n| self.board.is_occupied(n)),
            None => false,
        }
    }

    /// Pieces of a colour anywhere on the board, buried ones included.
    pub fn pieces_on_board(&self, color: Color) -> usize {
        self.board
            .stacks()
            .map(|(_, stack)| stack.iter().filter(|p| p.owner == color).count())
            .sum()
    }

    /// The full action space for the side to move: every placement the
    /// opening constraint allows plus every move of an owned top piece.
    /// This is the bot's branching set.
    pub fn legal_actions(&self) -> Vec<Action> {
        if self.winner.is_some() {
            return Vec::new();
        }
        let color = self.current;
        let mut actions = Vec::new();

        let mut spots: Vec<Hex> = rules::valid_placements(&self.board, color)
            .into_iter()
            .collect();
        spots.sort();
        for species in SPECIES {
            if self.hand(color).count(species) == 0 {
                continue;
            }
            if self.must_place_queen() && species != Species::Queen {
                continue;
            }
            for &at in &spots {
                actions.push(Action::Place { species, at });
            }
        }

        if self.queen_placed(color) {
            let mut own: Vec<Hex> = self
                .board
                .tops()
                .filter(|(_, p)| p.owner == color)
                .map(|(h, _)| h)
                .collect();
            own.sort();
            for from in own {
                for to in rules::piece_moves(&self.board, from) {
                    actions.push(Action::Move { from, to });
                }
            }
        }

        actions
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(state: &mut GameState, species: Species, q: i32, r: i32) {
        let color = state.current;
        state
            .play(
                color,
                Action::Place {
                    species,
                    at: Hex::new(q, r),
                },
            )
            .unwrap();
    }

    #[test]
    fn test_opening_two_moves() {
        let mut state = GameState::new();
        place(&mut state, Species::Queen, 0, 0);
        place(&mut state, Species::Queen, 1, 0);

        assert_eq!(state.board.len(), 2);
        assert_eq!(state.turn_number, 3);
        assert_eq!(state.current, Color::White);
        assert!(state.winner.is_none());
    }

    #[test]
    fn test_turn_alternation() {
        let mut state = GameState::new();
        assert_eq!(state.current, Color::White);
        place(&mut state, Species::Ant, 0, 0);
        assert_eq!((state.turn_number, state.current), (2, Color::Black));
        place(&mut state, Species::Ant, 1, 0);
        assert_eq!((state.turn_number, state.current), (3, Color::White));
        state.pass();
        assert_eq!((state.turn_number, state.current), (4, Color::Black));
    }

    #[test]
    fn test_wrong_color_rejected() {
        let mut state = GameState::new();
        let err = state.play(
            Color::Black,
            Action::Place {
                species: Species::Ant,
                at: Hex::new(0, 0),
            },
        );
        assert_eq!(err, Err(RuleError::NotYourTurn(Color::Black)));
    }

    #[test]
    fn test_queen_opening_enforced() {
        let mut state = GameState::new();
        // Three White placements without the Queen, Black mirroring.
        place(&mut state, Species::Ant, 0, 0); // W 1
        place(&mut state, Species::Ant, 1, 0); // B 1
        place(&mut state, Species::Ant, -1, 0); // W 2
        place(&mut state, Species::Ant, 2, 0); // B 2
        place(&mut state, Species::Ant, -2, 0); // W 3
        place(&mut state, Species::Ant, 3, 0); // B 3

        // White's fourth personal turn: only the Queen goes down.
        assert!(state.must_place_queen());
        let err = state.play(
            Color::White,
            Action::Place {
                species: Species::Spider,
                at: Hex::new(-3, 0),
            },
        );
        assert_eq!(err, Err(RuleError::QueenOverdue));

        place(&mut state, Species::Queen, -3, 0);
        assert!(state.queen_placed(Color::White));
    }

    #[test]
    fn test_no_moves_before_queen() {
        let mut state = GameState::new();
        place(&mut state, Species::Ant, 0, 0);
        place(&mut state, Species::Queen, 1, 0);

        let err = state.play(
            Color::White,
            Action::Move {
                from: Hex::new(0, 0),
                to: Hex::new(0, 1),
            },
        );
        assert_eq!(err, Err(RuleError::QueenNotPlaced));

        // And the bot's action space agrees: placements only.
        for action in state.legal_actions() {
            assert!(matches!(action, Action::Place { .. }));
        }
    }

    #[test]
    fn test_rejection_leaves_state_untouched() {
        let mut state = GameState::new();
        place(&mut state, Species::Queen, 0, 0);

        let before_turn = state.turn_number;
        let before_cells = state.board.len();
        let err = state.play(
            Color::Black,
            Action::Place {
                species: Species::Ant,
                at: Hex::new(40, 40),
            },
        );
        assert!(err.is_err());
        assert_eq!(state.turn_number, before_turn);
        assert_eq!(state.board.len(), before_cells);
    }

    fn raw(state: &mut GameState, q: i32, r: i32, species: Species, owner: Color) {
        let piece = Piece {
            id: state.next_piece_id,
            species,
            owner,
        };
        state.next_piece_id += 1;
        state.board.push(Hex::new(q, r), piece);
    }

    /// Black Queen ringed on five sides, a White Beetle hiding its colour
    /// from the placement check; White drops the last piece into the gap.
    fn one_gap_position() -> GameState {
        let mut state = GameState::new();
        raw(&mut state, 0, 0, Species::Queen, Color::Black);
        raw(&mut state, 0, 0, Species::Beetle, Color::White);
        raw(&mut state, 1, 0, Species::Ant, Color::White);
        raw(&mut state, 1, -1, Species::Ant, Color::Black);
        raw(&mut state, 0, -1, Species::Spider, Color::Black);
        raw(&mut state, -1, 0, Species::Grasshopper, Color::Black);
        raw(&mut state, -1, 1, Species::Spider, Color::White);
        raw(&mut state, 1, 1, Species::Queen, Color::White);
        state
    }

    #[test]
    fn test_victory_by_surround() {
        let mut state = one_gap_position();
        state
            .play(
                Color::White,
                Action::Place {
                    species: Species::Ant,
                    at: Hex::new(0, 1),
                },
            )
            .unwrap();
        assert_eq!(state.winner, Some(Winner::White));
        // Terminal: the turn no longer advances.
        let turn = state.turn_number;
        assert_eq!(
            state.play(
                Color::Black,
                Action::Place {
                    species: Species::Ant,
                    at: Hex::new(5, 5),
                },
            ),
            Err(RuleError::MatchOver)
        );
        assert_eq!(state.turn_number, turn);
    }

    #[test]
    fn test_buried_queen_still_found() {
        let state = one_gap_position();
        // The Black Queen sits under a White Beetle but is still located.
        assert_eq!(state.board.queen_cell(Color::Black), Some(Hex::new(0, 0)));
        assert!(!state.queen_surrounded(Color::Black));
    }

    /// Both Queens share the last open cell between them; the mover who
    /// fills it surrounds both and loses.
    #[test]
    fn test_double_surround_loses_for_mover() {
        let mut state = GameState::new();
        raw(&mut state, 0, 0, Species::Queen, Color::White);
        raw(&mut state, 1, 0, Species::Queen, Color::Black);
        // Remaining neighbours of both queens, except the shared gap (0,1).
        raw(&mut state, 1, -1, Species::Ant, Color::White);
        raw(&mut state, 0, -1, Species::Ant, Color::Black);
        raw(&mut state, -1, 0, Species::Ant, Color::White);
        raw(&mut state, -1, 1, Species::Ant, Color::Black);
        raw(&mut state, 2, 0, Species::Spider, Color::White);
        raw(&mut state, 2, -1, Species::Spider, Color::Black);
        raw(&mut state, 1, 1, Species::Grasshopper, Color::Black);
        // A white beetle within one step of the gap.
        raw(&mut state, 0, 2, Species::Beetle, Color::White);

        state
            .play(
                Color::White,
                Action::Move {
                    from: Hex::new(0, 2),
                    to: Hex::new(0, 1),
                },
            )
            .unwrap();
        // White moved, both queens are now surrounded: Black wins.
        assert_eq!(state.winner, Some(Winner::Black));
    }

    #[test]
    fn test_forfeit() {
        let mut state = GameState::new();
        state.forfeit(Color::White);
        assert_eq!(state.winner, Some(Winner::Black));
    }

    #[test]
    fn test_hand_conservation() {
        let mut state = GameState::new();
        place(&mut state, Species::Queen, 0, 0);
        place(&mut state, Species::Queen, 1, 0);
        place(&mut state, Species::Ant, -1, 0);
        place(&mut state, Species::Beetle, 2, 0);

        for color in [Color::White, Color::Black] {
            let total = state.hand(color).total() as usize + state.pieces_on_board(color);
            assert_eq!(total, 11);
        }
    }

    #[test]
    fn test_legal_actions_respect_queen_deadline() {
        let mut state = GameState::new();
        place(&mut state, Species::Ant, 0, 0);
        place(&mut state, Species::Ant, 1, 0);
        place(&mut state, Species::Ant, -1, 0);
        place(&mut state, Species::Ant, 2, 0);
        place(&mut state, Species::Spider, -2, 0);
        place(&mut state, Species::Ant, 3, 0);

        assert!(state.must_place_queen());
        let actions = state.legal_actions();
        assert!(!actions.is_empty());
        for action in actions {
            assert!(matches!(
                action,
                Action::Place {
                    species: Species::Queen,
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_moves_preserve_connectivity() {
        let mut state = GameState::new();
        place(&mut state, Species::Queen, 0, 0);
        place(&mut state, Species::Queen, 1, 0);
        place(&mut state, Species::Ant, -1, 0);
        place(&mut state, Species::Ant, 2, 0);

        // Exercise every legal move from this position; the hive must hold.
        let actions = state.legal_actions();
        for action in actions {
            if let Action::Move { .. } = action {
                let mut clone = state.clone();
                let mover = clone.current;
                clone.play(mover, action).unwrap();
                assert!(clone.board.is_hive_connected());
            }
        }
    }
}
