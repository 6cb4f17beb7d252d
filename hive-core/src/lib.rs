//! Hive Core - Game engine and bot
//!
//! This crate provides the core logic for the Hive match server:
//! - Board geometry (hex grid with axial coordinates) and stacked cells
//! - Placement and movement rules (One-Hive, Freedom-to-Move, Queen opening)
//! - Match state machine with surround-based victory detection
//! - Position evaluation and alpha-beta bot

pub mod ai;
pub mod board;
pub mod eval;
pub mod game;
pub mod pieces;
pub mod rules;

// Re-exports for convenient access
pub use ai::{BotPlayer, DEFAULT_DEPTH};
pub use board::{Board, Hex, ParseHexError, BOARD_BOUND, DIRECTIONS};
pub use eval::{evaluate, WIN_VALUE};
pub use game::{Action, GameState, RuleError, Winner, QUEEN_DEADLINE_TURN};
pub use pieces::{Color, Hand, Piece, Species, SPECIES};
pub use rules::{piece_moves, valid_placements, ORIGIN};
