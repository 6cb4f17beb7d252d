//! Wire protocol: typed client messages in, full state snapshots out
//!
//! Coordinates travel as `"q,r"` strings; enums use their UPPERCASE names.

use hive_core::{Board, Color, Hex, Species, Winner};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything a session may send.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinAsHuman { name: String },
    JoinVsBot { name: String },
    GameAction { action: WireAction },
    Forfeit,
}

/// The payload of a `game_action` frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WireAction {
    #[serde(rename = "PLACE")]
    Place {
        piece: WirePiece,
        hex: String,
        #[serde(rename = "hexObj", default, skip_serializing_if = "Option::is_none")]
        hex_obj: Option<WireHex>,
    },
    #[serde(rename = "MOVE")]
    Move { from: String, to: String },
    #[serde(rename = "FORFEIT")]
    Forfeit,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WirePiece {
    #[serde(rename = "type")]
    pub species: Species,
    pub color: Color,
}

/// Redundant cube form of a coordinate; cross-checked when present.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireHex {
    pub q: i32,
    pub r: i32,
    pub s: i32,
}

impl From<Hex> for WireHex {
    fn from(h: Hex) -> Self {
        Self {
            q: h.q,
            r: h.r,
            s: h.s(),
        }
    }
}

impl WireHex {
    pub fn matches(&self, h: Hex) -> bool {
        self.q == h.q && self.r == h.r && self.q + self.r + self.s == 0
    }
}

/// Everything the server sends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Snapshot(Snapshot),
    Error { message: String },
}

/// Full, idempotent view of the match. Broadcast after every commit; a
/// reconnecting client resumes from the most recent one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub board: Vec<(String, CellView)>,
    pub players: SeatsView,
    pub queue: Vec<String>,
    #[serde(rename = "turnNumber")]
    pub turn_number: u32,
    #[serde(rename = "currentPlayer")]
    pub current_player: Color,
    pub winner: Option<Winner>,
    pub log: Vec<String>,
    #[serde(rename = "timeLeft")]
    pub time_left: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellView {
    pub hex: WireHex,
    pub stack: Vec<PieceView>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PieceView {
    pub id: u32,
    #[serde(rename = "type")]
    pub species: Species,
    pub color: Color,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeatsView {
    #[serde(rename = "WHITE")]
    pub white: Option<SeatView>,
    #[serde(rename = "BLACK")]
    pub black: Option<SeatView>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeatView {
    pub id: u64,
    pub nickname: String,
    pub hand: BTreeMap<Species, u8>,
    pub wins: u32,
    #[serde(rename = "isBot", default, skip_serializing_if = "Option::is_none")]
    pub is_bot: Option<bool>,
}

/// The board as an ordered sequence of ("q,r", stack) pairs.
pub fn board_view(board: &Board) -> Vec<(String, CellView)> {
    let mut cells: Vec<Hex> = board.occupied().collect();
    cells.sort();
    cells
        .into_iter()
        .map(|h| {
            let stack = board
                .get(h)
                .unwrap_or_default()
                .iter()
                .map(|p| PieceView {
                    id: p.id,
                    species: p.species,
                    color: p.owner,
                })
                .collect();
            (
                h.to_string(),
                CellView {
                    hex: h.into(),
                    stack,
                },
            )
        })
        .collect()
}
