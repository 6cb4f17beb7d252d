//! Position evaluation for the resident bot

use crate::board::{Board, Hex};
use crate::game::{GameState, Winner};
use crate::pieces::{Color, Species};

/// Win value (effectively infinite)
pub const WIN_VALUE: f32 = 100_000.0;

const MATERIAL_SCALE: f32 = 0.8;
const QUEEN_AIR_WEIGHT: f32 = 40.0;
const QUEEN_SURROUNDED_VALUE: f32 = 2000.0;
const QUEEN_UNPLACED_PENALTY: f32 = 150.0;
const ENEMY_QUEEN_PRESSURE_WEIGHT: f32 = 70.0;
const MOBILITY_WEIGHT: f32 = 3.0;
const STUCK_WEIGHT: f32 = 40.0;
const SPLIT_HIVE_PENALTY: f32 = 1000.0;
const QUEEN_PROXIMITY_WEIGHT: f32 = 5.0;
const QUEEN_PROXIMITY_HORIZON: i32 = 10;

fn material_weight(species: Species) -> f32 {
    match species {
        Species::Queen => 1000.0,
        Species::Ant => 200.0,
        Species::Beetle => 180.0,
        Species::Spider => 150.0,
        Species::Grasshopper => 120.0,
    }
}

fn empty_neighbors(board: &Board, h: Hex) -> usize {
    h.neighbors()
        .into_iter()
        .filter(|&n| !board.is_occupied(n))
        .count()
}

fn occupied_neighbors(board: &Board, h: Hex) -> usize {
    6 - empty_neighbors(board, h)
}

/// Evaluate a position from the bot's perspective. The terms are
/// deliberately asymmetric (own queen air versus enemy queen pressure), so
/// this is not a negamax-style score.
pub fn evaluate(state: &GameState, bot: Color) -> f32 {
    if let Some(winner) = state.winner {
        return match winner {
            Winner::Draw => 0.0,
            w => {
                if w == Winner::from(bot) {
                    WIN_VALUE
                } else {
                    -WIN_VALUE
                }
            }
        };
    }

    let board = &state.board;
    let opponent = bot.opponent();
    let mut score = 0.0f32;

    // Material over visible tops; a climbing Beetle hides what it covers.
    for (_, piece) in board.tops() {
        let value = material_weight(piece.species) * MATERIAL_SCALE;
        if piece.owner == bot {
            score += value;
        } else {
            score -= value;
        }
    }

    // Own queen safety.
    match board.queen_cell(bot) {
        Some(cell) => {
            if state.queen_surrounded(bot) {
                score -= QUEEN_SURROUNDED_VALUE;
            } else {
                score += QUEEN_AIR_WEIGHT * empty_neighbors(board, cell) as f32;
            }
        }
        None => score -= QUEEN_UNPLACED_PENALTY,
    }

    // Pressure on the enemy queen.
    if let Some(cell) = board.queen_cell(opponent) {
        score += ENEMY_QUEEN_PRESSURE_WEIGHT * occupied_neighbors(board, cell) as f32;
        if state.queen_surrounded(opponent) {
            score += QUEEN_SURROUNDED_VALUE;
        }
    }

    // Breathing room and stuck pieces.
    let mut own_air = 0i32;
    let mut enemy_air = 0i32;
    let mut own_stuck = 0i32;
    let mut enemy_stuck = 0i32;
    for (cell, piece) in board.tops() {
        let air = empty_neighbors(board, cell) as i32;
        if piece.owner == bot {
            own_air += air;
            own_stuck += (air == 0) as i32;
        } else {
            enemy_air += air;
            enemy_stuck += (air == 0) as i32;
        }
    }
    score += MOBILITY_WEIGHT * (own_air - enemy_air) as f32;
    score += STUCK_WEIGHT * (enemy_stuck - own_stuck) as f32;

    // A split hive can only mean a corrupted search state.
    if !board.is_hive_connected() {
        score -= SPLIT_HIVE_PENALTY;
    }

    // Reward closing in on the enemy queen once both are down.
    if let (Some(own), Some(enemy)) = (board.queen_cell(bot), board.queen_cell(opponent)) {
        let closeness = (QUEEN_PROXIMITY_HORIZON - own.distance_to(enemy)).max(0);
        score += QUEEN_PROXIMITY_WEIGHT * closeness as f32;
    }

    score
}
