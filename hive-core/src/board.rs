//! Hex board geometry and the stacked-cell board

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use crate::pieces::{Color, Piece, Species};

/// Coordinate policy bound: |q| and |r| may not exceed this.
pub const BOARD_BOUND: i32 = 50;

/// Axial hex coordinates. The cube s coordinate is implicit: s = -q - r.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hex {
    pub q: i32,
    pub r: i32,
}

/// Direction vectors in axial coordinates (dq, dr), indexed 0..5.
/// Index 0 is the +q direction.
pub const DIRECTIONS: [(i32, i32); 6] = [(1, 0), (1, -1), (0, -1), (-1, 0), (-1, 1), (0, 1)];

impl Hex {
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// The implicit cube coordinate.
    pub fn s(&self) -> i32 {
        -self.q - self.r
    }

    /// Check against the coordinate policy bound.
    pub fn in_bounds(&self) -> bool {
        self.q.abs() <= BOARD_BOUND && self.r.abs() <= BOARD_BOUND
    }

    /// Get neighbour in direction (0-5)
    pub fn neighbor(&self, direction: u8) -> Hex {
        let (dq, dr) = DIRECTIONS[direction as usize % 6];
        Hex::new(self.q + dq, self.r + dr)
    }

    /// All six neighbours, in direction order.
    pub fn neighbors(&self) -> [Hex; 6] {
        let mut out = [*self; 6];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.neighbor(i as u8);
        }
        out
    }

    pub fn is_neighbor(&self, other: Hex) -> bool {
        let dq = other.q - self.q;
        let dr = other.r - self.r;
        DIRECTIONS.contains(&(dq, dr))
    }

    /// Distance between two hexes
    pub fn distance_to(&self, other: Hex) -> i32 {
        let dq = (self.q - other.q).abs();
        let dr = (self.r - other.r).abs();
        let ds = (self.s() - other.s()).abs();
        (dq + dr + ds) / 2
    }
}

impl fmt::Display for Hex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.q, self.r)
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("expected a coordinate of the form \"q,r\"")]
pub struct ParseHexError;

impl FromStr for Hex {
    type Err = ParseHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (q, r) = s.split_once(',').ok_or(ParseHexError)?;
        let q = q.trim().parse().map_err(|_| ParseHexError)?;
        let r = r.trim().parse().map_err(|_| ParseHexError)?;
        Ok(Hex::new(q, r))
    }
}

/// Sparse board: occupied coordinates mapped to non-empty piece stacks.
/// The last element of a stack is the top piece, the only one visible to
/// adjacency and placement queries.
#[derive(Clone, Debug, Default)]
pub struct Board {
    cells: FxHashMap<Hex, Vec<Piece>>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of occupied cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn get(&self, h: Hex) -> Option<&[Piece]> {
        self.cells.get(&h).map(Vec::as_slice)
    }

    pub fn is_occupied(&self, h: Hex) -> bool {
        self.cells.contains_key(&h)
    }

    pub fn top_at(&self, h: Hex) -> Option<&Piece> {
        self.cells.get(&h).and_then(|stack| stack.last())
    }

    pub fn stack_height(&self, h: Hex) -> usize {
        self.cells.get(&h).map_or(0, Vec::len)
    }

    pub fn push(&mut self, h: Hex, piece: Piece) {
        self.cells.entry(h).or_default().push(piece);
    }

    /// Remove and return the top piece; the cell disappears when emptied.
    pub fn pop_top(&mut self, h: Hex) -> Option<Piece> {
        let stack = self.cells.get_mut(&h)?;
        let piece = stack.pop();
        if stack.is_empty() {
            self.cells.remove(&h);
        }
        piece
    }

    /// Occupied coordinates, in no particular order.
    pub fn occupied(&self) -> impl Iterator<Item = Hex> + '_ {
        self.cells.keys().copied()
    }

    /// Top piece of every occupied cell.
    pub fn tops(&self) -> impl Iterator<Item = (Hex, &Piece)> {
        self.cells
            .iter()
            .filter_map(|(&h, stack)| stack.last().map(|p| (h, p)))
    }

    /// Full stacks, bottom to top.
    pub fn stacks(&self) -> impl Iterator<Item = (Hex, &[Piece])> {
        self.cells.iter().map(|(&h, stack)| (h, stack.as_slice()))
    }

    /// Locate a colour's Queen, wherever it sits in a stack.
    pub fn queen_cell(&self, color: Color) -> Option<Hex> {
        self.stacks().find_map(|(h, stack)| {
            stack
                .iter()
                .any(|p| p.species == Species::Queen && p.owner == color)
                .then_some(h)
        })
    }

    pub fn is_hive_connected(&self) -> bool {
        self.is_connected_ignoring(None)
    }

    /// Connectivity of the occupied set with one coordinate optionally
    /// removed. A fresh traversal every call: any move can change topology,
    /// so nothing here may be cached.
    pub fn is_connected_ignoring(&self, ignored: Option<Hex>) -> bool {
        let active: FxHashSet<Hex> = self
            .cells
            .keys()
            .copied()
            .filter(|&h| Some(h) != ignored)
            .collect();
        if active.len() <= 1 {
            return true;
        }

        let Some(&start) = active.iter().next() else {
            return true;
        };
        let mut visited = FxHashSet::default();
        visited.insert(start);
        let mut queue = VecDeque::from([start]);
        while let Some(h) = queue.pop_front() {
            for n in h.neighbors() {
                if active.contains(&n) && visited.insert(n) {
                    queue.push_back(n);
                }
            }
        }
        visited.len() == active.len()
    }
}
