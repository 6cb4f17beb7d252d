//! Placement legality and per-species movement generation

use rustc_hash::FxHashSet;
use std::collections::VecDeque;

use crate::board::{Board, Hex};
use crate::pieces::{Color, Species};

/// The very first piece of the game always lands here.
pub const ORIGIN: Hex = Hex::new(0, 0);

const SPIDER_STEPS: usize = 3;

/// Empty coordinates where `color` may place a new piece.
pub fn valid_placements(board: &Board, color: Color) -> FxHashSet<Hex> {
    let mut result = FxHashSet::default();

    if board.is_empty() {
        result.insert(ORIGIN);
        return result;
    }

    let has_pieces_down = board
        .stacks()
        .any(|(_, stack)| stack.iter().any(|p| p.owner == color));

    if !has_pieces_down {
        // Seeding the second colour: anywhere touching the hive.
        for cell in board.occupied() {
            for n in cell.neighbors() {
                if n.in_bounds() && !board.is_occupied(n) {
                    result.insert(n);
                }
            }
        }
        return result;
    }

    for cell in board.occupied() {
        for n in cell.neighbors() {
            if !n.in_bounds() || board.is_occupied(n) || result.contains(&n) {
                continue;
            }
            let mut own = false;
            let mut enemy = false;
            for nn in n.neighbors() {
                // Top-only: a Beetle stacked above an enemy base hides it.
                if let Some(top) = board.top_at(nn) {
                    if top.owner == color {
                        own = true;
                    } else {
                        enemy = true;
                    }
                }
            }
            if own && !enemy {
                result.insert(n);
            }
        }
    }
    result
}

/// Legal destinations for the piece on top of `from`. Empty when the cell is
/// empty or when lifting a singleton stack would split the hive.
pub fn piece_moves(board: &Board, from: Hex) -> Vec<Hex> {
    let Some(stack) = board.get(from) else {
        return Vec::new();
    };
    let Some(piece) = stack.last() else {
        return Vec::new();
    };

    // One-Hive pre-check. A stack taller than one keeps its base behind, so
    // lifting the top can never split the hive.
    if stack.len() == 1 && !board.is_connected_ignoring(Some(from)) {
        return Vec::new();
    }

    let lifted = Lifted {
        board,
        from,
        source_remains: stack.len() > 1,
    };

    let mut moves = match piece.species {
        Species::Queen => queen_moves(&lifted),
        Species::Ant => ant_moves(&lifted),
        Species::Spider => spider_moves(&lifted),
        Species::Beetle => beetle_moves(&lifted),
        Species::Grasshopper => grasshopper_moves(board, from),
    };
    moves.sort();
    moves.dedup();
    moves
}

/// Occupancy as seen while the moving piece hovers off its source cell.
struct Lifted<'a> {
    board: &'a Board,
    from: Hex,
    source_remains: bool,
}

impl Lifted<'_> {
    fn occupied(&self, h: Hex) -> bool {
        if h == self.from {
            self.source_remains
        } else {
            self.board.is_occupied(h)
        }
    }

    /// The destination must touch the hive once the mover has left home.
    fn has_contact(&self, h: Hex) -> bool {
        h.neighbors().into_iter().any(|n| self.occupied(n))
    }

    /// Freedom-to-Move gate: a ground-level step from `a` to `b` is blocked
    /// when both cells adjacent to both of them are occupied.
    fn can_slide(&self, a: Hex, b: Hex) -> bool {
        let pinch = a
            .neighbors()
            .into_iter()
            .filter(|&n| n.is_neighbor(b) && self.occupied(n))
            .count();
        pinch < 2
    }

    fn slide_step_ok(&self, a: Hex, b: Hex) -> bool {
        b.in_bounds() && !self.occupied(b) && self.can_slide(a, b) && self.has_contact(b)
    }
}

fn queen_moves(lifted: &Lifted) -> Vec<Hex> {
    lifted
        .from
        .neighbors()
        .into_iter()
        .filter(|&n| lifted.slide_step_ok(lifted.from, n))
        .collect()
}

/// Breadth-first exploration of every cell reachable by sliding around the
/// perimeter.
fn ant_moves(lifted: &Lifted) -> Vec<Hex> {
    let mut reachable = Vec::new();
    let mut visited = FxHashSet::default();
    visited.insert(lifted.from);
    let mut queue = VecDeque::from([lifted.from]);

    while let Some(cur) = queue.pop_front() {
        for n in cur.neighbors() {
            if !visited.contains(&n) && lifted.slide_step_ok(cur, n) {
                visited.insert(n);
                reachable.push(n);
                queue.push_back(n);
            }
        }
    }
    reachable
}

/// Distinct endpoints of all length-three sliding walks with no revisits.
fn spider_moves(lifted: &Lifted) -> Vec<Hex> {
    let mut out = FxHashSet::default();
    let mut path = vec![lifted.from];
    spider_walk(lifted, &mut path, &mut out);
    out.into_iter().collect()
}

fn spider_walk(lifted: &Lifted, path: &mut Vec<Hex>, out: &mut FxHashSet<Hex>) {
    let cur = path[path.len() - 1];
    if path.len() == SPIDER_STEPS + 1 {
        out.insert(cur);
        return;
    }
    for n in cur.neighbors() {
        if !path.contains(&n) && lifted.slide_step_ok(cur, n) {
            path.push(n);
            spider_walk(lifted, path, out);
            path.pop();
        }
    }
}

/// One step onto an empty cell (slide rules) or onto an occupied one (climb).
fn beetle_moves(lifted: &Lifted) -> Vec<Hex> {
    lifted
        .from
        .neighbors()
        .into_iter()
        .filter(|&n| {
            n.in_bounds()
                && if lifted.occupied(n) {
                    true
                } else {
                    lifted.can_slide(lifted.from, n) && lifted.has_contact(n)
                }
        })
        .collect()
}

/// Straight-line jump over one or more contiguous occupied cells to the
/// first empty cell beyond. A direction whose immediate neighbour is empty
/// yields no move.
fn grasshopper_moves(board: &Board, from: Hex) -> Vec<Hex> {
    let mut moves = Vec::new();
    for direction in 0..6u8 {
        let mut cur = from.neighbor(direction);
        if !board.is_occupied(cur) {
            continue;
        }
        while board.is_occupied(cur) {
            cur = cur.neighbor(direction);
        }
        if cur.in_bounds() {
            moves.push(cur);
        }
    }
    moves
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pieces::Piece;

    fn put(board: &mut Board, q: i32, r: i32, species: Species, owner: Color) {
        let id = board.stacks().map(|(_, s)| s.len() as u32).sum::<u32>() + 1;
        board.push(Hex::new(q, r), Piece { id, species, owner });
    }

    #[test]
    fn test_first_placement_is_origin() {
        let board = Board::new();
        let spots = valid_placements(&board, Color::White);
        assert_eq!(spots.len(), 1);
        assert!(spots.contains(&ORIGIN));
    }

    #[test]
    fn test_second_color_seeds_anywhere_adjacent() {
        let mut board = Board::new();
        put(&mut board, 0, 0, Species::Ant, Color::White);
        let spots = valid_placements(&board, Color::Black);
        assert_eq!(spots.len(), 6);
        for n in ORIGIN.neighbors() {
            assert!(spots.contains(&n));
        }
    }

    #[test]
    fn test_general_placement_avoids_enemy_contact() {
        let mut board = Board::new();
        put(&mut board, 0, 0, Species::Ant, Color::White);
        put(&mut board, 1, 0, Species::Ant, Color::Black);

        let spots = valid_placements(&board, Color::White);
        assert!(!spots.is_empty());
        for &h in &spots {
            assert!(!board.is_occupied(h));
            let touches_white = h
                .neighbors()
                .into_iter()
                .any(|n| board.top_at(n).is_some_and(|p| p.owner == Color::White));
            let touches_black = h
                .neighbors()
                .into_iter()
                .any(|n| board.top_at(n).is_some_and(|p| p.owner == Color::Black));
            assert!(touches_white && !touches_black);
        }
        // Cells hugging the black ant are out.
        assert!(!spots.contains(&Hex::new(2, 0)));
        assert!(!spots.contains(&Hex::new(1, 1)));
    }

    #[test]
    fn test_beetle_on_top_hides_base_color() {
        let mut board = Board::new();
        put(&mut board, 0, 0, Species::Queen, Color::Black);
        put(&mut board, 1, 0, Species::Ant, Color::White);
        // White beetle climbs onto the black queen.
        put(&mut board, 0, 0, Species::Beetle, Color::White);

        let spots = valid_placements(&board, Color::White);
        // (0,1) touches the stack at (0,0) whose visible top is white.
        assert!(spots.contains(&Hex::new(0, 1)));

        let black_spots = valid_placements(&board, Color::Black);
        // Black sees no black top anywhere: nothing to build from.
        assert!(black_spots.is_empty());
    }

    #[test]
    fn test_one_hive_precheck_pins_bridges() {
        let mut board = Board::new();
        put(&mut board, 0, 0, Species::Ant, Color::White);
        put(&mut board, 1, 0, Species::Queen, Color::White);
        put(&mut board, 2, 0, Species::Ant, Color::Black);

        // The middle queen is a bridge: lifting it splits the hive.
        assert!(piece_moves(&board, Hex::new(1, 0)).is_empty());
        // The ends are free.
        assert!(!piece_moves(&board, Hex::new(0, 0)).is_empty());
        assert!(!piece_moves(&board, Hex::new(2, 0)).is_empty());
    }

    #[test]
    fn test_queen_single_slide_step() {
        let mut board = Board::new();
        put(&mut board, 0, 0, Species::Queen, Color::White);
        put(&mut board, 1, 0, Species::Ant, Color::Black);

        let moves = piece_moves(&board, Hex::new(0, 0));
        // One step around the ant, staying in contact.
        assert_eq!(moves, vec![Hex::new(0, 1), Hex::new(1, -1)]);
    }

    #[test]
    fn test_freedom_to_move_gate() {
        // Queen at (0,1) wants (1,0); the pinching cells for that step are
        // (0,0) and (1,1). A chain through (1,-1),(2,-1),(2,0) keeps the
        // hive connected once the queen lifts off.
        let mut board = Board::new();
        put(&mut board, 0, 1, Species::Queen, Color::White);
        put(&mut board, 0, 0, Species::Ant, Color::Black);
        put(&mut board, 1, 1, Species::Ant, Color::Black);
        put(&mut board, 1, -1, Species::Ant, Color::White);
        put(&mut board, 2, -1, Species::Spider, Color::White);
        put(&mut board, 2, 0, Species::Spider, Color::Black);

        let gated = piece_moves(&board, Hex::new(0, 1));
        assert!(
            !gated.contains(&Hex::new(1, 0)),
            "both pinch cells occupied, slide must be blocked"
        );

        // Open one pinch cell and the same step becomes legal.
        board.pop_top(Hex::new(1, 1));
        let open = piece_moves(&board, Hex::new(0, 1));
        assert!(open.contains(&Hex::new(1, 0)));
    }

    #[test]
    fn test_ant_walks_whole_perimeter() {
        let mut board = Board::new();
        put(&mut board, 0, 0, Species::Ant, Color::White);
        put(&mut board, 1, 0, Species::Queen, Color::White);
        put(&mut board, 2, 0, Species::Ant, Color::Black);

        let moves = piece_moves(&board, Hex::new(0, 0));
        let expected = [
            Hex::new(1, -1),
            Hex::new(2, -1),
            Hex::new(3, -1),
            Hex::new(3, 0),
            Hex::new(2, 1),
            Hex::new(1, 1),
            Hex::new(0, 1),
        ];
        assert_eq!(moves.len(), expected.len());
        for h in expected {
            assert!(moves.contains(&h), "ant should reach {h}");
        }
    }

    #[test]
    fn test_spider_exactly_three_steps() {
        let mut board = Board::new();
        put(&mut board, 0, 0, Species::Spider, Color::White);
        put(&mut board, 1, 0, Species::Queen, Color::White);
        put(&mut board, 2, 0, Species::Ant, Color::Black);

        let mut moves = piece_moves(&board, Hex::new(0, 0));
        moves.sort();
        let mut expected = vec![Hex::new(3, -1), Hex::new(2, 1)];
        expected.sort();
        assert_eq!(moves, expected);
    }

    #[test]
    fn test_beetle_climbs_and_slides() {
        let mut board = Board::new();
        put(&mut board, 0, 0, Species::Beetle, Color::White);
        put(&mut board, 1, 0, Species::Queen, Color::Black);

        let moves = piece_moves(&board, Hex::new(0, 0));
        // Climb onto the queen, or slide around it.
        assert!(moves.contains(&Hex::new(1, 0)));
        assert!(moves.contains(&Hex::new(0, 1)));
        assert!(moves.contains(&Hex::new(1, -1)));
        assert_eq!(moves.len(), 3);
    }

    #[test]
    fn test_beetle_steps_off_stack_freely() {
        let mut board = Board::new();
        put(&mut board, 0, 0, Species::Queen, Color::Black);
        put(&mut board, 1, 0, Species::Ant, Color::Black);
        put(&mut board, 0, 0, Species::Beetle, Color::White);

        let moves = piece_moves(&board, Hex::new(0, 0));
        // All six neighbours: climbing onto the ant or dropping to ground
        // level, which always keeps contact with the cell it just left.
        assert_eq!(moves.len(), 6);
    }

    #[test]
    fn test_grasshopper_jump() {
        let mut board = Board::new();
        put(&mut board, 0, 0, Species::Grasshopper, Color::White);
        put(&mut board, 1, 0, Species::Ant, Color::White);
        put(&mut board, 2, 0, Species::Queen, Color::Black);

        let moves = piece_moves(&board, Hex::new(0, 0));
        // Over the two occupied cells in the +q direction, landing at (3,0).
        assert_eq!(moves, vec![Hex::new(3, 0)]);
    }
}
