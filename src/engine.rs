use rand::Rng;
use std::fmt;

/// Smallest playable grid edge.
pub const MIN_GRID: u8 = 3;
/// Largest playable grid edge.
pub const MAX_GRID: u8 = 8;

/// A direction to slide/merge tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    pub const ALL: [Move; 4] = [Move::Up, Move::Down, Move::Left, Move::Right];

    /// Unit step toward the destination edge.
    fn delta(self) -> (i16, i16) {
        match self {
            Move::Up => (0, -1),
            Move::Down => (0, 1),
            Move::Left => (-1, 0),
            Move::Right => (1, 0),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Move::Up => "up",
            Move::Down => "down",
            Move::Left => "left",
            Move::Right => "right",
        };
        write!(f, "{name}")
    }
}

/// A 0-based cell coordinate. `x` is the column, `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pos {
    pub x: u8,
    pub y: u8,
}

/// A single numbered tile on the board.
///
/// `id` is unique for the lifetime of a game and only exists so renderers can
/// correlate tiles across moves; merge semantics never consult it. `is_new`
/// and `is_merged` are transient per-move flags, and `previous_pos` holds the
/// cell the tile occupied before the latest move attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub id: u64,
    pub value: u32,
    pub pos: Pos,
    pub is_new: bool,
    pub is_merged: bool,
    pub previous_pos: Option<Pos>,
}

/// What a single directional move did to the board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveOutcome {
    /// True iff any tile ended somewhere new or a merge occurred.
    pub changed: bool,
    /// Sum of the post-merge values of every tile merged by this move.
    pub score_delta: u64,
}

/// Sparse N×N board. Occupancy is derived by scanning the tile list; the
/// invariant that no two tiles share a cell is maintained by every mutation.
///
/// ```
/// use auto_2048::engine::Board;
/// use rand::{rngs::StdRng, SeedableRng};
///
/// let mut rng = StdRng::seed_from_u64(1);
/// let mut board = Board::new(4);
/// let tile = board.spawn_random_tile(&mut rng).unwrap();
/// assert!(tile.value == 2 || tile.value == 4);
/// assert_eq!(board.count_empty(), 15);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    size: u8,
    tiles: Vec<Tile>,
    next_id: u64,
}

impl Board {
    /// Create an empty board. Sizes outside [`MIN_GRID`]..=[`MAX_GRID`] are
    /// clamped, never rejected.
    pub fn new(size: u8) -> Self {
        Self {
            size: size.clamp(MIN_GRID, MAX_GRID),
            tiles: Vec::new(),
            next_id: 0,
        }
    }

    #[inline]
    pub fn size(&self) -> u8 {
        self.size
    }

    #[inline]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// The tile occupying `(x, y)`, if any. Linear scan over the tile list.
    pub fn tile_at(&self, x: u8, y: u8) -> Option<&Tile> {
        self.tiles.iter().find(|t| t.pos.x == x && t.pos.y == y)
    }

    fn tile_index_at(&self, x: u8, y: u8) -> Option<usize> {
        self.tiles.iter().position(|t| t.pos.x == x && t.pos.y == y)
    }

    pub fn count_empty(&self) -> usize {
        usize::from(self.size) * usize::from(self.size) - self.tiles.len()
    }

    /// Highest tile value on the board, or 0 when empty.
    pub fn highest_tile(&self) -> u32 {
        self.tiles.iter().map(|t| t.value).max().unwrap_or(0)
    }

    /// Row-major N×N snapshot for rendering: `grid[y][x]`.
    pub fn grid(&self) -> Vec<Vec<Option<Tile>>> {
        let n = usize::from(self.size);
        let mut rows = vec![vec![None; n]; n];
        for tile in &self.tiles {
            rows[usize::from(tile.pos.y)][usize::from(tile.pos.x)] = Some(tile.clone());
        }
        rows
    }

    /// Slide and merge every tile in `dir`, in place.
    ///
    /// Lines are processed starting from the cell nearest the destination
    /// edge and walking back toward the far edge, so each tile only has to be
    /// visited once: everything it could stack or merge against has already
    /// settled. A tile merges at most once per move, which is what keeps
    /// `2 2 2 2` collapsing to `4 4` rather than a single `8`.
    ///
    /// Transient flags are reset and `previous_pos` recorded for every tile
    /// at the start of the attempt, whether or not anything ends up moving.
    pub fn shift(&mut self, dir: Move) -> MoveOutcome {
        for tile in &mut self.tiles {
            tile.is_new = false;
            tile.is_merged = false;
            tile.previous_pos = Some(tile.pos);
        }

        let mut outcome = MoveOutcome::default();
        let n = self.size;
        match dir {
            Move::Up => {
                for x in 0..n {
                    for y in 1..n {
                        self.advance(Pos { x, y }, dir, &mut outcome);
                    }
                }
            }
            Move::Down => {
                for x in 0..n {
                    for y in (0..n - 1).rev() {
                        self.advance(Pos { x, y }, dir, &mut outcome);
                    }
                }
            }
            Move::Left => {
                for y in 0..n {
                    for x in 1..n {
                        self.advance(Pos { x, y }, dir, &mut outcome);
                    }
                }
            }
            Move::Right => {
                for y in 0..n {
                    for x in (0..n - 1).rev() {
                        self.advance(Pos { x, y }, dir, &mut outcome);
                    }
                }
            }
        }
        outcome
    }

    /// Walk the tile at `from` toward the destination edge one cell at a
    /// time: relocate through empty cells, merge into an equal-valued
    /// not-yet-merged tile, stop at anything else.
    fn advance(&mut self, from: Pos, dir: Move, outcome: &mut MoveOutcome) {
        let Some(idx) = self.tile_index_at(from.x, from.y) else {
            return;
        };
        let (dx, dy) = dir.delta();
        let limit = i16::from(self.size);
        let mut cx = i16::from(from.x) + dx;
        let mut cy = i16::from(from.y) + dy;
        while cx >= 0 && cx < limit && cy >= 0 && cy < limit {
            let target = Pos {
                x: cx as u8,
                y: cy as u8,
            };
            match self.tile_index_at(target.x, target.y) {
                None => {
                    self.tiles[idx].pos = target;
                    outcome.changed = true;
                    cx += dx;
                    cy += dy;
                }
                Some(other) => {
                    if self.tiles[other].value == self.tiles[idx].value
                        && !self.tiles[other].is_merged
                    {
                        let merged_value = self.tiles[other].value * 2;
                        self.tiles[other].value = merged_value;
                        self.tiles[other].is_merged = true;
                        self.tiles.swap_remove(idx);
                        outcome.changed = true;
                        outcome.score_delta += u64::from(merged_value);
                    }
                    return;
                }
            }
        }
    }

    /// Insert a 2 (90%) or 4 (10%) into a uniformly random empty cell.
    ///
    /// Returns the spawned tile, or `None` when the board is full. This is an
    /// immediate state transition: callers invoke it synchronously right
    /// after a move that changed the board.
    pub fn spawn_random_tile<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Tile> {
        let mut empty = Vec::with_capacity(self.count_empty());
        for y in 0..self.size {
            for x in 0..self.size {
                if self.tile_at(x, y).is_none() {
                    empty.push(Pos { x, y });
                }
            }
        }
        if empty.is_empty() {
            return None;
        }
        let pos = empty[rng.gen_range(0..empty.len())];
        let value = if rng.gen_range(0..10) < 9 { 2 } else { 4 };
        let tile = Tile {
            id: self.next_id,
            value,
            pos,
            is_new: true,
            is_merged: false,
            previous_pos: None,
        };
        self.next_id += 1;
        self.tiles.push(tile.clone());
        Some(tile)
    }

    /// Convenience: like `spawn_random_tile` but uses thread-local RNG.
    pub fn spawn_random_tile_thread(&mut self) -> Option<Tile> {
        let mut rng = rand::thread_rng();
        self.spawn_random_tile(&mut rng)
    }

    /// True iff every cell is occupied and no two 4-adjacent tiles share a
    /// value. Short-circuits on the first empty cell or equal pair.
    pub fn is_game_over(&self) -> bool {
        if self.count_empty() > 0 {
            return false;
        }
        for tile in &self.tiles {
            let Pos { x, y } = tile.pos;
            if x + 1 < self.size {
                if let Some(right) = self.tile_at(x + 1, y) {
                    if right.value == tile.value {
                        return false;
                    }
                }
            }
            if y + 1 < self.size {
                if let Some(below) = self.tile_at(x, y + 1) {
                    if below.value == tile.value {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Replace the tile set wholesale, keeping the id counter monotonic.
    pub(crate) fn set_tiles(&mut self, tiles: Vec<Tile>) {
        self.tiles = tiles;
    }

    #[cfg(test)]
    pub(crate) fn place(&mut self, x: u8, y: u8, value: u32) {
        debug_assert!(self.tile_at(x, y).is_none());
        let tile = Tile {
            id: self.next_id,
            value,
            pos: Pos { x, y },
            is_new: false,
            is_merged: false,
            previous_pos: None,
        };
        self.next_id += 1;
        self.tiles.push(tile);
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = "+------".repeat(usize::from(self.size)) + "+";
        for y in 0..self.size {
            writeln!(f, "{sep}")?;
            write!(f, "|")?;
            for x in 0..self.size {
                match self.tile_at(x, y) {
                    Some(tile) => write!(f, "{:^6}|", tile.value)?,
                    None => write!(f, "      |")?,
                }
            }
            writeln!(f)?;
        }
        write!(f, "{sep}")
    }
}
