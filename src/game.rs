use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::engine::{Board, Move, MoveOutcome, Tile, MAX_GRID, MIN_GRID};
use crate::scores::{now_unix_seconds, ScoreEntry, ScoreSink};

/// Controller lifecycle. `Ready` means no game has been started yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ready,
    Playing,
    GameOver,
}

/// State-change notification, delivered synchronously on commit, in order,
/// at most once per transition.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Tiles(Vec<Tile>),
    Score(u64),
    GameOver(bool),
}

/// Deep copy of tiles and score, retained to support exactly one undo.
struct Snapshot {
    tiles: Vec<Tile>,
    score: u64,
}

struct Inner {
    status: Status,
    board: Board,
    score: u64,
    undo: Option<Snapshot>,
    started_at: Option<Instant>,
    rng: SmallRng,
    subscribers: Vec<Sender<GameEvent>>,
    sink: Option<Arc<dyn ScoreSink>>,
}

impl Inner {
    fn emit(&mut self, event: GameEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Snapshot with transient flags normalized, so undo restores a clean
    /// tile set rather than the animation leftovers of the previous move.
    fn snapshot(&self) -> Snapshot {
        let tiles = self
            .board
            .tiles()
            .iter()
            .map(|t| Tile {
                is_new: false,
                is_merged: false,
                previous_pos: None,
                ..t.clone()
            })
            .collect();
        Snapshot {
            tiles,
            score: self.score,
        }
    }
}

/// The game state machine.
///
/// Cheaply cloneable; every clone shares the same state behind one lock, so
/// the move → spawn → terminal-check pipeline is atomic from any caller's
/// perspective and auto-player ticks serialize behind the same boundary.
///
/// ```
/// use auto_2048::game::Game;
///
/// let game = Game::with_seed(42);
/// game.start_game(4);
/// assert_eq!(game.tiles().len(), 2);
/// assert_eq!(game.score(), 0);
/// assert!(!game.undo());
/// ```
#[derive(Clone)]
pub struct Game {
    inner: Arc<Mutex<Inner>>,
}

impl Game {
    pub fn new() -> Self {
        Self::with_seed(rand::thread_rng().gen())
    }

    /// Deterministic spawns for a given seed.
    pub fn with_seed(seed: u64) -> Self {
        let inner = Inner {
            status: Status::Ready,
            board: Board::new(4),
            score: 0,
            undo: None,
            started_at: None,
            rng: SmallRng::seed_from_u64(seed),
            subscribers: Vec::new(),
            sink: None,
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("game state lock poisoned")
    }

    /// Attach the collaborator that receives a score record when a game
    /// ends. Its failures are logged and never touch game state.
    pub fn set_score_sink(&self, sink: Arc<dyn ScoreSink>) {
        self.lock().sink = Some(sink);
    }

    /// Start a fresh game: reset tiles, score and undo state, spawn two
    /// tiles. Valid from any state; sizes are clamped to the playable range.
    pub fn start_game(&self, size: u8) {
        let mut g = self.lock();
        g.board = Board::new(size.clamp(MIN_GRID, MAX_GRID));
        g.score = 0;
        g.undo = None;
        g.status = Status::Playing;
        g.started_at = Some(Instant::now());
        {
            let inner = &mut *g;
            let _ = inner.board.spawn_random_tile(&mut inner.rng);
            let _ = inner.board.spawn_random_tile(&mut inner.rng);
        }
        let tiles = g.board.tiles().to_vec();
        g.emit(GameEvent::Tiles(tiles));
        g.emit(GameEvent::Score(0));
        g.emit(GameEvent::GameOver(false));
    }

    /// Attempt a move. Returns false, leaving the game untouched, when no
    /// game is in progress or the move would not change the board; a failed
    /// attempt also drops any pending undo snapshot, since there is nothing
    /// new to undo back from.
    ///
    /// On success the score delta is committed, one tile spawns, and the
    /// terminal check runs; reaching a terminal board pushes a score record
    /// to the attached collaborator.
    pub fn try_move(&self, dir: Move) -> bool {
        let mut pending: Option<(Arc<dyn ScoreSink>, ScoreEntry)> = None;
        {
            let mut g = self.lock();
            if g.status != Status::Playing {
                return false;
            }
            let snapshot = g.snapshot();
            let mut next = g.board.clone();
            let outcome = next.shift(dir);
            if !outcome.changed {
                g.undo = None;
                return false;
            }
            g.undo = Some(snapshot);
            g.board = next;
            g.score += outcome.score_delta;
            {
                let inner = &mut *g;
                let _ = inner.board.spawn_random_tile(&mut inner.rng);
            }
            let terminal = g.board.is_game_over();
            let tiles = g.board.tiles().to_vec();
            let score = g.score;
            g.emit(GameEvent::Tiles(tiles));
            if outcome.score_delta > 0 {
                g.emit(GameEvent::Score(score));
            }
            if terminal {
                g.status = Status::GameOver;
                g.emit(GameEvent::GameOver(true));
                if let Some(sink) = g.sink.clone() {
                    let entry = ScoreEntry {
                        score: g.score,
                        grid_size: g.board.size(),
                        date: now_unix_seconds(),
                        duration_s: g.started_at.map(|t| t.elapsed().as_secs_f32()),
                        max_tile: g.board.highest_tile(),
                    };
                    pending = Some((sink, entry));
                }
            }
        }
        // Outside the lock: the collaborator must not be able to re-enter
        // or stall the state machine.
        if let Some((sink, entry)) = pending {
            if let Err(err) = sink.record(&entry) {
                log::warn!("score record dropped: {err}");
            }
        }
        true
    }

    /// Restore the pre-move tiles and score. Returns false when no snapshot
    /// is held (a second undo in a row always fails). Undoing out of a
    /// terminal state resurrects the game: the pre-move board necessarily
    /// had a legal move left.
    pub fn undo(&self) -> bool {
        let mut g = self.lock();
        let Some(snapshot) = g.undo.take() else {
            return false;
        };
        let was_over = g.status == Status::GameOver;
        g.board.set_tiles(snapshot.tiles);
        g.score = snapshot.score;
        g.status = Status::Playing;
        let tiles = g.board.tiles().to_vec();
        let score = g.score;
        g.emit(GameEvent::Tiles(tiles));
        g.emit(GameEvent::Score(score));
        if was_over {
            g.emit(GameEvent::GameOver(false));
        }
        true
    }

    /// Simulate a move without committing it. The auto-player's lookahead
    /// goes through this instead of touching tiles directly.
    pub fn preview(&self, dir: Move) -> MoveOutcome {
        let g = self.lock();
        if g.status != Status::Playing {
            return MoveOutcome::default();
        }
        let mut scratch = g.board.clone();
        scratch.shift(dir)
    }

    /// Register for state-change notifications. Dropped receivers are pruned
    /// on the next emission.
    pub fn subscribe(&self) -> Receiver<GameEvent> {
        let (tx, rx) = mpsc::channel();
        self.lock().subscribers.push(tx);
        rx
    }

    pub fn status(&self) -> Status {
        self.lock().status
    }

    pub fn score(&self) -> u64 {
        self.lock().score
    }

    pub fn grid_size(&self) -> u8 {
        self.lock().board.size()
    }

    pub fn is_game_over(&self) -> bool {
        self.lock().status == Status::GameOver
    }

    pub fn highest_tile(&self) -> u32 {
        self.lock().board.highest_tile()
    }

    /// Current tiles, cloned.
    pub fn tiles(&self) -> Vec<Tile> {
        self.lock().board.tiles().to_vec()
    }

    /// Row-major N×N snapshot for rendering: `grid[y][x]`.
    pub fn grid(&self) -> Vec<Vec<Option<Tile>>> {
        self.lock().board.grid()
    }

    #[cfg(test)]
    pub(crate) fn force_state(&self, board: Board, score: u64) {
        let mut g = self.lock();
        g.board = board;
        g.score = score;
        g.status = Status::Playing;
        g.undo = None;
        g.started_at = Some(Instant::now());
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lock().board)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scores::ScoreError;
    use std::sync::mpsc::TryRecvError;

    fn shape(tiles: &[Tile]) -> Vec<(u64, u32, u8, u8)> {
        let mut out: Vec<_> = tiles
            .iter()
            .map(|t| (t.id, t.value, t.pos.x, t.pos.y))
            .collect();
        out.sort_unstable();
        out
    }

    /// 3x3 board that is one Left away from a terminal position: the only
    /// pair is 2 2 at the bottom-left, and whatever spawns into the freed
    /// corner (2 or 4) has no equal neighbor.
    fn one_move_from_the_end() -> Board {
        let mut board = Board::new(3);
        let values = [[4, 8, 16], [32, 64, 128], [2, 2, 256]];
        for (y, row) in values.iter().enumerate() {
            for (x, &value) in row.iter().enumerate() {
                board.place(x as u8, y as u8, value);
            }
        }
        board
    }

    struct RecordingSink {
        entries: Mutex<Vec<ScoreEntry>>,
    }

    impl ScoreSink for RecordingSink {
        fn record(&self, entry: &ScoreEntry) -> Result<(), ScoreError> {
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }
    }

    struct FailingSink;

    impl ScoreSink for FailingSink {
        fn record(&self, _entry: &ScoreEntry) -> Result<(), ScoreError> {
            Err(ScoreError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "denied",
            )))
        }
    }

    #[test]
    fn start_game_spawns_two_distinct_tiles() {
        let game = Game::with_seed(11);
        game.start_game(4);
        let tiles = game.tiles();
        assert_eq!(tiles.len(), 2);
        assert_ne!(tiles[0].pos, tiles[1].pos);
        for tile in &tiles {
            assert!(tile.value == 2 || tile.value == 4);
        }
        assert_eq!(game.score(), 0);
        assert_eq!(game.status(), Status::Playing);
        let grid = game.grid();
        assert_eq!(grid.len(), 4);
        let occupied: usize = grid
            .iter()
            .map(|row| row.iter().filter(|cell| cell.is_some()).count())
            .sum();
        assert_eq!(occupied, 2);
    }

    #[test]
    fn grid_size_is_clamped_at_start() {
        let game = Game::with_seed(1);
        game.start_game(1);
        assert_eq!(game.grid_size(), 3);
        game.start_game(99);
        assert_eq!(game.grid_size(), 8);
    }

    #[test]
    fn move_is_rejected_before_any_game() {
        let game = Game::with_seed(1);
        assert!(!game.try_move(Move::Left));
        assert_eq!(game.status(), Status::Ready);
    }

    #[test]
    fn unchanged_move_returns_false_and_preserves_everything() {
        let game = Game::with_seed(5);
        let mut board = Board::new(4);
        board.place(0, 0, 2);
        board.place(1, 0, 4);
        board.place(2, 0, 2);
        game.force_state(board, 17);
        let before = game.tiles();
        assert!(!game.try_move(Move::Left));
        // Identical down to the transient flags: the attempt ran on a
        // scratch copy that was thrown away.
        assert_eq!(game.tiles(), before);
        assert_eq!(game.score(), 17);
        // The failed attempt also dropped any snapshot.
        assert!(!game.undo());
    }

    #[test]
    fn committed_move_merges_scores_and_spawns() {
        let game = Game::with_seed(5);
        let mut board = Board::new(4);
        board.place(0, 0, 2);
        board.place(1, 0, 2);
        game.force_state(board, 0);
        assert!(game.try_move(Move::Left));
        assert_eq!(game.score(), 4);
        let tiles = game.tiles();
        // Merged pair plus the freshly spawned tile.
        assert_eq!(tiles.len(), 2);
        assert!(tiles.iter().any(|t| t.value == 4 && t.pos.x == 0 && t.pos.y == 0));
        assert!(tiles.iter().any(|t| t.is_new));
    }

    #[test]
    fn undo_restores_tiles_and_score_exactly() {
        let game = Game::with_seed(5);
        let mut board = Board::new(4);
        board.place(0, 0, 2);
        board.place(1, 0, 2);
        game.force_state(board, 10);
        let before = shape(&game.tiles());
        assert!(game.try_move(Move::Left));
        assert!(game.undo());
        assert_eq!(shape(&game.tiles()), before);
        assert_eq!(game.score(), 10);
        assert_eq!(game.status(), Status::Playing);
    }

    #[test]
    fn undo_twice_in_a_row_fails_the_second_time() {
        let game = Game::with_seed(6);
        let mut board = Board::new(4);
        board.place(0, 0, 2);
        board.place(1, 0, 2);
        game.force_state(board, 0);
        assert!(game.try_move(Move::Left));
        assert!(game.undo());
        assert!(!game.undo());
    }

    #[test]
    fn finishing_move_ends_the_game_and_undo_resurrects_it() {
        let game = Game::with_seed(9);
        game.force_state(one_move_from_the_end(), 100);
        assert!(game.try_move(Move::Left));
        assert!(game.is_game_over());
        // Moves are rejected from the terminal state.
        assert!(!game.try_move(Move::Right));
        // The pre-move board still had the 2 2 pair, so undo revives play.
        assert!(game.undo());
        assert!(!game.is_game_over());
        assert_eq!(game.score(), 100);
        assert_eq!(game.tiles().len(), 9);
    }

    #[test]
    fn game_over_pushes_one_score_record() {
        let game = Game::with_seed(9);
        let sink = Arc::new(RecordingSink {
            entries: Mutex::new(Vec::new()),
        });
        game.set_score_sink(sink.clone());
        game.force_state(one_move_from_the_end(), 100);
        assert!(game.try_move(Move::Left));
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].score, 104);
        assert_eq!(entries[0].grid_size, 3);
        assert_eq!(entries[0].max_tile, 256);
        assert!(entries[0].duration_s.is_some());
    }

    #[test]
    fn failing_sink_does_not_corrupt_game_state() {
        let game = Game::with_seed(9);
        game.set_score_sink(Arc::new(FailingSink));
        game.force_state(one_move_from_the_end(), 100);
        assert!(game.try_move(Move::Left));
        assert!(game.is_game_over());
        assert_eq!(game.score(), 104);
    }

    #[test]
    fn preview_simulates_without_committing() {
        let game = Game::with_seed(5);
        let mut board = Board::new(4);
        board.place(0, 0, 2);
        board.place(1, 0, 2);
        game.force_state(board, 0);
        let before = shape(&game.tiles());
        let outcome = game.preview(Move::Left);
        assert!(outcome.changed);
        assert_eq!(outcome.score_delta, 4);
        assert_eq!(shape(&game.tiles()), before);
        assert_eq!(game.score(), 0);
    }

    #[test]
    fn notifications_arrive_in_order_at_most_once() {
        let game = Game::with_seed(5);
        let mut board = Board::new(4);
        board.place(0, 0, 2);
        board.place(1, 0, 2);
        game.force_state(board, 0);
        let events = game.subscribe();
        assert!(game.try_move(Move::Left));
        match events.try_recv() {
            Ok(GameEvent::Tiles(tiles)) => assert_eq!(tiles.len(), 2),
            other => panic!("expected tiles event first, got {other:?}"),
        }
        assert_eq!(events.try_recv(), Ok(GameEvent::Score(4)));
        // No terminal transition happened, so nothing else is delivered.
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let game = Game::with_seed(5);
        let events = game.subscribe();
        drop(events);
        let kept = game.subscribe();
        game.start_game(4);
        assert!(matches!(kept.try_recv(), Ok(GameEvent::Tiles(_))));
    }
}
