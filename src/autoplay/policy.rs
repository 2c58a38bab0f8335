use rand::Rng;

use super::Strategy;
use crate::engine::Move;
use crate::game::Game;

/// Priority order shared by the corner strategy and greedy tie-breaks.
const CORNER_ORDER: [Move; 4] = [Move::Right, Move::Down, Move::Left, Move::Up];

/// One decide-and-move cycle. When the chosen strategy fails to change the
/// board and `fallback` is set, a single random attempt backstops the tick.
pub(super) fn tick<R: Rng + ?Sized>(
    game: &Game,
    strategy: Strategy,
    rng: &mut R,
    fallback: bool,
) -> bool {
    let moved = match strategy {
        Strategy::Corner => corner_move(game),
        Strategy::Greedy => greedy_move(game),
        Strategy::Random => random_move(game, rng),
    };
    if moved {
        return true;
    }
    if fallback {
        random_move(game, rng)
    } else {
        false
    }
}

/// Try each direction in the fixed priority order until one changes the
/// board.
fn corner_move(game: &Game) -> bool {
    CORNER_ORDER.iter().any(|&dir| game.try_move(dir))
}

/// Simulate all four directions and commit the one with the largest
/// immediate score gain. Ties resolve to the first candidate in the corner
/// order, so a merge-less position degrades gracefully toward the corner
/// behavior.
fn greedy_move(game: &Game) -> bool {
    let mut best: Option<(Move, u64)> = None;
    for &dir in &CORNER_ORDER {
        let outcome = game.preview(dir);
        if !outcome.changed {
            continue;
        }
        match best {
            Some((_, gain)) if outcome.score_delta <= gain => {}
            _ => best = Some((dir, outcome.score_delta)),
        }
    }
    match best {
        Some((dir, _)) => game.try_move(dir),
        None => false,
    }
}

/// One uniformly random direction, attempted once.
fn random_move<R: Rng + ?Sized>(game: &Game, rng: &mut R) -> bool {
    let dir = Move::ALL[rng.gen_range(0..Move::ALL.len())];
    game.try_move(dir)
}
