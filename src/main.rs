use std::sync::Arc;
use std::time::{Duration, Instant};

use auto_2048::autoplay::{AutoPlayer, Strategy};
use auto_2048::game::{Game, GameEvent};
use auto_2048::scores::JsonScoreStore;
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "auto2048", about = "Watch the auto-player run a board to game over")]
struct Args {
    /// Grid size (clamped to 3..=8)
    #[arg(long, default_value_t = 4)]
    size: u8,

    /// Strategy: corner, greedy or random
    #[arg(long, default_value_t = Strategy::Corner)]
    strategy: Strategy,

    /// Milliseconds between auto-player moves
    #[arg(long, default_value_t = 150)]
    interval_ms: u64,

    /// Stop after this many moves
    #[arg(long)]
    steps: Option<u64>,

    /// Print the board after every move
    #[arg(long)]
    watch: bool,

    /// Record the final score into this JSON score book
    #[arg(long)]
    scores: Option<std::path::PathBuf>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let game = Game::new();
    if let Some(path) = &args.scores {
        game.set_score_sink(Arc::new(JsonScoreStore::new(path)));
    }
    game.start_game(args.size);
    if args.watch {
        println!("{game}");
    }

    let events = game.subscribe();
    let mut player = AutoPlayer::new(game.clone());
    player.start_playing(args.strategy, Duration::from_millis(args.interval_ms));

    let started = Instant::now();
    let mut moves: u64 = 0;
    loop {
        match events.recv_timeout(Duration::from_secs(10)) {
            Ok(GameEvent::Tiles(_)) => {
                moves += 1;
                if args.watch {
                    println!("{game}");
                }
                if let Some(limit) = args.steps {
                    if moves >= limit {
                        break;
                    }
                }
            }
            Ok(GameEvent::GameOver(true)) => break,
            Ok(_) => {}
            Err(_) => {
                if game.is_game_over() {
                    break;
                }
            }
        }
    }
    player.stop_playing();

    let elapsed = started.elapsed().as_secs_f64().max(1e-6);
    println!(
        "Moves: {} | moves/sec: {:.1} | score: {} | highest tile: {}",
        moves,
        moves as f64 / elapsed,
        game.score(),
        game.highest_tile()
    );
}
