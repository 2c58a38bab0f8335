use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use auto_2048::autoplay::{AutoPlayer, Strategy};
use auto_2048::engine::{MAX_GRID, MIN_GRID};
use auto_2048::game::Game;
use auto_2048::scores::{now_unix_seconds, JsonScoreStore, ScoreEntry};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use rayon::prelude::*;

#[derive(Debug, Parser)]
#[command(name = "arena", about = "Race auto-player strategies over many games")]
struct Args {
    /// Games per strategy
    #[arg(long, default_value_t = 100)]
    games: u64,

    /// Grid size (clamped to 3..=8)
    #[arg(long, default_value_t = 4)]
    size: u8,

    /// Strategies to race
    #[arg(long, value_delimiter = ',', default_value = "corner,greedy,random")]
    strategies: Vec<Strategy>,

    /// Per-game move cap
    #[arg(long)]
    steps: Option<u64>,

    /// Base seed; defaults to a random one
    #[arg(long)]
    seed: Option<u64>,

    /// Write every finished game into this JSON score book
    #[arg(long)]
    scores: Option<PathBuf>,

    /// Suppress the progress bar
    #[arg(long)]
    quiet: bool,
}

struct GameReport {
    strategy: Strategy,
    score: u64,
    max_tile: u32,
    moves: u64,
    elapsed_s: f32,
}

fn run_single_game(strategy: Strategy, size: u8, seed: u64, steps: Option<u64>) -> GameReport {
    let game = Game::with_seed(seed);
    game.start_game(size);
    let mut player = AutoPlayer::with_seed(game.clone(), seed ^ 0x9E37_79B9_7F4A_7C15);
    player.set_strategy(strategy);
    let start = Instant::now();
    let mut moves: u64 = 0;
    while !game.is_game_over() {
        if player.step() {
            moves += 1;
        }
        if let Some(limit) = steps {
            if moves >= limit {
                break;
            }
        }
    }
    GameReport {
        strategy,
        score: game.score(),
        max_tile: game.highest_tile(),
        moves,
        elapsed_s: start.elapsed().as_secs_f32(),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let size = args.size.clamp(MIN_GRID, MAX_GRID);
    let base_seed = args.seed.unwrap_or_else(|| rand::thread_rng().gen());

    let jobs: Vec<(Strategy, u64)> = args
        .strategies
        .iter()
        .flat_map(|&strategy| (0..args.games).map(move |i| (strategy, i)))
        .collect();

    let pb = if args.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(jobs.len() as u64);
        pb.set_style(ProgressStyle::with_template(
            "{spinner} {elapsed_precise} | {pos}/{len} games | {msg}",
        )?);
        pb
    };

    let reports: Vec<GameReport> = jobs
        .into_par_iter()
        .map(|(strategy, i)| {
            let seed = base_seed.wrapping_add(i).wrapping_mul(0x0100_0000_01B3);
            let report = run_single_game(strategy, size, seed, args.steps);
            pb.inc(1);
            report
        })
        .collect();
    pb.finish_and_clear();

    println!("seed: {base_seed}");
    println!("strategy |  games | mean score |  max score | mean moves | best tile");
    for &strategy in &args.strategies {
        let runs: Vec<&GameReport> = reports.iter().filter(|r| r.strategy == strategy).collect();
        if runs.is_empty() {
            continue;
        }
        let games = runs.len() as f64;
        let mean_score = runs.iter().map(|r| r.score as f64).sum::<f64>() / games;
        let max_score = runs.iter().map(|r| r.score).max().unwrap_or(0);
        let mean_moves = runs.iter().map(|r| r.moves as f64).sum::<f64>() / games;
        let best_tile = runs.iter().map(|r| r.max_tile).max().unwrap_or(0);
        println!(
            "{:>8} | {:>6} | {:>10.1} | {:>10} | {:>10.1} | {:>9}",
            strategy.name(),
            runs.len(),
            mean_score,
            max_score,
            mean_moves,
            best_tile
        );
    }

    if let Some(path) = &args.scores {
        let store = JsonScoreStore::new(path);
        let mut book = store.load().unwrap_or_default();
        let date = now_unix_seconds();
        for report in &reports {
            book.insert(ScoreEntry {
                score: report.score,
                grid_size: size,
                date,
                duration_s: Some(report.elapsed_s),
                max_tile: report.max_tile,
            });
        }
        store.save(&book)?;
        println!("score book updated: {}", path.display());
    }

    Ok(())
}
