//! auto-2048: a 2048-style tile-sliding engine plus an autonomous player.
//!
//! This crate provides:
//! - A sparse-tile [`engine::Board`] for grids from 3x3 to 8x8, with the
//!   slide/merge rules, tile spawning and terminal detection
//! - A [`game::Game`] controller: single-undo state machine with
//!   subscribable change notifications
//! - An [`autoplay::AutoPlayer`] that drives the controller on a cancellable
//!   schedule using pluggable strategies
//! - A [`scores::JsonScoreStore`] collaborator that keeps a top-10 score
//!   table per grid size
//!
//! Quick start:
//! ```
//! use auto_2048::engine::Move;
//! use auto_2048::game::Game;
//!
//! let game = Game::with_seed(42);
//! game.start_game(4);
//! assert_eq!(game.tiles().len(), 2);
//!
//! // A move only commits when it changes the board.
//! let moved = game.try_move(Move::Left);
//! if moved {
//!     assert!(game.undo());
//! }
//! ```
pub mod autoplay;
pub mod engine;
pub mod game;
pub mod scores;
