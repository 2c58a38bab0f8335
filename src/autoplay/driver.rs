use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::{policy, AutoEvent, Strategy, DEFAULT_SPEED};
use crate::game::Game;

enum Command {
    Stop,
    Speed(Duration),
}

struct Shared {
    strategy: Mutex<Strategy>,
    subscribers: Mutex<Vec<Sender<AutoEvent>>>,
}

struct Worker {
    tx: Sender<Command>,
    handle: JoinHandle<()>,
}

/// Drives the game controller on a repeating, cancellable schedule.
///
/// One tick is one decide-and-move cycle. The worker thread waits on a
/// control channel with the tick interval as its timeout, so stop and
/// speed-change commands preempt the sleep: [`AutoPlayer::stop_playing`]
/// joins the worker and guarantees no tick starts after it returns, and
/// [`AutoPlayer::set_speed`] reschedules the pending tick at the new
/// interval without dropping or duplicating one.
pub struct AutoPlayer {
    game: Game,
    shared: Arc<Shared>,
    speed: Duration,
    worker: Option<Worker>,
    rng: SmallRng,
}

impl AutoPlayer {
    pub fn new(game: Game) -> Self {
        Self::with_seed(game, rand::thread_rng().gen())
    }

    /// Deterministic random draws for `step` ticks on this handle.
    pub fn with_seed(game: Game, seed: u64) -> Self {
        Self {
            game,
            shared: Arc::new(Shared {
                strategy: Mutex::new(Strategy::Corner),
                subscribers: Mutex::new(Vec::new()),
            }),
            speed: DEFAULT_SPEED,
            worker: None,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.worker.is_some()
    }

    pub fn speed(&self) -> Duration {
        self.speed
    }

    pub fn strategy(&self) -> Strategy {
        *self.shared.strategy.lock().expect("strategy lock poisoned")
    }

    /// Begin ticking every `speed`. An already-running schedule is stopped
    /// first, so at most one worker ever exists.
    pub fn start_playing(&mut self, strategy: Strategy, speed: Duration) {
        self.stop_playing();
        *self.shared.strategy.lock().expect("strategy lock poisoned") = strategy;
        self.speed = speed;
        let (tx, rx) = mpsc::channel();
        let game = self.game.clone();
        let shared = Arc::clone(&self.shared);
        let handle = thread::spawn(move || worker_loop(game, shared, rx, speed));
        self.worker = Some(Worker { tx, handle });
        self.emit(AutoEvent::Strategy(strategy));
        self.emit(AutoEvent::Speed(speed));
        self.emit(AutoEvent::Playing(true));
    }

    /// Cancel the schedule. A tick already dispatched may finish, but no new
    /// tick starts once this returns.
    pub fn stop_playing(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.tx.send(Command::Stop);
            let _ = worker.handle.join();
            self.emit(AutoEvent::Playing(false));
        }
    }

    /// Change the tick interval, rescheduling the live timer when active.
    pub fn set_speed(&mut self, speed: Duration) {
        self.speed = speed;
        if let Some(worker) = &self.worker {
            let _ = worker.tx.send(Command::Speed(speed));
        }
        self.emit(AutoEvent::Speed(speed));
    }

    /// Swap the policy; a running schedule picks it up on its next tick.
    pub fn set_strategy(&mut self, strategy: Strategy) {
        *self.shared.strategy.lock().expect("strategy lock poisoned") = strategy;
        self.emit(AutoEvent::Strategy(strategy));
    }

    /// Perform exactly one decide-and-move cycle on the caller's thread,
    /// whether or not the schedule is running. Returns true when a move was
    /// committed. The random backstop only applies while autoplay is active.
    pub fn step(&mut self) -> bool {
        let strategy = self.strategy();
        let fallback = self.is_playing();
        policy::tick(&self.game, strategy, &mut self.rng, fallback)
    }

    /// Register for playing/speed/strategy notifications.
    pub fn subscribe(&self) -> Receiver<AutoEvent> {
        let (tx, rx) = mpsc::channel();
        self.shared
            .subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .push(tx);
        rx
    }

    fn emit(&self, event: AutoEvent) {
        self.shared
            .subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .retain(|tx| tx.send(event).is_ok());
    }
}

impl Drop for AutoPlayer {
    fn drop(&mut self) {
        self.stop_playing();
    }
}

fn worker_loop(game: Game, shared: Arc<Shared>, rx: Receiver<Command>, mut interval: Duration) {
    let mut rng = SmallRng::from_entropy();
    loop {
        match rx.recv_timeout(interval) {
            Ok(Command::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(Command::Speed(next)) => interval = next,
            Err(RecvTimeoutError::Timeout) => {
                let strategy = *shared.strategy.lock().expect("strategy lock poisoned");
                // A tick against a finished game is a no-op: the controller
                // rejects moves outside of play.
                policy::tick(&game, strategy, &mut rng, true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::TryRecvError;

    #[test]
    fn step_commits_a_move_on_a_fresh_board() {
        let game = Game::with_seed(21);
        game.start_game(4);
        let mut player = AutoPlayer::with_seed(game.clone(), 1);
        // Two tiles on an otherwise empty board: some direction is legal.
        assert!(player.step());
        assert!(game.tiles().len() >= 2);
    }

    #[test]
    fn step_works_without_an_active_schedule() {
        let game = Game::with_seed(21);
        game.start_game(4);
        let mut player = AutoPlayer::with_seed(game, 1);
        assert!(!player.is_playing());
        player.set_strategy(Strategy::Greedy);
        assert!(player.step());
    }

    #[test]
    fn no_tick_fires_after_stop_playing_returns() {
        let game = Game::with_seed(33);
        game.start_game(4);
        let mut player = AutoPlayer::with_seed(game.clone(), 2);
        player.start_playing(Strategy::Corner, Duration::from_millis(1));
        thread::sleep(Duration::from_millis(25));
        player.stop_playing();
        let frozen = (game.score(), game.tiles().len());
        thread::sleep(Duration::from_millis(30));
        assert_eq!((game.score(), game.tiles().len()), frozen);
    }

    #[test]
    fn schedule_actually_drives_moves() {
        let game = Game::with_seed(33);
        game.start_game(4);
        let events = game.subscribe();
        let mut player = AutoPlayer::with_seed(game.clone(), 2);
        player.start_playing(Strategy::Corner, Duration::from_millis(1));
        // Wait for at least one committed move to be announced.
        let event = events.recv_timeout(Duration::from_secs(5));
        player.stop_playing();
        assert!(event.is_ok());
    }

    #[test]
    fn state_notifications_mirror_every_control_change() {
        let game = Game::with_seed(33);
        game.start_game(4);
        let mut player = AutoPlayer::with_seed(game, 2);
        let events = player.subscribe();
        player.start_playing(Strategy::Corner, Duration::from_millis(50));
        player.set_speed(Duration::from_millis(10));
        assert_eq!(player.speed(), Duration::from_millis(10));
        player.set_strategy(Strategy::Random);
        player.stop_playing();
        let expected = [
            AutoEvent::Strategy(Strategy::Corner),
            AutoEvent::Speed(Duration::from_millis(50)),
            AutoEvent::Playing(true),
            AutoEvent::Speed(Duration::from_millis(10)),
            AutoEvent::Strategy(Strategy::Random),
            AutoEvent::Playing(false),
        ];
        for expect in expected {
            assert_eq!(events.try_recv(), Ok(expect));
        }
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn restarting_replaces_the_previous_schedule() {
        let game = Game::with_seed(33);
        game.start_game(4);
        let mut player = AutoPlayer::with_seed(game, 2);
        player.start_playing(Strategy::Corner, Duration::from_millis(5));
        player.start_playing(Strategy::Random, Duration::from_millis(5));
        assert!(player.is_playing());
        assert_eq!(player.strategy(), Strategy::Random);
        player.stop_playing();
        assert!(!player.is_playing());
    }
}
