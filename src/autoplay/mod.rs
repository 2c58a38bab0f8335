//! Autonomous player for the game controller.
//!
//! A [`Strategy`] picks one direction per tick; the [`AutoPlayer`] drives
//! repeated ticks on a cancellable timer, or single ticks via
//! [`AutoPlayer::step`]. Strategies only ever go through the controller's
//! public API (`try_move` / `preview`), never the tile set itself.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

mod driver;
mod policy;

pub use driver::AutoPlayer;

/// Delay between ticks unless the caller picks one.
pub const DEFAULT_SPEED: Duration = Duration::from_millis(500);

/// A pluggable policy that selects a move direction.
///
/// ```
/// use auto_2048::autoplay::Strategy;
///
/// assert_eq!("corner".parse::<Strategy>().unwrap(), Strategy::Corner);
/// assert_eq!(Strategy::Greedy.to_string(), "greedy");
/// assert_eq!(Strategy::ALL.len(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Fixed priority order right, down, left, up: herds tiles into a corner.
    Corner,
    /// One-ply lookahead: commit the direction with the largest immediate
    /// score gain, tie-broken in the corner order.
    Greedy,
    /// One uniformly random direction, single attempt.
    Random,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Corner, Strategy::Greedy, Strategy::Random];

    pub fn name(self) -> &'static str {
        match self {
            Strategy::Corner => "corner",
            Strategy::Greedy => "greedy",
            Strategy::Random => "random",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "corner" => Ok(Strategy::Corner),
            "greedy" => Ok(Strategy::Greedy),
            "random" => Ok(Strategy::Random),
            other => Err(format!(
                "unknown strategy '{other}' (expected corner, greedy or random)"
            )),
        }
    }
}

/// Auto-player state notification, mirroring playing/speed/strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoEvent {
    Playing(bool),
    Speed(Duration),
    Strategy(Strategy),
}
