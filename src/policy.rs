//! Reuse policy: when slices and branches may be played again.
//!
//! Everything here is a pure function of elapsed output time and history
//! records. The policy itself holds only constants.

use crate::error::ConfigError;
use rand::Rng;

/// Slices rest 18 minutes before they may play again.
pub const SLICE_REUSE_DELAY_SECS: f64 = 18.0 * 60.0;
/// Excursion branches rest 5 minutes before they may be re-entered.
pub const BRANCH_REUSE_DELAY_SECS: f64 = 5.0 * 60.0;
/// Consecutive passes through an excursion before the forced return home.
pub const MAX_CONSECUTIVE_EXCURSION_LOOPS: u32 = 1;

/// True when something last played at `last_played` may play at `now`.
///
/// Never-played items are always rested.
pub fn is_rested(last_played: Option<f64>, now: f64, delay: f64) -> bool {
    match last_played {
        None => true,
        Some(t) => now - t >= delay,
    }
}

/// A weighted coin: `hits` in `out_of`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Odds {
    pub hits: u32,
    pub out_of: u32,
}

impl Odds {
    pub const fn new(hits: u32, out_of: u32) -> Self {
        Self { hits, out_of }
    }

    /// Heads every time.
    pub const ALWAYS: Odds = Odds::new(1, 1);
    /// Tails every time.
    pub const NEVER: Odds = Odds::new(0, 1);

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.out_of == 0 || self.hits > self.out_of {
            return Err(ConfigError::InvalidOdds {
                hits: self.hits,
                out_of: self.out_of,
            });
        }
        Ok(())
    }

    /// Flip the coin.
    pub fn flip<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen_ratio(self.hits, self.out_of)
    }
}

/// What has to happen before an eligible branch switch is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchGate {
    /// Switch whenever the branch is rested.
    Always,
    /// Flip this coin first; switch only on heads.
    Coin(Odds),
}

impl SwitchGate {
    pub fn open<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        match self {
            SwitchGate::Always => true,
            SwitchGate::Coin(odds) => odds.flip(rng),
        }
    }
}

/// When an excursion that reached its end must hand back to the home branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeReturn {
    /// Only once the consecutive loop limit is hit.
    LoopLimit,
    /// At the loop limit, or as soon as every excursion has been played at
    /// least once (however long ago).
    LoopLimitOrAllVisited,
}

/// Constants governing reuse and branch movement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReusePolicy {
    /// Minimum rest of a slice, in output seconds.
    pub slice_reuse_delay_secs: f64,
    /// Minimum rest of an excursion branch, in output seconds.
    pub branch_reuse_delay_secs: f64,
    /// Consecutive excursion loops before a forced return home.
    pub max_excursion_loops: u32,
    /// Chance of playing a slice when one is eligible.
    pub slice_odds: Odds,
    pub switch_gate: SwitchGate,
    pub home_return: HomeReturn,
}

impl Default for ReusePolicy {
    fn default() -> Self {
        Self {
            slice_reuse_delay_secs: SLICE_REUSE_DELAY_SECS,
            branch_reuse_delay_secs: BRANCH_REUSE_DELAY_SECS,
            max_excursion_loops: MAX_CONSECUTIVE_EXCURSION_LOOPS,
            slice_odds: Odds::new(4, 5),
            switch_gate: SwitchGate::Always,
            home_return: HomeReturn::LoopLimitOrAllVisited,
        }
    }
}

impl ReusePolicy {
    /// Behaviour of the single-excursion arrangement: a 50/50 coin gates every
    /// branch switch and only the loop limit sends playback home.
    pub fn single_excursion() -> Self {
        Self {
            switch_gate: SwitchGate::Coin(Odds::new(1, 2)),
            home_return: HomeReturn::LoopLimit,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for delay in [self.slice_reuse_delay_secs, self.branch_reuse_delay_secs] {
            if !(delay.is_finite() && delay >= 0.0) {
                return Err(ConfigError::InvalidReuseDelay(delay));
            }
        }
        if self.max_excursion_loops == 0 {
            return Err(ConfigError::ZeroLoopLimit);
        }
        self.slice_odds.validate()?;
        if let SwitchGate::Coin(odds) = self.switch_gate {
            odds.validate()?;
        }
        Ok(())
    }

    pub fn slice_rested(&self, last_played: Option<f64>, now: f64) -> bool {
        is_rested(last_played, now, self.slice_reuse_delay_secs)
    }

    pub fn branch_rested(&self, last_played: Option<f64>, now: f64) -> bool {
        is_rested(last_played, now, self.branch_reuse_delay_secs)
    }

    /// Decide whether an excursion that just hit its end goes home.
    ///
    /// `loops` is the consecutive loop count including the pass just
    /// finished; `all_visited` is true when every excursion has a recorded
    /// entry time.
    pub fn should_return_home(&self, loops: u32, all_visited: bool) -> bool {
        if loops >= self.max_excursion_loops {
            return true;
        }
        match self.home_return {
            HomeReturn::LoopLimit => false,
            HomeReturn::LoopLimitOrAllVisited => all_visited,
        }
    }
}
