//! Built-in leaf strategies.
//!
//! All reciprocal strategies only look at games between the two agents of
//! the [`Encounter`] within the current adaptation step.
//!
//! | Name | Decision |
//! |------|----------|
//! | `always-cooperate` | Always cooperate. |
//! | `always-defect` | Always defect. |
//! | `tit-for-tat` | Cooperate first, then copy the opponent's last move. |
//! | `suspicious-tit-for-tat` | Defect first, then copy the opponent's last move. |
//! | `grim` | Cooperate until the opponent defects once. |
//! | `pavlov` | Cooperate first, then cooperate iff both made the same last move. |
//! | `random(p)` | Cooperate with probability `p`. |

use std::sync::Arc;

use rand::{Rng, RngCore};

use crate::error::StrategyError;
use crate::strategy::{Condition, Encounter, PureStrategy, Strategy};

/// Names of the parameterless built-in strategies, in catalog order.
pub const NAMES: [&str; 6] = [
    "always-cooperate",
    "always-defect",
    "tit-for-tat",
    "suspicious-tit-for-tat",
    "grim",
    "pavlov",
];

/// Look up a parameterless built-in strategy by name.
pub fn by_name(name: &str) -> Option<Strategy> {
    match name {
        "always-cooperate" => Some(always_cooperate()),
        "always-defect" => Some(always_defect()),
        "tit-for-tat" => Some(tit_for_tat()),
        "suspicious-tit-for-tat" => Some(suspicious_tit_for_tat()),
        "grim" => Some(grim()),
        "pavlov" => Some(pavlov()),
        _ => None,
    }
}

/// Implement [`Condition`] for a type with an inherent `decide` method.
///
/// The sampled decision ignores the RNG and the probability is `1` or `0`.
macro_rules! deterministic {
    ($ty:ty) => {
        impl Condition for $ty {
            fn cooperates(&self, encounter: &Encounter<'_>, _rng: &mut dyn RngCore) -> bool {
                self.decide(encounter)
            }

            fn cooperation_probability(&self, encounter: &Encounter<'_>) -> f64 {
                if self.decide(encounter) { 1.0 } else { 0.0 }
            }
        }
    };
}

/// The opponent's move in the last game between the two agents.
fn opponent_last_move(encounter: &Encounter<'_>) -> Option<bool> {
    encounter
        .history
        .last_between(encounter.player, encounter.opponent)
        .and_then(|g| g.decision_of(encounter.opponent))
}

#[derive(Debug)]
struct Constant(bool);

impl Constant {
    const fn decide(&self, _encounter: &Encounter<'_>) -> bool {
        self.0
    }
}

#[derive(Debug)]
struct TitForTat {
    opening: bool,
}

impl TitForTat {
    fn decide(&self, encounter: &Encounter<'_>) -> bool {
        opponent_last_move(encounter).unwrap_or(self.opening)
    }
}

#[derive(Debug)]
struct Grim;

impl Grim {
    fn decide(&self, encounter: &Encounter<'_>) -> bool {
        !encounter
            .history
            .has_defected_against(encounter.opponent, encounter.player)
    }
}

#[derive(Debug)]
struct Pavlov;

impl Pavlov {
    fn decide(&self, encounter: &Encounter<'_>) -> bool {
        encounter
            .history
            .last_between(encounter.player, encounter.opponent)
            .is_none_or(|g| g.player_cooperated == g.opponent_cooperated)
    }
}

deterministic!(Constant);
deterministic!(TitForTat);
deterministic!(Grim);
deterministic!(Pavlov);

#[derive(Debug)]
struct Random {
    probability: f64,
}

impl Condition for Random {
    fn cooperates(&self, _encounter: &Encounter<'_>, rng: &mut dyn RngCore) -> bool {
        rng.random::<f64>() < self.probability
    }

    fn cooperation_probability(&self, _encounter: &Encounter<'_>) -> f64 {
        self.probability
    }
}

fn pure(name: &str, condition: Arc<dyn Condition>) -> Strategy {
    Strategy::Pure(PureStrategy::new(name, condition))
}

/// Always cooperate.
pub fn always_cooperate() -> Strategy {
    pure("always-cooperate", Arc::new(Constant(true)))
}

/// Always defect.
pub fn always_defect() -> Strategy {
    pure("always-defect", Arc::new(Constant(false)))
}

/// Cooperate first, then copy the opponent's last move.
pub fn tit_for_tat() -> Strategy {
    pure("tit-for-tat", Arc::new(TitForTat { opening: true }))
}

/// Defect first, then copy the opponent's last move.
pub fn suspicious_tit_for_tat() -> Strategy {
    pure("suspicious-tit-for-tat", Arc::new(TitForTat { opening: false }))
}

/// Grim trigger: cooperate until the opponent has defected once.
pub fn grim() -> Strategy {
    pure("grim", Arc::new(Grim))
}

/// Win-stay, lose-shift.
pub fn pavlov() -> Strategy {
    pure("pavlov", Arc::new(Pavlov))
}

/// Cooperate with a fixed probability.
///
/// # Errors
///
/// Returns [`StrategyError::InvalidProbability`] unless `probability` lies
/// in `[0, 1]`.
pub fn random(probability: f64) -> Result<Strategy, StrategyError> {
    let name = format!("random({probability})");
    if !(0.0..=1.0).contains(&probability) {
        return Err(StrategyError::InvalidProbability { name, probability });
    }
    Ok(pure(&name, Arc::new(Random { probability })))
}
