//! Payoffs, game records, and the per-step game history.
//!
//! A game is one round between two agents: each decides to cooperate or
//! defect, and the [`PayoffMatrix`] maps the four possible outcomes to a
//! payoff for each side. Every round is recorded as an immutable
//! [`GameResult`] in the [`SimulationHistory`] of the current adaptation
//! step, which reciprocal strategies consult when deciding.

use serde::{Deserialize, Serialize};

use crate::ids::AgentId;

/// Payoffs for the four (cooperate/defect) x (cooperate/defect) outcomes.
///
/// Defaults to the classic prisoner's dilemma values
/// `T = 5 > R = 3 > P = 1 > S = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PayoffMatrix {
    /// Payoff for mutual cooperation.
    pub reward: f64,
    /// Payoff for cooperating against a defector.
    pub sucker: f64,
    /// Payoff for defecting against a cooperator.
    pub temptation: f64,
    /// Payoff for mutual defection.
    pub punishment: f64,
}

impl Default for PayoffMatrix {
    fn default() -> Self {
        Self {
            reward: 3.0,
            sucker: 0.0,
            temptation: 5.0,
            punishment: 1.0,
        }
    }
}

/// One cell of the payoff matrix, used as a sweep target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoffEntry {
    /// Mutual cooperation.
    Reward,
    /// Cooperating against a defector.
    Sucker,
    /// Defecting against a cooperator.
    Temptation,
    /// Mutual defection.
    Punishment,
}

impl PayoffEntry {
    /// Every entry, in matrix order.
    pub const ALL: [Self; 4] = [Self::Reward, Self::Sucker, Self::Temptation, Self::Punishment];

    /// Lower-case name of the entry.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Reward => "reward",
            Self::Sucker => "sucker",
            Self::Temptation => "temptation",
            Self::Punishment => "punishment",
        }
    }

    /// Look up an entry by its lower-case name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|entry| entry.name() == name)
    }
}

impl PayoffMatrix {
    /// Payoff pair `(player, opponent)` for the given decisions.
    pub const fn payoffs(&self, player_cooperates: bool, opponent_cooperates: bool) -> (f64, f64) {
        match (player_cooperates, opponent_cooperates) {
            (true, true) => (self.reward, self.reward),
            (true, false) => (self.sucker, self.temptation),
            (false, true) => (self.temptation, self.sucker),
            (false, false) => (self.punishment, self.punishment),
        }
    }

    /// Return a copy with one entry replaced.
    #[must_use]
    pub const fn with_entry(mut self, entry: PayoffEntry, value: f64) -> Self {
        match entry {
            PayoffEntry::Reward => self.reward = value,
            PayoffEntry::Sucker => self.sucker = value,
            PayoffEntry::Temptation => self.temptation = value,
            PayoffEntry::Punishment => self.punishment = value,
        }
        self
    }
}

/// Immutable record of one game round between two agents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    /// The first agent of the pair.
    pub player: AgentId,
    /// The second agent of the pair.
    pub opponent: AgentId,
    /// Whether the first agent cooperated.
    pub player_cooperated: bool,
    /// Whether the second agent cooperated.
    pub opponent_cooperated: bool,
    /// Payoff received by the first agent.
    pub player_payoff: f64,
    /// Payoff received by the second agent.
    pub opponent_payoff: f64,
}

impl GameResult {
    /// Whether `agent` took part in this game.
    pub fn involves(&self, agent: AgentId) -> bool {
        self.player == agent || self.opponent == agent
    }

    /// Whether this game was played between `a` and `b`, in either seat.
    pub fn is_between(&self, a: AgentId, b: AgentId) -> bool {
        (self.player == a && self.opponent == b) || (self.player == b && self.opponent == a)
    }

    /// The decision `agent` made in this game, if it took part.
    pub fn decision_of(&self, agent: AgentId) -> Option<bool> {
        if self.player == agent {
            Some(self.player_cooperated)
        } else if self.opponent == agent {
            Some(self.opponent_cooperated)
        } else {
            None
        }
    }

    /// The payoff `agent` received in this game, if it took part.
    pub fn payoff_of(&self, agent: AgentId) -> Option<f64> {
        if self.player == agent {
            Some(self.player_payoff)
        } else if self.opponent == agent {
            Some(self.opponent_payoff)
        } else {
            None
        }
    }
}

/// Ordered, append-only record of the games of one adaptation step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationHistory {
    games: Vec<GameResult>,
}

impl SimulationHistory {
    /// Create an empty history.
    pub const fn new() -> Self {
        Self { games: Vec::new() }
    }

    /// Append a game record.
    pub fn push(&mut self, game: GameResult) {
        self.games.push(game);
    }

    /// Number of recorded games.
    pub fn len(&self) -> usize {
        self.games.len()
    }

    /// Whether no game has been recorded.
    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// All games in play order.
    pub fn games(&self) -> &[GameResult] {
        &self.games
    }

    /// The most recent game between `a` and `b`.
    pub fn last_between(&self, a: AgentId, b: AgentId) -> Option<&GameResult> {
        self.games.iter().rev().find(|g| g.is_between(a, b))
    }

    /// The most recent game `agent` took part in.
    pub fn last_game_of(&self, agent: AgentId) -> Option<&GameResult> {
        self.games.iter().rev().find(|g| g.involves(agent))
    }

    /// Whether `defector` ever defected while playing against `victim`.
    pub fn has_defected_against(&self, defector: AgentId, victim: AgentId) -> bool {
        self.games
            .iter()
            .filter(|g| g.is_between(defector, victim))
            .any(|g| g.decision_of(defector) == Some(false))
    }

    /// Total payoff `agent` received over all recorded games.
    pub fn total_payoff_of(&self, agent: AgentId) -> f64 {
        self.games.iter().filter_map(|g| g.payoff_of(agent)).sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn game(a: u32, b: u32, ca: bool, cb: bool) -> GameResult {
        let (pa, pb) = PayoffMatrix::default().payoffs(ca, cb);
        GameResult {
            player: AgentId(a),
            opponent: AgentId(b),
            player_cooperated: ca,
            opponent_cooperated: cb,
            player_payoff: pa,
            opponent_payoff: pb,
        }
    }

    #[test]
    fn payoff_matrix_is_symmetric() {
        let m = PayoffMatrix::default();
        assert_eq!(m.payoffs(true, false), (0.0, 5.0));
        assert_eq!(m.payoffs(false, true), (5.0, 0.0));
        assert_eq!(m.payoffs(true, true), (3.0, 3.0));
        assert_eq!(m.payoffs(false, false), (1.0, 1.0));
    }

    #[test]
    fn with_entry_replaces_one_cell() {
        let m = PayoffMatrix::default().with_entry(PayoffEntry::Temptation, 8.0);
        assert_eq!(m.payoffs(false, true), (8.0, 0.0));
        assert_eq!(m.payoffs(true, true), (3.0, 3.0));
    }

    #[test]
    fn last_between_ignores_seat_order() {
        let mut h = SimulationHistory::new();
        h.push(game(1, 2, true, true));
        h.push(game(3, 1, false, true));
        h.push(game(2, 1, false, true));
        let last = h.last_between(AgentId(1), AgentId(2)).unwrap();
        assert_eq!(last.decision_of(AgentId(2)), Some(false));
        assert_eq!(last.decision_of(AgentId(1)), Some(true));
        assert!(h.last_between(AgentId(2), AgentId(3)).is_none());
    }

    #[test]
    fn defection_tracking() {
        let mut h = SimulationHistory::new();
        h.push(game(1, 2, true, false));
        assert!(h.has_defected_against(AgentId(2), AgentId(1)));
        assert!(!h.has_defected_against(AgentId(1), AgentId(2)));
    }

    #[test]
    fn total_payoff_sums_both_seats() {
        let mut h = SimulationHistory::new();
        h.push(game(1, 2, true, true));
        h.push(game(2, 1, false, true));
        assert!((h.total_payoff_of(AgentId(1)) - 3.0).abs() < 1e-12);
        assert!((h.total_payoff_of(AgentId(2)) - 8.0).abs() < 1e-12);
    }

    #[test]
    fn payoff_entries_round_trip_by_name() {
        for entry in PayoffEntry::ALL {
            assert_eq!(PayoffEntry::from_name(entry.name()), Some(entry));
        }
        assert_eq!(PayoffEntry::from_name("Reward"), None);
    }
}
