use serde::{Deserialize, Serialize};

/// Control-loop mode: `Cool` keeps the peltier engaged, `Idle` keeps it off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Cool,
    Idle,
}

/// The whole state of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub phase: Phase,
    /// Completed ticks since the peltier was last observed on.
    pub last_peltier_on: u64,
}

impl State {
    /// The state every run starts from.
    pub const INITIAL: State = State {
        phase: Phase::Cool,
        last_peltier_on: 0,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Phase::Cool).unwrap(), "\"cool\"");
        assert_eq!(serde_json::to_string(&Phase::Idle).unwrap(), "\"idle\"");

        let back: Phase = serde_json::from_str("\"idle\"").unwrap();
        assert_eq!(back, Phase::Idle);
    }

    #[test]
    fn state_roundtrip() {
        let state = State {
            phase: Phase::Idle,
            last_peltier_on: 4,
        };
        let json = serde_json::to_string(&state).unwrap();
        let back: State = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn initial_state() {
        assert_eq!(State::INITIAL.phase, Phase::Cool);
        assert_eq!(State::INITIAL.last_peltier_on, 0);
    }
}
