use super::types::ProbeStatus;

/// A status change that warrants an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Entered `down` from any other status, including `unknown`
    WentDown,
    /// Left `down` for `up`
    Recovered,
}

impl Transition {
    /// Decide whether moving from `previous` to `current` should notify.
    ///
    /// Only transitions into or out of `down` count; `unknown -> up` and
    /// `down -> down` do not.
    pub fn between(previous: ProbeStatus, current: ProbeStatus) -> Option<Self> {
        match (previous, current) {
            (previous, current) if previous == current => None,
            (_, ProbeStatus::Down) => Some(Transition::WentDown),
            (ProbeStatus::Down, ProbeStatus::Up) => Some(Transition::Recovered),
            _ => None,
        }
    }
}
