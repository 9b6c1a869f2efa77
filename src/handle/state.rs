use serde::Serialize;
use std::fmt;

/// Lifecycle state of a resource handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleState {
    Pending,
    Loading,
    Loaded,
    /// Data was supplied up front, no transfer needed
    Populated,
    Processing,
    WaitingOnLink,
    Complete,
    Errored,
}

impl HandleState {
    /// Forward-only transition table
    pub fn can_transition_to(self, next: HandleState) -> bool {
        use HandleState::*;

        matches!(
            (self, next),
            (Pending, Loading)
                | (Pending, Populated)
                | (Loading, Loaded)
                | (Loading, Errored)
                | (Loaded, Processing)
                | (Loaded, Errored)
                | (Populated, Complete)
                | (Populated, WaitingOnLink)
                | (Processing, Complete)
                | (Processing, WaitingOnLink)
                | (WaitingOnLink, Complete)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, HandleState::Complete | HandleState::Errored)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HandleState::Pending => "pending",
            HandleState::Loading => "loading",
            HandleState::Loaded => "loaded",
            HandleState::Populated => "populated",
            HandleState::Processing => "processing",
            HandleState::WaitingOnLink => "waiting_on_link",
            HandleState::Complete => "complete",
            HandleState::Errored => "errored",
        }
    }
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::HandleState::*;
    use super::*;

    const ALL: [HandleState; 8] = [
        Pending,
        Loading,
        Loaded,
        Populated,
        Processing,
        WaitingOnLink,
        Complete,
        Errored,
    ];

    #[test]
    fn test_network_path() {
        assert!(Pending.can_transition_to(Loading));
        assert!(Loading.can_transition_to(Loaded));
        assert!(Loaded.can_transition_to(Processing));
        assert!(Processing.can_transition_to(WaitingOnLink));
        assert!(WaitingOnLink.can_transition_to(Complete));
        assert!(Processing.can_transition_to(Complete));
    }

    #[test]
    fn test_populated_never_loads() {
        assert!(!Populated.can_transition_to(Loading));
        assert!(!Populated.can_transition_to(Loaded));
        assert!(Populated.can_transition_to(Complete));
        assert!(Populated.can_transition_to(WaitingOnLink));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for next in ALL {
            assert!(!Complete.can_transition_to(next));
            assert!(!Errored.can_transition_to(next));
        }
        assert!(Complete.is_terminal());
        assert!(Errored.is_terminal());
        assert!(!WaitingOnLink.is_terminal());
    }

    #[test]
    fn test_no_backward_moves() {
        assert!(!Loaded.can_transition_to(Loading));
        assert!(!Processing.can_transition_to(Loaded));
        assert!(!WaitingOnLink.can_transition_to(Processing));
        assert!(!Loading.can_transition_to(Pending));
    }

    #[test]
    fn test_display() {
        assert_eq!(WaitingOnLink.to_string(), "waiting_on_link");
    }
}
