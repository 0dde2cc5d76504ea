//! Teardown state machine.

use std::fmt;

/// Lifecycle of a cache box.
///
/// ```text
/// Active ──► TearingDown ──► Torn
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxState {
    /// Accepting operations.
    Active,
    /// Running destroy-all then unload-all.
    TearingDown,
    /// Terminal. The ledger is empty.
    Torn,
}

impl BoxState {
    pub fn can_transition_to(&self, target: BoxState) -> bool {
        matches!(
            (self, target),
            (BoxState::Active, BoxState::TearingDown) | (BoxState::TearingDown, BoxState::Torn)
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(self, BoxState::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BoxState::Active => "active",
            BoxState::TearingDown => "tearing_down",
            BoxState::Torn => "torn",
        }
    }
}

impl fmt::Display for BoxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
