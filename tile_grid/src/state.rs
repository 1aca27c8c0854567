//! Signal state carried on a tile's connection sides.

/// The value driven on, or observed at, one side of a tile.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum SignalState {
    /// No electrical connection on this side.
    Disconnected,
    /// Driven or observed low.
    Low,
    /// Driven or observed high.
    High,
    /// Tri-state: conflicting drivers, or an indeterminate input. Only
    /// observable when a board's `extra_logic_states` flag is enabled.
    Middle,
}

impl SignalState {
    /// True for any concrete (non-Disconnected, non-Middle) driven value.
    pub fn is_definite(self) -> bool {
        matches!(self, SignalState::Low | SignalState::High)
    }

    pub fn is_high(self) -> bool {
        matches!(self, SignalState::High)
    }

    pub fn is_middle(self) -> bool {
        matches!(self, SignalState::Middle)
    }
}

impl Default for SignalState {
    fn default() -> Self {
        SignalState::Disconnected
    }
}
