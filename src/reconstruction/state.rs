//! Reconstruction state machine.
//!
//! `Init -> Bootstrapped -> {SelectView -> RegisterView -> TriangulatePairs}* -> Done`

/// Stage of the incremental reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconstructionState {
    /// No camera posed yet.
    #[default]
    Init,
    /// Initial pair posed and triangulated.
    Bootstrapped,
    /// Looking for the next view to register.
    SelectView,
    /// Estimating the pose of the selected view.
    RegisterView,
    /// Triangulating the new view against the registered ones.
    TriangulatePairs,
    /// No view qualifies any more.
    Done,
}

impl ReconstructionState {
    /// Whether `step` can make progress from this state.
    pub fn is_running(self) -> bool {
        !matches!(self, Self::Init | Self::Done)
    }
}
