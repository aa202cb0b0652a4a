use foundation::ids::Generation;

/// Lifecycle of the data behind one UI region.
///
/// Idle → Loading → Ready | Failed, and back to Loading on the next request.
/// Only the generation recorded in `Loading` may move the state forward.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading {
        generation: Generation,
    },
    Ready,
    Failed {
        message: String,
    },
}

impl LoadState {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoadState::Failed { message } => Some(message.as_str()),
            _ => None,
        }
    }
}
