use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Coarse condition reported by the link hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    #[default]
    Normal,
    /// The peripheral flagged an error.
    Error,
    /// The peripheral is held in reset or was never brought up.
    Reset,
}

impl LinkState {
    fn to_raw(self) -> u8 {
        match self {
            LinkState::Normal => 0,
            LinkState::Error => 1,
            LinkState::Reset => 2,
        }
    }

    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => LinkState::Error,
            2 => LinkState::Reset,
            _ => LinkState::Normal,
        }
    }
}

/// Shared, lock-free cell holding the current [`LinkState`].
///
/// The driver side updates it; pipelines read it when asked for their state.
/// Clones observe the same value.
#[derive(Debug, Clone, Default)]
pub struct LinkStateCell {
    raw: Arc<AtomicU8>,
}

impl LinkStateCell {
    pub fn new(initial: LinkState) -> Self {
        Self {
            raw: Arc::new(AtomicU8::new(initial.to_raw())),
        }
    }

    #[inline]
    pub fn get(&self) -> LinkState {
        LinkState::from_raw(self.raw.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: LinkState) {
        self.raw.store(state.to_raw(), Ordering::Release);
    }
}
