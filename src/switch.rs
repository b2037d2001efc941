use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide kill switch of the client.
///
/// When the switch is off, every evaluation returns its safest default without touching
/// the flag definitions or the network. The switch is read on every call, so flipping a
/// cloned handle takes effect immediately.
///
/// # Examples
///
/// ```rust
/// use unleash::Switch;
///
/// let switch = Switch::new(true);
/// let handle = switch.clone();
/// handle.set(false);
/// assert!(!switch.is_on());
/// ```
#[derive(Clone, Debug)]
pub struct Switch {
    state: Arc<AtomicBool>,
}

impl Switch {
    /// Creates a new [`Switch`] with the given initial state.
    pub fn new(on: bool) -> Self {
        Self {
            state: Arc::new(AtomicBool::new(on)),
        }
    }

    /// Returns `true` when the client is allowed to evaluate flags.
    pub fn is_on(&self) -> bool {
        self.state.load(Ordering::SeqCst)
    }

    /// Turns the switch on or off.
    pub fn set(&self, on: bool) {
        self.state.store(on, Ordering::SeqCst);
    }
}

impl Default for Switch {
    fn default() -> Self {
        Self::new(true)
    }
}
