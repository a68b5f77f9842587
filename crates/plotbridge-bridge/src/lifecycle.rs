use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::info;

/// Lifecycle state of a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Receive and processing loops are active.
    Running,
    /// A stop was requested; no further dispatch happens.
    Draining,
    /// Both loops have terminated.
    Stopped,
}

impl State {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Running,
            1 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

/// What triggered a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The producer sent the `exit` literal.
    ExitFrame,
    /// An external interrupt (ctrl-c).
    Interrupted,
}

impl StopReason {
    /// Process exit status for this reason.
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::ExitFrame => 0,
            Self::Interrupted => 130,
        }
    }
}

#[derive(Debug)]
struct Inner {
    stop: AtomicBool,
    state: AtomicU8,
    reason: OnceLock<StopReason>,
}

/// Shared Running → Draining → Stopped controller.
///
/// Cheap to clone; every clone observes the same state. The first stop
/// request wins and fixes the [`StopReason`].
#[derive(Debug, Clone)]
pub struct Lifecycle {
    inner: Arc<Inner>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                stop: AtomicBool::new(false),
                state: AtomicU8::new(0),
                reason: OnceLock::new(),
            }),
        }
    }

    pub fn state(&self) -> State {
        State::from_u8(self.inner.state.load(Ordering::SeqCst))
    }

    /// Whether a stop has been requested.
    pub fn is_stopping(&self) -> bool {
        self.inner.stop.load(Ordering::SeqCst)
    }

    /// The raw stop flag, for transport calls that poll it.
    pub fn stop_flag(&self) -> &AtomicBool {
        &self.inner.stop
    }

    /// Request a stop and enter `Draining`.
    ///
    /// Returns `false` if a stop was already requested.
    pub fn request_stop(&self, reason: StopReason) -> bool {
        if self.inner.reason.set(reason).is_err() {
            return false;
        }
        self.inner.stop.store(true, Ordering::SeqCst);
        let _ = self
            .inner
            .state
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst);
        info!(?reason, "bridge draining");
        true
    }

    /// Both loops have finished.
    pub fn mark_stopped(&self) {
        self.inner.stop.store(true, Ordering::SeqCst);
        if self.inner.state.swap(2, Ordering::SeqCst) != 2 {
            info!(reason = ?self.reason(), "bridge stopped");
        }
    }

    pub fn reason(&self) -> Option<StopReason> {
        self.inner.reason.get().copied()
    }
}
