// Orchestrator Module
//
// Time control shared by every component that waits on the ledger.

/// Clock abstractions for deterministic time control in tests
pub mod clock;

use std::sync::Arc;

pub use clock::{Clock, PausedClock, SystemClock};

/// Clock used when nothing else is injected
pub fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}
