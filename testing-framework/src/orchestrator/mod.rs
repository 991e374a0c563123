// Orchestration infrastructure shared by every scenario.
//
// Scenario code reads time and sleeps only through `Clock`, which lets tests
// run whole epoch-gated scenarios under paused tokio time.

/// Clock abstractions for deterministic time control in tests
pub mod clock;

pub use clock::{Clock, PausedClock, SystemClock};
