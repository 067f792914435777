// Continuous inbox monitoring: the poll loop, its backoff, alert delivery
// and shutdown plumbing.

pub mod alert;
pub mod backoff;
pub mod inbox;
pub mod shutdown;

pub use alert::{Alert, AlertSink, FanoutSink, ReplySink, TerminalSink};
pub use backoff::{BackoffPolicy, BackoffState};
pub use inbox::{CycleStats, InboxMonitor, MonitorSettings};
pub use shutdown::{Shutdown, ShutdownListener};
