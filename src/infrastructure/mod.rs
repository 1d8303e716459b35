//! Infrastructure Layer
//!
//! Process-level concerns: run locking, wall-clock time and shutdown.

pub mod clock;
pub mod run_lock;
pub mod shutdown;

pub use clock::SystemClock;
pub use run_lock::RunLock;
pub use shutdown::{shutdown_signal, ShutdownController};
