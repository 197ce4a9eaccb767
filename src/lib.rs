//! Core of the echoline server: a sequential line-exchange script run as a
//! stackless cooperative task over a non-blocking transport.
//!
//! - [`runtime::task`]: the resumable-task primitive — one persisted resume
//!   point, no retained call stack across suspensions.
//! - [`runtime::sock`]: the fixed-capacity buffered line socket whose
//!   operations suspend and resume without replaying completed work.
//! - [`protocol`]: the five-step exchange script as an explicit state
//!   machine, one named state per suspension point.
//! - [`runtime`]: the mio event loop that serializes one connection at a
//!   time onto the machinery above.

pub mod config;
pub mod protocol;
pub mod runtime;
