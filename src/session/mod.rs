//! Session layer: per-identity play loops and their registry

pub mod engine;
pub mod registry;
pub mod signal;
pub mod stats;

pub use engine::SessionEngine;
pub use registry::{SessionRegistry, StartStatus, StopStatus};
pub use signal::StopSignal;
pub use stats::{SessionPhase, SessionStats};
