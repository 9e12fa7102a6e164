pub mod compute;
pub mod schedule;
pub mod show;
pub mod sync;

// Re-export command functions for convenience
pub use compute::{compute, ComputeArgs};
pub use schedule::schedule;
pub use show::show;
pub use sync::sync;
