//! Client side of the acquisition pipeline.

pub mod acquisition;
pub mod progress;

pub use acquisition::{AcquisitionClient, AcquisitionError};
pub use progress::{Phase, ProgressState, ProgressTracker, follow_until_terminal};
