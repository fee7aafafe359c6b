pub mod config;
pub mod error;
pub mod iq;
pub mod simulation;
pub mod sync;
pub mod tracing_init;

pub use config::{PeakDetectorConfig, SyncConfig};
pub use error::SyncError;
pub use sync::{AcquisitionState, ProcessStatus, RunSummary, SymbolAcquisition};
