pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod ignore;
pub mod platform;
pub mod progress;
pub mod reconcile;
pub mod scanner;
pub mod session;
pub mod storage;

pub use analysis::report::{Report, ReportOptions};
pub use config::AppConfig;
pub use engine::ScanEngine;
pub use error::{Error, FileError};
pub use ignore::{GlobIgnore, IgnorePredicate};
pub use progress::{ProgressReporter, SilentReporter};
pub use reconcile::PruneSummary;
pub use session::{ScanCounts, ScanSession, ScanStatus, ScanSummary};
