pub mod collector;
pub mod report;
pub mod reporter;

pub use collector::{DiagnosticsCollector, FollowerStats};
pub use report::{DriftReport, ReportAck, ReportEnvelope};
pub use reporter::DiagnosticsReporter;
