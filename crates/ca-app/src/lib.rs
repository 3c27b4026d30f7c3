//! ca-app: analysis objects built on the signal, fit and metric crates.
//!
//! - source: where signals come from
//! - ledger: problems graded by severity
//! - common: fetching, smoothing setup, uncertainty and fits shared by both analyses
//! - sysid / quality: system identification and control quality
//! - analysis: both behind one enum
//! - persist: loading results into a table store
//! - report: fixed-width report lines

pub mod analysis;
pub mod common;
pub mod error;
pub mod history;
pub mod ledger;
pub mod persist;
pub mod quality;
pub mod report;
pub mod source;
pub mod sysid;

pub use analysis::{Analysis, DEFAULT_REPORT_ORDERS};
pub use common::{AnalysisCore, MISSING_BASIC_DATA};
pub use error::{AppError, AppResult};
pub use history::{History, InputData};
pub use ledger::{
    Complaint, ComplaintLevel, ProblemLedger, SEVERITY_QUALITATIVE, SEVERITY_SCALE, describe_severity,
    qualitative,
};
pub use persist::{ResultTarget, load_results};
pub use quality::{ControlQuality, INIT_EXCEPTION, TARGET_DOES_NOT_VARY};
pub use report::{ReportValue, format_report_line};
pub use source::{FetchRequest, FetchedSignal, InMemorySource, SignalSource, SourceError};
pub use sysid::SystemIdentification;
