//! ca-metrics: how well a controlled quantity follows its target.
//!
//! - standard: ISE/IAE/ITAE, raw, normalised and per window
//! - tracking: effective targets, lethargy and scorn
//! - bundle: everything for one shot, plus RMS error and gain error

pub mod bundle;
pub mod error;
pub mod standard;
pub mod tracking;

pub use bundle::{
    MIN_NORM, MetricHistories, MetricSet, MetricSettings, MetricUnits, MetricsBundle, Summary,
    calculate_control_metrics, gain_error,
};
pub use ca_fit::{TimeDomainSpecs, time_domain_specs_order_2};
pub use error::{MetricsError, MetricsResult};
pub use standard::{
    IntegralErrors, IntegralTraces, StandardMetrics, WindowedMetrics, calc_standard_metrics,
    calculate_standard_metrics,
};
pub use tracking::{
    ControlSeries, TARGET_VARIATION_THRESHOLD, TrackingHistories, TrackingMetrics,
    make_effective_target, target_varies, tracking_metrics,
};
