//! Observability: gauge snapshot, Prometheus text exposition, and the
//! per-tick motion sample recorder.

pub mod http;
pub mod metrics;
pub mod recorder;

pub use http::spawn_metrics_server;
pub use metrics::{Metrics, SharedMetrics, lock, shared};
pub use recorder::{MotionRecorder, MotionSample};
