pub mod error;
pub mod metric;

pub use error::LogsterError;
pub use metric::{Metric, MetricSink, VecSink};
