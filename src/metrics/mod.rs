mod line_protocol;
mod telegraf;
#[cfg(test)]
mod tests;

pub use line_protocol::{encode_line, escape_measurement, escape_tag};
pub use telegraf::{TelegrafSink, DEFAULT_TELEGRAF_SOCKET};

use crate::error::Result;
use crate::scheduler::Measurement;

/// Destination for relayed measurements
#[async_trait::async_trait]
pub trait MetricsSink: Send {
    async fn record(&mut self, measurement: &Measurement) -> Result<()>;
}
