use super::line_protocol::encode_line;
use super::MetricsSink;
use crate::error::{EyepiError, Result};
use crate::scheduler::Measurement;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::UnixStream;
use tracing::{debug, info};

pub const DEFAULT_TELEGRAF_SOCKET: &str = "/tmp/telegraf.sock";

/// Writes measurements to a Telegraf `socket_listener` over a Unix stream
pub struct TelegrafSink {
    path: PathBuf,
    writer: BufWriter<UnixStream>,
}

impl TelegrafSink {
    pub async fn connect<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let stream = UnixStream::connect(&path).await.map_err(|e| {
            EyepiError::metrics(format!("cannot connect to {}: {}", path.display(), e))
        })?;

        info!("Connected to metrics socket {}", path.display());
        Ok(Self {
            path,
            writer: BufWriter::new(stream),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl MetricsSink for TelegrafSink {
    async fn record(&mut self, measurement: &Measurement) -> Result<()> {
        let line = encode_line(measurement)?;
        debug!("metrics: {}", line.trim_end());

        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}
