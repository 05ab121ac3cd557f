use std::time::Duration;

/// Per-server knobs for response emission.
#[derive(Debug, Clone)]
pub struct Config {
    /// Outbound buffer high watermark in bytes. The pipeline drains the
    /// connection write queue below this mark before reading more body
    /// data from the source.
    pub outbound_buffer_size: u64,
    /// Minimum acceptable client download throughput in bytes/second.
    /// Clients falling under it (after a warmup window) are disconnected.
    pub write_min_throughput: u64,
    /// Max time to wait for the socket to become writable again.
    pub write_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            outbound_buffer_size: 16 * 1024,
            write_min_throughput: 1024,
            write_timeout: Duration::from_secs(30),
        }
    }
}
