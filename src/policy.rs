//! Run flush policy.

use std::fs;
use std::sync::Arc;

/// Default number of input lines after which a run is flushed.
pub const DEFAULT_FLUSH_THRESHOLD: u64 = 100_000;
/// Default number of input lines between two resident memory samples.
pub const DEFAULT_MEMORY_CHECK_INTERVAL: u64 = 1_000;
/// Default resident memory size above which a run is flushed early.
pub const DEFAULT_MEMORY_LIMIT: u64 = 1024 * 1024 * 1024;

/// Resident memory probe interface.
pub trait MemoryProbe: Send + Sync {
    /// Returns the current resident memory size in bytes or [`None`] if it can't be measured.
    fn resident_bytes(&self) -> Option<u64>;
}

/// Probe reporting the resident set size of the current process.
/// Only supported on Linux, on other platforms the size is never reported.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessMemoryProbe;

impl MemoryProbe for ProcessMemoryProbe {
    fn resident_bytes(&self) -> Option<u64> {
        let status = fs::read_to_string("/proc/self/status").ok()?;
        parse_vm_rss(&status)
    }
}

/// Extracts `VmRSS` value from `/proc/<pid>/status` content.
fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|line| line.starts_with("VmRSS:"))?;
    let mut fields = line["VmRSS:".len()..].split_whitespace();

    let value: u64 = fields.next()?.parse().ok()?;
    match fields.next() {
        Some("kB") => Some(value * 1024),
        _ => None,
    }
}

/// Decides when the splitter writes its buffer out as a run.
///
/// A run is flushed when the number of lines read is a multiple of the flush threshold,
/// or when it is a multiple of the memory check interval and the sampled resident memory exceeds
/// the memory limit. The memory sample is a coarse backpressure signal, not an exact budget.
#[derive(Clone)]
pub struct FlushPolicy {
    flush_threshold: u64,
    memory_check_interval: u64,
    memory_limit: u64,
    probe: Arc<dyn MemoryProbe>,
}

impl FlushPolicy {
    /// Creates a new policy. Zero threshold and interval are treated as 1.
    ///
    /// # Arguments
    /// * `flush_threshold` - Number of lines after which a run is flushed
    /// * `memory_check_interval` - Number of lines between memory samples
    /// * `memory_limit` - Resident memory size in bytes that triggers an early flush
    /// * `probe` - Resident memory probe
    pub fn new(
        flush_threshold: u64,
        memory_check_interval: u64,
        memory_limit: u64,
        probe: Arc<dyn MemoryProbe>,
    ) -> Self {
        FlushPolicy {
            flush_threshold: flush_threshold.max(1),
            memory_check_interval: memory_check_interval.max(1),
            memory_limit,
            probe,
        }
    }

    pub fn flush_threshold(&self) -> u64 {
        self.flush_threshold
    }

    /// Checks if the buffer should be flushed after `lines_read` lines have been read.
    pub fn should_flush(&self, lines_read: u64) -> bool {
        if lines_read % self.flush_threshold == 0 {
            return true;
        }
        if lines_read % self.memory_check_interval != 0 {
            return false;
        }

        match self.probe.resident_bytes() {
            Some(resident) if resident > self.memory_limit => {
                log::info!(
                    "resident memory {} bytes exceeds limit {} bytes (line: {}), flushing early",
                    resident,
                    self.memory_limit,
                    lines_read
                );
                true
            }
            _ => false,
        }
    }
}

impl Default for FlushPolicy {
    fn default() -> Self {
        FlushPolicy::new(
            DEFAULT_FLUSH_THRESHOLD,
            DEFAULT_MEMORY_CHECK_INTERVAL,
            DEFAULT_MEMORY_LIMIT,
            Arc::new(ProcessMemoryProbe),
        )
    }
}
