//! Session statistics

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for a receiving session
///
/// All fields use atomic operations so every stage can record into the same
/// instance without locking.
#[derive(Debug, Default)]
pub struct SessionStats {
    /// Complete packets read off the stream
    pub frames_received: AtomicU64,

    /// Payload bytes read off the stream (headers excluded)
    pub bytes_received: AtomicU64,

    /// Config-only packets held back for merging
    pub config_packets_merged: AtomicU64,

    /// Images produced by the codec
    pub frames_decoded: AtomicU64,

    /// Packets the codec accepted without producing an image yet
    pub decoder_pending: AtomicU64,

    /// Images handed to the render sink
    pub frames_painted: AtomicU64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self, payload_len: usize) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(payload_len as u64, Ordering::Relaxed);
    }

    pub fn record_config_merged(&self) {
        self.config_packets_merged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decoded(&self) {
        self.frames_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decoder_pending(&self) {
        self.decoder_pending.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_painted(&self) {
        self.frames_painted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded.load(Ordering::Relaxed)
    }

    pub fn frames_painted(&self) -> u64 {
        self.frames_painted.load(Ordering::Relaxed)
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            frames_received: self.frames_received(),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            config_packets_merged: self.config_packets_merged.load(Ordering::Relaxed),
            frames_decoded: self.frames_decoded(),
            decoder_pending: self.decoder_pending.load(Ordering::Relaxed),
            frames_painted: self.frames_painted(),
        }
    }
}

/// Snapshot of session statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSummary {
    pub frames_received: u64,
    pub bytes_received: u64,
    pub config_packets_merged: u64,
    pub frames_decoded: u64,
    pub decoder_pending: u64,
    pub frames_painted: u64,
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} packets ({} bytes, {} config merged), {} decoded ({} pending in decoder), {} painted",
            self.frames_received,
            self.bytes_received,
            self.config_packets_merged,
            self.frames_decoded,
            self.decoder_pending,
            self.frames_painted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_counters() {
        let stats = SessionStats::new();

        stats.record_received(1000);
        stats.record_received(24);
        stats.record_config_merged();
        stats.record_decoded();
        stats.record_painted();

        let summary = stats.summary();
        assert_eq!(summary.frames_received, 2);
        assert_eq!(summary.bytes_received, 1024);
        assert_eq!(summary.config_packets_merged, 1);
        assert_eq!(summary.frames_decoded, 1);
        assert_eq!(summary.frames_painted, 1);
        assert_eq!(summary.decoder_pending, 0);
    }

    #[test]
    fn test_summary_display() {
        let stats = SessionStats::new();
        stats.record_received(10);
        let text = stats.summary().to_string();
        assert!(text.starts_with("1 packets (10 bytes"));
    }
}
