use crate::error_code::ErrorCode;

/// Byte and failure counters for one source, one worker thread, or one whole
/// transfer (spec §3 "TransferStats"). The same shape is reused at all three
/// granularities and folded bottom-up at transfer end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferStats {
    header_bytes: u64,
    data_bytes: u64,
    effective_data_bytes: u64,
    failed_attempts: u64,
    error_code: ErrorCode,
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferStats {
    /// An all-zero, `Ok` set of counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            header_bytes: 0,
            data_bytes: 0,
            effective_data_bytes: 0,
            failed_attempts: 0,
            error_code: ErrorCode::Ok,
        }
    }

    /// Bytes spent on frame headers (opcode, lengths, path strings).
    #[must_use]
    pub const fn header_bytes(&self) -> u64 {
        self.header_bytes
    }

    /// Bytes of file content placed on the wire, acked or not.
    #[must_use]
    pub const fn data_bytes(&self) -> u64 {
        self.data_bytes
    }

    /// Bytes of file content the receiver has confirmed persisting.
    #[must_use]
    pub const fn effective_data_bytes(&self) -> u64 {
        self.effective_data_bytes
    }

    /// Number of attempts that failed and were retried or rewound.
    #[must_use]
    pub const fn failed_attempts(&self) -> u64 {
        self.failed_attempts
    }

    /// The worst [`ErrorCode`] recorded at this granularity.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        self.error_code
    }

    /// Records `bytes` of header overhead.
    pub fn add_header_bytes(&mut self, bytes: u64) {
        self.header_bytes += bytes;
    }

    /// Records `bytes` of data placed on the wire.
    pub fn add_data_bytes(&mut self, bytes: u64) {
        self.data_bytes += bytes;
    }

    /// Records `bytes` of data the receiver has acked.
    pub fn add_effective_bytes(&mut self, bytes: u64) {
        self.effective_data_bytes += bytes;
    }

    /// Records one failed attempt.
    pub fn record_failed_attempt(&mut self) {
        self.failed_attempts += 1;
    }

    /// Raises this stats block's error code to `code` if it is more severe
    /// than what is already recorded.
    pub fn escalate(&mut self, code: ErrorCode) {
        self.error_code = self.error_code.worst(code);
    }

    /// Folds `other` into `self`: counters add, the error code takes the
    /// worse of the two. Used to aggregate per-source stats into per-thread,
    /// and per-thread into per-transfer (spec §3 "Aggregated bottom-up").
    pub fn merge(&mut self, other: &Self) {
        self.header_bytes += other.header_bytes;
        self.data_bytes += other.data_bytes;
        self.effective_data_bytes += other.effective_data_bytes;
        self.failed_attempts += other.failed_attempts;
        self.escalate(other.error_code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_sums_counters_and_escalates_error() {
        let mut total = TransferStats::new();
        let mut a = TransferStats::new();
        a.add_data_bytes(100);
        a.add_effective_bytes(100);
        let mut b = TransferStats::new();
        b.add_data_bytes(50);
        b.record_failed_attempt();
        b.escalate(ErrorCode::ChecksumMismatch);

        total.merge(&a);
        total.merge(&b);

        assert_eq!(total.data_bytes(), 150);
        assert_eq!(total.effective_data_bytes(), 100);
        assert_eq!(total.failed_attempts(), 1);
        assert_eq!(total.error_code(), ErrorCode::ChecksumMismatch);
    }

    #[test]
    fn escalate_never_downgrades() {
        let mut stats = TransferStats::new();
        stats.escalate(ErrorCode::VersionMismatch);
        stats.escalate(ErrorCode::ChecksumMismatch);
        assert_eq!(stats.error_code(), ErrorCode::VersionMismatch);
    }
}
