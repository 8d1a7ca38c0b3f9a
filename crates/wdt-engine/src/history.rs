use std::collections::VecDeque;
use wdt_queue::{ByteSource, SourceQueue};

/// A [`ByteSource`] together with the worker-local sequence position at
/// which it was sent (spec §3 "InFlightRecord").
#[derive(Debug, Clone)]
pub struct InFlightRecord {
    source: ByteSource,
    seq: u64,
}

impl InFlightRecord {
    /// The in-flight block.
    #[must_use]
    pub const fn source(&self) -> &ByteSource {
        &self.source
    }

    /// The worker-local send sequence position.
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }
}

/// Tells [`ThreadTransferHistory::rewind_all`] that the connection's last
/// ACK covered only part of the oldest still-in-flight block, so that the
/// unsent tail (not the whole block) is the one returned to the queue
/// (spec §4.5 "Partial-block acks").
#[derive(Debug, Clone, Copy)]
pub struct PartialAck {
    /// Sequence number of the file the partial ack refers to.
    pub file_seq: u64,
    /// Byte offset within the file up to which the receiver has persisted
    /// data.
    pub persisted_offset: u64,
}

/// Per-connection ordered list of sources sent but not yet acked (spec §3,
/// §4.5, GLOSSARY "ThreadTransferHistory").
///
/// Owned exclusively by the worker thread that drives one TCP connection;
/// nothing here is shared, so no internal locking is needed. On failure the
/// worker calls [`ThreadTransferHistory::rewind_all`] to hand every
/// still-unacked source back to the [`SourceQueue`] before exiting (spec §4.3
/// step 5).
#[derive(Debug, Default)]
pub struct ThreadTransferHistory {
    records: VecDeque<InFlightRecord>,
}

impl ThreadTransferHistory {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: VecDeque::new(),
        }
    }

    /// Records `source` as sent at worker-local position `seq`, called
    /// before each send (spec §4.5 "append").
    pub fn append(&mut self, source: ByteSource, seq: u64) {
        self.records.push_back(InFlightRecord { source, seq });
    }

    /// Number of sources currently in flight on this connection.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Removes every record with `seq <= acked_seq`, per spec §4.5
    /// "ack_up_to". Returns the total byte length of the removed blocks, the
    /// "effective data bytes" the caller should credit to its stats.
    pub fn ack_up_to(&mut self, acked_seq: u64) -> u64 {
        let mut acked_bytes = 0u64;
        while let Some(front) = self.records.front() {
            if front.seq() > acked_seq {
                break;
            }
            let record = self.records.pop_front().expect("front just matched");
            acked_bytes += record.source.length();
        }
        acked_bytes
    }

    /// Returns every still-present source to `queue`, in original emission
    /// order, clearing this history (spec §4.5 "rewind_all").
    ///
    /// If `partial_ack` names the oldest remaining record's file, the record
    /// is trimmed to the unsent tail before being queued, so bytes the
    /// receiver already has are not retransmitted.
    pub fn rewind_all(&mut self, queue: &SourceQueue, partial_ack: Option<PartialAck>) {
        let mut sources: Vec<ByteSource> = self.records.drain(..).map(|r| r.source).collect();

        if let (Some(first), Some(ack)) = (sources.first().cloned(), partial_ack) {
            if first.file().seq() == ack.file_seq
                && ack.persisted_offset > first.offset()
                && ack.persisted_offset < first.end()
            {
                sources[0] = first.split_after(ack.persisted_offset - first.offset());
            }
        }

        queue.return_all_to_queue(sources.into_iter());
    }
}
