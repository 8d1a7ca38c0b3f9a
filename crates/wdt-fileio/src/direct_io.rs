/// Block size direct I/O must align reads, writes, and offsets to on the
/// platforms where it is supported (spec §4.6 "direct-I/O alignment").
///
/// 4 KiB covers every mainstream disk sector / page size; a host with a
/// larger native sector size would still accept writes aligned to this
/// (smaller) boundary correctly, just without the full performance benefit.
pub const ALIGNMENT: usize = 4096;

/// Rounds `value` down to the nearest multiple of [`ALIGNMENT`].
#[must_use]
pub const fn align_down(value: u64) -> u64 {
    value - (value % ALIGNMENT as u64)
}

/// Rounds `value` up to the nearest multiple of [`ALIGNMENT`].
#[must_use]
pub const fn align_up(value: u64) -> u64 {
    align_down(value) + if value % ALIGNMENT as u64 == 0 { 0 } else { ALIGNMENT as u64 }
}

/// Pads `buf` with trailing zeros up to the next multiple of [`ALIGNMENT`],
/// the shape direct I/O requires for the final, usually short, write of a
/// file (spec §4.6 "padding the last block").
pub fn pad_to_alignment(buf: &mut Vec<u8>) {
    let padded_len = align_up(buf.len() as u64) as usize;
    buf.resize(padded_len, 0);
}
