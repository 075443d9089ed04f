//! # Fetch Buffer Tests
//!
//! Assembly of a window from two halves, coverage queries, and the
//! statistics renderers.

use frontsim_core::fetch::FetchBuffer;
use frontsim_core::stats::{BpuStats, FetchStats};
use pretty_assertions::assert_eq;

#[test]
fn test_new_buffer_is_invalid() {
    let buf = FetchBuffer::new(66);
    assert!(!buf.is_valid());
    assert_eq!(buf.size(), 66);
    assert!(!buf.contains(0, 0));
    assert!(buf.bytes_from(0).is_empty());
}

#[test]
fn test_merge_places_halves_back_to_back() {
    let mut buf = FetchBuffer::new(66);
    let first: Vec<u8> = (0..64).collect();
    let second = vec![0xAA, 0xBB];
    buf.merge_halves(0x1000, 64, &first, &second);

    assert!(buf.is_valid());
    assert_eq!(buf.start_pc(), 0x1000);
    assert_eq!(&buf.data()[..64], first.as_slice());
    assert_eq!(&buf.data()[64..], &[0xAA, 0xBB]);
}

#[test]
fn test_merge_uneven_split() {
    let mut buf = FetchBuffer::new(66);
    buf.merge_halves(0x1030, 16, &[1; 16], &[2; 50]);
    assert_eq!(&buf.data()[..16], &[1; 16]);
    assert_eq!(&buf.data()[16..], &[2; 50]);
}

#[test]
fn test_merge_zero_fills_short_input() {
    let mut buf = FetchBuffer::new(8);
    buf.merge_halves(0x100, 2, &[9, 9], &[7]);
    assert_eq!(buf.data(), &[9, 9, 7, 0, 0, 0, 0, 0]);
    assert_eq!(buf.filled(), 3);
    assert!(buf.contains(0x102, 1));
    assert!(!buf.contains(0x102, 2));
}

#[test]
fn test_merge_places_second_half_at_split() {
    let mut buf = FetchBuffer::new(8);
    buf.merge_halves(0x100, 4, &[9, 9], &[7, 7]);
    assert_eq!(buf.data(), &[9, 9, 0, 0, 7, 7, 0, 0]);
    assert_eq!(buf.bytes_from(0x104), &[7, 7]);
}

#[test]
fn test_merge_truncates_oversized_input() {
    let mut buf = FetchBuffer::new(4);
    buf.merge_halves(0x100, 3, &[1, 2, 3], &[4, 5, 6]);
    assert_eq!(buf.data(), &[1, 2, 3, 4]);
}

#[test]
fn test_contains_and_bytes_from() {
    let mut buf = FetchBuffer::new(66);
    buf.merge_halves(0x1000, 64, &[0; 64], &[0; 2]);

    assert!(buf.contains(0x1000, 4));
    assert!(buf.contains(0x103e, 4));
    assert!(!buf.contains(0x1040, 4), "only two bytes left past the line");
    assert!(!buf.contains(0x0ffe, 4));

    assert_eq!(buf.bytes_from(0x1040).len(), 2);
    assert_eq!(buf.bytes_from(0x1000).len(), 66);
    assert!(buf.bytes_from(0x2000).is_empty());
}

#[test]
fn test_short_window_covers_only_received_bytes() {
    let mut buf = FetchBuffer::new(128);
    buf.merge_halves(0x1002, 62, &[1; 62], &[2; 64]);
    assert_eq!(buf.filled(), 126);
    assert!(buf.contains(0x107c, 4));
    assert!(!buf.contains(0x107e, 4));
    assert_eq!(buf.bytes_from(0x1040).len(), 64);
    assert_eq!(&buf.data()[126..], &[0, 0]);
}

#[test]
fn test_invalidate_drops_coverage() {
    let mut buf = FetchBuffer::new(66);
    buf.merge_halves(0x1000, 64, &[0; 64], &[0; 2]);
    buf.invalidate();
    assert!(!buf.contains(0x1000, 4));
}

// ──────────────────────────────────────────────────────────
// Statistics rendering
// ──────────────────────────────────────────────────────────

#[test]
fn test_fetch_stats_display() {
    let stats = FetchStats {
        cycles: 10,
        running_cycles: 5,
        insts: 40,
        ..FetchStats::default()
    };
    let text = stats.to_string();
    assert!(text.starts_with("FETCH"));
    assert!(text.contains("fetch.insts            40"));
    assert!(text.contains("(50.00%)"));
}

#[test]
fn test_bpu_stats_display_lists_every_stage() {
    let stats = BpuStats::new(3);
    let text = stats.to_string();
    assert!(text.starts_with("BRANCH PREDICTION UNIT"));
    assert!(text.contains("bpu.stage0.preds"));
    assert!(text.contains("bpu.stage2.preds"));
    assert!(!text.contains("bpu.stage3.preds"));
}
