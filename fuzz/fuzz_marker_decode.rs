//! Fuzz target for the marker decoder.
//!
//! Run with: cargo +nightly fuzz run fuzz_marker_decode
//!
//! `decode_all` must never panic on model output. A successful decode must
//! be marker-free with offsets inside the cleaned text, and re-encoding the
//! recovered cursor or selection must decode back to the same text and
//! offsets.

#![no_main]

use inkwell_core::marker::{Marker, decode_all, encode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(decoded) = decode_all(s) else {
        return;
    };
    for marker in Marker::ALL {
        assert!(!decoded.text.contains(marker.token()), "cleaned text kept {marker}");
    }

    let len = decoded.text.chars().count();
    for (_, offset) in decoded.placement.iter() {
        assert!(offset <= len);
    }

    let (caret, start, end) = match (decoded.placement.selection(), decoded.placement.cursor()) {
        (Some((start, end)), _) if start < end => (start, start, end),
        (_, Some(cursor)) => (cursor, cursor, cursor),
        _ => return,
    };
    let marked = encode(&decoded.text, caret, start, end).expect("offsets come from decode");
    let again = decode_all(&marked).expect("encoded markers are ordered");
    assert_eq!(again.text, decoded.text);
    if start == end {
        assert_eq!(again.placement.cursor(), Some(caret));
    } else {
        assert_eq!(again.placement.selection(), Some((start, end)));
    }
});
