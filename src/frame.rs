//! Frame encoding/decoding utilities.
//!
//! Every message on the link is wrapped between a start and an end byte.
//! Control bytes occurring inside the payload are escaped so that a bare
//! `ETX` only ever appears as the final byte of a frame.
//!
//! ```text
//! +------+-------------------------+------+
//! | 0x02 | escaped payload[0..len] | 0x03 |
//! +------+-------------------------+------+
//!
//! 0x05 -> 0x05 0x15
//! 0x02 -> 0x05 0x12
//! 0x03 -> 0x05 0x13
//! ```

use crate::constants::{ESC, ESC_ESC, ESC_ETX, ESC_STX, ETX, STX};

/// Escape a payload and wrap it in start/end delimiters.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 2);
    out.push(STX);
    for &b in payload {
        match b {
            ESC => out.extend_from_slice(&[ESC, ESC_ESC]),
            STX => out.extend_from_slice(&[ESC, ESC_STX]),
            ETX => out.extend_from_slice(&[ESC, ESC_ETX]),
            _ => out.push(b),
        }
    }
    out.push(ETX);
    out
}

/// Undo the escape substitutions and strip the first and last byte.
///
/// No validation is performed: an escape marker followed by anything other
/// than a known substitute is passed through unchanged, and input shorter
/// than two bytes yields an empty payload.
pub fn decode(framed: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(framed.len());
    let mut bytes = framed.iter().copied().peekable();
    while let Some(b) = bytes.next() {
        if b == ESC {
            let original = match bytes.peek() {
                Some(&ESC_ESC) => Some(ESC),
                Some(&ESC_STX) => Some(STX),
                Some(&ESC_ETX) => Some(ETX),
                _ => None,
            };
            if let Some(original) = original {
                bytes.next();
                out.push(original);
                continue;
            }
        }
        out.push(b);
    }

    if out.len() < 2 {
        return Vec::new();
    }
    out[1..out.len() - 1].to_vec()
}

/// Whether an encoded accumulator ends in a bare end delimiter.
///
/// An `ETX` byte inside the payload is always sent as `ESC 0x13`, so a
/// trailing `0x03` can only be the real end of frame.
pub fn is_complete(encoded: &[u8]) -> bool {
    encoded.last() == Some(&ETX)
}

/// Format bytes as space separated hex for log output.
pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
