//! Reconstruction of a channel's circular log index.
//!
//! The charger keeps up to twelve block boundary addresses per channel in a
//! ring. Once the ring is full the oldest entries are overwritten, so the
//! first address reported reappears further down the list where the ring
//! wraps. Putting the addresses back into chronological order gives the
//! live log blocks.

use crate::constants::{LOG_BLOCK_SIZE, LOG_INDEX_ENTRIES, UNUSED_LOG_ADDRESS};
use crate::error::{Alc8500Error, Result};
use crate::types::{LogBlock, LogIndex};

/// Rotation indexes at or above this are not handled
const MAX_ROTATION: usize = 8;

/// Offset from the recurrence of the first address to the oldest entry
const ROTATION_OFFSET: usize = 3;

/// Split raw index bytes into big-endian addresses, ignoring a trailing
/// odd byte.
pub fn parse_addresses(data: &[u8]) -> Vec<u16> {
    data.chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

/// Index the live sequence starts at in a full index, if the wrap point is
/// found.
pub fn rotation_index(addresses: &[u16]) -> Option<usize> {
    let first = *addresses.first()?;
    addresses
        .iter()
        .skip(1)
        .position(|&a| a == first)
        .map(|pos| pos + ROTATION_OFFSET)
}

/// Addresses left once unused entries are dropped
fn live_addresses(raw: &[u16]) -> Vec<u16> {
    raw.iter()
        .copied()
        .filter(|&a| a != UNUSED_LOG_ADDRESS)
        .collect()
}

/// Rotation index applied to a raw index, `None` unless the ring is full.
fn applied_rotation(addresses: &[u16]) -> Option<usize> {
    if addresses.len() == LOG_INDEX_ENTRIES {
        rotation_index(addresses)
    } else {
        None
    }
}

/// Put the surviving addresses in chronological order.
pub fn reorder(raw: &[u16]) -> Result<Vec<u16>> {
    let addresses = live_addresses(raw);

    if addresses.len() != LOG_INDEX_ENTRIES {
        return Ok(addresses);
    }

    match rotation_index(&addresses) {
        Some(idx) if idx < MAX_ROTATION => {
            let mut rotated = addresses[idx..].to_vec();
            rotated.extend_from_slice(&addresses[1..idx]);
            Ok(rotated)
        }
        // TODO: wrap points past entry 8 need the end marker moved to the
        // back and entry 0 dropped; needs a device capture to confirm.
        rotation_index => Err(Alc8500Error::UnsupportedLogLayout { rotation_index }),
    }
}

/// Describe the run between each pair of adjacent addresses.
///
/// Returns `None` if the addresses are not strictly increasing.
pub fn blocks(addresses: &[u16]) -> Option<Vec<LogBlock>> {
    addresses
        .windows(2)
        .map(|pair| {
            let (start, end) = (pair[0], pair[1]);
            let size = end.checked_sub(start).filter(|&size| size > 0)?;
            Some(LogBlock {
                address: start,
                size,
                block_count: size / LOG_BLOCK_SIZE,
                remainder: size % LOG_BLOCK_SIZE,
            })
        })
        .collect()
}

/// Rebuild the log index of `channel` from its raw address list.
pub fn reconstruct(channel: u8, raw: &[u16]) -> Result<LogIndex> {
    let addresses = reorder(raw)?;
    let blocks = blocks(&addresses).ok_or_else(|| Alc8500Error::UnsupportedLogLayout {
        rotation_index: applied_rotation(&live_addresses(raw)),
    })?;
    Ok(LogIndex {
        channel,
        addresses,
        blocks,
    })
}
