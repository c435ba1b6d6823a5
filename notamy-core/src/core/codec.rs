//! Static Huffman coding for the note file at rest.
//!
//! Container layout:
//!
//! ```text
//! "HUFF" | 256 x u32 little-endian byte counts | payload
//! ```
//!
//! The payload is the concatenated codes packed most significant bit first,
//! zero padded to a whole byte. Decoding rebuilds the same tree from the
//! counts and stops after `sum(counts)` symbols, so the padding is never read.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use thiserror::Error;

pub const MAGIC: &[u8; 4] = b"HUFF";

const SYMBOLS: usize = 256;
const HEADER_LEN: usize = MAGIC.len() + SYMBOLS * 4;

/// Errors produced while encoding or decoding a container.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The header or payload ended before every symbol was decoded.
    #[error("compressed data is truncated")]
    Truncated,

    /// A byte occurs more often than a 32-bit counter can record.
    #[error("input of {0} bytes is too large to compress")]
    TooLarge(usize),
}

#[derive(Debug, Clone, Copy)]
enum HuffNode {
    Leaf(u8),
    Internal { zero: usize, one: usize },
}

/// Code tree stored as an arena; `root` is `None` only for empty input.
#[derive(Debug)]
struct HuffTree {
    nodes: Vec<HuffNode>,
    root: Option<usize>,
}

/// Builds the code tree for `counts`.
///
/// Ties in frequency are broken by arrival order: leaves enter in byte order,
/// each merged node after all earlier entries. Compressor and decompressor
/// therefore derive identical trees from the same counts.
fn build_tree(counts: &[u32; SYMBOLS]) -> HuffTree {
    let mut nodes = Vec::new();
    let mut heap = BinaryHeap::new();

    for (byte, &count) in counts.iter().enumerate() {
        if count > 0 {
            heap.push(Reverse((u64::from(count), nodes.len())));
            nodes.push(HuffNode::Leaf(byte as u8));
        }
    }

    while heap.len() > 1 {
        let (Some(Reverse((fa, a))), Some(Reverse((fb, b)))) = (heap.pop(), heap.pop()) else {
            break;
        };
        heap.push(Reverse((fa + fb, nodes.len())));
        nodes.push(HuffNode::Internal { zero: a, one: b });
    }

    let root = heap.pop().map(|Reverse((_, id))| id);
    HuffTree { nodes, root }
}

/// Code for every byte present; a lone symbol gets the one-bit code `0`.
fn derive_codes(tree: &HuffTree) -> Vec<Vec<bool>> {
    let mut codes = vec![Vec::new(); SYMBOLS];
    let Some(root) = tree.root else {
        return codes;
    };
    if let HuffNode::Leaf(byte) = tree.nodes[root] {
        codes[byte as usize] = vec![false];
        return codes;
    }

    let mut stack = vec![(root, Vec::new())];
    while let Some((id, prefix)) = stack.pop() {
        match tree.nodes[id] {
            HuffNode::Leaf(byte) => codes[byte as usize] = prefix,
            HuffNode::Internal { zero, one } => {
                let mut one_code = prefix.clone();
                one_code.push(true);
                let mut zero_code = prefix;
                zero_code.push(false);
                stack.push((one, one_code));
                stack.push((zero, zero_code));
            }
        }
    }
    codes
}

struct BitWriter {
    out: Vec<u8>,
    current: u8,
    filled: u8,
}

impl BitWriter {
    fn new(out: Vec<u8>) -> Self {
        Self {
            out,
            current: 0,
            filled: 0,
        }
    }

    fn push(&mut self, bit: bool) {
        self.current = (self.current << 1) | u8::from(bit);
        self.filled += 1;
        if self.filled == 8 {
            self.out.push(self.current);
            self.current = 0;
            self.filled = 0;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.filled > 0 {
            self.out.push(self.current << (8 - self.filled));
        }
        self.out
    }
}

/// Compresses `data` into a container.
///
/// # Errors
///
/// Returns [`CodecError::TooLarge`] if the input exceeds the 32-bit counters.
pub fn compress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    if u32::try_from(data.len()).is_err() {
        return Err(CodecError::TooLarge(data.len()));
    }
    let mut counts = [0u32; SYMBOLS];
    for &byte in data {
        counts[byte as usize] += 1;
    }

    let mut out = Vec::with_capacity(HEADER_LEN + data.len() / 2);
    out.extend_from_slice(MAGIC);
    for count in counts {
        out.extend_from_slice(&count.to_le_bytes());
    }

    let codes = derive_codes(&build_tree(&counts));
    let mut writer = BitWriter::new(out);
    for &byte in data {
        for &bit in &codes[byte as usize] {
            writer.push(bit);
        }
    }
    let out = writer.finish();
    log::debug!("compressed {} bytes into {}", data.len(), out.len());
    Ok(out)
}

/// True when `data` starts with the container magic.
#[must_use]
pub fn is_compressed(data: &[u8]) -> bool {
    data.starts_with(MAGIC)
}

/// Decompresses a container.
///
/// Returns `Ok(None)` when `data` does not start with the magic, so callers
/// can fall back to treating it as plain text.
///
/// # Errors
///
/// Returns [`CodecError::Truncated`] if the header is short, the counts
/// promise more symbols than the payload has bits, or the payload runs out of
/// bits before every counted symbol is produced.
pub fn decompress(data: &[u8]) -> Result<Option<Vec<u8>>, CodecError> {
    if !is_compressed(data) {
        return Ok(None);
    }
    if data.len() < HEADER_LEN {
        return Err(CodecError::Truncated);
    }

    let mut counts = [0u32; SYMBOLS];
    for (count, chunk) in counts
        .iter_mut()
        .zip(data[MAGIC.len()..HEADER_LEN].chunks_exact(4))
    {
        *count = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    let total: u64 = counts.iter().map(|&c| u64::from(c)).sum();

    // Every symbol costs at least one bit.
    let payload = &data[HEADER_LEN..];
    let payload_bits = payload.len() as u64 * 8;
    if total > payload_bits {
        return Err(CodecError::Truncated);
    }

    let tree = build_tree(&counts);
    let Some(root) = tree.root else {
        return Ok(Some(Vec::new()));
    };

    let mut out = Vec::with_capacity(usize::try_from(total).unwrap_or(usize::MAX));
    let mut bits = payload
        .iter()
        .flat_map(|byte| (0..8).rev().map(move |shift| (byte >> shift) & 1 == 1));
    let mut node = root;

    while (out.len() as u64) < total {
        let bit = bits.next().ok_or(CodecError::Truncated)?;
        if let HuffNode::Internal { zero, one } = tree.nodes[node] {
            node = if bit { one } else { zero };
        }
        if let HuffNode::Leaf(byte) = tree.nodes[node] {
            out.push(byte);
            node = root;
        }
    }
    Ok(Some(out))
}
