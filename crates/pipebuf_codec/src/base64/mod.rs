// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

mod sink;
mod source;

use ::base64::{DecodeError, Engine};
use pipebuf::Buffer;
pub use sink::Base64Sink;
pub use source::Base64Source;

/// Number of encoded bytes in one Base64 quantum.
pub const BASE64_BLOCK: usize = 4;

/// Number of decoded bytes represented by one full Base64 quantum.
pub const DECODED_BLOCK: usize = 3;

const PAD: u8 = b'=';

/// Decodes whole quanta of `encoded` into `output`.
///
/// `encoded` is a concatenation of one or more Base64 segments. Every quantum that contains
/// padding terminates its segment, so independently padded encodings written back to back decode
/// to the concatenation of their payloads.
fn decode_quanta<E: Engine>(engine: &E, encoded: &[u8], output: &mut Buffer) -> Result<(), DecodeError> {
    debug_assert_eq!(encoded.len() % BASE64_BLOCK, 0);

    let mut decoded = Vec::with_capacity(encoded.len() / BASE64_BLOCK * DECODED_BLOCK);
    let mut segment_start = 0;

    for (index, quantum) in encoded.chunks_exact(BASE64_BLOCK).enumerate() {
        if quantum.contains(&PAD) {
            let segment_end = (index + 1) * BASE64_BLOCK;
            decode_segment(engine, &encoded[segment_start..segment_end], &mut decoded)?;
            segment_start = segment_end;
        }
    }

    decode_segment(engine, &encoded[segment_start..], &mut decoded)?;

    output.put_slice(&decoded);
    Ok(())
}

fn decode_segment<E: Engine>(engine: &E, segment: &[u8], decoded: &mut Vec<u8>) -> Result<(), DecodeError> {
    if segment.is_empty() {
        return Ok(());
    }

    engine.decode_vec(segment, decoded)
}
