//! Hand-rolled base64 for hosts without a built-in base64url codec.
//!
//! Encoding always produces the unpadded URL-safe form. Decoding accepts both the
//! URL-safe (`-_`) and the standard (`+/`) alphabet, with or without up to two `=`
//! padding characters. Trailing bits that do not fit a whole byte must be zero.

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Unpadded encoded length for `len` input bytes.
#[must_use]
pub const fn encoded_len(len: usize) -> usize {
    (len * 4 + 2) / 3
}

/// Encode `input` into `out`, returning the number of bytes written.
///
/// Returns `None` when `out` is too small.
pub fn encode(input: &[u8], out: &mut [u8]) -> Option<usize> {
    let needed = encoded_len(input.len());
    if out.len() < needed {
        return None;
    }

    let mut written = 0;
    for chunk in input.chunks(3) {
        let b0 = u32::from(chunk[0]);
        let b1 = chunk.get(1).copied().map_or(0, u32::from);
        let b2 = chunk.get(2).copied().map_or(0, u32::from);
        let triple = (b0 << 16) | (b1 << 8) | b2;

        let sextets = [
            (triple >> 18) & 0x3f,
            (triple >> 12) & 0x3f,
            (triple >> 6) & 0x3f,
            triple & 0x3f,
        ];
        let emit = chunk.len() + 1;
        for sextet in sextets.iter().take(emit) {
            out[written] = ALPHABET[*sextet as usize];
            written += 1;
        }
    }

    Some(written)
}

fn sextet(byte: u8) -> Option<u32> {
    match byte {
        b'A'..=b'Z' => Some(u32::from(byte - b'A')),
        b'a'..=b'z' => Some(u32::from(byte - b'a') + 26),
        b'0'..=b'9' => Some(u32::from(byte - b'0') + 52),
        b'-' | b'+' => Some(62),
        b'_' | b'/' => Some(63),
        _ => None,
    }
}

/// Strip at most two trailing `=`.
#[must_use]
pub fn strip_padding(input: &[u8]) -> &[u8] {
    let mut end = input.len();
    let mut pads = 0;
    while end > 0 && pads < 2 && input[end - 1] == b'=' {
        end -= 1;
        pads += 1;
    }
    &input[..end]
}

/// Decode `input` into `out`, returning the number of bytes written.
///
/// Returns `None` for characters outside both alphabets, an impossible length,
/// non-zero trailing bits, or when `out` is too small.
pub fn decode_lenient(input: &[u8], out: &mut [u8]) -> Option<usize> {
    let input = strip_padding(input);
    if input.len() % 4 == 1 {
        return None;
    }

    let mut bits: u32 = 0;
    let mut bit_count: u32 = 0;
    let mut written = 0;

    for byte in input {
        let value = sextet(*byte)?;
        bits = (bits << 6) | value;
        bit_count += 6;

        if bit_count >= 8 {
            bit_count -= 8;
            if written == out.len() {
                return None;
            }
            out[written] = ((bits >> bit_count) & 0xff) as u8;
            written += 1;
            bits &= (1 << bit_count) - 1;
        }
    }

    if bits != 0 {
        return None;
    }

    Some(written)
}
