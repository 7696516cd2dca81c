//! Subscriber identifier (IMSI) wire codec.
//!
//! Identifiers travel as packed BCD (3GPP TS 29.274 §8.3): two decimal digits
//! per byte, high nibble first.  When the digit count is odd the low nibble of
//! the last byte is the filler value `0xF`.
//!
//! ```text
//!  "123456789012345"  ->  12 34 56 78 90 12 34 5F
//! ```
//!
//! No I/O happens here.  [`decode`] never fails,
//! and format validation ([`is_well_formed`]) is the caller's job.

use crate::error::PgwError;

/// Number of digits in a well-formed IMSI.
pub const IMSI_LEN: usize = 15;

/// Filler nibble used to pad odd-length digit strings.
const FILLER: u8 = 0x0F;

/// Pack a digit string into BCD bytes.
///
/// Returns [`PgwError::Format`] if `imsi` contains anything other than ASCII
/// decimal digits.  Length is not checked here.
pub fn encode(imsi: &str) -> Result<Vec<u8>, PgwError> {
    if !imsi.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PgwError::Format(imsi.to_string()));
    }

    let digits = imsi.as_bytes();
    let mut out = Vec::with_capacity(digits.len().div_ceil(2));
    for pair in digits.chunks(2) {
        let high = pair[0] - b'0';
        let low = match pair.get(1) {
            Some(d) => d - b'0',
            None => FILLER,
        };
        out.push((high << 4) | low);
    }
    Ok(out)
}

/// Unpack BCD bytes into a digit string.
///
/// Filler nibbles are dropped.  Nibbles `0xA..=0xE` are not digits and come
/// out as lowercase hex characters, so a corrupted payload can never pass
/// [`is_well_formed`].
pub fn decode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        for nibble in [byte >> 4, byte & 0x0F] {
            if nibble == FILLER {
                continue;
            }
            // nibble < 16, so from_digit cannot fail
            if let Some(c) = char::from_digit(nibble as u32, 16) {
                out.push(c);
            }
        }
    }
    out
}

/// True if `imsi` is exactly [`IMSI_LEN`] ASCII decimal digits.
pub fn is_well_formed(imsi: &str) -> bool {
    imsi.len() == IMSI_LEN && imsi.bytes().all(|b| b.is_ascii_digit())
}
