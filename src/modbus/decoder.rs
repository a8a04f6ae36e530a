// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register pair decoding
//!
//! PLC `REAL` values occupy two consecutive 16-bit holding registers. The
//! first register carries the high-order word, so the four bytes are read
//! big-endian and reinterpreted as an IEEE-754 single-precision float.
//!
//! | Register | Content |
//! |----------|---------|
//! | n        | bits 31..16 (sign, exponent, high mantissa) |
//! | n + 1    | bits 15..0 (low mantissa) |
//!
//! Every 32-bit pattern is a valid `f32`, NaN and infinities included, and
//! those are returned untouched.

use thiserror::Error;

/// Number of registers holding one `REAL` value
pub const REGISTER_COUNT: u16 = 2;

/// Errors raised when a register payload cannot be turned into a float
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The controller answered with a word count other than a register pair
    #[error("expected a register pair, got {0} word(s)")]
    WordCount(usize),
}

/// Decode one float from its high and low words.
pub fn decode_f32(high: u16, low: u16) -> f32 {
    let [h0, h1] = high.to_be_bytes();
    let [l0, l1] = low.to_be_bytes();
    f32::from_be_bytes([h0, h1, l0, l1])
}

/// Decode a register read response into a float.
///
/// ### Parameters
///
/// * `words` - The registers returned by the controller, in address order
///
/// ### Returns
///
/// The decoded value, or [`DecodeError::WordCount`] when `words` is not
/// exactly one register pair.
pub fn decode_register_pair(words: &[u16]) -> Result<f32, DecodeError> {
    match words {
        [high, low] => Ok(decode_f32(*high, *low)),
        other => Err(DecodeError::WordCount(other.len())),
    }
}

/// Split a float into the `[high, low]` register pair a PLC would expose.
pub fn encode_f32(value: f32) -> [u16; 2] {
    let [b0, b1, b2, b3] = value.to_be_bytes();
    [u16::from_be_bytes([b0, b1]), u16::from_be_bytes([b2, b3])]
}

/// Convert a decoded value to the engineering value kept for display and logging.
///
/// The value is widened to `f64` and rounded to `decimal_places`. Non-finite
/// values pass through unchanged.
pub fn to_engineering(value: f32, decimal_places: u32) -> f64 {
    let value = f64::from(value);
    if !value.is_finite() {
        return value;
    }
    let scale = 10f64.powi(decimal_places as i32);
    let scaled = value * scale;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / scale
}
