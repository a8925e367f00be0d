//! # Register byte and word order
//!
//! Multi-register values arrive as big-endian 16-bit words. Devices disagree
//! on how the bytes of a 32-bit value are spread over those words, so every
//! float layout the template can name maps onto one [`ByteOrder`].
//!
//! Uses ABCD notation, A being the most significant byte of the value:
//!
//! | data type | words on the wire | order |
//! |---|---|---|
//! | `float32` | `AB CD` | [`ByteOrder::BigEndian`] |
//! | `rfloat32_byte_swap` | `BA DC` | [`ByteOrder::LittleEndianSwap`] |
//! | `rfloat32_word_swap` | `CD AB` | [`ByteOrder::BigEndianSwap`] |
//! | `rfloat32_byte_word_swap` | `DC BA` | [`ByteOrder::LittleEndian`] |
//! | `ruint16` / `rsint16` | `BA` | [`ByteOrder::LittleEndian16`] |

use std::fmt;

/// Placement of the value's bytes across the received words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    /// ABCD, network order
    #[default]
    BigEndian,
    /// DCBA, bytes and words reversed
    LittleEndian,
    /// CDAB, words swapped
    BigEndianSwap,
    /// BADC, bytes swapped inside each word
    LittleEndianSwap,
    /// AB, single word as received
    BigEndian16,
    /// BA, single word with its two bytes swapped
    LittleEndian16,
}

impl ByteOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BigEndian => "ABCD",
            Self::LittleEndian => "DCBA",
            Self::BigEndianSwap => "CDAB",
            Self::LittleEndianSwap => "BADC",
            Self::BigEndian16 => "AB",
            Self::LittleEndian16 => "BA",
        }
    }

    #[inline]
    pub fn has_word_swap(&self) -> bool {
        matches!(self, Self::BigEndianSwap | Self::LittleEndian)
    }

    #[inline]
    pub fn has_byte_swap(&self) -> bool {
        matches!(
            self,
            Self::LittleEndianSwap | Self::LittleEndian | Self::LittleEndian16
        )
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reorder the wire bytes of `N` words into big-endian value bytes.
///
/// A word swap reverses the word sequence; a byte swap exchanges the two
/// bytes inside each word. The two operations commute, which is what makes
/// DCBA the composition of BADC and CDAB.
#[inline]
fn words_to_value_bytes<const N: usize, const B: usize>(
    words: &[u16; N],
    order: ByteOrder,
) -> [u8; B] {
    debug_assert_eq!(N * 2, B);
    let mut out = [0u8; B];
    for (i, slot) in out.chunks_exact_mut(2).enumerate() {
        let word = if order.has_word_swap() {
            words[N - 1 - i]
        } else {
            words[i]
        };
        let word = if order.has_byte_swap() {
            word.swap_bytes()
        } else {
            word
        };
        slot.copy_from_slice(&word.to_be_bytes());
    }
    out
}

/// Inverse of [`words_to_value_bytes`]; both swaps are involutions.
#[inline]
fn value_bytes_to_words<const N: usize, const B: usize>(
    bytes: &[u8; B],
    order: ByteOrder,
) -> [u16; N] {
    let mut natural = [0u16; N];
    for (word, pair) in natural.iter_mut().zip(bytes.chunks_exact(2)) {
        *word = u16::from_be_bytes([pair[0], pair[1]]);
    }
    let mut out = [0u16; N];
    for (i, slot) in out.iter_mut().enumerate() {
        let word = if order.has_word_swap() {
            natural[N - 1 - i]
        } else {
            natural[i]
        };
        *slot = if order.has_byte_swap() {
            word.swap_bytes()
        } else {
            word
        };
    }
    out
}

/// Two registers as the four big-endian bytes of a 32-bit value.
///
/// ```rust
/// use modbus_dl::bytes::{regs_to_bytes_4, ByteOrder};
///
/// let regs = [0x1234, 0x5678];
/// assert_eq!(regs_to_bytes_4(&regs, ByteOrder::BigEndian), [0x12, 0x34, 0x56, 0x78]);
/// assert_eq!(regs_to_bytes_4(&regs, ByteOrder::BigEndianSwap), [0x56, 0x78, 0x12, 0x34]);
/// ```
#[inline]
pub fn regs_to_bytes_4(regs: &[u16; 2], order: ByteOrder) -> [u8; 4] {
    words_to_value_bytes::<2, 4>(regs, order)
}

/// Four registers as the eight big-endian bytes of a 64-bit value.
#[inline]
pub fn regs_to_bytes_8(regs: &[u16; 4], order: ByteOrder) -> [u8; 8] {
    words_to_value_bytes::<4, 8>(regs, order)
}

#[inline]
pub fn reg_to_u16(reg: u16, order: ByteOrder) -> u16 {
    if order.has_byte_swap() {
        reg.swap_bytes()
    } else {
        reg
    }
}

#[inline]
pub fn reg_to_i16(reg: u16, order: ByteOrder) -> i16 {
    reg_to_u16(reg, order) as i16
}

#[inline]
pub fn regs_to_f32(regs: &[u16; 2], order: ByteOrder) -> f32 {
    f32::from_be_bytes(regs_to_bytes_4(regs, order))
}

#[inline]
pub fn regs_to_f64(regs: &[u16; 4], order: ByteOrder) -> f64 {
    f64::from_be_bytes(regs_to_bytes_8(regs, order))
}

/// Encode an `f32` the way a device using `order` would place it on the wire.
#[inline]
pub fn f32_to_regs(value: f32, order: ByteOrder) -> [u16; 2] {
    value_bytes_to_words::<2, 4>(&value.to_be_bytes(), order)
}

/// Encode an `f64` the way a device using `order` would place it on the wire.
#[inline]
pub fn f64_to_regs(value: f64, order: ByteOrder) -> [u16; 4] {
    value_bytes_to_words::<4, 8>(&value.to_be_bytes(), order)
}
