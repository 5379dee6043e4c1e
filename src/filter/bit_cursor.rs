//! A bit cursor for reading sub-byte aligned values from a packed byte stream.
//!
//! Packed values are stored most significant bit first and may straddle byte boundaries.
//! The `nbit` and `scaleoffset` filters unpack each atomic element one destination byte at a time with [`BitCursor::unpack_atomic`].

use thiserror::Error;

use super::{element::ByteOrder, CodecError};

/// The packed input was exhausted before all bits were read.
#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
#[error("packed input exhausted at byte {byte_index}")]
pub struct BitCursorError {
    byte_index: usize,
}

impl BitCursorError {
    /// The index of the byte that could not be read.
    #[must_use]
    pub const fn byte_index(&self) -> usize {
        self.byte_index
    }
}

impl From<BitCursorError> for CodecError {
    fn from(err: BitCursorError) -> Self {
        Self::InvalidData {
            message: err.to_string(),
            offset: Some(err.byte_index as u64),
        }
    }
}

/// The layout of a packed atomic element.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PackedAtomic {
    /// The size of the unpacked element in bytes.
    pub size: usize,
    /// The byte order of the unpacked element.
    pub order: ByteOrder,
    /// The number of significant bits.
    pub precision: usize,
    /// The bit offset of the significant bits within the element.
    pub offset: usize,
}

impl PackedAtomic {
    /// Returns an error unless the significant bits of the element fit within its size.
    ///
    /// # Errors
    /// Returns an error description if `size` or `precision` is zero, or `precision + offset` exceeds the size of the element in bits.
    pub fn validate(&self) -> Result<(), String> {
        if self.size == 0 {
            Err("atomic element size is zero".to_string())
        } else if self.precision == 0 {
            Err("atomic element precision is zero".to_string())
        } else if self
            .precision
            .checked_add(self.offset)
            .map_or(true, |bits| bits > self.size.saturating_mul(8))
        {
            Err(format!(
                "atomic element precision {} with offset {} exceeds its size of {} bytes",
                self.precision, self.offset, self.size
            ))
        } else {
            Ok(())
        }
    }
}

/// A position in a packed byte stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BitCursor {
    /// The index of the current byte.
    byte_index: usize,
    /// The number of unread bits in the current byte.
    bits_left: u32,
}

impl Default for BitCursor {
    fn default() -> Self {
        Self::new()
    }
}

fn low_mask(bits: u32) -> u8 {
    if bits >= u8::BITS {
        u8::MAX
    } else {
        (1u8 << bits) - 1
    }
}

impl BitCursor {
    /// Create a cursor at the start of a stream.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            byte_index: 0,
            bits_left: u8::BITS,
        }
    }

    /// The index of the current byte.
    #[must_use]
    pub const fn byte_index(&self) -> usize {
        self.byte_index
    }

    /// The number of unread bits in the current byte.
    #[must_use]
    pub const fn bits_left(&self) -> u32 {
        self.bits_left
    }

    fn next_byte(&mut self) {
        self.byte_index += 1;
        self.bits_left = u8::BITS;
    }

    fn current(&self, input: &[u8]) -> Result<u8, BitCursorError> {
        input
            .get(self.byte_index)
            .copied()
            .ok_or(BitCursorError {
                byte_index: self.byte_index,
            })
    }

    /// Read the next `bits` (1 to 8) bits of `input` into the low bits of a byte.
    ///
    /// # Errors
    /// Returns [`BitCursorError`] if `input` is exhausted.
    pub fn read_bits(&mut self, input: &[u8], bits: u32) -> Result<u8, BitCursorError> {
        debug_assert!((1..=u8::BITS).contains(&bits));
        let mut remaining = bits.min(u8::BITS);
        let value = self.current(input)?;
        if self.bits_left > remaining {
            let bits = (value >> (self.bits_left - remaining)) & low_mask(remaining);
            self.bits_left -= remaining;
            return Ok(bits);
        }

        // the read straddles a byte boundary
        let mut bits = (value & low_mask(self.bits_left)) << (remaining - self.bits_left);
        remaining -= self.bits_left;
        self.next_byte();
        if remaining == 0 {
            return Ok(bits);
        }
        let value = self.current(input)?;
        bits |= (value >> (self.bits_left - remaining)) & low_mask(remaining);
        self.bits_left -= remaining;
        Ok(bits)
    }

    /// Copy `output.len()` whole bytes from the packed stream.
    ///
    /// # Errors
    /// Returns [`BitCursorError`] if `input` is exhausted.
    pub fn copy_bytes(&mut self, input: &[u8], output: &mut [u8]) -> Result<(), BitCursorError> {
        for byte in output {
            *byte = self.read_bits(input, u8::BITS)?;
        }
        Ok(())
    }

    /// Unpack one atomic element from `input` into `element`.
    ///
    /// `element` must be `atomic.size` bytes and zero-initialised, and `atomic` must be [valid](PackedAtomic::validate).
    /// Bytes holding significant bits are visited from most to least significant, so the byte index runs downwards for little endian elements and upwards for big endian elements.
    ///
    /// # Errors
    /// Returns [`BitCursorError`] if `input` is exhausted.
    pub fn unpack_atomic(
        &mut self,
        input: &[u8],
        element: &mut [u8],
        atomic: &PackedAtomic,
    ) -> Result<(), BitCursorError> {
        let datatype_bits = atomic.size * 8;
        let significant_bits = atomic.precision + atomic.offset;
        match atomic.order {
            ByteOrder::Little => {
                let begin = (significant_bits - 1) / 8;
                let end = atomic.offset / 8;
                for k in (end..=begin).rev() {
                    self.unpack_byte(input, element, k, begin, end, atomic, datatype_bits)?;
                }
            }
            ByteOrder::Big => {
                let begin = (datatype_bits - significant_bits) / 8;
                let end = (datatype_bits - atomic.offset - 1) / 8;
                for k in begin..=end {
                    self.unpack_byte(input, element, k, begin, end, atomic, datatype_bits)?;
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn unpack_byte(
        &mut self,
        input: &[u8],
        element: &mut [u8],
        k: usize,
        begin: usize,
        end: usize,
        atomic: &PackedAtomic,
        datatype_bits: usize,
    ) -> Result<(), BitCursorError> {
        // bits to read and their left shift within the destination byte
        let (bits, shift) = if begin == end {
            (atomic.precision, atomic.offset % 8)
        } else if k == begin {
            (
                8 - (datatype_bits - atomic.precision - atomic.offset) % 8,
                0,
            )
        } else if k == end {
            let bits = 8 - atomic.offset % 8;
            (bits, 8 - bits)
        } else {
            (8, 0)
        };
        // bits <= 8, shift < 8
        #[allow(clippy::cast_possible_truncation)]
        let value = self.read_bits(input, bits as u32)?;
        if let Some(byte) = element.get_mut(k) {
            *byte = value << shift;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_cursor_read_bits() {
        let input = [0b1011_0100, 0b1011_0000];
        let mut cursor = BitCursor::new();
        assert_eq!(cursor.read_bits(&input, 3).unwrap(), 0b101);
        assert_eq!(cursor.bits_left(), 5);
        assert_eq!(cursor.read_bits(&input, 8).unwrap(), 0b1010_0101);
        assert_eq!(cursor.byte_index(), 1);
        assert_eq!(cursor.bits_left(), 5);
        assert_eq!(cursor.read_bits(&input, 5).unwrap(), 0b1_0000);
        assert_eq!(cursor.byte_index(), 2);
        assert_eq!(cursor.bits_left(), 8);
        assert_eq!(
            cursor.read_bits(&input, 1),
            Err(BitCursorError { byte_index: 2 })
        );
    }

    #[test]
    fn bit_cursor_copy_bytes() {
        let input = [0xab, 0xcd];
        let mut cursor = BitCursor::new();
        let mut output = [0u8; 2];
        cursor.copy_bytes(&input, &mut output).unwrap();
        assert_eq!(output, input);
        assert!(cursor.copy_bytes(&input, &mut output[..1]).is_err());
    }

    #[test]
    fn bit_cursor_unpack_atomic_le() {
        // two 12-bit values (0xabc, 0x123) at bit offset 2 of a little endian u16
        let input = [0xab, 0xc1, 0x23];
        let atomic = PackedAtomic {
            size: 2,
            order: ByteOrder::Little,
            precision: 12,
            offset: 2,
        };
        atomic.validate().unwrap();
        let mut cursor = BitCursor::new();
        let mut output = [0u8; 4];
        let (first, second) = output.split_at_mut(2);
        cursor.unpack_atomic(&input, first, &atomic).unwrap();
        cursor.unpack_atomic(&input, second, &atomic).unwrap();
        assert_eq!(output, [0xf0, 0x2a, 0x8c, 0x04]);
    }

    #[test]
    fn bit_cursor_unpack_atomic_be() {
        // a 9-bit value (259) in a big endian u16
        let input = [0b1000_0001, 0b1000_0000];
        let atomic = PackedAtomic {
            size: 2,
            order: ByteOrder::Big,
            precision: 9,
            offset: 0,
        };
        let mut cursor = BitCursor::new();
        let mut output = [0u8; 2];
        cursor.unpack_atomic(&input, &mut output, &atomic).unwrap();
        assert_eq!(output, 259u16.to_be_bytes());
        assert_eq!(cursor.byte_index(), 1);
        assert_eq!(cursor.bits_left(), 7);
    }

    #[test]
    fn bit_cursor_unpack_atomic_single_byte() {
        // a 3-bit value at bit offset 4
        let input = [0b0110_0000];
        let atomic = PackedAtomic {
            size: 1,
            order: ByteOrder::Little,
            precision: 3,
            offset: 4,
        };
        let mut cursor = BitCursor::new();
        let mut output = [0u8; 1];
        cursor.unpack_atomic(&input, &mut output, &atomic).unwrap();
        assert_eq!(output, [0b0011_0000]);
    }

    #[test]
    fn bit_cursor_unpack_atomic_full_width() {
        let input: Vec<u8> = (1..=8).collect();
        for (order, expected) in [
            (ByteOrder::Big, vec![1, 2, 3, 4, 5, 6, 7, 8]),
            (ByteOrder::Little, vec![4, 3, 2, 1, 8, 7, 6, 5]),
        ] {
            let atomic = PackedAtomic {
                size: 4,
                order,
                precision: 32,
                offset: 0,
            };
            let mut cursor = BitCursor::new();
            let mut output = vec![0u8; 8];
            for element in output.chunks_exact_mut(4) {
                cursor.unpack_atomic(&input, element, &atomic).unwrap();
            }
            assert_eq!(output, expected);
        }
    }

    #[test]
    fn packed_atomic_validate() {
        let mut atomic = PackedAtomic {
            size: 2,
            order: ByteOrder::Little,
            precision: 12,
            offset: 4,
        };
        assert!(atomic.validate().is_ok());
        atomic.offset = 5;
        assert!(atomic.validate().is_err());
        atomic.offset = 0;
        atomic.precision = 0;
        assert!(atomic.validate().is_err());
        atomic.precision = 1;
        atomic.size = 0;
        assert!(atomic.validate().is_err());
    }
}
