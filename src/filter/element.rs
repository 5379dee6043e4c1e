//! Numeric element helpers.
//!
//! Filters that reconstruct numeric values (e.g. `scaleoffset`) operate on a closed set of [`ElementKind`]s.
//! Values are widened to 64 bits for arithmetic and truncated back to the element width when written.

/// A byte order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little endian.
    Little,
    /// Big endian.
    Big,
}

impl ByteOrder {
    /// The byte order of the target.
    #[must_use]
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }

    /// Create a byte order from a filter parameter (`0` is little endian, `1` is big endian).
    #[must_use]
    pub const fn from_parameter(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Little),
            1 => Some(Self::Big),
            _ => None,
        }
    }

    /// Returns true if this is the byte order of the target.
    #[must_use]
    pub fn is_native(self) -> bool {
        self == Self::native()
    }
}

/// The class of a numeric element.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ElementClass {
    /// An integer.
    Integer,
    /// An IEEE 754 floating point number.
    Float,
}

/// A numeric element kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ElementKind {
    /// `u8`.
    UInt8,
    /// `i8`.
    Int8,
    /// `u16`.
    UInt16,
    /// `i16`.
    Int16,
    /// `u32`.
    UInt32,
    /// `i32`.
    Int32,
    /// `u64`.
    UInt64,
    /// `i64`.
    Int64,
    /// `f32`.
    Float32,
    /// `f64`.
    Float64,
}

impl ElementKind {
    /// Create an element kind from its class, byte size and signedness.
    ///
    /// Signedness is ignored for floating point classes.
    /// Returns [`None`] if the combination is unsupported.
    #[must_use]
    pub const fn new(class: ElementClass, size: usize, signed: bool) -> Option<Self> {
        match (class, size, signed) {
            (ElementClass::Integer, 1, false) => Some(Self::UInt8),
            (ElementClass::Integer, 1, true) => Some(Self::Int8),
            (ElementClass::Integer, 2, false) => Some(Self::UInt16),
            (ElementClass::Integer, 2, true) => Some(Self::Int16),
            (ElementClass::Integer, 4, false) => Some(Self::UInt32),
            (ElementClass::Integer, 4, true) => Some(Self::Int32),
            (ElementClass::Integer, 8, false) => Some(Self::UInt64),
            (ElementClass::Integer, 8, true) => Some(Self::Int64),
            (ElementClass::Float, 4, _) => Some(Self::Float32),
            (ElementClass::Float, 8, _) => Some(Self::Float64),
            _ => None,
        }
    }

    /// The size of the element in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::UInt8 | Self::Int8 => 1,
            Self::UInt16 | Self::Int16 => 2,
            Self::UInt32 | Self::Int32 | Self::Float32 => 4,
            Self::UInt64 | Self::Int64 | Self::Float64 => 8,
        }
    }

    /// The size of the element in bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        // at most 64
        #[allow(clippy::cast_possible_truncation)]
        let bits = self.size() as u32 * 8;
        bits
    }

    /// The class of the element.
    #[must_use]
    pub const fn class(self) -> ElementClass {
        match self {
            Self::Float32 | Self::Float64 => ElementClass::Float,
            _ => ElementClass::Integer,
        }
    }

    /// Returns true if the element is a signed integer.
    #[must_use]
    pub const fn is_signed(self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    /// A mask of the element bits in a [`u64`].
    #[must_use]
    pub const fn mask(self) -> u64 {
        low_bits_mask(self.bits())
    }
}

/// A mask with the lowest `bits` bits set.
#[must_use]
pub const fn low_bits_mask(bits: u32) -> u64 {
    if bits >= u64::BITS {
        u64::MAX
    } else {
        (1 << bits) - 1
    }
}

/// Read an unsigned integer of `bytes.len()` (at most 8) bytes stored in native byte order.
#[must_use]
pub fn read_native_uint(bytes: &[u8]) -> u64 {
    let mut buffer = [0u8; 8];
    let len = bytes.len().min(8);
    if cfg!(target_endian = "big") {
        buffer[8 - len..].copy_from_slice(&bytes[..len]);
        u64::from_be_bytes(buffer)
    } else {
        buffer[..len].copy_from_slice(&bytes[..len]);
        u64::from_le_bytes(buffer)
    }
}

/// Write the low `bytes.len()` (at most 8) bytes of `value` in native byte order.
pub fn write_native_uint(bytes: &mut [u8], value: u64) {
    let len = bytes.len().min(8);
    if cfg!(target_endian = "big") {
        bytes[..len].copy_from_slice(&value.to_be_bytes()[8 - len..]);
    } else {
        bytes[..len].copy_from_slice(&value.to_le_bytes()[..len]);
    }
}

/// Read a little endian unsigned integer of `bytes.len()` (at most 8) bytes.
#[must_use]
pub fn read_le_uint(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .take(8)
        .enumerate()
        .fold(0, |value, (i, byte)| value | (u64::from(*byte) << (8 * i)))
}

/// Sign extend the low `bits` bits of `value`.
#[must_use]
pub const fn sign_extend(value: u64, bits: u32) -> i64 {
    if bits == 0 || bits >= u64::BITS {
        #[allow(clippy::cast_possible_wrap)]
        return value as i64;
    }
    let shift = u64::BITS - bits;
    #[allow(clippy::cast_possible_wrap)]
    let value = ((value << shift) as i64) >> shift;
    value
}

/// Reverse the byte order of each element of `element_size` bytes in `bytes`.
///
/// Trailing bytes that do not form a whole element are left untouched.
pub fn swap_byte_order(bytes: &mut [u8], element_size: usize) {
    if element_size > 1 {
        for element in bytes.chunks_exact_mut(element_size) {
            element.reverse();
        }
    }
}

/// Reassemble a value of `size` bytes that was copied into consecutive [`u32`] client data values in memory order.
///
/// Returns [`None`] if `params` is too short.
#[must_use]
pub fn value_from_params(params: &[u32], size: usize) -> Option<u64> {
    let words = size.div_ceil(core::mem::size_of::<u32>());
    let bytes: Vec<u8> = params
        .get(..words)?
        .iter()
        .flat_map(|word| word.to_ne_bytes())
        .take(size)
        .collect();
    Some(read_native_uint(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_kind_new() {
        assert_eq!(
            ElementKind::new(ElementClass::Integer, 2, true),
            Some(ElementKind::Int16)
        );
        assert_eq!(
            ElementKind::new(ElementClass::Float, 8, true),
            Some(ElementKind::Float64)
        );
        assert_eq!(ElementKind::new(ElementClass::Integer, 3, false), None);
        assert_eq!(ElementKind::new(ElementClass::Float, 2, false), None);
        assert_eq!(ElementKind::Int32.bits(), 32);
        assert_eq!(ElementKind::UInt64.mask(), u64::MAX);
        assert_eq!(ElementKind::UInt16.mask(), 0xffff);
        assert!(ElementKind::Int8.is_signed());
        assert!(!ElementKind::Float32.is_signed());
        assert_eq!(ElementKind::Float32.class(), ElementClass::Float);
    }

    #[test]
    fn native_uint() {
        let bytes = 0x1234u16.to_ne_bytes();
        assert_eq!(read_native_uint(&bytes), 0x1234);
        let mut out = [0u8; 4];
        write_native_uint(&mut out, 0xdead_beef);
        assert_eq!(out, 0xdead_beefu32.to_ne_bytes());
        let mut out = [0u8; 2];
        write_native_uint(&mut out, 0x1_2345);
        assert_eq!(out, 0x2345u16.to_ne_bytes());
    }

    #[test]
    fn le_uint() {
        assert_eq!(read_le_uint(&[0x01, 0x02, 0x03]), 0x03_0201);
        assert_eq!(read_le_uint(&[]), 0);
    }

    #[test]
    fn sign_extension() {
        assert_eq!(sign_extend(0xff, 8), -1);
        assert_eq!(sign_extend(0x7f, 8), 127);
        assert_eq!(sign_extend(0xffff_fffe, 32), -2);
        assert_eq!(sign_extend(u64::MAX, 64), -1);
    }

    #[test]
    fn swap() {
        let mut bytes = vec![1, 2, 3, 4, 5, 6, 7];
        swap_byte_order(&mut bytes, 2);
        assert_eq!(bytes, vec![2, 1, 4, 3, 6, 5, 7]);
    }

    #[test]
    fn params_value() {
        let fill = 0xbeefu16;
        let mut word = [0u8; 4];
        word[..2].copy_from_slice(&fill.to_ne_bytes());
        let params = [u32::from_ne_bytes(word)];
        assert_eq!(value_from_params(&params, 2), Some(0xbeef));

        let fill = 0x0102_0304_0506_0708u64;
        let bytes = fill.to_ne_bytes();
        let params = [
            u32::from_ne_bytes(bytes[..4].try_into().unwrap()),
            u32::from_ne_bytes(bytes[4..].try_into().unwrap()),
        ];
        assert_eq!(value_from_params(&params, 8), Some(fill));
        assert_eq!(value_from_params(&params[..1], 8), None);
    }

    #[test]
    fn byte_order() {
        assert!(ByteOrder::native().is_native());
        assert_eq!(ByteOrder::from_parameter(1), Some(ByteOrder::Big));
        assert_eq!(ByteOrder::from_parameter(2), None);
    }
}
