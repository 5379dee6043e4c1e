use std::borrow::Cow;

use crate::filter::{
    allocate_zeroed,
    bit_cursor::{BitCursor, PackedAtomic},
    element::ByteOrder,
    ensure_decode, CodecError, CodecOptions, FilterCodecTraits, FilterFlags, FilterId, RawBytes,
};

use super::{
    NbitClass, MAX_NESTING_DEPTH, NAME, NBIT_PARAMS_CLASS, NBIT_PARAMS_COUNT, NBIT_PARAMS_DESCRIPTION,
    NBIT_PARAMS_ELEMENTS, NBIT_PARAMS_NEED_NOT_COMPRESS,
};

/// A `nbit` codec implementation.
#[derive(Clone, Debug, Default)]
pub struct NbitCodec;

impl NbitCodec {
    /// Create a new `nbit` codec.
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }
}

/// A cursor over the client data values describing a datatype.
#[derive(Debug)]
struct ParamCursor<'p> {
    params: &'p [u32],
    position: usize,
}

impl<'p> ParamCursor<'p> {
    fn new(params: &'p [u32], position: usize) -> Self {
        Self { params, position }
    }

    fn position(&self) -> usize {
        self.position
    }

    fn seek(&mut self, position: usize) {
        self.position = position;
    }

    fn peek(&self) -> Result<u32, CodecError> {
        self.params.get(self.position).copied().ok_or_else(|| {
            CodecError::invalid_parameters(
                NAME,
                format!("datatype description truncated at value {}", self.position),
            )
        })
    }

    fn next(&mut self) -> Result<u32, CodecError> {
        let value = self.peek()?;
        self.position += 1;
        Ok(value)
    }

    fn next_usize(&mut self) -> Result<usize, CodecError> {
        let value = self.next()?;
        usize::try_from(value)
            .map_err(|_| CodecError::invalid_parameters(NAME, format!("value {value} overflow")))
    }

    fn next_class(&mut self) -> Result<NbitClass, CodecError> {
        let value = self.next()?;
        NbitClass::from_parameter(value).ok_or_else(|| {
            CodecError::invalid_parameters(NAME, format!("invalid datatype class {value}"))
        })
    }

    fn next_atomic(&mut self) -> Result<PackedAtomic, CodecError> {
        let size = self.next_usize()?;
        let order = self.next()?;
        let order = ByteOrder::from_parameter(order).ok_or_else(|| {
            CodecError::invalid_parameters(NAME, format!("invalid byte order {order}"))
        })?;
        let precision = self.next_usize()?;
        let offset = self.next_usize()?;
        let atomic = PackedAtomic {
            size,
            order,
            precision,
            offset,
        };
        atomic
            .validate()
            .map_err(|reason| CodecError::invalid_parameters(NAME, reason))?;
        Ok(atomic)
    }

    /// Advance past the description of a datatype of `class` without decoding.
    ///
    /// `depth` is the nesting depth of the enclosing datatype.
    fn skip(&mut self, class: NbitClass, depth: usize) -> Result<(), CodecError> {
        match class {
            NbitClass::Atomic => {
                self.next_atomic()?;
            }
            NbitClass::Array => {
                let depth = nesting(depth)?;
                self.next()?;
                let base_class = self.next_class()?;
                self.skip(base_class, depth)?;
            }
            NbitClass::Compound => {
                let depth = nesting(depth)?;
                self.next()?;
                let members = self.next()?;
                for _ in 0..members {
                    self.next()?;
                    let member_class = self.next_class()?;
                    self.skip(member_class, depth)?;
                }
            }
            NbitClass::NoOp => {
                self.next()?;
            }
        }
        Ok(())
    }
}

/// Return the depth of an array or compound nested in a datatype at `depth`.
fn nesting(depth: usize) -> Result<usize, CodecError> {
    if depth < MAX_NESTING_DEPTH {
        Ok(depth + 1)
    } else {
        Err(CodecError::invalid_parameters(
            NAME,
            format!("datatype nesting exceeds {MAX_NESTING_DEPTH} levels"),
        ))
    }
}

fn slot(data: &mut [u8], offset: usize, size: usize) -> Result<&mut [u8], CodecError> {
    let len = data.len();
    offset
        .checked_add(size)
        .and_then(|end| data.get_mut(offset..end))
        .ok_or_else(|| {
            CodecError::invalid_parameters(
                NAME,
                format!("{size} bytes at offset {offset} exceed the enclosing {len} bytes"),
            )
        })
}

/// Unpacks bit packed values from the encoded input.
struct Unpacker<'i> {
    input: &'i [u8],
    bits: BitCursor,
    /// The number of enclosing arrays and compounds.
    depth: usize,
}

impl Unpacker<'_> {
    fn atomic(&mut self, data: &mut [u8], params: &mut ParamCursor) -> Result<(), CodecError> {
        let atomic = params.next_atomic()?;
        let element = slot(data, 0, atomic.size)?;
        self.bits.unpack_atomic(self.input, element, &atomic)?;
        Ok(())
    }

    fn no_op(&mut self, data: &mut [u8], size: usize) -> Result<(), CodecError> {
        let element = slot(data, 0, size)?;
        self.bits.copy_bytes(self.input, element)?;
        Ok(())
    }

    fn array(&mut self, data: &mut [u8], params: &mut ParamCursor) -> Result<(), CodecError> {
        let total_size = params.next_usize()?;
        let data = slot(data, 0, total_size)?;
        let base_class = params.next_class()?;
        match base_class {
            NbitClass::Atomic => {
                let atomic = params.next_atomic()?;
                for element in data.chunks_exact_mut(atomic.size) {
                    self.bits.unpack_atomic(self.input, element, &atomic)?;
                }
            }
            NbitClass::Array | NbitClass::Compound => {
                let base_size = usize::try_from(params.peek()?).unwrap_or(0);
                if base_size == 0 {
                    return Err(CodecError::invalid_parameters(
                        NAME,
                        "array base datatype size is zero",
                    ));
                }
                let begin = params.position();
                let count = total_size / base_size;
                for element in data.chunks_exact_mut(base_size) {
                    // every element re-reads the base description
                    params.seek(begin);
                    self.nested(base_class, element, params)?;
                }
                if count == 0 {
                    params.skip(base_class, self.depth)?;
                }
            }
            NbitClass::NoOp => {
                params.next()?;
                self.no_op(data, total_size)?;
            }
        }
        Ok(())
    }

    fn compound(&mut self, data: &mut [u8], params: &mut ParamCursor) -> Result<(), CodecError> {
        let total_size = params.next_usize()?;
        let data = slot(data, 0, total_size)?;
        let members = params.next()?;
        for _ in 0..members {
            let member_offset = params.next_usize()?;
            let member_class = params.next_class()?;
            match member_class {
                NbitClass::Atomic => {
                    let atomic = params.next_atomic()?;
                    let element = slot(data, member_offset, atomic.size)?;
                    self.bits.unpack_atomic(self.input, element, &atomic)?;
                }
                NbitClass::Array | NbitClass::Compound => {
                    let member = data.get_mut(member_offset..).ok_or_else(|| {
                        CodecError::invalid_parameters(
                            NAME,
                            format!("member offset {member_offset} exceeds the compound size"),
                        )
                    })?;
                    self.nested(member_class, member, params)?;
                }
                NbitClass::NoOp => {
                    let size = params.next_usize()?;
                    let element = slot(data, member_offset, size)?;
                    self.no_op(element, size)?;
                }
            }
        }
        Ok(())
    }

    fn nested(
        &mut self,
        class: NbitClass,
        data: &mut [u8],
        params: &mut ParamCursor,
    ) -> Result<(), CodecError> {
        match class {
            NbitClass::Atomic => self.atomic(data, params),
            NbitClass::Array | NbitClass::Compound => {
                let depth = self.depth;
                self.depth = nesting(depth)?;
                let result = if class == NbitClass::Array {
                    self.array(data, params)
                } else {
                    self.compound(data, params)
                };
                self.depth = depth;
                result
            }
            NbitClass::NoOp => {
                let size = params.next_usize()?;
                self.no_op(data, size)
            }
        }
    }
}

fn parameter(client_params: &[u32], index: usize) -> Result<usize, CodecError> {
    let value = client_params.get(index).copied().ok_or_else(|| {
        CodecError::invalid_parameters(NAME, format!("missing client data value {index}"))
    })?;
    usize::try_from(value)
        .map_err(|_| CodecError::invalid_parameters(NAME, format!("value {value} overflow")))
}

impl FilterCodecTraits for NbitCodec {
    fn id(&self) -> FilterId {
        FilterId::NBIT
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn decode<'a>(
        &self,
        flags: FilterFlags,
        client_params: &[u32],
        encoded_value: RawBytes<'a>,
        _buf_size: usize,
        _options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError> {
        ensure_decode(flags, NAME)?;
        let count = parameter(client_params, NBIT_PARAMS_COUNT)?;
        if count != client_params.len() {
            return Err(CodecError::invalid_parameters(
                NAME,
                format!(
                    "declared {count} client data values, got {}",
                    client_params.len()
                ),
            ));
        }
        if parameter(client_params, NBIT_PARAMS_NEED_NOT_COMPRESS)? != 0 {
            return Ok(encoded_value);
        }

        let elements = parameter(client_params, NBIT_PARAMS_ELEMENTS)?;
        let class = client_params
            .get(NBIT_PARAMS_CLASS)
            .copied()
            .and_then(NbitClass::from_parameter)
            .filter(|class| *class != NbitClass::NoOp)
            .ok_or_else(|| CodecError::invalid_parameters(NAME, "invalid datatype class"))?;
        let element_size = parameter(client_params, NBIT_PARAMS_DESCRIPTION)?;
        if element_size == 0 {
            return Err(CodecError::invalid_parameters(
                NAME,
                "datatype size is zero",
            ));
        }
        let size = elements.checked_mul(element_size).ok_or_else(|| {
            CodecError::invalid_parameters(NAME, "decoded size overflow")
        })?;

        let mut decoded = allocate_zeroed(size)?;
        let mut unpacker = Unpacker {
            input: &encoded_value,
            bits: BitCursor::new(),
            depth: 0,
        };
        for element in decoded.chunks_exact_mut(element_size) {
            let mut params = ParamCursor::new(client_params, NBIT_PARAMS_DESCRIPTION);
            unpacker.nested(class, element, &mut params)?;
            if params.position() != client_params.len() {
                return Err(CodecError::invalid_parameters(
                    NAME,
                    format!(
                        "datatype description used {} of {} client data values",
                        params.position(),
                        client_params.len()
                    ),
                ));
            }
        }
        log::trace!(
            "nbit unpacked {elements} elements from {} of {} bytes",
            unpacker.bits.byte_index(),
            encoded_value.len()
        );

        Ok(Cow::Owned(decoded))
    }
}
