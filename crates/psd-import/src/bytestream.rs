/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Big endian reader over an in memory document
//!
//! Every read is bounds checked, a read that would run past the end
//! of the stream fails with [`StreamError::NotEnoughBytes`] and leaves
//! the position untouched.
use crate::constants::PsdVersion;
use crate::errors::StreamError;
use crate::surface::Rect;

pub struct PSDReader<'a> {
    data:     &'a [u8],
    position: usize
}

impl<'a> PSDReader<'a> {
    pub fn new(data: &'a [u8]) -> PSDReader<'a> {
        PSDReader { data, position: 0 }
    }

    #[inline(always)]
    pub const fn position(&self) -> usize {
        self.position
    }

    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of bytes left between the current position and the end
    #[inline(always)]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    #[inline(always)]
    pub const fn eof(&self) -> bool {
        self.position >= self.data.len()
    }

    pub fn set_position(&mut self, position: usize) -> Result<(), StreamError> {
        if position > self.data.len() {
            return Err(StreamError::SeekOutOfBounds(position, self.data.len()));
        }
        self.position = position;
        Ok(())
    }

    pub fn skip(&mut self, num: usize) -> Result<(), StreamError> {
        if num > self.remaining() {
            return Err(StreamError::NotEnoughBytes(num, self.remaining()));
        }
        self.position += num;
        Ok(())
    }

    /// Borrow the next `num` bytes and advance past them
    pub fn get_slice(&mut self, num: usize) -> Result<&'a [u8], StreamError> {
        if num > self.remaining() {
            return Err(StreamError::NotEnoughBytes(num, self.remaining()));
        }
        let slice = &self.data[self.position..self.position + num];
        self.position += num;
        Ok(slice)
    }

    pub fn read_exact_bytes(&mut self, buf: &mut [u8]) -> Result<(), StreamError> {
        let slice = self.get_slice(buf.len())?;
        buf.copy_from_slice(slice);
        Ok(())
    }

    #[inline(always)]
    pub fn read_fixed_bytes_or_error<const N: usize>(&mut self) -> Result<[u8; N], StreamError> {
        let mut byte_store: [u8; N] = [0; N];
        self.read_exact_bytes(&mut byte_store)?;
        Ok(byte_store)
    }

    #[inline(always)]
    pub fn get_u8_err(&mut self) -> Result<u8, StreamError> {
        let [byte] = self.read_fixed_bytes_or_error::<1>()?;
        Ok(byte)
    }

    /// Read a section length, 4 bytes wide in PSD and 8 bytes wide in PSB
    pub fn get_length(&mut self, version: PsdVersion) -> Result<usize, StreamError> {
        let length = match version {
            PsdVersion::Psd => u64::from(self.get_u32_be_err()?),
            PsdVersion::Psb => self.get_u64_be_err()?
        };
        usize::try_from(length).map_err(|_| StreamError::Generic("Length does not fit in usize"))
    }

    /// Read `length` bytes as an ASCII string, non ASCII bytes are
    /// replaced rather than rejected
    pub fn get_fixed_string(&mut self, length: usize) -> Result<String, StreamError> {
        let bytes = self.get_slice(length)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Read a pascal string, a length byte followed by that many bytes,
    /// with the whole record (length byte included) padded to a multiple of `padding`
    pub fn get_pascal_string(&mut self, padding: usize) -> Result<String, StreamError> {
        let length = usize::from(self.get_u8_err()?);
        let name = self.get_fixed_string(length)?;

        if padding > 1 {
            let consumed = length + 1;
            let padded = consumed.div_ceil(padding) * padding;
            self.skip(padded - consumed)?;
        }
        Ok(name)
    }

    /// Read a UTF-16BE string prefixed by its length in code units
    pub fn get_unicode_string(&mut self) -> Result<String, StreamError> {
        let units = self.get_u32_be_err()? as usize;

        if units.saturating_mul(2) > self.remaining() {
            return Err(StreamError::NotEnoughBytes(units * 2, self.remaining()));
        }
        let mut code_units = Vec::with_capacity(units);

        for _ in 0..units {
            code_units.push(self.get_u16_be_err()?);
        }
        let string = String::from_utf16_lossy(&code_units);
        Ok(string.trim_end_matches('\0').to_string())
    }

    /// Read a rectangle stored as top, left, bottom, right
    pub fn get_rect(&mut self) -> Result<Rect, StreamError> {
        let top = self.get_i32_be_err()?;
        let left = self.get_i32_be_err()?;
        let bottom = self.get_i32_be_err()?;
        let right = self.get_i32_be_err()?;

        Ok(Rect::from_edges(top, left, bottom, right))
    }
}

macro_rules! get_single_type {
    ($name:tt,$int_type:tt) => {
        impl<'a> PSDReader<'a> {
            #[doc=concat!("Read ",stringify!($int_type)," as a big endian value")]
            #[doc=concat!("Returning an error if the underlying buffer cannot support a ",stringify!($int_type)," read.")]
            #[inline]
            pub fn $name(&mut self) -> Result<$int_type, StreamError> {
                const SIZE_OF_VAL: usize = core::mem::size_of::<$int_type>();

                let space = self.read_fixed_bytes_or_error::<SIZE_OF_VAL>()?;

                Ok($int_type::from_be_bytes(space))
            }
        }
    };
}

get_single_type!(get_u16_be_err, u16);
get_single_type!(get_i16_be_err, i16);
get_single_type!(get_u32_be_err, u32);
get_single_type!(get_i32_be_err, i32);
get_single_type!(get_u64_be_err, u64);
get_single_type!(get_f32_be_err, f32);
get_single_type!(get_f64_be_err, f64);
