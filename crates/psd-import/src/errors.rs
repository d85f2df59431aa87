/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use std::fmt::{Debug, Display, Formatter};

use zune_inflate::errors::InflateDecodeErrors;

use crate::constants::PSD_IDENTIFIER_BE;

/// Errors raised by the byte reader when the document is shorter
/// than what its own headers claim
pub enum StreamError {
    /// requested, available
    NotEnoughBytes(usize, usize),
    /// position, length
    SeekOutOfBounds(usize, usize),
    Generic(&'static str)
}

impl Debug for StreamError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamError::NotEnoughBytes(requested, available) => {
                writeln!(
                    f,
                    "Not enough bytes, expected {requested} but found {available}"
                )
            }
            StreamError::SeekOutOfBounds(position, length) => {
                writeln!(
                    f,
                    "Cannot seek to {position}, stream is only {length} bytes long"
                )
            }
            StreamError::Generic(reason) => {
                writeln!(f, "Generic I/O error: {reason}")
            }
        }
    }
}

impl From<&'static str> for StreamError {
    fn from(value: &'static str) -> Self {
        StreamError::Generic(value)
    }
}

/// PSDDecodeErrors that can occur during PSD decoding
pub enum PSDDecodeErrors {
    WrongMagicBytes(u32),
    UnsupportedFileType(u16),
    UnsupportedChannelCount(u16),
    UnsupportedBitDepth(u16),
    LargeDimensions(usize, usize),
    ZeroDimensions,
    UnknownCompression(u16),
    /// A four byte signature that was expected to be `8BIM`/`8B64`
    BadSignature([u8; 4]),
    /// An RLE row did not decompress to the expected length
    BadRLE {
        row:      usize,
        expected: usize,
        found:    usize
    },
    /// A decompressed channel plane does not match its rectangle
    /// expected, found
    BadPlaneSize(usize, usize),
    InflateError(InflateDecodeErrors),
    Generic(&'static str),
    GenericString(String),
    IoErrors(StreamError)
}

impl Debug for PSDDecodeErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PSDDecodeErrors::Generic(reason) => {
                writeln!(f, "{reason}")
            }
            PSDDecodeErrors::GenericString(reason) => {
                writeln!(f, "{reason}")
            }
            PSDDecodeErrors::WrongMagicBytes(bytes) => {
                writeln!(
                    f,
                    "Expected {:?} but found  {:?}, not a PSD image",
                    PSD_IDENTIFIER_BE.to_be_bytes(),
                    bytes.to_be_bytes()
                )
            }
            PSDDecodeErrors::UnsupportedFileType(version) => {
                writeln!(
                    f,
                    "Unsupported file version {version:?}, known versions are 1 (PSD) and 2 (PSB)",
                )
            }
            PSDDecodeErrors::UnsupportedChannelCount(channels) => {
                writeln!(f, "Unsupported channel count {channels:?}")
            }
            PSDDecodeErrors::UnsupportedBitDepth(depth) => {
                writeln!(
                    f,
                    "Unsupported bit depth {depth:?}, supported depths are 1, 8, 16 and 32",
                )
            }
            PSDDecodeErrors::UnknownCompression(method) => {
                writeln!(f, "Unknown compression method {method}")
            }
            PSDDecodeErrors::BadSignature(sig) => {
                writeln!(
                    f,
                    "Expected an 8BIM signature but found {:?}",
                    String::from_utf8_lossy(sig)
                )
            }
            PSDDecodeErrors::BadRLE {
                row,
                expected,
                found
            } => {
                writeln!(
                    f,
                    "Bad RLE, row {row} decoded to {found} bytes but expected {expected}"
                )
            }
            PSDDecodeErrors::BadPlaneSize(expected, found) => {
                writeln!(
                    f,
                    "Channel plane has {found} bytes but its rectangle needs {expected}"
                )
            }
            PSDDecodeErrors::LargeDimensions(supported, found) => {
                writeln!(
                    f,
                    "Too large dimensions, supported {supported} but found {found}",
                )
            }
            PSDDecodeErrors::ZeroDimensions => {
                writeln!(f, "Zero found where not expected")
            }
            PSDDecodeErrors::InflateError(e) => {
                writeln!(f, "Inflate error :{:?}", e)
            }
            PSDDecodeErrors::IoErrors(e) => {
                writeln!(f, "I/O error :{:?}", e)
            }
        }
    }
}

impl Display for PSDDecodeErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for PSDDecodeErrors {}

impl From<&'static str> for PSDDecodeErrors {
    fn from(r: &'static str) -> Self {
        Self::Generic(r)
    }
}

impl From<String> for PSDDecodeErrors {
    fn from(r: String) -> Self {
        Self::GenericString(r)
    }
}

impl From<StreamError> for PSDDecodeErrors {
    fn from(r: StreamError) -> Self {
        Self::IoErrors(r)
    }
}

impl From<InflateDecodeErrors> for PSDDecodeErrors {
    fn from(r: InflateDecodeErrors) -> Self {
        Self::InflateError(r)
    }
}
