/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

#![allow(clippy::upper_case_acronyms)]

#[cfg(feature = "serde")]
use serde::Serialize;

pub const PSD_IDENTIFIER_BE: u32 = 0x38425053;

/// `8BIM`, signature of blend mode keys and tagged blocks
pub const SIGNATURE_8BIM: [u8; 4] = *b"8BIM";
/// `8B64`, alternative tagged block signature used by PSB writers
pub const SIGNATURE_8B64: [u8; 4] = *b"8B64";

/// Hard ceiling on document dimensions for version 1 files
pub const PSD_MAX_DIMENSION: usize = 30_000;
/// Hard ceiling on document dimensions for version 2 (large document) files
pub const PSB_MAX_DIMENSION: usize = 300_000;

pub const CHANNEL_ID_TRANSPARENCY: i16 = -1;
pub const CHANNEL_ID_USER_MASK: i16 = -2;
pub const CHANNEL_ID_LAYER_MASK: i16 = -3;

pub const MASK_FLAG_DISABLED: u8 = 1 << 1;
pub const MASK_FLAG_INVERT_ON_BLEND: u8 = 1 << 2;

pub const LAYER_FLAG_HIDDEN: u8 = 1 << 1;

/// Tagged blocks whose length field is 8 bytes wide in PSB files
pub const PSB_LONG_LENGTH_KEYS: [&[u8; 4]; 13] = [
    b"LMsk", b"Lr16", b"Lr32", b"Layr", b"Mt16", b"Mt32", b"Mtrn", b"Alph", b"FMsk", b"lnk2",
    b"FEid", b"FXid", b"PxSD"
];

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum PsdVersion {
    /// Classic `.psd`, lengths are 32 bits wide
    Psd = 1,
    /// Large document `.psb`, some lengths are 64 bits wide
    Psb = 2
}

impl PsdVersion {
    pub fn from_int(int: u16) -> Option<PsdVersion> {
        match int {
            1 => Some(PsdVersion::Psd),
            2 => Some(PsdVersion::Psb),
            _ => None
        }
    }

    pub const fn max_dimension(self) -> usize {
        match self {
            PsdVersion::Psd => PSD_MAX_DIMENSION,
            PsdVersion::Psb => PSB_MAX_DIMENSION
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum ColorModes {
    Bitmap,
    Grayscale,
    IndexedColor,
    RGB,
    CMYK,
    MultiChannel,
    DuoTone,
    LabColor,
    /// A mode value this decoder does not know about
    Unknown(u16)
}

impl ColorModes {
    pub fn from_int(int: u16) -> ColorModes {
        use crate::constants::ColorModes::{
            Bitmap, DuoTone, Grayscale, IndexedColor, LabColor, MultiChannel, Unknown, CMYK, RGB
        };

        match int {
            0 => Bitmap,
            1 => Grayscale,
            2 => IndexedColor,
            3 => RGB,
            4 => CMYK,
            7 => MultiChannel,
            8 => DuoTone,
            9 => LabColor,
            _ => Unknown(int)
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CompressionMethod {
    NoCompression = 0,
    RLE = 1,
    Zip = 2,
    ZipPrediction = 3
}

impl CompressionMethod {
    pub fn from_int(int: u16) -> Option<CompressionMethod> {
        match int {
            0 => Some(Self::NoCompression),
            1 => Some(Self::RLE),
            2 => Some(Self::Zip),
            3 => Some(Self::ZipPrediction),
            _ => None
        }
    }
}

/// Kind of a `lsct`/`lsdk` section divider record
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SectionDivider {
    Other = 0,
    OpenFolder = 1,
    ClosedFolder = 2,
    /// Marks the bottom end of a group, appears before the group's children
    BoundingSection = 3
}

impl SectionDivider {
    pub fn from_int(int: u32) -> SectionDivider {
        match int {
            1 => SectionDivider::OpenFolder,
            2 => SectionDivider::ClosedFolder,
            3 => SectionDivider::BoundingSection,
            _ => SectionDivider::Other
        }
    }
}
