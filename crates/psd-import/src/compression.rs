/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Channel decompression
//!
//! Photoshop stores every channel of every layer separately, each one
//! tagged with one of four compression methods. Everything here turns a
//! compressed channel into a [`RawChannelPlane`], an uncompressed plane
//! whose multi-byte samples are kept big endian.
use std::cmp::Ordering;

use zune_inflate::{DeflateDecoder, DeflateOptions};

use crate::bytestream::PSDReader;
use crate::constants::{CompressionMethod, PsdVersion};
use crate::errors::PSDDecodeErrors;
use crate::options::PSDOptions;
use crate::surface::Rect;

/// Number of bytes a single uncompressed row of `width` samples occupies
pub const fn bytes_per_row(width: usize, depth: u16) -> usize {
    match depth {
        1 => width.div_ceil(8),
        d => width * (d as usize / 8)
    }
}

/// An uncompressed channel
#[derive(Clone, Debug)]
pub struct RawChannelPlane {
    compression: CompressionMethod,
    depth:       u16,
    rect:        Rect,
    data:        Vec<u8>
}

impl RawChannelPlane {
    /// Decompress one channel whose bytes (after the compression tag) are in `data`
    pub fn decompress(
        compression: CompressionMethod, data: &[u8], rect: Rect, depth: u16, version: PsdVersion,
        options: &PSDOptions
    ) -> Result<RawChannelPlane, PSDDecodeErrors> {
        let width = rect.width as usize;
        let rows = rect.height as usize;
        let row_bytes = bytes_per_row(width, depth);
        let expected = row_bytes * rows;

        let data = if expected == 0 {
            Vec::new()
        } else {
            match compression {
                CompressionMethod::NoCompression => {
                    if data.len() < expected {
                        return Err(PSDDecodeErrors::BadPlaneSize(expected, data.len()));
                    }
                    data[..expected].to_vec()
                }
                CompressionMethod::RLE => {
                    let mut reader = PSDReader::new(data);
                    let counts = read_rle_counts(&mut reader, rows, version)?;
                    decode_rle_plane(&mut reader, &counts, row_bytes)?
                }
                CompressionMethod::Zip => inflate(data, expected, options)?,
                CompressionMethod::ZipPrediction => {
                    let mut plane = inflate(data, expected, options)?;
                    unpredict_plane(&mut plane, width, depth)?;
                    plane
                }
            }
        };

        Ok(RawChannelPlane {
            compression,
            depth,
            rect,
            data
        })
    }

    /// Wrap already uncompressed bytes
    pub fn from_raw(data: Vec<u8>, rect: Rect, depth: u16) -> Result<RawChannelPlane, PSDDecodeErrors> {
        let expected = bytes_per_row(rect.width as usize, depth) * rect.height as usize;

        if data.len() != expected {
            return Err(PSDDecodeErrors::BadPlaneSize(expected, data.len()));
        }
        Ok(RawChannelPlane {
            compression: CompressionMethod::NoCompression,
            depth,
            rect,
            data
        })
    }

    pub const fn compression(&self) -> CompressionMethod {
        self.compression
    }

    pub const fn depth(&self) -> u16 {
        self.depth
    }

    pub const fn rect(&self) -> Rect {
        self.rect
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub const fn bytes_per_row(&self) -> usize {
        bytes_per_row(self.rect.width as usize, self.depth)
    }

    /// Row `y` counted from the top of the plane's own rectangle
    pub fn row(&self, y: usize) -> &[u8] {
        let stride = self.bytes_per_row();
        &self.data[y * stride..(y + 1) * stride]
    }
}

/// Read the per row compressed byte counts preceding RLE data
pub fn read_rle_counts(
    reader: &mut PSDReader, rows: usize, version: PsdVersion
) -> Result<Vec<usize>, PSDDecodeErrors> {
    let width = match version {
        PsdVersion::Psd => 2,
        PsdVersion::Psb => 4
    };
    if rows.saturating_mul(width) > reader.remaining() {
        return Err(PSDDecodeErrors::Generic("RLE row table is truncated"));
    }
    let mut counts = Vec::with_capacity(rows);

    for _ in 0..rows {
        let count = match version {
            PsdVersion::Psd => usize::from(reader.get_u16_be_err()?),
            PsdVersion::Psb => reader.get_u32_be_err()? as usize
        };
        counts.push(count);
    }
    Ok(counts)
}

/// Decode consecutive packbits rows, one per entry of `counts`
pub fn decode_rle_plane(
    reader: &mut PSDReader, counts: &[usize], row_bytes: usize
) -> Result<Vec<u8>, PSDDecodeErrors> {
    let compressed = counts.iter().fold(0_usize, |acc, c| acc.saturating_add(*c));

    if compressed > reader.remaining() {
        return Err(PSDDecodeErrors::Generic("RLE data is truncated"));
    }
    let mut plane = vec![0; counts.len() * row_bytes];

    for (row, (count, out)) in counts
        .iter()
        .zip(plane.chunks_exact_mut(row_bytes.max(1)))
        .enumerate()
    {
        let source = reader.get_slice(*count)?;
        let found = decode_packbits_row(source, out)?;

        if found != row_bytes {
            return Err(PSDDecodeErrors::BadRLE {
                row,
                expected: row_bytes,
                found
            });
        }
    }
    Ok(plane)
}

/// Decode one packbits row from `source` into `out`,
/// returning how many bytes were produced.
///
/// Producing more than `out.len()` bytes or running out of source
/// in the middle of a run is an error.
pub fn decode_packbits_row(source: &[u8], out: &mut [u8]) -> Result<usize, PSDDecodeErrors> {
    let capacity = out.len();
    let overflow = |found: usize| PSDDecodeErrors::BadRLE {
        row: 0,
        expected: capacity,
        found
    };
    let mut position = 0;
    let mut i = 0;

    while i < source.len() {
        let header = usize::from(source[i]);
        i += 1;

        match header.cmp(&128) {
            Ordering::Less => {
                // copy next header+1 bytes literally
                let len = header + 1;

                if i + len > source.len() {
                    return Err(PSDDecodeErrors::Generic("RLE literal run is truncated"));
                }
                if position + len > out.len() {
                    return Err(overflow(position + len));
                }
                out[position..position + len].copy_from_slice(&source[i..i + len]);
                i += len;
                position += len;
            }
            Ordering::Equal => (),
            Ordering::Greater => {
                // Next -len+1 bytes in the dest are replicated from next source byte.
                // (Interpret len as a negative 8-bit int.)
                let len = 257 - header;

                let Some(&value) = source.get(i) else {
                    return Err(PSDDecodeErrors::Generic("RLE repeat run is truncated"));
                };
                i += 1;

                if position + len > out.len() {
                    return Err(overflow(position + len));
                }
                out[position..position + len].fill(value);
                position += len;
            }
        }
    }
    Ok(position)
}

fn inflate(data: &[u8], expected: usize, options: &PSDOptions) -> Result<Vec<u8>, PSDDecodeErrors> {
    let option = DeflateOptions::default()
        .set_size_hint(expected)
        .set_confirm_checksum(options.get_inflate_confirm_adler());

    let mut decoder = DeflateDecoder::new_with_options(data, option);
    let mut plane = decoder.decode_zlib()?;

    if plane.len() < expected {
        return Err(PSDDecodeErrors::BadPlaneSize(expected, plane.len()));
    }
    plane.truncate(expected);
    Ok(plane)
}

/// Undo delta prediction for a whole plane of `width` samples per row
pub fn unpredict_plane(plane: &mut [u8], width: usize, depth: u16) -> Result<(), PSDDecodeErrors> {
    let row_bytes = bytes_per_row(width, depth);
    if row_bytes == 0 {
        return Ok(());
    }
    match depth {
        8 => plane.chunks_exact_mut(row_bytes).for_each(unpredict_row_u8),
        16 => plane.chunks_exact_mut(row_bytes).for_each(unpredict_row_u16),
        32 => {
            let mut scratch = vec![0; row_bytes];
            for row in plane.chunks_exact_mut(row_bytes) {
                unpredict_row_f32(row, &mut scratch);
            }
        }
        _ => return Err(PSDDecodeErrors::UnsupportedBitDepth(depth))
    }
    Ok(())
}

pub fn unpredict_row_u8(row: &mut [u8]) {
    for i in 1..row.len() {
        row[i] = row[i].wrapping_add(row[i - 1]);
    }
}

/// Running sum over big endian words, column 0 is the base value
pub fn unpredict_row_u16(row: &mut [u8]) {
    let mut previous = 0_u16;

    for (i, word) in row.chunks_exact_mut(2).enumerate() {
        let delta = u16::from_be_bytes([word[0], word[1]]);
        let value = if i == 0 {
            delta
        } else {
            delta.wrapping_add(previous)
        };
        word.copy_from_slice(&value.to_be_bytes());
        previous = value;
    }
}

/// Inverse of [`unpredict_row_u16`]
pub fn predict_row_u16(row: &mut [u8]) {
    let mut previous = 0_u16;

    for (i, word) in row.chunks_exact_mut(2).enumerate() {
        let value = u16::from_be_bytes([word[0], word[1]]);
        let delta = if i == 0 {
            value
        } else {
            value.wrapping_sub(previous)
        };
        word.copy_from_slice(&delta.to_be_bytes());
        previous = value;
    }
}

/// 32 bit rows are byte-delta coded over the whole row and
/// stored as four planes: every sample's first byte, then every second byte...
fn unpredict_row_f32(row: &mut [u8], scratch: &mut [u8]) {
    unpredict_row_u8(row);

    let width = row.len() / 4;
    for i in 0..width {
        for k in 0..4 {
            scratch[i * 4 + k] = row[k * width + i];
        }
    }
    row.copy_from_slice(scratch);
}
