/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Channel planes to RGBA8 conversion
//!
//! Each supported color mode has a single row converter, selected
//! once per layer through [`ColorDecoder`]. Rows are independent so
//! a layer is converted in parallel bands of rows.
use log::trace;

use crate::compression::RawChannelPlane;
use crate::constants::ColorModes;
use crate::errors::PSDDecodeErrors;
use crate::options::PSDOptions;
use crate::surface::DecodedSurface;
use crate::workers::for_each_row_band;

/// Size of an indexed color palette, 256 reds, then greens, then blues
pub const PALETTE_SIZE: usize = 768;

/// Converter for one color mode
#[derive(Copy, Clone, Debug)]
pub enum ColorDecoder<'a> {
    RGB,
    Grayscale,
    CMYK,
    Bitmap,
    Indexed(&'a [u8]),
    Lab
}

impl<'a> ColorDecoder<'a> {
    /// Pick the converter for `mode`, `None` for modes we cannot convert
    /// (Multichannel, Duotone, or Indexed without a palette)
    pub fn for_mode(mode: ColorModes, palette: &'a [u8]) -> Option<ColorDecoder<'a>> {
        match mode {
            ColorModes::RGB => Some(ColorDecoder::RGB),
            ColorModes::Grayscale => Some(ColorDecoder::Grayscale),
            ColorModes::CMYK => Some(ColorDecoder::CMYK),
            ColorModes::Bitmap => Some(ColorDecoder::Bitmap),
            ColorModes::LabColor => Some(ColorDecoder::Lab),
            ColorModes::IndexedColor if palette.len() >= PALETTE_SIZE => {
                Some(ColorDecoder::Indexed(palette))
            }
            _ => None
        }
    }

    /// Number of color channels consumed
    pub const fn channels(&self) -> usize {
        match self {
            ColorDecoder::RGB | ColorDecoder::Lab => 3,
            ColorDecoder::CMYK => 4,
            ColorDecoder::Grayscale | ColorDecoder::Bitmap | ColorDecoder::Indexed(_) => 1
        }
    }

    /// Sample value used in place of a channel the layer does not carry
    const fn missing_channel_fill(&self) -> u8 {
        match self {
            // CMYK samples are stored inverted, 255 is "no ink"
            ColorDecoder::CMYK => 255,
            ColorDecoder::Lab => 128,
            _ => 0
        }
    }

    /// Convert color channels into an opaque RGBA surface of `width`x`height`
    ///
    /// `channels` holds one entry per color channel in file order, missing
    /// channels are filled with a neutral value.
    pub fn decode(
        &self, channels: &[Option<&RawChannelPlane>], width: usize, height: usize,
        options: &PSDOptions
    ) -> Result<DecodedSurface, PSDDecodeErrors> {
        for plane in channels.iter().flatten() {
            let rect = plane.rect();
            if rect.width as usize != width || rect.height as usize != height {
                return Err(PSDDecodeErrors::BadPlaneSize(
                    width * height,
                    rect.area()
                ));
            }
        }
        let mut surface = DecodedSurface::new(width, height);

        if surface.is_empty() {
            return Ok(surface);
        }
        let decoder = *self;
        let fill = self.missing_channel_fill();
        let count = self.channels();

        trace!("Converting {width}x{height} layer from {count} channels");

        for_each_row_band(surface.pixels_mut(), width * 4, options, |first_row, band| {
            // per band scratch rows, one per channel
            let mut scratch = vec![vec![fill; width]; count];

            for (y, out) in band.chunks_exact_mut(width * 4).enumerate() {
                let row = first_row + y;

                for (c, samples) in scratch.iter_mut().enumerate() {
                    if let Some(Some(plane)) = channels.get(c) {
                        row_to_u8(plane.row(row), plane.depth(), samples);
                    }
                }
                decoder.convert_row(&scratch, out);
            }
            Ok::<(), PSDDecodeErrors>(())
        })?;

        Ok(surface)
    }

    fn convert_row(&self, rows: &[Vec<u8>], out: &mut [u8]) {
        match self {
            ColorDecoder::RGB => {
                let (r, g, b) = (&rows[0], &rows[1], &rows[2]);
                for (i, px) in out.chunks_exact_mut(4).enumerate() {
                    px.copy_from_slice(&[r[i], g[i], b[i], 255]);
                }
            }
            ColorDecoder::Grayscale | ColorDecoder::Bitmap => {
                for (v, px) in rows[0].iter().zip(out.chunks_exact_mut(4)) {
                    px.copy_from_slice(&[*v, *v, *v, 255]);
                }
            }
            ColorDecoder::CMYK => {
                for (i, px) in out.chunks_exact_mut(4).enumerate() {
                    let [r, g, b] = cmyk_to_rgb(rows[0][i], rows[1][i], rows[2][i], rows[3][i]);
                    px.copy_from_slice(&[r, g, b, 255]);
                }
            }
            ColorDecoder::Indexed(palette) => {
                for (v, px) in rows[0].iter().zip(out.chunks_exact_mut(4)) {
                    let index = usize::from(*v);
                    px.copy_from_slice(&[
                        palette[index],
                        palette[index + 256],
                        palette[index + 512],
                        255
                    ]);
                }
            }
            ColorDecoder::Lab => {
                for (i, px) in out.chunks_exact_mut(4).enumerate() {
                    let [r, g, b] = lab_to_rgb(rows[0][i], rows[1][i], rows[2][i]);
                    px.copy_from_slice(&[r, g, b, 255]);
                }
            }
        }
    }
}

/// Convert one plane row of any depth into 8 bit samples.
///
/// 1 bit samples map 0 to white and 1 to black, 16 bit samples are
/// rescaled and 32 bit float samples are tone mapped.
pub fn row_to_u8(row: &[u8], depth: u16, out: &mut [u8]) {
    match depth {
        8 => {
            let n = out.len().min(row.len());
            out[..n].copy_from_slice(&row[..n]);
        }
        16 => {
            for (o, c) in out.iter_mut().zip(row.chunks_exact(2)) {
                *o = u16_to_u8(u16::from_be_bytes([c[0], c[1]]));
            }
        }
        32 => {
            for (o, c) in out.iter_mut().zip(row.chunks_exact(4)) {
                *o = hdr_to_u8(f32::from_be_bytes([c[0], c[1], c[2], c[3]]));
            }
        }
        1 => {
            for (x, o) in out.iter_mut().enumerate() {
                let Some(byte) = row.get(x / 8) else { break };
                let bit = (byte >> (7 - (x % 8))) & 1;
                *o = if bit == 0 { 255 } else { 0 };
            }
        }
        _ => out.fill(0)
    }
}

#[inline]
pub fn u16_to_u8(value: u16) -> u8 {
    ((u32::from(value) * 255 + 32767) / 65535) as u8
}

/// HDR to LDR byte mapping
#[inline]
pub fn hdr_to_u8(value: f32) -> u8 {
    // NaN saturates to 0
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Convert stored CMYK samples, which Photoshop keeps as 255 complements
pub fn cmyk_to_rgb(c: u8, m: u8, y: u8, k: u8) -> [u8; 3] {
    let k = 255 - u32::from(k);
    let convert = |v: u8| -> u8 {
        let v = 255 - u32::from(v);
        (255 - (v * (255 - k) / 255 + k).min(255)) as u8
    };
    [convert(c), convert(m), convert(y)]
}

/// CIE L*a*b* (bytes) to sRGB via XYZ, D65 white point and 2 degree observer
pub fn lab_to_rgb(l: u8, a: u8, b: u8) -> [u8; 3] {
    const REF_X: f64 = 95.047;
    const REF_Y: f64 = 100.000;
    const REF_Z: f64 = 108.883;

    let l = f64::from(l) * 100.0 / 255.0;
    let a = f64::from(a) - 127.5;
    let b = f64::from(b) - 127.5;

    let fy = (l + 16.0) / 116.0;
    let fx = a / 500.0 + fy;
    let fz = fy - b / 200.0;

    let inverse = |f: f64| -> f64 {
        let cube = f * f * f;
        if cube > 0.008856 {
            cube
        } else {
            (f - 16.0 / 116.0) / 7.787
        }
    };

    let x = REF_X * inverse(fx) / 100.0;
    let y = REF_Y * inverse(fy) / 100.0;
    let z = REF_Z * inverse(fz) / 100.0;

    let r = x * 3.2406 + y * -1.5372 + z * -0.4986;
    let g = x * -0.9689 + y * 1.8758 + z * 0.0415;
    let b = x * 0.0557 + y * -0.2040 + z * 1.0570;

    let gamma = |v: f64| -> u8 {
        let v = if v > 0.0031308 {
            1.055 * v.powf(1.0 / 2.4) - 0.055
        } else {
            12.92 * v
        };
        (v * 255.0).round().clamp(0.0, 255.0) as u8
    };
    [gamma(r), gamma(g), gamma(b)]
}
