/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! In memory PSD/PSB writer used by the integration tests
#![allow(dead_code)]

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

pub const RAW: u16 = 0;
pub const RLE: u16 = 1;
pub const ZIP: u16 = 2;
pub const ZIP_PREDICTION: u16 = 3;

pub const MODE_BITMAP: u16 = 0;
pub const MODE_GRAYSCALE: u16 = 1;
pub const MODE_INDEXED: u16 = 2;
pub const MODE_RGB: u16 = 3;
pub const MODE_CMYK: u16 = 4;
pub const MODE_MULTICHANNEL: u16 = 7;

#[derive(Clone, Copy, Debug)]
pub struct Mask {
    pub top:           i32,
    pub left:          i32,
    pub bottom:        i32,
    pub right:         i32,
    pub default_color: u8,
    pub flags:         u8
}

#[derive(Clone, Debug)]
pub struct Layer {
    pub name:         String,
    pub unicode_name: Option<String>,
    /// top, left, bottom, right
    pub rect:         [i32; 4],
    pub channels:     Vec<(i16, Vec<u8>)>,
    pub compression:  u16,
    pub opacity:      u8,
    pub hidden:       bool,
    pub divider:      Option<u32>,
    pub id:           Option<u32>,
    pub mask:         Option<Mask>,
    /// The second, vector backed mask, written in the 36 byte mask record
    pub layer_mask:   Option<Mask>
}

impl Layer {
    fn empty(name: &str, id: Option<u32>) -> Layer {
        Layer {
            name: name.to_string(),
            unicode_name: None,
            rect: [0; 4],
            channels: Vec::new(),
            compression: RAW,
            opacity: 255,
            hidden: false,
            divider: None,
            id,
            mask: None,
            layer_mask: None
        }
    }

    /// An 8 bit RGB layer filled with one color
    pub fn solid(name: &str, id: u32, rect: [i32; 4], rgba: [u8; 4]) -> Layer {
        let size = ((rect[2] - rect[0]) * (rect[3] - rect[1])).max(0) as usize;
        let mut layer = Layer::empty(name, Some(id));

        layer.rect = rect;
        layer.channels = vec![
            (-1, vec![rgba[3]; size]),
            (0, vec![rgba[0]; size]),
            (1, vec![rgba[1]; size]),
            (2, vec![rgba[2]; size]),
        ];
        layer
    }

    /// The record closing a group, stored above its children
    pub fn group(name: &str, id: u32) -> Layer {
        let mut layer = Layer::empty(name, Some(id));
        layer.divider = Some(1);
        layer
    }

    /// The record opening a group, stored below its children
    pub fn group_end() -> Layer {
        let mut layer = Layer::empty("</Layer group>", None);
        layer.divider = Some(3);
        layer
    }

    pub fn hidden(mut self) -> Layer {
        self.hidden = true;
        self
    }

    pub fn compressed(mut self, compression: u16) -> Layer {
        self.compression = compression;
        self
    }

    pub fn with_opacity(mut self, opacity: u8) -> Layer {
        self.opacity = opacity;
        self
    }

    pub fn with_mask(mut self, mask: Mask, plane: Vec<u8>) -> Layer {
        self.mask = Some(mask);
        self.channels.push((-2, plane));
        self
    }

    pub fn with_layer_mask(mut self, mask: Mask, plane: Vec<u8>) -> Layer {
        self.layer_mask = Some(mask);
        self.channels.push((-3, plane));
        self
    }

    pub fn with_unicode_name(mut self, name: &str) -> Layer {
        self.unicode_name = Some(name.to_string());
        self
    }

    fn channel_rect(&self, id: i16) -> [i32; 4] {
        match (id, self.mask, self.layer_mask) {
            (-2, Some(mask), _) | (-3, _, Some(mask)) => {
                [mask.top, mask.left, mask.bottom, mask.right]
            }
            _ => self.rect
        }
    }
}

#[derive(Clone, Debug)]
pub struct Document {
    pub version:      u16,
    pub width:        usize,
    pub height:       usize,
    pub depth:        u16,
    pub mode:         u16,
    pub channels:     u16,
    pub palette:      Vec<u8>,
    /// Bottom to top
    pub layers:       Vec<Layer>,
    pub merged:       Vec<Vec<u8>>,
    pub compression:  u16,
    pub merged_alpha: bool,
    /// Store layers in an `Lr16` block instead of the layer info section
    pub high_depth:   bool
}

impl Document {
    pub fn new(mode: u16, channels: u16, width: usize, height: usize) -> Document {
        Document {
            version: 1,
            width,
            height,
            depth: 8,
            mode,
            channels,
            palette: Vec::new(),
            layers: Vec::new(),
            merged: Vec::new(),
            compression: RAW,
            merged_alpha: false,
            high_depth: false
        }
    }

    pub fn rgb(width: usize, height: usize) -> Document {
        Document::new(MODE_RGB, 4, width, height)
    }

    pub fn psb(mut self) -> Document {
        self.version = 2;
        self
    }

    pub fn layer(mut self, layer: Layer) -> Document {
        self.layers.push(layer);
        self
    }

    fn row_bytes(&self, width: usize) -> usize {
        match self.depth {
            1 => width.div_ceil(8),
            d => width * usize::from(d / 8)
        }
    }

    fn write_length(&self, out: &mut Vec<u8>, length: usize) {
        if self.version == 2 {
            out.extend_from_slice(&(length as u64).to_be_bytes());
        } else {
            out.extend_from_slice(&(length as u32).to_be_bytes());
        }
    }

    fn rle_count(&self, out: &mut Vec<u8>, count: usize) {
        if self.version == 2 {
            out.extend_from_slice(&(count as u32).to_be_bytes());
        } else {
            out.extend_from_slice(&(count as u16).to_be_bytes());
        }
    }

    /// Compress a plane of `rows` rows, without the compression tag
    fn encode_plane(&self, compression: u16, plane: &[u8], rows: usize) -> Vec<u8> {
        if rows == 0 || plane.is_empty() {
            return Vec::new();
        }
        let row_bytes = plane.len() / rows;

        match compression {
            RLE => {
                let encoded: Vec<Vec<u8>> = plane.chunks(row_bytes).map(packbits).collect();
                let mut out = Vec::new();
                for row in &encoded {
                    self.rle_count(&mut out, row.len());
                }
                for row in &encoded {
                    out.extend_from_slice(row);
                }
                out
            }
            ZIP => zlib(plane),
            ZIP_PREDICTION => {
                let mut predicted = plane.to_vec();
                for row in predicted.chunks_mut(row_bytes) {
                    predict(row, self.depth);
                }
                zlib(&predicted)
            }
            _ => plane.to_vec()
        }
    }

    fn record(&self, layer: &Layer, channel_data: &[Vec<u8>]) -> Vec<u8> {
        let mut out = Vec::new();
        for v in layer.rect {
            out.extend_from_slice(&v.to_be_bytes());
        }
        out.extend_from_slice(&(layer.channels.len() as u16).to_be_bytes());
        for ((id, _), data) in layer.channels.iter().zip(channel_data) {
            out.extend_from_slice(&id.to_be_bytes());
            self.write_length(&mut out, data.len());
        }
        out.extend_from_slice(b"8BIMnorm");
        let flags = if layer.hidden { 2 } else { 0 };
        out.extend_from_slice(&[layer.opacity, 0, flags, 0]);

        let mut extra = Vec::new();
        let write_rect = |out: &mut Vec<u8>, mask: &Mask| {
            for v in [mask.top, mask.left, mask.bottom, mask.right] {
                out.extend_from_slice(&v.to_be_bytes());
            }
        };
        match (layer.mask, layer.layer_mask) {
            (Some(mask), None) => {
                extra.extend_from_slice(&20_u32.to_be_bytes());
                write_rect(&mut extra, &mask);
                extra.extend_from_slice(&[mask.default_color, mask.flags, 0, 0]);
            }
            (user, Some(real)) => {
                // the leading fields describe the user mask, the trailing
                // ones the layer mask
                let user = user.unwrap_or(Mask {
                    top:           0,
                    left:          0,
                    bottom:        0,
                    right:         0,
                    default_color: 255,
                    flags:         0
                });
                extra.extend_from_slice(&36_u32.to_be_bytes());
                write_rect(&mut extra, &user);
                extra.extend_from_slice(&[user.default_color, user.flags]);
                extra.extend_from_slice(&[real.flags, real.default_color]);
                write_rect(&mut extra, &real);
            }
            (None, None) => extra.extend_from_slice(&0_u32.to_be_bytes())
        }
        // blending ranges
        extra.extend_from_slice(&0_u32.to_be_bytes());

        let name = layer.name.as_bytes();
        extra.push(name.len() as u8);
        extra.extend_from_slice(name);
        let consumed = name.len() + 1;
        extra.resize(extra.len() + consumed.div_ceil(4) * 4 - consumed, 0);

        if let Some(divider) = layer.divider {
            block(&mut extra, b"lsct", &divider.to_be_bytes());
        }
        if let Some(id) = layer.id {
            block(&mut extra, b"lyid", &id.to_be_bytes());
        }
        if let Some(name) = &layer.unicode_name {
            let units: Vec<u16> = name.encode_utf16().collect();
            let mut data = (units.len() as u32).to_be_bytes().to_vec();
            for unit in units {
                data.extend_from_slice(&unit.to_be_bytes());
            }
            block(&mut extra, b"luni", &data);
        }

        out.extend_from_slice(&(extra.len() as u32).to_be_bytes());
        out.extend_from_slice(&extra);
        out
    }

    /// Layer count, records and channel data
    fn layer_info(&self) -> Vec<u8> {
        let count = self.layers.len() as i16;
        let count = if self.merged_alpha { -count } else { count };

        let mut records = Vec::new();
        let mut pixels = Vec::new();

        for layer in &self.layers {
            let channel_data: Vec<Vec<u8>> = layer
                .channels
                .iter()
                .map(|(id, plane)| {
                    let rect = layer.channel_rect(*id);
                    let rows = (rect[2] - rect[0]).max(0) as usize;
                    let mut data = layer.compression.to_be_bytes().to_vec();
                    data.extend(self.encode_plane(layer.compression, plane, rows));
                    data
                })
                .collect();

            records.extend(self.record(layer, &channel_data));
            for data in channel_data {
                pixels.extend(data);
            }
        }
        let mut out = count.to_be_bytes().to_vec();
        out.extend(records);
        out.extend(pixels);
        if out.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    fn layer_section(&self) -> Vec<u8> {
        if self.layers.is_empty() {
            return Vec::new();
        }
        let info = self.layer_info();
        let mut out = Vec::new();

        if self.high_depth {
            self.write_length(&mut out, 0);
        } else {
            self.write_length(&mut out, info.len());
            out.extend_from_slice(&info);
        }
        // global layer mask info
        out.extend_from_slice(&0_u32.to_be_bytes());

        if self.high_depth {
            let key = if self.depth == 32 { b"Lr32" } else { b"Lr16" };
            out.extend_from_slice(b"8BIM");
            out.extend_from_slice(key);
            self.write_length(&mut out, info.len());
            out.extend_from_slice(&info);
        }
        out
    }

    fn merged_image(&self) -> Vec<u8> {
        let plane_size = self.row_bytes(self.width) * self.height;
        let planes: Vec<Vec<u8>> = (0..usize::from(self.channels))
            .map(|c| {
                self.merged
                    .get(c)
                    .cloned()
                    .unwrap_or_else(|| vec![0; plane_size])
            })
            .collect();
        let stacked = planes.concat();

        let mut out = self.compression.to_be_bytes().to_vec();
        out.extend(self.encode_plane(
            self.compression,
            &stacked,
            self.height * planes.len()
        ));
        out
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"8BPS");
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(&[0; 6]);
        out.extend_from_slice(&self.channels.to_be_bytes());
        out.extend_from_slice(&(self.height as u32).to_be_bytes());
        out.extend_from_slice(&(self.width as u32).to_be_bytes());
        out.extend_from_slice(&self.depth.to_be_bytes());
        out.extend_from_slice(&self.mode.to_be_bytes());

        out.extend_from_slice(&(self.palette.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.palette);
        // image resources
        out.extend_from_slice(&0_u32.to_be_bytes());

        let section = self.layer_section();
        self.write_length(&mut out, section.len());
        out.extend(section);

        out.extend(self.merged_image());
        out
    }
}

fn block(out: &mut Vec<u8>, key: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(b"8BIM");
    out.extend_from_slice(key);
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
}

/// Packbits with literal runs only
pub fn packbits(row: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for chunk in row.chunks(128) {
        out.push((chunk.len() - 1) as u8);
        out.extend_from_slice(chunk);
    }
    out
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Delta encode one row in place
fn predict(row: &mut [u8], depth: u16) {
    match depth {
        16 => {
            let mut prev = 0_u16;
            for chunk in row.chunks_exact_mut(2) {
                let value = u16::from_be_bytes([chunk[0], chunk[1]]);
                chunk.copy_from_slice(&value.wrapping_sub(prev).to_be_bytes());
                prev = value;
            }
        }
        _ => {
            let mut prev = 0_u8;
            for byte in row.iter_mut() {
                let value = *byte;
                *byte = value.wrapping_sub(prev);
                prev = value;
            }
        }
    }
}

/// 16 bit big endian plane of one value
pub fn plane_u16(value: u16, count: usize) -> Vec<u8> {
    value.to_be_bytes().repeat(count)
}
