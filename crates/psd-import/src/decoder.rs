/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! A layered PSD/PSB reader.
//!
//! The decoder walks the file once to locate its sections, then decodes
//! the layer section into a [`LayerNode`] tree and the merged image
//! section into a [`DecodedSurface`].
use log::{trace, warn};
#[cfg(feature = "serde")]
use serde::Serialize;

use crate::bytestream::PSDReader;
use crate::color::{ColorDecoder, PALETTE_SIZE};
use crate::compression::RawChannelPlane;
use crate::constants::{ColorModes, CompressionMethod, PsdVersion, PSD_IDENTIFIER_BE};
use crate::errors::PSDDecodeErrors;
use crate::layers::{parse_layer_info, read_tagged_block, LayerContext, LayerInfo, LayerNode};
use crate::mask::apply_alpha_and_masks;
use crate::options::PSDOptions;
use crate::surface::{DecodedSurface, Rect};

/// Fields of the file header
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PSDHeader {
    pub version:    PsdVersion,
    pub channels:   u16,
    pub width:      usize,
    pub height:     usize,
    pub depth:      u16,
    pub color_mode: ColorModes
}

/// A decoded document
#[derive(Clone, Debug)]
pub struct PSDDocument {
    pub header:    PSDHeader,
    /// Root layers, topmost first
    pub layers:    Vec<LayerNode>,
    /// The merged image stored alongside the layers
    pub composite: DecodedSurface
}

impl PSDDocument {
    pub const fn width(&self) -> usize {
        self.header.width
    }

    pub const fn height(&self) -> usize {
        self.header.height
    }
}

/// A Photoshop document reader
pub struct PSDDecoder<'a> {
    data:           &'a [u8],
    options:        PSDOptions,
    header:         Option<PSDHeader>,
    palette:        &'a [u8],
    layer_section:  &'a [u8],
    image_data:     &'a [u8],
    merged_alpha:   bool,
    warned_unknown: bool
}

impl<'a> PSDDecoder<'a> {
    /// Create a new decoder reading a document from `data`
    pub fn new(data: &'a [u8]) -> PSDDecoder<'a> {
        Self::new_with_options(data, PSDOptions::default())
    }

    /// Create a new decoder with options that influence decoding routines
    pub fn new_with_options(data: &'a [u8], options: PSDOptions) -> PSDDecoder<'a> {
        PSDDecoder {
            data,
            options,
            header: None,
            palette: &[],
            layer_section: &[],
            image_data: &[],
            merged_alpha: false,
            warned_unknown: false
        }
    }

    /// Decode headers and locate the document sections
    ///
    /// This confirms whether the file is a photoshop document and extracts
    /// dimensions, depth and color mode.
    pub fn decode_headers(&mut self) -> Result<(), PSDDecodeErrors> {
        if self.header.is_some() {
            return Ok(());
        }
        let data = self.data;
        let mut stream = PSDReader::new(data);

        let magic = stream.get_u32_be_err()?;

        if magic != PSD_IDENTIFIER_BE {
            return Err(PSDDecodeErrors::WrongMagicBytes(magic));
        }
        let version = stream.get_u16_be_err()?;
        let version =
            PsdVersion::from_int(version).ok_or(PSDDecodeErrors::UnsupportedFileType(version))?;

        // Skip 6 reserved bytes
        stream.skip(6)?;

        let channels = stream.get_u16_be_err()?;

        if !(1..=56).contains(&channels) {
            return Err(PSDDecodeErrors::UnsupportedChannelCount(channels));
        }
        let height = stream.get_u32_be_err()? as usize;
        let width = stream.get_u32_be_err()? as usize;

        if width == 0 || height == 0 {
            return Err(PSDDecodeErrors::ZeroDimensions);
        }
        let max_width = self.options.get_max_width().min(version.max_dimension());
        let max_height = self.options.get_max_height().min(version.max_dimension());

        if width > max_width {
            return Err(PSDDecodeErrors::LargeDimensions(max_width, width));
        }
        if height > max_height {
            return Err(PSDDecodeErrors::LargeDimensions(max_height, height));
        }

        let depth = stream.get_u16_be_err()?;

        if !matches!(depth, 1 | 8 | 16 | 32) {
            return Err(PSDDecodeErrors::UnsupportedBitDepth(depth));
        }
        let color_mode = stream.get_u16_be_err()?;
        // unknown modes still decode, to blank surfaces
        let color_mode = ColorModes::from_int(color_mode);

        // color mode data, the palette for indexed documents
        let bytes = stream.get_u32_be_err()? as usize;
        self.palette = stream.get_slice(bytes)?;

        if color_mode == ColorModes::IndexedColor && self.palette.len() < PALETTE_SIZE {
            warn!(
                "Indexed document carries a {} byte palette, expected {PALETTE_SIZE}",
                self.palette.len()
            );
        }

        // skip image resources
        let bytes = stream.get_u32_be_err()? as usize;
        stream.skip(bytes)?;

        let bytes = stream.get_length(version)?;
        self.layer_section = stream.get_slice(bytes)?;

        self.image_data = &data[stream.position()..];

        let header = PSDHeader {
            version,
            channels,
            width,
            height,
            depth,
            color_mode
        };

        trace!("Version: {:?}", header.version);
        trace!("Image width: {}", header.width);
        trace!("Image height: {}", header.height);
        trace!("Channels: {}", header.channels);
        trace!("Bit depth: {}", header.depth);
        trace!("Color mode: {:?}", header.color_mode);
        trace!("Layer section: {} bytes", self.layer_section.len());

        self.header = Some(header);

        Ok(())
    }

    /// Return the header, decoding it first when needed
    pub fn get_header(&mut self) -> Result<PSDHeader, PSDDecodeErrors> {
        self.decode_headers()?;
        self.header
            .ok_or(PSDDecodeErrors::Generic("Header was not decoded"))
    }

    /// Width and height of the document, `None` before headers are decoded
    pub fn get_dimensions(&self) -> Option<(usize, usize)> {
        self.header.map(|h| (h.width, h.height))
    }

    /// Whether the color mode of this document could not be converted,
    /// meaning every surface decoded so far is blank
    pub const fn unsupported_color_mode(&self) -> bool {
        self.warned_unknown
    }

    fn color_decoder(&mut self, mode: ColorModes) -> Option<ColorDecoder<'a>> {
        let decoder = ColorDecoder::for_mode(mode, self.palette);

        if decoder.is_none() && !self.warned_unknown {
            warn!("Color mode {mode:?} is not supported, layers will be blank");
            self.warned_unknown = true;
        }
        decoder
    }

    /// Decode the layer section into a tree of layers, topmost first
    ///
    /// Documents without a layer section return an empty list.
    pub fn decode_layers(&mut self) -> Result<Vec<LayerNode>, PSDDecodeErrors> {
        let header = self.get_header()?;
        let ctx = LayerContext {
            version: header.version,
            depth:   header.depth,
            color:   self.color_decoder(header.color_mode),
            options: &self.options
        };
        let mut reader = PSDReader::new(self.layer_section);

        if reader.is_empty() {
            return Ok(Vec::new());
        }
        let bytes = reader.get_length(header.version)?;
        let mut info = parse_layer_info(&mut PSDReader::new(reader.get_slice(bytes)?), &ctx)?;

        // global layer mask info
        if reader.remaining() >= 4 {
            let bytes = reader.get_u32_be_err()? as usize;
            reader.skip(bytes)?;
        }
        // high depth documents keep their layers in a tagged block
        while reader.remaining() >= 12 {
            let Some((key, data)) = read_tagged_block(&mut reader, header.version)? else {
                break;
            };
            if matches!(&key, b"Lr16" | b"Lr32" | b"Layr") && info.records == 0 {
                trace!("Reading layers from {}", String::from_utf8_lossy(&key));
                info = parse_layer_info(&mut PSDReader::new(data), &ctx)?;
            }
        }
        let LayerInfo {
            roots,
            merged_alpha,
            records
        } = info;

        trace!("Decoded {records} layer records");
        self.merged_alpha = merged_alpha;

        Ok(roots)
    }

    /// Decode the merged image section
    ///
    /// The surface is opaque unless the layer section flagged the first extra
    /// channel as merged transparency, so call [`decode_layers`](Self::decode_layers)
    /// first when transparency matters.
    pub fn decode_composite(&mut self) -> Result<DecodedSurface, PSDDecodeErrors> {
        let header = self.get_header()?;
        let (width, height) = (header.width, header.height);
        let channels = usize::from(header.channels);

        let mut stream = PSDReader::new(self.image_data);
        let tag = stream.get_u16_be_err()?;
        let compression =
            CompressionMethod::from_int(tag).ok_or(PSDDecodeErrors::UnknownCompression(tag))?;

        trace!("Merged image compression: {compression:?}");

        let Some(color) = self.color_decoder(header.color_mode) else {
            return Ok(DecodedSurface::new(width, height));
        };

        // channels are stored one after another, which is the same layout
        // as one plane `channels` times as tall
        let stacked = Rect::new(0, 0, width as i32, (height * channels) as i32);
        let planes = RawChannelPlane::decompress(
            compression,
            stream.get_slice(stream.remaining())?,
            stacked,
            header.depth,
            header.version,
            &self.options
        )?;
        let rect = Rect::new(0, 0, width as i32, height as i32);
        let plane_size = planes.bytes_per_row() * height;

        let mut split = Vec::with_capacity(channels);
        for chunk in planes.data().chunks_exact(plane_size).take(color.channels() + 1) {
            split.push(RawChannelPlane::from_raw(chunk.to_vec(), rect, header.depth)?);
        }
        let color_planes: Vec<_> = (0..color.channels()).map(|c| split.get(c)).collect();
        let mut surface = color.decode(&color_planes, width, height, &self.options)?;

        let alpha = split
            .get(color.channels())
            .filter(|_| self.merged_alpha);

        apply_alpha_and_masks(&mut surface, rect, alpha, None, None, &self.options)?;

        Ok(surface)
    }

    /// Decode the whole document, layers and merged image
    ///
    /// Documents without layers expose their merged image as a single
    /// root layer named `Background`.
    pub fn decode(&mut self) -> Result<PSDDocument, PSDDecodeErrors> {
        let header = self.get_header()?;
        let mut layers = self.decode_layers()?;
        let composite = self.decode_composite()?;

        if layers.is_empty() {
            trace!("No layers, using the merged image as background");
            layers.push(LayerNode::background(composite.clone()));
        }
        Ok(PSDDocument {
            header,
            layers,
            composite
        })
    }
}
