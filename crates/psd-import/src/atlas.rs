/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Contract with an external texture atlas packer
//!
//! The packing algorithm lives outside this crate, implementors of
//! [`AtlasPacker`] receive the imported surfaces in flat list order and
//! return one placement per surface, in the same order.
use std::fmt::{Debug, Display, Formatter};

#[cfg(feature = "serde")]
use serde::Serialize;
use uuid::Uuid;

use crate::import::ImportOutput;
use crate::surface::Rect;

/// Offset applied to a sprite's texture coordinates inside the atlas
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct UvTransform {
    pub x: i32,
    pub y: i32
}

/// Input handed to a packer
#[derive(Clone, Debug)]
pub struct PackRequest<'a> {
    /// RGBA8 pixels of each surface
    pub buffers:            Vec<&'a [u8]>,
    pub widths:             Vec<u32>,
    pub heights:            Vec<u32>,
    /// Pixels kept free around each surface
    pub padding:            i32,
    /// Pixels added to each surface's extent before placement
    pub size_expand:        u32,
    pub require_square_pot: bool
}

impl<'a> PackRequest<'a> {
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

/// Output of a packer
#[derive(Clone, Debug, Default)]
pub struct PackedAtlas {
    pub buffer:        Vec<u8>,
    pub width:         u32,
    pub height:        u32,
    /// Placement of each requested surface, in request order
    pub rects:         Vec<Rect>,
    pub uv_transforms: Vec<UvTransform>
}

/// A texture atlas packing algorithm
pub trait AtlasPacker {
    type Error: Debug;

    fn pack(&self, request: &PackRequest) -> Result<PackedAtlas, Self::Error>;
}

/// Where an imported record ended up in the atlas
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct AtlasSprite {
    /// Index of the record in the flat list
    pub index:     usize,
    pub sprite_id: Uuid,
    pub rect:      Rect,
    pub uv:        UvTransform
}

pub enum AtlasError<E> {
    Packer(E),
    /// The packer returned a different number of placements than requested
    /// expected, found
    PlacementCount(usize, usize)
}

impl<E: Debug> Debug for AtlasError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AtlasError::Packer(err) => writeln!(f, "Atlas packer failed: {err:?}"),
            AtlasError::PlacementCount(expected, found) => {
                writeln!(
                    f,
                    "Atlas packer returned {found} placements for {expected} surfaces"
                )
            }
        }
    }
}

impl<E: Debug> Display for AtlasError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{:?}", self)
    }
}

impl<E: Debug> std::error::Error for AtlasError<E> {}

/// Build a pack request from the imported surfaces of `output`, in flat
/// list order. A flattened canvas is requested as a single surface.
///
/// Returns the request together with the record index of each entry,
/// `None` standing for the canvas.
pub fn build_pack_request(
    output: &ImportOutput, padding: i32, size_expand: u32, require_square_pot: bool
) -> (PackRequest<'_>, Vec<Option<usize>>) {
    let mut request = PackRequest {
        buffers: Vec::new(),
        widths: Vec::new(),
        heights: Vec::new(),
        padding,
        size_expand,
        require_square_pot
    };
    let mut sources = Vec::new();

    let mut push = |pixels, width: usize, height: usize| {
        request.buffers.push(pixels);
        request.widths.push(width as u32);
        request.heights.push(height as u32);
    };

    if let Some(canvas) = &output.canvas {
        push(canvas.pixels(), canvas.width(), canvas.height());
        sources.push(None);
    }
    for record in output.imported() {
        if let Some(surface) = &record.surface {
            push(surface.pixels(), surface.width(), surface.height());
            sources.push(Some(record.index));
        }
    }
    (request, sources)
}

/// Pack the imported surfaces of `output` and map placements back to records
pub fn pack_output<P: AtlasPacker>(
    packer: &P, output: &ImportOutput, padding: i32, size_expand: u32, require_square_pot: bool
) -> Result<(PackedAtlas, Vec<AtlasSprite>), AtlasError<P::Error>> {
    let (request, sources) = build_pack_request(output, padding, size_expand, require_square_pot);
    let atlas = packer.pack(&request).map_err(AtlasError::Packer)?;

    if atlas.rects.len() != request.len() {
        return Err(AtlasError::PlacementCount(request.len(), atlas.rects.len()));
    }
    let sprites = sources
        .iter()
        .zip(&atlas.rects)
        .enumerate()
        .filter_map(|(i, (source, rect))| {
            let record = &output.records[(*source)?];
            Some(AtlasSprite {
                index:     record.index,
                sprite_id: record.sprite_id,
                rect:      *rect,
                uv:        atlas.uv_transforms.get(i).copied().unwrap_or_default()
            })
        })
        .collect();

    Ok((atlas, sprites))
}
