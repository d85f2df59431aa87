/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Group merging and canvas flattening
//!
//! Layers are blended back to front with the non premultiplied
//! "over" operator. Since records are topmost first, back to front
//! means walking indices downwards.
use log::{debug, trace};

use crate::errors::PSDDecodeErrors;
use crate::extract::{subtree_ends, ExtractionRecord};
use crate::options::PSDOptions;
use crate::surface::{DecodedSurface, Rect};
use crate::workers::{for_each_row_band, map_blocks};

/// A contiguous range of records producing one surface
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MergeUnit {
    pub start: usize,
    /// Last record of the unit, inclusive
    pub end:   usize,
    /// Output rectangle, bottom left origin
    pub rect:  Rect
}

/// Blend `rgb` with coverage `in_alpha` in `[0,1]` over the RGBA pixel `dst`
#[inline]
pub fn blend_normalized(dst: &mut [u8], rgb: [u8; 3], in_alpha: f32) {
    if in_alpha <= 0.0 {
        return;
    }
    let prev_alpha = f32::from(dst[3]) / 255.0;
    let out_alpha = in_alpha + prev_alpha * (1.0 - in_alpha);

    if out_alpha <= 0.0 {
        dst.copy_from_slice(&[0; 4]);
        return;
    }
    let below = prev_alpha * (1.0 - in_alpha);

    for (d, s) in dst[..3].iter_mut().zip(rgb) {
        let value = (f32::from(s) * in_alpha + f32::from(*d) * below) / out_alpha;
        *d = round_u8(value);
    }
    dst[3] = round_u8(out_alpha * 255.0);
}

/// Blend the RGBA pixel `src` scaled by a layer `opacity` over `dst`
#[inline]
pub fn blend_pixel(dst: &mut [u8], src: &[u8], opacity: u8) {
    let alpha = f32::from(src[3]) / 255.0 * (f32::from(opacity) / 255.0);
    blend_normalized(dst, [src[0], src[1], src[2]], alpha);
}

/// Round half up and saturate
#[inline]
fn round_u8(value: f32) -> u8 {
    (value.clamp(0.0, 255.0) + 0.5) as u8
}

/// Blend `src` over a `width`x`height` RGBA buffer, placing its top left
/// corner at `(x,y)` of a top left origin grid. Pixels falling outside are skipped.
///
/// With `bottom_up` set, rows of `dst` are stored bottom to top.
fn blend_surface(
    dst: &mut [u8], width: usize, height: usize, src: &DecodedSurface, x: i32, y: i32,
    opacity: u8, bottom_up: bool
) {
    let (src_width, src_height) = src.dimensions();
    let first_col = (-x).max(0) as usize;
    let last_col = (i64::from(width as i32) - i64::from(x)).clamp(0, src_width as i64) as usize;

    if first_col >= last_col {
        return;
    }
    for (sy, src_row) in src
        .pixels()
        .chunks_exact(src_width * 4)
        .enumerate()
        .take(src_height)
    {
        let dy = y + sy as i32;
        if dy < 0 || dy >= height as i32 {
            continue;
        }
        let row = if bottom_up {
            height - 1 - dy as usize
        } else {
            dy as usize
        };
        let dst_start = (row * width + (x + first_col as i32) as usize) * 4;
        let dst_row = &mut dst[dst_start..dst_start + (last_col - first_col) * 4];

        for (d, s) in dst_row
            .chunks_exact_mut(4)
            .zip(src_row[first_col * 4..last_col * 4].chunks_exact(4))
        {
            blend_pixel(d, s, opacity);
        }
    }
}

fn note_blend_mode(record: &ExtractionRecord) {
    if record.blend_mode != "norm" && record.blend_mode != "pass" {
        debug!(
            "Layer {:?} uses blend mode {:?}, blending as normal",
            record.name, record.blend_mode
        );
    }
}

/// Leaves that take part in a composite: non group records that contribute
/// and carry a surface
fn is_drawable(record: &ExtractionRecord) -> bool {
    !record.is_group
        && record.contributes
        && record.surface.as_ref().is_some_and(|s| !s.is_empty())
}

/// One unit per imported leaf and per imported (flattened) group
pub fn build_merge_units(records: &[ExtractionRecord]) -> Vec<MergeUnit> {
    let ends = subtree_ends(records);

    records
        .iter()
        .filter(|r| r.is_imported)
        .map(|r| MergeUnit {
            start: r.index,
            end:   if r.is_group { ends[r.index] - 1 } else { r.index },
            rect:  r.position
        })
        .collect()
}

/// Pairs of units whose records share a parent and whose rectangles overlap
pub fn overlapping_siblings(records: &[ExtractionRecord], units: &[MergeUnit]) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();

    for (i, a) in units.iter().enumerate() {
        for (j, b) in units.iter().enumerate().skip(i + 1) {
            if records[a.start].parent == records[b.start].parent && a.rect.overlaps(&b.rect) {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

fn merge_unit(records: &[ExtractionRecord], unit: &MergeUnit) -> DecodedSurface {
    let width = unit.rect.width.max(0) as usize;
    let height = unit.rect.height.max(0) as usize;
    let mut surface = DecodedSurface::new(width, height);

    if surface.is_empty() {
        return surface;
    }
    for record in records[unit.start..=unit.end].iter().rev() {
        if !is_drawable(record) {
            continue;
        }
        let Some(src) = &record.surface else {
            continue;
        };
        note_blend_mode(record);

        // both rectangles have a bottom left origin, offsets inside the
        // unit are measured from its top edge
        let x = record.position.x - unit.rect.x;
        let y = unit.rect.bottom() - record.position.bottom();

        blend_surface(
            surface.pixels_mut(),
            width,
            height,
            src,
            x,
            y,
            record.opacity,
            false
        );
    }
    surface
}

/// Composite every unit into its own surface, in unit order
pub fn merge_units(
    records: &[ExtractionRecord], units: &[MergeUnit], options: &PSDOptions
) -> Result<Vec<DecodedSurface>, PSDDecodeErrors> {
    for (a, b) in overlapping_siblings(records, units) {
        debug!(
            "Sibling units {:?} and {:?} overlap",
            records[units[a].start].name, records[units[b].start].name
        );
    }
    let blocks = options.get_num_threads();

    map_blocks(units, blocks, options, |offset, block| {
        trace!("Merging units {offset}..{}", offset + block.len());
        Ok(block.iter().map(|unit| merge_unit(records, unit)).collect::<Vec<_>>())
    })
    .map(|blocks| blocks.into_iter().flatten().collect())
}

/// Composite every imported leaf, including leaves of flattened groups,
/// into one `width`x`height` surface with rows top to bottom.
pub fn flatten_canvas(
    records: &[ExtractionRecord], width: usize, height: usize, options: &PSDOptions
) -> Result<DecodedSurface, PSDDecodeErrors> {
    let units = build_merge_units(records);

    // back to front
    let mut layers: Vec<usize> = units
        .iter()
        .flat_map(|unit| unit.start..=unit.end)
        .filter(|index| is_drawable(&records[*index]))
        .collect();
    layers.sort_unstable_by(|a, b| b.cmp(a));

    let mut canvas = DecodedSurface::new(width, height);

    if layers.is_empty() || canvas.is_empty() {
        return Ok(canvas);
    }
    let canvas_height = height as i32;
    let partitions = options.get_num_threads();

    debug!(
        "Flattening {} layers in up to {partitions} partitions",
        layers.len()
    );

    // stage 1, every partition owns a scratch canvas with rows bottom to top
    let scratch = map_blocks(&layers, partitions, options, |_, block| {
        let mut buffer = vec![0_u8; width * height * 4];

        for index in block {
            let record = &records[*index];
            let Some(src) = &record.surface else {
                continue;
            };
            note_blend_mode(record);

            let top = canvas_height - record.position.bottom();
            blend_surface(
                &mut buffer,
                width,
                height,
                src,
                record.position.x,
                top,
                record.opacity,
                true
            );
        }
        Ok::<_, PSDDecodeErrors>(buffer)
    })?;

    // stage 2, reduce partitions in order, flipping rows back to top to bottom
    let stride = width * 4;
    for_each_row_band(canvas.pixels_mut(), stride, options, |first_row, band| {
        for (y, row) in band.chunks_exact_mut(stride).enumerate() {
            let source_row = height - 1 - (first_row + y);

            for buffer in &scratch {
                let source = &buffer[source_row * stride..(source_row + 1) * stride];

                for (d, s) in row.chunks_exact_mut(4).zip(source.chunks_exact(4)) {
                    blend_pixel(d, s, 255);
                }
            }
        }
        Ok::<(), PSDDecodeErrors>(())
    })?;

    Ok(canvas)
}
