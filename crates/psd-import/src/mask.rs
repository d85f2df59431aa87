/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Layer alpha and mask application
use crate::color::row_to_u8;
use crate::compression::RawChannelPlane;
use crate::constants::{MASK_FLAG_DISABLED, MASK_FLAG_INVERT_ON_BLEND};
use crate::errors::PSDDecodeErrors;
use crate::options::PSDOptions;
use crate::surface::{DecodedSurface, Rect};
use crate::workers::for_each_row_band;

/// Placement and interpretation of a mask, as found in a layer's mask record
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MaskParameters {
    /// Document space rectangle covered by the mask plane
    pub rect:          Rect,
    /// Value of the mask outside its rectangle, 0 or 255
    pub default_color: u8,
    pub flags:         u8
}

impl MaskParameters {
    pub const fn invert_on_blend(&self) -> bool {
        self.flags & MASK_FLAG_INVERT_ON_BLEND != 0
    }

    pub const fn disabled(&self) -> bool {
        self.flags & MASK_FLAG_DISABLED != 0
    }

    /// Value used for pixels outside the mask rectangle
    pub const fn background(&self) -> u8 {
        if self.invert_on_blend() {
            255 - self.default_color
        } else {
            self.default_color
        }
    }
}

/// A decoded mask plane together with its parameters
#[derive(Copy, Clone, Debug)]
pub struct LayerMask<'a> {
    pub params: MaskParameters,
    pub plane:  &'a RawChannelPlane
}

impl<'a> LayerMask<'a> {
    /// Fill `out` with mask values for one row of a layer.
    ///
    /// `doc_y` is the row in document space and `layer_x` the document
    /// column of `out[0]`.
    fn fill_row(&self, doc_y: i32, layer_x: i32, out: &mut [u8], scratch: &mut Vec<u8>) {
        out.fill(self.params.background());

        let rect = self.plane.rect();
        if rect.is_empty() || doc_y < rect.y || doc_y >= rect.bottom() {
            return;
        }
        scratch.resize(rect.width as usize, 0);
        row_to_u8(
            self.plane.row((doc_y - rect.y) as usize),
            self.plane.depth(),
            scratch
        );

        let layer_right = layer_x + out.len() as i32;
        let start = layer_x.max(rect.x);
        let end = layer_right.min(rect.right());

        for doc_x in start..end {
            out[(doc_x - layer_x) as usize] = scratch[(doc_x - rect.x) as usize];
        }
    }
}

/// Write alpha into an RGBA surface decoded from `layer_rect`.
///
/// Without an alpha plane every pixel becomes opaque. Masks flagged as
/// disabled are ignored. With two masks alpha is scaled by
/// `layer * user / 65025`, with one by `mask / 255`.
pub fn apply_alpha_and_masks(
    surface: &mut DecodedSurface, layer_rect: Rect, alpha: Option<&RawChannelPlane>,
    user_mask: Option<LayerMask>, layer_mask: Option<LayerMask>, options: &PSDOptions
) -> Result<(), PSDDecodeErrors> {
    let (width, height) = surface.dimensions();

    if surface.is_empty() {
        return Ok(());
    }
    if let Some(plane) = alpha {
        if plane.rect().width as usize != width || plane.rect().height as usize != height {
            return Err(PSDDecodeErrors::BadPlaneSize(
                width * height,
                plane.rect().area()
            ));
        }
    }
    let user_mask = user_mask.filter(|m| !m.params.disabled());
    let layer_mask = layer_mask.filter(|m| !m.params.disabled());

    for_each_row_band(surface.pixels_mut(), width * 4, options, |first_row, band| {
        let mut alpha_row = vec![255; width];
        let mut user_row = vec![255; width];
        let mut layer_row = vec![255; width];
        let mut scratch = Vec::new();

        for (y, out) in band.chunks_exact_mut(width * 4).enumerate() {
            let row = first_row + y;
            let doc_y = layer_rect.y + row as i32;

            if let Some(plane) = alpha {
                row_to_u8(plane.row(row), plane.depth(), &mut alpha_row);
            }
            if let Some(mask) = &user_mask {
                mask.fill_row(doc_y, layer_rect.x, &mut user_row, &mut scratch);
            }
            if let Some(mask) = &layer_mask {
                mask.fill_row(doc_y, layer_rect.x, &mut layer_row, &mut scratch);
            }

            for (x, px) in out.chunks_exact_mut(4).enumerate() {
                let a = u32::from(alpha_row[x]);

                px[3] = match (&user_mask, &layer_mask) {
                    (Some(_), Some(_)) => {
                        let masks = u32::from(layer_row[x]) * u32::from(user_row[x]);
                        (a * masks / 65025) as u8
                    }
                    (Some(_), None) => (a * u32::from(user_row[x]) / 255) as u8,
                    (None, Some(_)) => (a * u32::from(layer_row[x]) / 255) as u8,
                    (None, None) => a as u8
                };
            }
        }
        Ok::<(), PSDDecodeErrors>(())
    })
}
