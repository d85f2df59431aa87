/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Rectangles and RGBA pixel surfaces
#[cfg(feature = "serde")]
use serde::Serialize;

/// An axis aligned rectangle, `x`/`y` is the top left corner
/// unless stated otherwise by the owner.
///
/// Widths and heights are never negative, a rectangle whose right
/// edge is left of its left edge is treated as empty.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Rect {
    pub x:      i32,
    pub y:      i32,
    pub width:  i32,
    pub height: i32
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Rect {
        Rect {
            x,
            y,
            width: if width < 0 { 0 } else { width },
            height: if height < 0 { 0 } else { height }
        }
    }

    /// Build a rectangle from its edges in the order they are stored in the file
    pub const fn from_edges(top: i32, left: i32, bottom: i32, right: i32) -> Rect {
        Rect::new(
            left,
            top,
            right.saturating_sub(left),
            bottom.saturating_sub(top)
        )
    }

    pub const fn right(&self) -> i32 {
        self.x + self.width
    }

    pub const fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub const fn area(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        self.width as usize * self.height as usize
    }

    /// Smallest rectangle containing both, empty rectangles are ignored
    pub fn union(&self, other: &Rect) -> Rect {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return *other;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());

        Rect::new(x, y, right - x, bottom - y)
    }

    pub fn intersect(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right <= x || bottom <= y {
            return Rect::new(x, y, 0, 0);
        }
        Rect::new(x, y, right - x, bottom - y)
    }

    /// Clamp every edge independently into `[0,width)x[0,height)`,
    /// the result is never larger than the input
    pub fn crop_to(&self, width: usize, height: usize) -> Rect {
        let max_x = i32::try_from(width).unwrap_or(i32::MAX);
        let max_y = i32::try_from(height).unwrap_or(i32::MAX);

        let left = self.x.clamp(0, max_x);
        let top = self.y.clamp(0, max_y);
        let right = self.right().clamp(0, max_x);
        let bottom = self.bottom().clamp(0, max_y);

        Rect::new(left, top, right - left, bottom - top)
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        !self.intersect(other).is_empty()
    }

    /// Mirror vertically inside a canvas of `canvas_height` rows,
    /// converting between top-left and bottom-left origins.
    ///
    /// Applying it twice returns the original rectangle.
    pub const fn flip_y(&self, canvas_height: i32) -> Rect {
        Rect::new(
            self.x,
            canvas_height - self.y - self.height,
            self.width,
            self.height
        )
    }
}

/// A decoded RGBA8 image, rows are stored top to bottom
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DecodedSurface {
    width:  usize,
    height: usize,
    pixels: Vec<u8>
}

impl DecodedSurface {
    /// Create a fully transparent surface
    pub fn new(width: usize, height: usize) -> DecodedSurface {
        DecodedSurface {
            width,
            height,
            pixels: vec![0; width * height * 4]
        }
    }

    /// Wrap existing RGBA pixels, `None` if the buffer does not match the dimensions
    pub fn from_pixels(width: usize, height: usize, pixels: Vec<u8>) -> Option<DecodedSurface> {
        if pixels.len() != width * height * 4 {
            return None;
        }
        Some(DecodedSurface {
            width,
            height,
            pixels
        })
    }

    pub const fn width(&self) -> usize {
        self.width
    }

    pub const fn height(&self) -> usize {
        self.height
    }

    pub const fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Return the RGBA value at `(x,y)` or `None` when out of bounds
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = (y * self.width + x) * 4;
        let mut px = [0; 4];
        px.copy_from_slice(&self.pixels[start..start + 4]);
        Some(px)
    }
}
