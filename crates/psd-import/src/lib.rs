/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! A layered PSD/PSB decoder and compositor
//!
//! This crate reads Photoshop documents (`.psd` and the large document
//! `.psb` variant), decodes every layer into an RGBA surface and composites
//! those surfaces either per group or over the whole canvas, ready to be
//! handed to a texture atlas packer.
//!
//! ## What is supported
//! - Raw, RLE, ZIP and ZIP with prediction compressed channels
//! - RGB, Grayscale, CMYK, Bitmap, Indexed and Lab documents at 1, 8, 16 and 32 bits
//! - Transparency, user masks and layer masks
//! - Layer groups, with per group flattening
//!
//! Multichannel and Duotone documents decode to blank surfaces.
//!
//! # Example
//! - Importing every layer of a document
//! ```no_run
//! use psd_import::errors::PSDDecodeErrors;
//! use psd_import::{import_document, ImportSettings, PSDOptions};
//!
//! fn main() -> Result<(), PSDDecodeErrors> {
//!     let data = std::fs::read("image.psd").unwrap_or_default();
//!     let output = import_document(&data, &ImportSettings::default(), &PSDOptions::default())?;
//!
//!     for record in output.imported() {
//!         println!("{} at {:?}", record.name, record.position);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! - Reading the layer tree only
//! ```no_run
//! use psd_import::PSDDecoder;
//!
//! let mut decoder = PSDDecoder::new(&[]);
//! if let Ok(layers) = decoder.decode_layers() {
//!     println!("{} root layers", layers.len());
//! }
//! ```
#![forbid(unsafe_code)]
pub use decoder::{PSDDecoder, PSDDocument, PSDHeader};
pub use extract::{ExtractionRecord, ImportMode, ImportSettings, ImportWarning, LayerImportSettings};
pub use import::{import_document, ImportOutput};
pub use layers::LayerNode;
pub use options::PSDOptions;
pub use surface::{DecodedSurface, Rect};

pub mod atlas;
pub mod bytestream;
pub mod color;
pub mod composite;
pub mod compression;
pub mod constants;
pub mod decoder;
pub mod errors;
pub mod extract;
pub mod import;
pub mod layers;
pub mod mask;
mod options;
mod surface;
pub mod workers;
