/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! One call import pass, decode then extract then composite
use log::{trace, warn};

use crate::composite::{build_merge_units, flatten_canvas, merge_units};
use crate::decoder::{PSDDecoder, PSDHeader};
use crate::errors::PSDDecodeErrors;
use crate::extract::{extract_layers, ExtractionRecord, ImportMode, ImportSettings, ImportWarning};
use crate::options::PSDOptions;
use crate::surface::DecodedSurface;

/// Everything an import pass produces
///
/// In [`ImportMode::Layers`] every imported record owns the surface it
/// produced. In [`ImportMode::FlattenCanvas`] record surfaces are consumed
/// and the result is in `canvas`.
#[derive(Clone, Debug)]
pub struct ImportOutput {
    pub header:   PSDHeader,
    pub records:  Vec<ExtractionRecord>,
    pub canvas:   Option<DecodedSurface>,
    pub warnings: Vec<ImportWarning>
}

impl ImportOutput {
    pub const fn width(&self) -> usize {
        self.header.width
    }

    pub const fn height(&self) -> usize {
        self.header.height
    }

    /// Records owning an output surface, in flat list order
    pub fn imported(&self) -> impl Iterator<Item = &ExtractionRecord> {
        self.records
            .iter()
            .filter(|r| r.is_imported && r.surface.is_some())
    }
}

/// Decode `data` and produce the surfaces requested by `settings`
///
/// Any decode error aborts the pass, no partial output is returned.
pub fn import_document(
    data: &[u8], settings: &ImportSettings, options: &PSDOptions
) -> Result<ImportOutput, PSDDecodeErrors> {
    let mut decoder = PSDDecoder::new_with_options(data, *options);
    let document = decoder.decode()?;
    let header = document.header;

    let mut extraction = extract_layers(document.layers, header.width, header.height, settings);

    if decoder.unsupported_color_mode() {
        extraction
            .warnings
            .push(ImportWarning::UnsupportedColorMode(format!(
                "{:?}",
                header.color_mode
            )));
    }
    for warning in &extraction.warnings {
        warn!("{warning:?}");
    }
    let mut records = extraction.records;

    let canvas = match settings.mode {
        ImportMode::Layers => {
            let units = build_merge_units(&records);
            let merged = merge_units(&records, &units, options)?;

            trace!("Merged {} units", units.len());

            // inputs are consumed, only unit heads keep a surface
            for record in &mut records {
                record.surface = None;
            }
            for (unit, surface) in units.iter().zip(merged) {
                records[unit.start].surface = Some(surface);
            }
            None
        }
        ImportMode::FlattenCanvas => {
            let canvas = flatten_canvas(&records, header.width, header.height, options)?;

            for record in &mut records {
                record.surface = None;
            }
            Some(canvas)
        }
    };

    Ok(ImportOutput {
        header,
        records,
        canvas,
        warnings: extraction.warnings
    })
}
