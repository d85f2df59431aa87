/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use std::fmt::{Debug, Formatter};
use std::fs::{create_dir_all, File};
use std::io::BufWriter;
use std::path::Path;
use std::time::Instant;

use log::{info, trace};
use psd_import::errors::PSDDecodeErrors;
use psd_import::{import_document, DecodedSurface};

use crate::global_options::CmdOptions;
use crate::manifest::{Manifest, Sprite};

pub enum WorkflowErrors {
    Io(std::io::Error),
    Decode(PSDDecodeErrors),
    Png(png::EncodingError),
    Json(serde_json::Error)
}

impl Debug for WorkflowErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowErrors::Io(err) => writeln!(f, "I/O error: {err}"),
            WorkflowErrors::Decode(err) => writeln!(f, "{err:?}"),
            WorkflowErrors::Png(err) => writeln!(f, "Could not encode sprite: {err}"),
            WorkflowErrors::Json(err) => writeln!(f, "Could not write manifest: {err}")
        }
    }
}

impl From<std::io::Error> for WorkflowErrors {
    fn from(value: std::io::Error) -> Self {
        WorkflowErrors::Io(value)
    }
}

impl From<PSDDecodeErrors> for WorkflowErrors {
    fn from(value: PSDDecodeErrors) -> Self {
        WorkflowErrors::Decode(value)
    }
}

impl From<png::EncodingError> for WorkflowErrors {
    fn from(value: png::EncodingError) -> Self {
        WorkflowErrors::Png(value)
    }
}

impl From<serde_json::Error> for WorkflowErrors {
    fn from(value: serde_json::Error) -> Self {
        WorkflowErrors::Json(value)
    }
}

fn write_png(path: &Path, surface: &DecodedSurface) -> Result<(), WorkflowErrors> {
    let (width, height) = surface.dimensions();
    let writer = BufWriter::new(File::create(path)?);

    let mut encoder = png::Encoder::new(writer, width as u32, height as u32);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);

    let mut writer = encoder.write_header()?;
    writer.write_image_data(surface.pixels())?;
    writer.finish()?;

    trace!("Wrote {:?} ({}x{})", path, width, height);
    Ok(())
}

/// File name of a sprite, made of the flat index and a file system safe layer name
fn sprite_name(index: usize, name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{index:04}_{safe}.png")
}

pub fn run(options: &CmdOptions) -> Result<(), WorkflowErrors> {
    let data = std::fs::read(&options.input)?;
    info!("Read {} bytes from {:?}", data.len(), options.input);

    let start = Instant::now();
    let output = import_document(&data, &options.settings, &options.options)?;
    info!(
        "Imported {}x{} document in {} ms",
        output.width(),
        output.height(),
        start.elapsed().as_millis()
    );

    create_dir_all(&options.out_dir)?;
    let mut sprites = Vec::new();

    if let Some(canvas) = &output.canvas {
        let file = String::from("canvas.png");
        write_png(&options.out_dir.join(&file), canvas)?;
        sprites.push(Sprite { record: None, file });
    }
    for record in output.imported() {
        if let Some(surface) = &record.surface {
            if surface.is_empty() {
                info!("Skipping empty layer {:?}", record.name);
                continue;
            }
            let file = sprite_name(record.index, &record.name);
            write_png(&options.out_dir.join(&file), surface)?;
            sprites.push(Sprite {
                record: Some(record.index),
                file
            });
        }
    }

    let manifest = Manifest::new(&options.input, &output, &sprites);
    let writer = BufWriter::new(File::create(options.out_dir.join("manifest.json"))?);
    serde_json::to_writer_pretty(writer, &manifest)?;

    info!(
        "Wrote {} sprites to {:?}",
        sprites.len(),
        options.out_dir
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::sprite_name;

    #[test]
    fn sprite_names_are_path_safe() {
        assert_eq!(sprite_name(3, "Layer 1/shadow"), "0003_Layer_1_shadow.png");
        assert_eq!(sprite_name(12, "Ébauche"), "0012_Ébauche.png");
    }
}
