/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use std::path::Path;

use psd_import::ImportOutput;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// A written sprite and the record it came from, `None` for the canvas
pub struct Sprite {
    pub record: Option<usize>,
    pub file:   String
}

impl Serialize for Sprite {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer
    {
        let mut state = serializer.serialize_struct("Sprite", 2)?;

        state.serialize_field("record", &self.record)?;
        state.serialize_field("file", &self.file)?;

        state.end()
    }
}

pub struct Manifest<'a> {
    source:  &'a Path,
    output:  &'a ImportOutput,
    sprites: &'a [Sprite]
}

impl<'a> Manifest<'a> {
    pub fn new(source: &'a Path, output: &'a ImportOutput, sprites: &'a [Sprite]) -> Manifest<'a> {
        Manifest {
            source,
            output,
            sprites
        }
    }
}

impl<'a> Serialize for Manifest<'a> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer
    {
        let mut state = serializer.serialize_struct("Manifest", 5)?;

        state.serialize_field("file", &self.source.to_string_lossy())?;
        state.serialize_field("header", &self.output.header)?;
        state.serialize_field("records", &self.output.records)?;
        state.serialize_field("sprites", &self.sprites)?;
        state.serialize_field("warnings", &self.output.warnings)?;

        state.end()
    }
}
