/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Flattening the layer tree into parent indexed records
use std::collections::{HashMap, HashSet};

use log::{trace, warn};
#[cfg(feature = "serde")]
use serde::Serialize;
use uuid::Uuid;

use crate::layers::LayerNode;
use crate::surface::{DecodedSurface, Rect};

/// What an import pass produces
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum ImportMode {
    /// One surface per imported layer or flattened group
    #[default]
    Layers,
    /// A single surface of the whole canvas
    FlattenCanvas
}

/// Per layer import choices, keyed by layer id in [`ImportSettings`]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct LayerImportSettings {
    pub import:    bool,
    /// Merge a group and all its descendants into one surface
    pub flatten:   bool,
    /// Sprite id assigned by a previous import, kept stable across imports
    pub sprite_id: Option<Uuid>
}

impl Default for LayerImportSettings {
    fn default() -> Self {
        LayerImportSettings {
            import:    true,
            flatten:   false,
            sprite_id: None
        }
    }
}

/// Host supplied settings for an import pass
#[derive(Clone, Debug, Default)]
pub struct ImportSettings {
    pub mode:                 ImportMode,
    pub import_hidden_layers: bool,
    pub layers:               HashMap<u32, LayerImportSettings>
}

impl ImportSettings {
    #[must_use]
    pub fn with_mode(mut self, mode: ImportMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_hidden_layers(mut self, yes: bool) -> Self {
        self.import_hidden_layers = yes;
        self
    }

    #[must_use]
    pub fn with_layer(mut self, layer_id: u32, settings: LayerImportSettings) -> Self {
        self.layers.insert(layer_id, settings);
        self
    }
}

/// Non fatal issues found during an import pass
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum ImportWarning {
    /// No settings for this layer, defaults were used
    MissingSettings { layer_id: u32, name: String },
    /// Another layer already used this id, a fresh sprite id was assigned
    DuplicateLayerId { layer_id: u32, name: String },
    /// Layers of this document decode to blank surfaces
    UnsupportedColorMode(String)
}

/// One entry of the flat layer list
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ExtractionRecord {
    pub index:       usize,
    /// Index of the parent record, -1 for root layers
    pub parent:      i32,
    pub layer_id:    u32,
    pub name:        String,
    pub is_group:    bool,
    /// Whether this record produces a surface of its own
    pub is_imported: bool,
    /// Whether this record takes part in any composite
    pub contributes: bool,
    /// Own or inherited flatten flag
    pub flatten:     bool,
    pub visible:     bool,
    pub opacity:     u8,
    pub blend_mode:  String,
    /// Canvas position with a bottom left origin
    pub position:    Rect,
    pub width:       usize,
    pub height:      usize,
    pub sprite_id:   Uuid,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub surface:     Option<DecodedSurface>
}

/// Records plus the warnings raised while building them
#[derive(Clone, Debug, Default)]
pub struct LayerExtraction {
    pub records:  Vec<ExtractionRecord>,
    pub warnings: Vec<ImportWarning>
}

struct Walker<'s> {
    settings: &'s ImportSettings,
    width:    usize,
    height:   usize,
    records:  Vec<ExtractionRecord>,
    warnings: Vec<ImportWarning>,
    seen:     HashSet<u32>
}

impl<'s> Walker<'s> {
    /// Append `node` and its subtree, returning the union of the
    /// contributing leaf rectangles below (or at) it.
    fn visit(
        &mut self, node: LayerNode, parent: i32, parent_visible: bool, inherited_flatten: bool
    ) -> Rect {
        let index = self.records.len();

        let layer = match self.settings.layers.get(&node.id) {
            Some(settings) => *settings,
            None => {
                self.warnings.push(ImportWarning::MissingSettings {
                    layer_id: node.id,
                    name:     node.name.clone()
                });
                LayerImportSettings::default()
            }
        };
        let sprite_id = if self.seen.insert(node.id) {
            layer.sprite_id.unwrap_or_else(Uuid::new_v4)
        } else {
            warn!("Layer {:?} reuses layer id {}", node.name, node.id);
            self.warnings.push(ImportWarning::DuplicateLayerId {
                layer_id: node.id,
                name:     node.name.clone()
            });
            Uuid::new_v4()
        };

        let visible = parent_visible && node.visible;
        let contributes = (self.settings.import_hidden_layers || visible) && layer.import;
        let flatten = inherited_flatten || layer.flatten;
        let is_imported =
            contributes && !inherited_flatten && (!node.is_group || layer.flatten);

        let position = if node.is_group {
            Rect::default()
        } else {
            node.rect.flip_y(self.height as i32)
        };

        self.records.push(ExtractionRecord {
            index,
            parent,
            layer_id: node.id,
            name: node.name,
            is_group: node.is_group,
            is_imported,
            contributes,
            flatten,
            visible,
            opacity: node.opacity,
            blend_mode: node.blend_mode,
            position,
            width: position.width as usize,
            height: position.height as usize,
            sprite_id,
            surface: node.surface
        });

        if !node.is_group {
            return if contributes { position } else { Rect::default() };
        }

        let mut bounds = Rect::default();
        for child in node.children {
            let child_bounds = self.visit(child, index as i32, visible, flatten);
            bounds = bounds.union(&child_bounds);
        }
        let cropped = bounds.crop_to(self.width, self.height);

        let record = &mut self.records[index];
        record.position = cropped;
        record.width = cropped.width as usize;
        record.height = cropped.height as usize;

        bounds
    }
}

/// Flatten root layers (topmost first) into pre-order records.
///
/// Records are topmost first and every parent precedes its children.
/// Leaf positions are flipped to a bottom left origin, group positions are
/// the union of their contributing leaves, cropped to the canvas.
pub fn extract_layers(
    layers: Vec<LayerNode>, canvas_width: usize, canvas_height: usize, settings: &ImportSettings
) -> LayerExtraction {
    let count = layers.iter().map(LayerNode::count).sum();

    let mut walker = Walker {
        settings,
        width: canvas_width,
        height: canvas_height,
        records: Vec::with_capacity(count),
        warnings: Vec::new(),
        seen: HashSet::with_capacity(count)
    };
    for layer in layers {
        walker.visit(layer, -1, true, false);
    }
    trace!(
        "Extracted {} records, {} imported",
        walker.records.len(),
        walker.records.iter().filter(|r| r.is_imported).count()
    );

    LayerExtraction {
        records:  walker.records,
        warnings: walker.warnings
    }
}

/// Index one past the last descendant of every record
pub fn subtree_ends(records: &[ExtractionRecord]) -> Vec<usize> {
    let mut ends: Vec<usize> = (1..=records.len()).collect();

    // children always follow their parent, so a reverse pass sees
    // every child before its parent
    for record in records.iter().rev() {
        if let Ok(parent) = usize::try_from(record.parent) {
            ends[parent] = ends[parent].max(ends[record.index]);
        }
    }
    ends
}
