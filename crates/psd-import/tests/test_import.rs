/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

mod common;

use common::*;
use psd_import::composite::{build_merge_units, overlapping_siblings};
use psd_import::{
    import_document, ImportMode, ImportOutput, ImportSettings, ImportWarning,
    LayerImportSettings, PSDOptions, Rect
};
use uuid::Uuid;

fn import(data: &[u8], settings: &ImportSettings) -> ImportOutput {
    import_document(data, settings, &PSDOptions::default()).unwrap()
}

fn flatten(id: u32) -> (u32, LayerImportSettings) {
    let layer = LayerImportSettings {
        flatten: true,
        ..LayerImportSettings::default()
    };
    (id, layer)
}

fn settings(layers: &[(u32, LayerImportSettings)]) -> ImportSettings {
    let mut settings = ImportSettings::default();
    for id in 0..16 {
        settings.layers.insert(id, LayerImportSettings::default());
    }
    for (id, layer) in layers {
        settings.layers.insert(*id, *layer);
    }
    settings
}

fn red_under_blue() -> Vec<u8> {
    Document::rgb(4, 4)
        .layer(Layer::solid("red", 1, [0, 0, 4, 4], [255, 0, 0, 255]))
        .layer(Layer::solid("blue", 2, [0, 0, 4, 4], [0, 0, 255, 128]))
        .build()
}

#[test]
fn red_under_half_blue_flattens_to_purple() {
    let settings = settings(&[]).with_mode(ImportMode::FlattenCanvas);
    let output = import(&red_under_blue(), &settings);

    let canvas = output.canvas.as_ref().unwrap();
    assert_eq!(canvas.dimensions(), (4, 4));

    // 128 is the closest byte to half coverage, so red lands a step below 128
    for px in canvas.pixels().chunks_exact(4) {
        assert!(px[0].abs_diff(128) <= 1, "{px:?}");
        assert_eq!(px[1], 0);
        assert!(px[2].abs_diff(128) <= 1, "{px:?}");
        assert_eq!(px[3], 255);
    }
    assert!(output.records.iter().all(|r| r.surface.is_none()));
    assert!(output.warnings.is_empty());
}

#[test]
fn layers_mode_keeps_one_surface_per_layer() {
    let output = import(&red_under_blue(), &settings(&[]));

    assert!(output.canvas.is_none());
    let imported: Vec<_> = output.imported().map(|r| r.name.as_str()).collect();
    assert_eq!(imported, ["blue", "red"]);

    let blue = output.records[0].surface.as_ref().unwrap();
    assert_eq!(blue.pixel(3, 3), Some([0, 0, 255, 128]));
}

#[test]
fn opaque_top_layer_replaces_base() {
    let data = Document::rgb(2, 2)
        .layer(Layer::solid("base", 1, [0, 0, 2, 2], [255, 0, 0, 255]))
        .layer(Layer::solid("top", 2, [0, 0, 2, 2], [0, 255, 0, 255]))
        .layer(Layer::solid("clear", 3, [0, 0, 2, 2], [0, 0, 255, 0]))
        .build();
    let output = import(&data, &settings(&[]).with_mode(ImportMode::FlattenCanvas));

    let canvas = output.canvas.unwrap();
    assert!(canvas
        .pixels()
        .chunks_exact(4)
        .all(|px| px == [0, 255, 0, 255]));
}

/// a at the bottom, group g holding b (bottom) and c (top)
fn grouped() -> Vec<u8> {
    Document::rgb(4, 4)
        .layer(Layer::solid("a", 1, [0, 0, 2, 2], [255, 0, 0, 255]))
        .layer(Layer::group_end())
        .layer(Layer::solid("b", 3, [2, 2, 4, 4], [0, 255, 0, 255]))
        .layer(Layer::solid("c", 4, [0, 2, 2, 4], [0, 0, 255, 255]))
        .layer(Layer::group("g", 2))
        .build()
}

#[test]
fn flattened_group_becomes_one_surface() {
    let output = import(&grouped(), &settings(&[flatten(2)]));
    let records = &output.records;

    let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["g", "c", "b", "a"]);

    let parents: Vec<_> = records.iter().map(|r| r.parent).collect();
    assert_eq!(parents, [-1, 0, 0, -1]);

    let imported: Vec<_> = output.imported().map(|r| r.name.as_str()).collect();
    assert_eq!(imported, ["g", "a"]);

    // b and c stacked in the right column, bottom left origin
    let group = &records[0];
    assert_eq!(group.position, Rect::new(2, 0, 2, 4));
    assert_eq!((group.width, group.height), (2, 4));

    let surface = group.surface.as_ref().unwrap();
    assert_eq!(surface.dimensions(), (2, 4));
    assert_eq!(surface.pixel(0, 0), Some([0, 0, 255, 255]));
    assert_eq!(surface.pixel(1, 1), Some([0, 0, 255, 255]));
    assert_eq!(surface.pixel(0, 2), Some([0, 255, 0, 255]));
    assert_eq!(surface.pixel(1, 3), Some([0, 255, 0, 255]));
}

#[test]
fn unflattened_group_imports_children() {
    let output = import(&grouped(), &settings(&[]));

    let imported: Vec<_> = output.imported().map(|r| r.name.as_str()).collect();
    assert_eq!(imported, ["c", "b", "a"]);
    // the group still reports its bounds
    assert_eq!(output.records[0].position, Rect::new(2, 0, 2, 4));
}

#[test]
fn group_rect_is_union_of_children() {
    let output = import(&grouped(), &settings(&[]));
    let records = &output.records;

    for (i, record) in records.iter().enumerate() {
        assert!(record.parent < i as i32);

        if record.is_group {
            let union = records
                .iter()
                .filter(|r| r.parent == i as i32 && r.contributes && !r.is_group)
                .fold(Rect::default(), |acc, r| acc.union(&r.position))
                .crop_to(output.width(), output.height());
            assert_eq!(record.position, union);
        }
    }
}

#[test]
fn hidden_layers_follow_policy() {
    let data = Document::rgb(2, 2)
        .layer(Layer::solid("shown", 1, [0, 0, 2, 2], [255; 4]))
        .layer(Layer::solid("hidden", 2, [0, 0, 1, 1], [0, 0, 0, 255]).hidden())
        .build();

    let output = import(&data, &settings(&[]));
    assert!(!output.records[0].is_imported);
    assert!(output.records[0].surface.is_none());

    let mut with_hidden = settings(&[]);
    with_hidden.import_hidden_layers = true;
    let output = import(&data, &with_hidden);
    assert!(output.records[0].is_imported);

    // disabling import wins over visibility
    let disabled = LayerImportSettings {
        import: false,
        ..LayerImportSettings::default()
    };
    let output = import(&data, &settings(&[(1, disabled)]));
    assert_eq!(output.imported().count(), 0);
}

#[test]
fn hidden_group_hides_its_children() {
    let data = Document::rgb(4, 4)
        .layer(Layer::group_end())
        .layer(Layer::solid("inside", 3, [0, 0, 1, 1], [255; 4]))
        .layer(Layer::group("g", 2).hidden())
        .build();
    let output = import(&data, &settings(&[]).with_mode(ImportMode::FlattenCanvas));

    assert!(!output.records[1].is_imported);
    assert!(output
        .canvas
        .unwrap()
        .pixels()
        .iter()
        .all(|p| *p == 0));
}

#[test]
fn sprite_ids_survive_reimport() {
    let kept = Uuid::new_v4();
    let layer = LayerImportSettings {
        sprite_id: Some(kept),
        ..LayerImportSettings::default()
    };
    let output = import(&red_under_blue(), &settings(&[(1, layer)]));

    assert_eq!(output.records[1].sprite_id, kept);
    assert_ne!(output.records[0].sprite_id, kept);
}

#[test]
fn missing_settings_warn() {
    let output = import(&red_under_blue(), &ImportSettings::default());

    assert_eq!(output.warnings.len(), 2);
    assert!(output
        .warnings
        .iter()
        .all(|w| matches!(w, ImportWarning::MissingSettings { .. })));
    // defaults import everything
    assert_eq!(output.imported().count(), 2);
}

#[test]
fn sibling_units_are_disjoint() {
    let data = Document::rgb(8, 8)
        .layer(Layer::solid("tl", 1, [0, 0, 4, 4], [255; 4]))
        .layer(Layer::solid("tr", 2, [0, 4, 4, 8], [255; 4]))
        .layer(Layer::solid("bl", 3, [4, 0, 8, 4], [255; 4]))
        .layer(Layer::solid("br", 4, [4, 4, 8, 8], [255; 4]))
        .build();
    let output = import(&data, &settings(&[]));
    let units = build_merge_units(&output.records);

    assert_eq!(units.len(), 4);
    assert!(overlapping_siblings(&output.records, &units).is_empty());
    for (i, a) in units.iter().enumerate() {
        for b in &units[i + 1..] {
            assert!(!a.rect.overlaps(&b.rect));
        }
    }
}

#[test]
fn threads_do_not_change_results() {
    let mut document = Document::rgb(64, 48);
    for i in 0..12 {
        let top = (i * 3) as i32;
        let left = (i * 4) as i32;
        let rgba = [(i * 20) as u8, 255 - (i * 20) as u8, (i * 7) as u8, 255];
        document = document.layer(
            Layer::solid(&format!("layer {i}"), i + 1, [top, left, top + 12, left + 16], rgba)
                .compressed([RAW, RLE, ZIP, ZIP_PREDICTION][i as usize % 4])
        );
    }
    let data = document.build();
    let settings = settings(&[]).with_mode(ImportMode::FlattenCanvas);

    let single = import_document(
        &data,
        &settings,
        &PSDOptions::default().set_use_threads(false)
    )
    .unwrap();
    let threaded = import_document(
        &data,
        &settings,
        &PSDOptions::default()
            .set_num_threads(4)
            .set_min_rows_per_task(1)
    )
    .unwrap();

    assert_eq!(single.canvas, threaded.canvas);
}

#[test]
fn layer_opacity_scales_coverage() {
    let data = Document::rgb(1, 1)
        .layer(Layer::solid("white", 1, [0, 0, 1, 1], [255, 255, 255, 255]))
        .layer(Layer::solid("black", 2, [0, 0, 1, 1], [0, 0, 0, 255]).with_opacity(0))
        .build();
    let output = import(&data, &settings(&[]).with_mode(ImportMode::FlattenCanvas));

    assert_eq!(output.canvas.unwrap().pixel(0, 0), Some([255, 255, 255, 255]));
}
