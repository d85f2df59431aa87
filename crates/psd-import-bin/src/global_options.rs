/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use std::path::PathBuf;

use clap::parser::ValueSource;
use clap::ArgMatches;
use log::{info, Level};
use psd_import::{ImportMode, ImportSettings, LayerImportSettings, PSDOptions};

#[derive(Debug, Clone)]
pub struct CmdOptions {
    pub input:    PathBuf,
    pub out_dir:  PathBuf,
    pub options:  PSDOptions,
    pub settings: ImportSettings
}

fn ids(options: &ArgMatches, name: &str) -> Vec<u32> {
    options
        .get_many::<u32>(name)
        .map(|ids| ids.copied().collect())
        .unwrap_or_default()
}

pub fn parse_options(options: &ArgMatches) -> Option<CmdOptions> {
    let input = options.get_one::<PathBuf>("in")?.clone();
    let out_dir = options.get_one::<PathBuf>("out")?.clone();

    let mut decoder_options = PSDOptions::default()
        .set_max_width(*options.get_one::<usize>("max-width")?)
        .set_max_height(*options.get_one::<usize>("max-height")?);

    if options.value_source("threads") == Some(ValueSource::CommandLine) {
        let threads = *options.get_one::<usize>("threads")?;
        info!("Using {} threads", threads);
        decoder_options = decoder_options
            .set_use_threads(threads > 1)
            .set_num_threads(threads.max(1));
    }

    let mut settings =
        ImportSettings::default().with_hidden_layers(options.get_flag("include-hidden"));

    if options.get_flag("canvas") {
        info!("Flattening the whole canvas");
        settings = settings.with_mode(ImportMode::FlattenCanvas);
    }
    for id in ids(options, "flatten") {
        let layer = settings.layers.entry(id).or_default();
        layer.flatten = true;
    }
    for id in ids(options, "skip") {
        let layer: &mut LayerImportSettings = settings.layers.entry(id).or_default();
        layer.import = false;
    }

    Some(CmdOptions {
        input,
        out_dir,
        options: decoder_options,
        settings
    })
}

/// Set up logging options
pub fn setup_logger(options: &ArgMatches) {
    let log_level = if options.get_flag("debug") {
        Level::Debug
    } else if options.get_flag("trace") {
        Level::Trace
    } else if options.get_flag("warn") {
        Level::Warn
    } else if options.get_flag("info") {
        Level::Info
    } else {
        Level::Warn
    };

    if let Err(err) = simple_logger::init_with_level(log_level) {
        eprintln!("Could not initialize logger: {err}");
        return;
    }
    info!("Initialized logger");
    info!("Log level :{}", log_level);
}
