/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use clap::{value_parser, Arg, ArgAction, Command};

#[rustfmt::skip]
pub fn create_cmd_args() -> Command {
    Command::new("psd-import")
        .about("Export the layers of a PSD/PSB document as PNG sprites")
        .arg(Arg::new("in")
            .help("Input document to read")
            .value_parser(value_parser!(std::path::PathBuf))
            .required(true))
        .arg(Arg::new("out")
            .short('o')
            .long("out")
            .help("Directory to write sprites and the manifest to")
            .value_parser(value_parser!(std::path::PathBuf))
            .required(true))
        .arg(Arg::new("canvas")
            .long("canvas")
            .action(ArgAction::SetTrue)
            .help_heading("IMPORT")
            .help("Flatten the whole document into a single sprite"))
        .arg(Arg::new("include-hidden")
            .long("include-hidden")
            .action(ArgAction::SetTrue)
            .help_heading("IMPORT")
            .help("Import layers hidden in the document"))
        .arg(Arg::new("flatten")
            .long("flatten")
            .action(ArgAction::Append)
            .value_parser(value_parser!(u32))
            .help_heading("IMPORT")
            .help("Merge the group with this layer id into one sprite, may be repeated"))
        .arg(Arg::new("skip")
            .long("skip")
            .action(ArgAction::Append)
            .value_parser(value_parser!(u32))
            .help_heading("IMPORT")
            .help("Do not import the layer with this layer id, may be repeated"))
        .arg(Arg::new("threads")
            .long("threads")
            .value_parser(value_parser!(usize))
            .help_heading("ADVANCED")
            .help("Number of threads used for decoding and compositing, 1 disables threading"))
        .arg(Arg::new("max-width")
            .long("max-width")
            .value_parser(value_parser!(usize))
            .default_value("300000")
            .help_heading("ADVANCED")
            .help("Maximum width of a document, larger documents are rejected"))
        .arg(Arg::new("max-height")
            .long("max-height")
            .value_parser(value_parser!(usize))
            .default_value("300000")
            .help_heading("ADVANCED")
            .help("Maximum height of a document, larger documents are rejected"))
        .arg(Arg::new("debug")
            .long("debug")
            .action(ArgAction::SetTrue)
            .help_heading("LOGGING")
            .help("Display debug information and higher"))
        .arg(Arg::new("trace")
            .long("trace")
            .action(ArgAction::SetTrue)
            .help_heading("LOGGING")
            .help("Display very verbose information"))
        .arg(Arg::new("warn")
            .long("warn")
            .action(ArgAction::SetTrue)
            .help_heading("LOGGING")
            .help("Display warnings and errors"))
        .arg(Arg::new("info")
            .long("info")
            .action(ArgAction::SetTrue)
            .help_heading("LOGGING")
            .help("Display information about the import"))
}
