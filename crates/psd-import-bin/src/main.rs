/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use std::process::exit;

use log::error;

mod cmd_args;
mod global_options;
mod manifest;
mod workflow;

pub fn main() {
    let cmd = cmd_args::create_cmd_args();
    let options = cmd.get_matches();

    global_options::setup_logger(&options);

    let Some(parsed_opts) = global_options::parse_options(&options) else {
        error!("Could not parse command line options");
        exit(-1);
    };

    if let Err(err) = workflow::run(&parsed_opts) {
        println!();
        error!(" Could not import {:?}, reason {:?}", parsed_opts.input, err);
        println!();
        exit(-1);
    }
}
