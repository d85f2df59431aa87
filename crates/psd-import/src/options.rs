/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Decoder options
use crate::constants::PSD_MAX_DIMENSION;

/// Options that influence decoding and compositing
///
/// Options are set with the builder style `set_*` methods,
/// each returning the modified options.
#[derive(Debug, Copy, Clone)]
pub struct PSDOptions {
    /// Maximum width for which the decoder will
    /// not try to decode documents larger than the
    /// specified width.
    ///
    /// - Default value: 30000
    max_width:             usize,
    /// Maximum height for which the decoder will
    /// not try to decode documents larger than the
    /// specified height.
    ///
    /// - Default value: 30000
    max_height:            usize,
    /// Whether zlib compressed channels should have their
    /// adler32 checksum confirmed
    inflate_confirm_adler: bool,
    /// Whether fork-join stages may run on scoped threads
    use_threads:           bool,
    /// Number of workers for a stage, 0 means use the available parallelism
    num_threads:           usize,
    /// Color conversion is not split into tasks smaller than this many rows
    min_rows_per_task:     usize
}

impl Default for PSDOptions {
    fn default() -> Self {
        PSDOptions {
            max_width:             PSD_MAX_DIMENSION,
            max_height:            PSD_MAX_DIMENSION,
            inflate_confirm_adler: true,
            use_threads:           true,
            num_threads:           0,
            min_rows_per_task:     64
        }
    }
}

impl PSDOptions {
    pub const fn get_max_width(&self) -> usize {
        self.max_width
    }

    pub const fn get_max_height(&self) -> usize {
        self.max_height
    }

    /// Set maximum width for which the decoder should not try
    /// decoding documents greater than that width
    #[must_use]
    pub fn set_max_width(mut self, width: usize) -> Self {
        self.max_width = width;
        self
    }

    /// Set maximum height for which the decoder should not try
    /// decoding documents greater than that height
    #[must_use]
    pub fn set_max_height(mut self, height: usize) -> Self {
        self.max_height = height;
        self
    }

    pub const fn get_inflate_confirm_adler(&self) -> bool {
        self.inflate_confirm_adler
    }

    #[must_use]
    pub fn set_inflate_confirm_adler(mut self, yes: bool) -> Self {
        self.inflate_confirm_adler = yes;
        self
    }

    /// Whether stages should fan out to threads.
    ///
    /// Always false when the crate is built without the `threads` feature
    pub const fn get_use_threads(&self) -> bool {
        cfg!(feature = "threads") && self.use_threads
    }

    #[must_use]
    pub fn set_use_threads(mut self, yes: bool) -> Self {
        self.use_threads = yes;
        self
    }

    /// Set the number of workers a stage fans out to,
    /// 0 lets the decoder query the available parallelism
    #[must_use]
    pub fn set_num_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    /// Resolve the number of workers a stage may use
    pub fn get_num_threads(&self) -> usize {
        if !self.get_use_threads() {
            return 1;
        }
        if self.num_threads != 0 {
            return self.num_threads;
        }
        std::thread::available_parallelism()
            .map(|x| x.get())
            .unwrap_or(1)
    }

    pub const fn get_min_rows_per_task(&self) -> usize {
        self.min_rows_per_task
    }

    #[must_use]
    pub fn set_min_rows_per_task(mut self, rows: usize) -> Self {
        self.min_rows_per_task = rows.max(1);
        self
    }
}
