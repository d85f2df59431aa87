/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Fork-join helpers
//!
//! Every stage splits its work into contiguous, disjoint index ranges,
//! runs one task per range and waits for all of them before returning.
//! Outputs are either disjoint `chunks_mut` of one buffer or owned values
//! returned from each task, so no task ever writes memory another task sees.
use std::ops::Range;

use log::trace;

use crate::options::PSDOptions;

/// Split `len` items into at most `parts` contiguous ranges whose sizes
/// differ by at most one. Empty ranges are never returned.
pub fn partition(len: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.clamp(1, len.max(1));
    let base = len / parts;
    let extra = len % parts;

    let mut ranges = Vec::with_capacity(parts);
    let mut start = 0;

    for i in 0..parts {
        let size = base + usize::from(i < extra);
        if size == 0 {
            continue;
        }
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}

/// Run `func` over horizontal bands of `output`.
///
/// `func` receives the index of the first row in its band and the band itself,
/// bands never overlap.
pub fn for_each_row_band<E, F>(
    output: &mut [u8], row_bytes: usize, options: &PSDOptions, func: F
) -> Result<(), E>
where
    E: Send,
    F: Fn(usize, &mut [u8]) -> Result<(), E> + Sync
{
    if row_bytes == 0 || output.is_empty() {
        return Ok(());
    }
    let rows = output.len() / row_bytes;
    let tasks = options
        .get_num_threads()
        .min(rows / options.get_min_rows_per_task())
        .max(1);

    #[cfg(feature = "threads")]
    {
        if tasks > 1 {
            let rows_per_task = rows.div_ceil(tasks);
            trace!("Splitting {rows} rows into bands of {rows_per_task}");

            return std::thread::scope(|s| {
                let func = &func;
                let handles: Vec<_> = output
                    .chunks_mut(rows_per_task * row_bytes)
                    .enumerate()
                    .map(|(i, band)| s.spawn(move || func(i * rows_per_task, band)))
                    .collect();

                join_all(handles).into_iter().collect()
            });
        }
    }
    let _ = tasks;
    func(0, output)
}

/// Map contiguous blocks of `items` to one result each, in order.
///
/// `func` receives the offset of its block within `items` and the block.
pub fn map_blocks<T, R, E, F>(
    items: &[T], blocks: usize, options: &PSDOptions, func: F
) -> Result<Vec<R>, E>
where
    T: Sync,
    R: Send,
    E: Send,
    F: Fn(usize, &[T]) -> Result<R, E> + Sync
{
    let ranges = partition(items.len(), blocks.min(options.get_num_threads()));

    #[cfg(feature = "threads")]
    {
        if ranges.len() > 1 {
            trace!("Running {} blocks over {} items", ranges.len(), items.len());

            return std::thread::scope(|s| {
                let func = &func;
                let handles: Vec<_> = ranges
                    .into_iter()
                    .map(|range| s.spawn(move || func(range.start, &items[range])))
                    .collect();

                join_all(handles).into_iter().collect()
            });
        }
    }
    ranges
        .into_iter()
        .map(|range| func(range.start, &items[range]))
        .collect()
}

#[cfg(feature = "threads")]
fn join_all<R>(handles: Vec<std::thread::ScopedJoinHandle<'_, R>>) -> Vec<R> {
    handles
        .into_iter()
        .map(|handle| match handle.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic)
        })
        .collect()
}
