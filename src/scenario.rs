//! Starts the workers and waits for them.

use std::thread;

use log::debug;

use crate::counter::{self, Storage};
use crate::error::Error;
use crate::options::Options;

/// Spawns `options.workers` threads running [`counter::count`], joins them in
/// spawn order and returns each worker's final counter value.
///
/// The values are handed back as-is; nothing here compares them.
pub fn run(options: &Options) -> Result<Vec<u64>, Error> {
    let Options {
        iterations,
        workers,
        storage,
    } = *options;

    let handles = (1..=workers)
        .map(|worker| spawn_worker(worker, storage, iterations))
        .collect::<Result<Vec<_>, _>>()?;
    debug!("spawned {} workers", handles.len());

    handles
        .into_iter()
        .enumerate()
        .map(|(i, handle)| {
            handle
                .join()
                .map_err(|_| Error::WorkerPanicked { worker: i + 1 })
        })
        .collect()
}

fn spawn_worker(
    worker: usize,
    storage: Storage,
    iterations: u64,
) -> Result<thread::JoinHandle<u64>, Error> {
    thread::Builder::new()
        .name(format!("worker-{worker}"))
        .spawn(move || counter::count(storage, iterations))
        .map_err(|source| Error::Spawn { worker, source })
}
