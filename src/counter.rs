//! The per-thread counter and the worker routine that bumps it.

use std::cell::Cell;
use std::fmt;
use std::str::FromStr;
use std::thread;

use log::{debug, info};

use crate::error::UnknownStorage;
use crate::thread_local::LocalKey;
use crate::thread_local_simple;

thread_local! {
    static NATIVE: Cell<u64> = const { Cell::new(0) };
}

static PTHREAD: LocalKey<Cell<u64>> = LocalKey::new(|| Cell::new(0));

static REGISTRY: thread_local_simple::ThreadLocal<Cell<u64>> =
    thread_local_simple::ThreadLocal::new(|| Cell::new(0));

/// Which thread-local facility backs the counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Storage {
    /// `thread_local!`
    #[default]
    Native,
    /// POSIX thread-specific data keys.
    Pthread,
    /// A `ThreadId`-keyed registry.
    Registry,
}

impl Storage {
    pub const ALL: [Storage; 3] = [Storage::Native, Storage::Pthread, Storage::Registry];

    pub fn name(self) -> &'static str {
        match self {
            Storage::Native => "native",
            Storage::Pthread => "pthread",
            Storage::Registry => "registry",
        }
    }

    fn with<R>(self, f: impl FnOnce(&Cell<u64>) -> R) -> R {
        match self {
            Storage::Native => NATIVE.with(f),
            Storage::Pthread => PTHREAD.with(f),
            Storage::Registry => REGISTRY.with(f),
        }
    }

    /// The calling thread's counter value.
    pub fn read(self) -> u64 {
        self.with(Cell::get)
    }

    /// Overwrites the calling thread's counter value.
    pub fn write(self, value: u64) {
        self.with(|counter| counter.set(value))
    }
}

impl fmt::Display for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Storage {
    type Err = UnknownStorage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Storage::ALL
            .into_iter()
            .find(|storage| storage.name() == s)
            .ok_or_else(|| UnknownStorage(s.to_owned()))
    }
}

/// Runs `iterations` unsynchronized read-increment-write cycles on the calling
/// thread's counter and returns the value left behind.
///
/// Nothing here locks: the read and the write both land in this thread's own
/// instance.
pub fn count(storage: Storage, iterations: u64) -> u64 {
    let current = thread::current();
    let name = current.name().unwrap_or("<unnamed>");
    info!("{name} starts ({storage} storage)");
    for _ in 0..iterations {
        let mut local = storage.read();
        local += 1;
        storage.write(local);
    }
    let counter = storage.read();
    info!("{name} completes: counter={counter}");
    debug!("{name} ran {iterations} iterations");
    counter
}
