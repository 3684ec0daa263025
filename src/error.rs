use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to spawn worker {worker}: {source}")]
    Spawn {
        worker: usize,
        #[source]
        source: io::Error,
    },
    #[error("worker {worker} panicked")]
    WorkerPanicked { worker: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown storage kind `{0}`")]
pub struct UnknownStorage(pub String);
