//! Each thread that touches a thread-local variable gets its own instance, so a
//! counter that looks shared in the source can be bumped from many threads
//! without a lock.
//!
//! [`counter::count`] runs the unsynchronized read-increment-write loop and
//! [`scenario::run`] starts and joins the workers. The counter can be backed by
//! `thread_local!`, by POSIX thread-specific keys ([`thread_local`]) or by a
//! `ThreadId`-keyed registry ([`thread_local_simple`]).

pub mod counter;
pub mod error;
pub mod options;
pub mod scenario;
pub mod thread_local;
pub mod thread_local_simple;

pub use counter::Storage;
pub use error::Error;
pub use options::Options;
