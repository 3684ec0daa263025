//! Parsing Options.
//! `--iterations {n}` or `-n`, `--workers {k}` or `-w`, `--storage {kind}` or `-s`.

use std::ffi::OsString;

use clap::builder::{PossibleValuesParser, TypedValueParser};
use clap::{Arg, Command, value_parser};

use crate::counter::Storage;

fn make_options_parser() -> Command {
    Command::new("thread-local-counter")
        .no_binary_name(true)
        .version(env!("CARGO_PKG_VERSION"))
        .about("Bumps a thread-local counter from several threads without a lock")
        .arg(
            Arg::new("iterations")
                .short('n')
                .long("iterations")
                .value_name("N")
                .help("Read-increment-write cycles each worker performs")
                .default_value("1000000")
                .value_parser(value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("workers")
                .short('w')
                .long("workers")
                .value_name("K")
                .help("Number of worker threads to start")
                .default_value("2")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("storage")
                .short('s')
                .long("storage")
                .value_name("KIND")
                .help("Thread-local facility backing the counter")
                .default_value(Storage::default().name())
                .value_parser(
                    PossibleValuesParser::new(Storage::ALL.map(Storage::name))
                        .try_map(|s| s.parse::<Storage>()),
                ),
        )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub iterations: u64,
    pub workers: usize,
    pub storage: Storage,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            iterations: 1_000_000,
            workers: 2,
            storage: Storage::Native,
        }
    }
}

impl Options {
    /// Parses the process arguments, skipping the binary name.
    pub fn from_env() -> Result<Self, clap::Error> {
        Self::parse_from_args(std::env::args_os().skip(1))
    }

    pub fn parse_from_args<I, T>(flags: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = make_options_parser().try_get_matches_from(flags)?;
        let defaults = Options::default();
        Ok(Options {
            iterations: matches
                .get_one::<u64>("iterations")
                .copied()
                .unwrap_or(defaults.iterations),
            workers: matches
                .get_one::<usize>("workers")
                .copied()
                .unwrap_or(defaults.workers),
            storage: matches
                .get_one::<Storage>("storage")
                .copied()
                .unwrap_or(defaults.storage),
        })
    }
}
