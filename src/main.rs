use std::process::ExitCode;

use log::{error, info};
use thread_local_counter::{Options, scenario};

fn main() -> ExitCode {
    let e = env_logger::Env::new()
        .filter_or("COUNTER_LOG", "info")
        .write_style("COUNTER_LOG_STYLE");
    env_logger::init_from_env(e);

    let options = Options::from_env().unwrap_or_else(|e| e.exit());
    log::debug!("options: {:?}", options);

    info!("main() starts");
    if let Err(e) = scenario::run(&options) {
        error!("{e}");
        return ExitCode::FAILURE;
    }
    info!("main() completes");
    ExitCode::SUCCESS
}
