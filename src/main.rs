mod app;

use std::{process, sync::Arc};

use log::error;

use app::cli::{self, TerminalSink};
use pass_tasks::{services::PassCommand, MainContext, Operations, RunnerConfig};

fn main() {
    env_logger::init();

    let config = match RunnerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            process::exit(2);
        }
    };

    let context = MainContext::new();
    let operations = Operations::new(
        Arc::new(PassCommand::from_env()),
        Arc::new(TerminalSink),
        context.handle(),
        &config,
    );

    if let Err(e) = cli::run_cli(context, operations) {
        error!("Terminal error: {}", e);
        eprintln!("Terminal error: {}", e);
        process::exit(1);
    }
}
