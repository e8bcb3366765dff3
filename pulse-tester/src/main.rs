mod config;
mod dashboard;
mod headless;
mod logger;
mod runner;
mod session;
mod ui;

use std::io;
use std::process;
use std::sync::Arc;

use clap::Parser;

use config::TesterConfig;
use logger::FileLogger;
use runner::PulseRunner;
use session::Session;

fn main() -> io::Result<()> {
    let config = TesterConfig::parse();

    FileLogger::create(&config.log, config.log_level.into())?
        .install()
        .map_err(io::Error::other)?;

    let settings = config.settings().unwrap_or_else(|err| {
        eprintln!("{err}");
        process::exit(2);
    });
    log::info!(
        "pulse tester starting: targets {}W / {}W, width {}ms",
        config.target1,
        config.target2,
        config.width
    );

    let session = Session::new(PulseRunner::new(Arc::new(settings), config.runner()));
    let result = match config.headless_duration() {
        Some(duration) => headless::run(session, duration, &mut io::stdout().lock()),
        None => ui::run(session),
    };

    log::info!("pulse tester exiting");
    log::logger().flush();
    result
}
