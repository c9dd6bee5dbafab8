//! lv-capture binary entry point.

use std::process::ExitCode;

use lv_capture::capture::{CaptureLoop, ControlChannel, DataStream};
use lv_capture::cli::{self, Args};
use lv_capture::{interrupt, logging, Config, Result};
use tracing::info;

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("Try 'lv-capture --help' for more information.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error processing input: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = Config::load(args)?;
    let filter = config.log_filter();
    logging::init(Some(filter.as_str()));

    info!("lv-capture v{}", env!("CARGO_PKG_VERSION"));
    info!(
        log_file = ?config.capture.log_file,
        control = %config.capture.control_path.display(),
        chunk_size = config.capture.chunk_size,
        "configuration loaded"
    );

    let data = DataStream::stdin(config.capture.chunk_size)?;
    interrupt::install()?;
    // Blocks until the shell integration opens the pipe for writing.
    let Some(control) =
        ControlChannel::open_cancellable(&config.capture.control_path, interrupt::flag())?
    else {
        info!("interrupted before a control writer connected");
        return Ok(());
    };

    let mut capture = CaptureLoop::from_config(&config.capture, std::io::stderr(), data, control)
        .with_cancel(interrupt::flag());
    capture.run()?;
    Ok(())
}
