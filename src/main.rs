use clap::Parser as _;
use supports_color::Stream;
use tracing::debug;

use ftree::application::{Application, ApplicationError};
use ftree::cli::Cli;

#[snafu::report]
fn main() -> Result<(), ApplicationError> {
    let cli_args = Cli::parse();
    setup_tracing(&cli_args);
    debug!("Parsed CLI arguments: {cli_args:?}");

    colored::control::set_override(supports_color::on(Stream::Stdout).is_some());
    Application::run(cli_args, std::io::stdout().lock())?;

    Ok(())
}

fn setup_tracing(cli_args: &Cli) {
    if let Some(level) = cli_args.log_level.to_tracing_level() {
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .without_time()
            .compact()
            .init();
    }
}
