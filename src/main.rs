use clap::Parser;
use tracing::{error, Level};

use tablinum::cli::{dispatch, Cli};
use tablinum::config;
use tablinum::logging;

fn main() {
    let cli = Cli::parse();

    let level = logging::level_for_verbosity(Level::INFO, cli.verbose);
    logging::init(level);

    let cfg = match config::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{e}");
            std::process::exit(e.kind().exit_code());
        }
    };

    if let Err(e) = dispatch(cli.command, &cfg) {
        error!("{e}");
        std::process::exit(e.kind().exit_code());
    }
}
