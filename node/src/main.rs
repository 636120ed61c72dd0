use clap::Parser;
use node_config::{Config, ConfigError, ProcessEnv};
use remapper::SerializationError;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod logging;
mod remap;

#[derive(Parser)]
#[command(version, about = "Node configuration and inbound port remapping")]
enum CliCommand {
    /// Load the node configuration from the environment and report it.
    Check,
    /// Apply PORT_MAP to a proxy engine config.
    Remap {
        /// Config to read, stdin when omitted.
        #[arg(long)]
        input: Option<PathBuf>,
        /// Where to write the remapped config, stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum NodeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("could not load config: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

fn main() -> ExitCode {
    let cli = CliCommand::parse();
    let _sentry = logging::init(&ProcessEnv);

    let result = match &cli {
        CliCommand::Check => check(),
        CliCommand::Remap { input, output } => remap(input.as_deref(), output.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

fn check() -> Result<(), NodeError> {
    let config = Config::load()?;

    tracing::info!(
        node_port = config.node_port,
        disable_hashed_set_check = config.disable_hashed_set_check,
        port_map = %config.port_map(),
        "Configuration is valid"
    );
    Ok(())
}

fn remap(input: Option<&Path>, output: Option<&Path>) -> Result<(), NodeError> {
    let config = Config::load()?;

    remap::run(config.port_map(), input, output)
}
