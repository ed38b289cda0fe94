use anyhow::Context;
use clap::Parser;
use fwprompt_core::{ConfigSource, ConnectionDescriptor, FileConfig, PasswdFile, Prompter};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::filter::EnvFilter;

mod terminal;

use terminal::TerminalAdapter;

#[derive(Parser, Debug)]
#[command(name = "fwprompt")]
#[command(about = "Ask whether an outbound connection should be allowed and print the resulting rule")]
struct Args {
    /// Process id of the connecting program (0 if unknown)
    #[arg(long, default_value_t = 0)]
    pid: u32,

    /// Executable path of the connecting program
    #[arg(long, default_value = "")]
    path: String,

    /// Working directory of the connecting program
    #[arg(long, default_value = "")]
    cwd: String,

    /// User id owning the connection (-1 if unknown)
    #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
    uid: i64,

    /// Source address
    #[arg(long, default_value = "")]
    src_ip: String,

    /// Destination address
    #[arg(long)]
    dst_ip: String,

    /// Destination host name, if resolved
    #[arg(long, default_value = "")]
    dst_host: String,

    /// Destination port
    #[arg(long)]
    dst_port: u16,

    /// Transport protocol
    #[arg(long, default_value = "tcp")]
    protocol: String,

    /// Peer address when the prompt comes from a remote daemon
    #[arg(long)]
    remote: Option<String>,

    /// Config file path
    #[arg(long, short = 'c', env = "FWPROMPT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Command line of the connecting program
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

impl Args {
    fn connection(&self) -> ConnectionDescriptor {
        ConnectionDescriptor {
            process_id: self.pid,
            process_path: self.path.clone(),
            process_args: self.command.clone(),
            process_cwd: self.cwd.clone(),
            user_id: self.uid,
            src_ip: self.src_ip.clone(),
            dst_ip: self.dst_ip.clone(),
            dst_host: self.dst_host.clone(),
            dst_port: self.dst_port,
            protocol: self.protocol.clone(),
        }
    }
}

/// Debug logging is on when asked for on the command line or in the config
/// file. An unreadable config is reported later, when the prompt opens.
fn debug_logging(cli_verbose: bool, config: &dyn ConfigSource) -> bool {
    cli_verbose || config.load().is_ok_and(|config| config.common.verbose)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = FileConfig::from_path_or_default(args.config.clone());

    // Initialize logging
    let env_filter = if debug_logging(args.verbose, &config) {
        EnvFilter::from_default_env()
            .add_directive(tracing_subscriber::filter::LevelFilter::DEBUG.into())
    } else {
        EnvFilter::from_default_env()
            .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Using config {:?}", config.path());

    let prompter = Prompter::new(
        Arc::new(config),
        Arc::new(PasswdFile::default()),
        Arc::new(TerminalAdapter),
    );

    let is_local = args.remote.is_none();
    let peer = args.remote.clone().unwrap_or_else(|| "unix:/local".to_string());

    let session = prompter
        .open(args.connection(), is_local, peer)
        .await
        .context("Failed to prompt for connection")?;
    let outcome = session.close();

    if outcome.timed_out {
        tracing::info!("No answer before the timeout, default action applied");
    }

    match outcome.rule {
        Some(rule) => {
            let json = serde_json::to_string_pretty(&rule).context("Failed to encode rule")?;
            println!("{}", json);
            Ok(())
        }
        None => anyhow::bail!("No rule produced for this connection"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fwprompt_core::Config;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_debug_logging_from_cli() {
        assert!(debug_logging(true, &Config::default()));
        assert!(!debug_logging(false, &Config::default()));
    }

    #[test]
    fn test_debug_logging_from_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[common]\nverbose = true").unwrap();
        assert!(debug_logging(false, &FileConfig::new(file.path())));

        let mut quiet = NamedTempFile::new().unwrap();
        writeln!(quiet, "[prompt]\ndefault_timeout = 5").unwrap();
        assert!(!debug_logging(false, &FileConfig::new(quiet.path())));
    }

    #[test]
    fn test_debug_logging_ignores_broken_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[common]\nverbose = \"loud\"").unwrap();
        assert!(!debug_logging(false, &FileConfig::new(file.path())));
        assert!(debug_logging(true, &FileConfig::new(file.path())));
    }
}
