//! flowengd - flow engineering reconciliation daemon.
//!
//! Loads the host tables from a JSON file, then applies one JSON
//! reconciliation message per input line until end of input or SIGINT.

use anyhow::Context;
use clap::Parser;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::fs::File;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, BufReader};

use flow_engineering::{
    FlowEngineeringConfig, FlowEngineeringError, FlowEngineeringSession, JsonFileTableStore,
    NoStatistics,
};

type Session = FlowEngineeringSession<JsonFileTableStore, NoStatistics>;

/// Flow engineering reconciliation daemon
#[derive(Parser, Debug)]
#[command(name = "flowengd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file holding the interfaces and flows tables
    #[arg(short = 't', long)]
    tables: PathBuf,

    /// File of newline-delimited JSON messages (defaults to stdin)
    #[arg(short = 'i', long)]
    input: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Match flows without their destination port
    #[arg(long)]
    ignore_destination_port: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

fn load_config(args: &Args) -> anyhow::Result<FlowEngineeringConfig> {
    let config = match &args.config {
        Some(path) => FlowEngineeringConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => FlowEngineeringConfig::default(),
    };

    // The command line can only turn the policy on.
    Ok(if args.ignore_destination_port {
        config.with_ignore_destination_port(true)
    } else {
        config
    })
}

fn open_session(args: &Args) -> anyhow::Result<Session> {
    let config = load_config(args)?;
    info!(
        "Ignore destination port: {}, statistics budget: {} fetches / {}ms",
        config.ignore_destination_port,
        config.statistics.max_fetches_per_update,
        config.statistics.update_budget_ms
    );

    let tables = JsonFileTableStore::open(&args.tables)
        .with_context(|| format!("failed to open tables {}", args.tables.display()))?;

    let mut session = FlowEngineeringSession::new(config, tables, NoStatistics);
    session.load_tables().context("failed to load tables")?;
    info!(
        "Loaded {} interfaces, {} incoming flows, {} outgoing flows",
        session.interfaces().len(),
        session.incoming_flows().len(),
        session.outgoing_flows().len()
    );
    Ok(session)
}

/// Applies messages until end of input or SIGINT.
///
/// A message that fails is logged and skipped, except for errors that leave
/// the tables out of step with the registries.
async fn run<R>(reader: R, session: &mut Session) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    error!("Failed to listen for ctrl-c: {}", e);
                }
                warn!("Received SIGINT, shutting down gracefully...");
                return Ok(());
            }
            line = lines.next_line() => line.context("failed to read input")?,
        };

        let Some(line) = line else {
            info!("End of input");
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        match session.handle_raw_message(&line) {
            Ok(result) => {
                for flow in &result.added {
                    debug!("+ {}", flow.key());
                }
                for flow in &result.removed {
                    debug!("- {}", flow.key());
                }
            }
            Err(e @ FlowEngineeringError::Table(_)) => {
                return Err(e).context("failed to update tables");
            }
            Err(e) => error!("Rejected message: {}", e),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    info!("Starting flowengd");

    let mut session = match open_session(&args) {
        Ok(session) => session,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let outcome = match &args.input {
        Some(path) => match File::open(path).await {
            Ok(file) => run(BufReader::new(file), &mut session).await,
            Err(e) => Err(e).with_context(|| format!("failed to open {}", path.display())),
        },
        None => run(BufReader::new(io::stdin()), &mut session).await,
    };

    let stats = session.stats();
    info!(
        "Handled {} messages ({} rejected): {} flows added, {} removed, {} entries skipped",
        stats.messages_handled,
        stats.messages_rejected,
        stats.flows_added,
        stats.flows_removed,
        stats.entries_skipped
    );

    match outcome {
        Ok(()) => {
            info!("flowengd shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("flowengd failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
