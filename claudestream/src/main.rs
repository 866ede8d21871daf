//! claudestream - replay an agent's stream-json output
//!
//! Reads newline-delimited stream-json from a file or stdin, prints the
//! transcript as it is assembled, and reports the session summary.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Summaries (`--save`): $XDG_DATA_HOME/claudestream/sessions/<session_id>.json
//! - Logs: $XDG_STATE_HOME/claudestream/claudestream.log
//! - Config: $XDG_CONFIG_HOME/claudestream/config.toml

mod render;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use claudestream_core::ingest::{forward_lines, JsonSummaryWriter, SummarySink};
use claudestream_core::{Config, SessionSummary, StreamInput, StreamSession, TerminationReason};
use std::path::PathBuf;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;

/// Inputs waiting for the worker; the reader blocks when this is full.
const INPUT_BUFFER: usize = 256;

#[derive(Parser)]
#[command(name = "claudestream")]
#[command(about = "Replay agent stream-json output into a transcript and session summary")]
#[command(version)]
struct Args {
    /// stream-json file to read (stdin when omitted)
    input: Option<PathBuf>,

    /// Project path recorded in the summary (default: current directory)
    #[arg(long)]
    project: Option<PathBuf>,

    /// Write the summary JSON to this path
    #[arg(long, value_name = "PATH")]
    summary_out: Option<PathBuf>,

    /// Write the summary JSON to the data directory
    #[arg(long)]
    save: bool,

    /// Treat end of input as the agent exiting (finalizes an unfinished session)
    #[arg(long)]
    finalize_on_eof: bool,

    /// Print each transcript update as a JSON line
    #[arg(long)]
    json: bool,

    /// Verbose logging (-v debug, -vv trace); also mirrors warnings to stderr
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    let mut config = Config::load().context("failed to load configuration")?;
    if args.verbose > 0 {
        config.logging.level = if args.verbose == 1 { "debug" } else { "trace" }.to_string();
        config.logging.stderr = true;
    }

    let _log_guard =
        claudestream_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!(input = ?args.input, "claudestream starting");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    let result = runtime.block_on(run(&args, &config));

    // A reader still blocked on stdin must not hold up exit.
    runtime.shutdown_background();
    result
}

async fn run(args: &Args, config: &Config) -> Result<()> {
    let project = match &args.project {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("failed to resolve current directory")?,
    };

    let (input_tx, input_rx) = mpsc::channel(INPUT_BUFFER);
    let (update_tx, mut update_rx) = mpsc::channel(config.stream.channel_capacity);

    let worker = StreamSession::new(project, config.stream.clone()).spawn(input_rx, update_tx);

    // The handler must not keep the input channel open after EOF.
    let interrupt_tx = input_tx.downgrade();
    ctrlc::set_handler(move || {
        eprintln!("\nCancelling...");
        if let Some(tx) = interrupt_tx.upgrade() {
            let _ = tx.blocking_send(StreamInput::Terminated(TerminationReason::Cancelled));
        }
    })
    .context("failed to set Ctrl+C handler")?;

    let reader = match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            tokio::spawn(feed(file, input_tx, args.finalize_on_eof))
        }
        None => tokio::spawn(feed(tokio::io::stdin(), input_tx, args.finalize_on_eof)),
    };

    while let Some(update) = update_rx.recv().await {
        if args.json {
            println!("{}", serde_json::to_string(&update)?);
        } else if let Some(line) = render::render_update(&update) {
            println!("{}", line);
        }
    }

    let session = worker
        .await
        .context("stream worker panicked")?
        .context("stream worker failed")?;

    // After a cancel the reader may still be waiting on input.
    if reader.is_finished() {
        match reader.await.context("input reader panicked")? {
            Ok(lines) => tracing::info!(lines, "Input exhausted"),
            Err(e) => eprintln!("Input error: {}", e),
        }
    } else {
        reader.abort();
    }

    let Some(summary) = session.into_summary() else {
        eprintln!("No session found in input");
        return Ok(());
    };

    if !args.json {
        println!();
        println!("{}", render::render_summary(&summary));
    }

    if let Some(path) = &args.summary_out {
        write_summary(JsonSummaryWriter::to_file(path), &summary)?;
    }
    if args.save {
        write_summary(JsonSummaryWriter::default_location(), &summary)?;
    }

    Ok(())
}

/// Forward input lines, then optionally report end of input as an exit.
async fn feed<R>(
    reader: R,
    inputs: mpsc::Sender<StreamInput>,
    finalize_on_eof: bool,
) -> claudestream_core::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let lines = forward_lines(reader, inputs.clone()).await?;
    if finalize_on_eof {
        // The worker is gone if it was cancelled meanwhile.
        let _ = inputs
            .send(StreamInput::Terminated(TerminationReason::Exited { code: None }))
            .await;
    }
    Ok(lines)
}

fn write_summary(
    mut writer: JsonSummaryWriter,
    summary: &SessionSummary,
) -> Result<()> {
    let path = writer
        .write_summary(summary)
        .context("failed to write session summary")?;
    eprintln!("Summary written to {}", path.display());
    Ok(())
}
