// SPDX-License-Identifier: Apache-2.0

use clap::{Parser, ValueEnum};
use fileconsumer::emit::ChannelEmitter;
use fileconsumer::init::args::FileConsumerArgs;
use fileconsumer::{FileConsumerConfig, Manager, Token};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::select;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tower::BoxError;
use tracing::metadata::LevelFilter;
use tracing::{debug, error, info, warn};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

const SENDING_QUEUE_SIZE: usize = 1_000;

#[derive(Debug, Parser)]
#[command(name = "fileconsumer")]
#[command(bin_name = "fileconsumer")]
#[command(version, about, long_about = None)]
struct Arguments {
    #[arg(value_enum, long, env = "FILECONSUMER_LOG_FORMAT", default_value = "text")]
    /// Log format
    log_format: LogFormatArg,

    /// JSON file holding the consumer configuration, used instead of the
    /// command line options
    #[arg(long, env = "FILECONSUMER_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    consumer: FileConsumerArgs,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

fn main() -> ExitCode {
    let opt = Arguments::parse();

    let _guard = match setup_logging(&opt.log_format) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ERROR: failed to setup logging: {}", e);
            return ExitCode::from(1);
        }
    };

    let config = match load_config(&opt) {
        Ok(config) => config,
        Err(e) => {
            error!(error = e, "Invalid configuration.");
            return ExitCode::from(2);
        }
    };

    match run_consumer(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = e, "Failed to run file consumer.");
            ExitCode::from(1)
        }
    }
}

fn load_config(opt: &Arguments) -> Result<FileConsumerConfig, BoxError> {
    let config = match &opt.config {
        Some(path) => read_config_file(path)?,
        None => opt.consumer.build_config()?,
    };
    config.validate()?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<FileConsumerConfig, BoxError> {
    let file = File::open(path).map_err(|e| format!("failed to open {:?}: {}", path, e))?;
    let config = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| format!("failed to parse {:?}: {}", path, e))?;
    Ok(config)
}

#[tokio::main]
async fn run_consumer(config: FileConsumerConfig) -> Result<(), BoxError> {
    let (tx, rx) = flume::bounded::<Token>(SENDING_QUEUE_SIZE);
    let manager = Manager::new(&config, Arc::new(ChannelEmitter::new(tx)))?;

    let cancel_token = CancellationToken::new();
    let consumer = manager.spawn(cancel_token.clone())?;

    // Finishes once the manager is gone and the channel is drained
    let mut writer = tokio::spawn(async move {
        let mut out = BufWriter::new(tokio::io::stdout());
        while let Ok(token) = rx.recv_async().await {
            out.write_all(&record_line(&token)?).await?;
            if rx.is_empty() {
                out.flush().await?;
            }
        }
        out.flush().await?;
        Ok::<(), BoxError>(())
    });

    let mut writer_done = false;
    select! {
        res = signal_wait() => {
            res?;
            info!("Shutdown signal received.");
        },
        res = &mut writer => {
            writer_done = true;
            match res {
                Ok(Ok(())) => warn!("Unexpected early exit of record writer."),
                Ok(Err(e)) => error!(error = e, "Record writer failed."),
                Err(e) => error!(error = ?e, "Record writer panicked."),
            }
        },
    }
    cancel_token.cancel();

    match tokio::task::spawn_blocking(move || consumer.join()).await {
        Ok(Ok(())) => debug!("File consumer thread joined"),
        Ok(Err(_)) => return Err("file consumer thread panicked".into()),
        Err(e) => return Err(e.into()),
    }

    if !writer_done {
        writer.await??;
    }

    Ok(())
}

/// One JSON object per record, newline terminated.
fn record_line(token: &Token) -> Result<Vec<u8>, BoxError> {
    let record = serde_json::json!({
        "body": String::from_utf8_lossy(&token.body),
        "attributes": token.attributes,
        "offset": token.offset.offset,
        "len": token.offset.len,
    });
    let mut line = serde_json::to_vec(&record)?;
    line.push(b'\n');
    Ok(line)
}

type LoggerGuard = tracing_appender::non_blocking::WorkerGuard;

// Logs go to stderr, stdout carries the records
fn setup_logging(log_format: &LogFormatArg) -> Result<LoggerGuard, BoxError> {
    LogTracer::init()?;

    let (non_blocking_writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?
        .add_directive("opentelemetry=warn".parse()?);

    if *log_format == LogFormatArg::Json {
        let app_name = format!("{}-{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        let bunyan_formatting_layer = BunyanFormattingLayer::new(app_name, non_blocking_writer);

        let subscriber = Registry::default()
            .with(filter)
            .with(JsonStorageLayer)
            .with(bunyan_formatting_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        use std::io::{self, IsTerminal};

        // Skip color codes when not in a terminal
        let use_ansi = io::stderr().is_terminal();

        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_target(false)
            .with_level(true)
            .with_ansi(use_ansi)
            .compact();

        let subscriber = Registry::default().with(filter).with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(guard)
}

async fn signal_wait() -> std::io::Result<()> {
    let mut sig_term = signal(SignalKind::terminate())?;
    let mut sig_int = signal(SignalKind::interrupt())?;

    select! {
        _ = sig_term.recv() => {},
        _ = sig_int.recv() => {},
    }
    Ok(())
}
