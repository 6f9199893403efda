//! Resh loopback driver
//!
//! Pipes stdin into the server's terminal as host output, runs the session
//! until both ends agree, then prints the screen the client ended up with.

use crate::session::{LoopbackSession, SessionConfig, DEFAULT_MTU};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use resh_state::CompressionAlgorithm;
use resh_terminal::render_row_ansi;
use std::io::{self, Write};
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Resh loopback - run host output through a simulated session"
)]
struct Args {
    /// Terminal width (defaults to the current terminal)
    #[arg(long)]
    width: Option<u16>,

    /// Terminal height (defaults to the current terminal)
    #[arg(long)]
    height: Option<u16>,

    /// Compression for diff payloads
    #[arg(long, value_enum, default_value = "zstd")]
    compression: CompressionAlgorithm,

    /// Keys typed on the client once the session starts
    #[arg(long)]
    keys: Option<String>,

    /// Lose every Nth datagram in each direction (0 never loses any)
    #[arg(long, default_value = "0")]
    drop_every: usize,

    /// Largest datagram on the simulated link
    #[arg(long, default_value_t = DEFAULT_MTU)]
    mtu: usize,

    /// Milliseconds between session steps
    #[arg(long, default_value = "10")]
    tick_ms: u64,

    /// Log level
    #[arg(long, value_enum, default_value = "warn")]
    log_level: LogLevel,
}

pub async fn run() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(args.log_level.directive())),
        )
        .with_writer(io::stderr)
        .init();

    let (default_width, default_height) = crossterm::terminal::size().unwrap_or((80, 24));
    let config = SessionConfig {
        width: args.width.unwrap_or(default_width),
        height: args.height.unwrap_or(default_height),
        compression: args.compression,
        drop_every: args.drop_every,
        mtu: args.mtu,
    };
    let mut session = LoopbackSession::new(config).context("Invalid session settings")?;

    if let Some(keys) = &args.keys {
        session.type_keys(keys);
    }

    let (output_tx, mut output_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let reader = tokio::spawn(async move {
        let mut stdin = tokio::io::stdin();
        let mut buf = vec![0u8; 4096];
        loop {
            let n = stdin.read(&mut buf).await?;
            if n == 0 || output_tx.send(buf[..n].to_vec()).is_err() {
                break;
            }
        }
        Ok::<_, io::Error>(())
    });

    let start = Instant::now();
    let mut ticker = time::interval(Duration::from_millis(args.tick_ms.max(1)));
    let mut stdin_open = true;

    loop {
        tokio::select! {
            chunk = output_rx.recv(), if stdin_open => {
                match chunk {
                    Some(bytes) => {
                        let replies = session.host_output(&bytes);
                        if !replies.is_empty() {
                            debug!("Discarding {} bytes of terminal replies", replies.len());
                        }
                    }
                    None => {
                        debug!("Host output closed");
                        stdin_open = false;
                    }
                }
            }

            _ = ticker.tick() => {
                let now = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
                let to_host = session.step(now)?;
                // The host echoes what it is sent, like a shell with echo on
                if !to_host.is_empty() {
                    session.host_output(&to_host);
                }

                if !stdin_open && session.is_synchronized() {
                    break;
                }
            }
        }
    }

    reader.await.context("stdin reader panicked")??;

    let up = session.upstream_stats();
    let down = session.downstream_stats();
    info!(
        "Synchronized; client sent {} datagrams ({} lost), server sent {} ({} lost), echo ack {}, {} unconfirmed predictions",
        up.sent,
        up.dropped,
        down.sent,
        down.dropped,
        session.client_echo_ack(),
        session.pending_predictions()
    );

    let screen = session.client_screen().framebuffer();
    let mut stdout = io::stdout().lock();
    for row in 0..screen.height() {
        writeln!(stdout, "{}", render_row_ansi(screen, row))?;
    }
    stdout.flush()?;

    Ok(())
}
