//! Entry point for `drtp`.
//!
//! Parses CLI arguments and dispatches into either **server** (receive) or
//! **client** (send) mode.  All protocol work is delegated to the library;
//! `main.rs` owns only process setup (logging, signal handling, argument
//! validation, the output file).

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::fs::File;

use drtp::config::{DEFAULT_OUTPUT, DEFAULT_PORT, DEFAULT_WINDOW};
use drtp::{
    DiscardOnce, ReceiverConfig, ReceiverEngine, ResendPolicy, SenderConfig, SenderEngine,
    TimerConfig,
};

/// Reliable file transfer over UDP (DRTP).
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Receive one file and write it to the output path.
    Server {
        /// IPv4 address to bind.
        #[arg(short, long, default_value_t = Ipv4Addr::LOCALHOST)]
        ip: Ipv4Addr,
        /// Port to bind (1024-65535).
        #[arg(short, long, default_value_t = DEFAULT_PORT,
              value_parser = clap::value_parser!(u16).range(1024..))]
        port: u16,
        /// Drop the first delivery of this sequence number (loss testing).
        #[arg(short, long)]
        discard: Option<u16>,
        /// Where to write the received file.
        #[arg(short, long, default_value = DEFAULT_OUTPUT)]
        output: PathBuf,
        /// Keep accepting new transfers after one completes.
        #[arg(long)]
        persistent: bool,
    },
    /// Send a file to a running server.
    Client {
        /// IPv4 address of the server.
        #[arg(short, long, default_value_t = Ipv4Addr::LOCALHOST)]
        ip: Ipv4Addr,
        /// Server port (1024-65535).
        #[arg(short, long, default_value_t = DEFAULT_PORT,
              value_parser = clap::value_parser!(u16).range(1024..))]
        port: u16,
        /// File to send.
        #[arg(short, long)]
        file: PathBuf,
        /// Sliding window size in packets.
        #[arg(short, long, default_value_t = DEFAULT_WINDOW as u16,
              value_parser = clap::value_parser!(u16).range(1..))]
        window: u16,
        /// Restart each packet's timer when the window is resent.
        #[arg(long)]
        reset_timers: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG overrides the default `info` level.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    match cli.mode {
        Mode::Server {
            ip,
            port,
            discard,
            output,
            persistent,
        } => {
            let config = ReceiverConfig {
                bind: SocketAddr::V4(SocketAddrV4::new(ip, port)),
                output,
                persistent,
            };
            run_server(config, discard).await
        }
        Mode::Client {
            ip,
            port,
            file,
            window,
            reset_timers,
        } => {
            let resend_policy = if reset_timers {
                ResendPolicy::ResetTimestamps
            } else {
                ResendPolicy::KeepTimestamps
            };
            let config = SenderConfig {
                window_size: usize::from(window),
                timer: TimerConfig {
                    resend_policy,
                    ..TimerConfig::default()
                },
                ..SenderConfig::new(SocketAddr::V4(SocketAddrV4::new(ip, port)))
            };
            run_client(config, file).await
        }
    }
}

async fn run_server(config: ReceiverConfig, discard: Option<u16>) -> Result<()> {
    let mut receiver = ReceiverEngine::with_faults(config.bind, DiscardOnce::new(discard))
        .await
        .with_context(|| format!("binding {}", config.bind))?;

    let outcome = tokio::select! {
        result = serve(&mut receiver, &config) => result,
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => Err(anyhow!("interrupted")),
            Err(e) => Err(anyhow::Error::new(e).context("waiting for interrupt")),
        },
    };

    // The socket is released on every exit path, interrupt included.
    receiver.close();
    outcome
}

async fn serve(receiver: &mut ReceiverEngine<DiscardOnce>, config: &ReceiverConfig) -> Result<()> {
    loop {
        receiver.accept().await?;

        let mut output = File::create(&config.output)
            .await
            .with_context(|| format!("creating {}", config.output.display()))?;
        let report = receiver.receive(&mut output).await?;

        println!("\nThe throughput is {:.2} Mbps", report.throughput_mbps);
        log::debug!("{report:?}");

        if !config.persistent {
            return Ok(());
        }
    }
}

async fn run_client(config: SenderConfig, file: PathBuf) -> Result<()> {
    if !file.is_file() {
        bail!("file {} does not exist", file.display());
    }
    let source = File::open(&file)
        .await
        .with_context(|| format!("opening {}", file.display()))?;

    let report = SenderEngine::transfer(config, source).await?;

    println!(
        "Sent {} packets ({} bytes) with {} retransmissions, at most {} sends per packet",
        report.packets, report.bytes_read, report.retransmissions, report.max_transmissions
    );
    Ok(())
}
