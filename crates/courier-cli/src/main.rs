mod sender;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use courier_core::app::{Gateway, GatewayHandle};
use courier_core::config::GatewayConfig;
use courier_core::ports::{Clock, SystemClock};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::sender::DryRunSender;

#[derive(Debug, Parser)]
#[command(name = "courier", about = "SMS gateway between a coordinator and a carrier")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Overrides `state_dir` from the configuration
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Overrides the reply flush interval (clamped to the configured bounds)
    #[arg(long)]
    reply_interval_secs: Option<u64>,

    /// Read inbound replies from stdin as `origin|body` lines
    #[arg(long)]
    stdin_replies: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // (A) 設定を読む（ここだけはエラーで終了する）
    let mut config = match GatewayConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!(path = %args.config.display(), error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    if let Some(dir) = args.state_dir {
        config.state_dir = dir;
    }

    // (B) ゲートウェイを組み立てて起動
    let gateway = match Gateway::builder(config).sender(Arc::new(DryRunSender)).build() {
        Ok(gateway) => gateway,
        Err(e) => {
            error!(error = %e, "failed to build gateway");
            return ExitCode::FAILURE;
        }
    };
    let handle = gateway.start().await;
    if let Some(secs) = args.reply_interval_secs {
        let interval = handle.set_reply_flush_interval(secs);
        info!(?interval, "reply flush interval overridden");
    }

    // (C) Ctrl-C まで動かす
    if args.stdin_replies {
        read_replies_until_ctrl_c(&handle).await;
    } else {
        wait_for_ctrl_c().await;
    }

    // (D) graceful shutdown
    info!("shutting down");
    handle.shutdown().await;
    ExitCode::SUCCESS
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to wait for ctrl-c; shutting down");
    }
}

/// stdin が閉じた後も Ctrl-C までは動き続ける
async fn read_replies_until_ctrl_c(handle: &GatewayHandle) {
    tokio::select! {
        _ = read_replies(handle) => {
            info!("stdin closed");
            wait_for_ctrl_c().await;
        }
        _ = wait_for_ctrl_c() => {}
    }
}

async fn read_replies(handle: &GatewayHandle) {
    let intake = handle.intake();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "failed to read stdin");
                return;
            }
        };
        let Some((origin, body)) = line.split_once('|') else {
            warn!(line, "expected `origin|body`");
            continue;
        };
        let received_at = SystemClock.now_millis();
        match intake.on_inbound(origin.trim(), body.trim(), received_at).await {
            Some(reply_type) => info!(origin, reply_type = reply_type.as_str(), "reply queued"),
            None => info!(origin, "reply ignored"),
        }
    }
}
