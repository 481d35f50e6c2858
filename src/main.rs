mod dns_resolver;
mod error;
mod messages;
mod packet;
mod parser;
mod pinger;
mod report;
mod session;
mod transport;

use crate::messages::ControlMessage;
use crate::pinger::Pinger;
use crate::session::{Session, SessionConfig};
use crate::transport::IcmpTransport;

use anyhow::Context;
use clap::Parser;
use log::{info, LevelFilter};
use std::io;
use std::sync::mpsc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(version, about = "Send ICMP echo requests to a host until interrupted", long_about = None)]
struct Args {
    /// Host name or IPv4 address to ping
    target: String,

    /// Seconds to wait between probes
    #[arg(short, long, value_parser = parse_seconds, default_value = "1")]
    interval: Duration,

    /// Seconds to wait for each reply
    #[arg(short = 'W', long, value_parser = parse_seconds, default_value = "10")]
    timeout: Duration,

    /// Stop after sending this many probes
    #[arg(short, long)]
    count: Option<u64>,

    /// Log level (off, error, warn, info, debug, trace); RUST_LOG overrides it
    #[arg(long, default_value = "warn")]
    log_level: LevelFilter,
}

const MIN_DURATION: Duration = Duration::from_millis(1);

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|_| format!("`{}` is not a number of seconds", s))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("`{}` must be a positive number of seconds", s));
    }
    let duration = Duration::try_from_secs_f64(secs).map_err(|e| e.to_string())?;
    if duration < MIN_DURATION {
        return Err(format!("`{}` is below the 1ms minimum", s));
    }
    Ok(duration)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .parse_default_env()
        .format_timestamp_millis()
        .init();

    // without a raw socket no probe can ever succeed, so this is fatal
    let transport = IcmpTransport::open().context("unable to start pinging")?;
    let pinger = Pinger::new(transport, args.timeout);
    info!("using ICMP identifier {}", pinger.identifier());

    let (cancel_tx, cancel_rx) = mpsc::channel::<ControlMessage>();
    ctrlc::set_handler(move || {
        // the loop may already be gone, nothing to do then
        let _ = cancel_tx.send(ControlMessage::Cancel);
    })
    .context("unable to install the interrupt handler")?;

    let config = SessionConfig {
        interval: args.interval,
        count: args.count,
        ..SessionConfig::new(args.target)
    };

    let mut stdout = io::stdout();
    report::banner(&mut stdout, &config.hostname, 0)?;
    let mut session = Session::new(pinger, config);
    let stats = session.run(&cancel_rx, &mut stdout)?;
    info!("{} probes sent, {} replies", stats.transmitted, stats.received);
    Ok(())
}
