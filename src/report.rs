use crate::messages::ProbeOutcome;
use crate::session::SessionStats;

use crossterm::QueueableCommand;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use std::io::{self, Write};
use std::time::Duration;

pub fn banner<W: Write>(out: &mut W, hostname: &str, payload_len: usize) -> io::Result<()> {
    out.queue(Print(format!("PING {}: {} data bytes\n", hostname, payload_len)))?;
    out.flush()
}

/// Writes the single line that describes one probe.
pub fn probe_line<W: Write>(out: &mut W, outcome: &ProbeOutcome) -> io::Result<()> {
    let line = format_outcome(outcome);
    match outcome_color(outcome) {
        Some(color) => {
            out.queue(SetForegroundColor(color))?
                .queue(Print(line))?
                .queue(ResetColor)?
                .queue(Print("\n"))?;
        }
        None => {
            out.queue(Print(line))?.queue(Print("\n"))?;
        }
    }
    out.flush()
}

pub fn format_outcome(outcome: &ProbeOutcome) -> String {
    match outcome {
        ProbeOutcome::Success(s) => format!(
            "{} bytes from {} ({}): icmp_seq={} time={:.3} ms loss={}%",
            s.bytes,
            s.peer,
            s.target.input,
            s.sequence,
            millis(s.round_trip_time),
            s.loss_percent
        ),
        ProbeOutcome::Timeout { target } => format!("Request timeout for {}", target),
        ProbeOutcome::ResolutionFailure { host, error } => format!("ping: cannot resolve {}: {}", host, error),
        ProbeOutcome::TransportFailure { target, error } => format!("ping: transport failure for {}: {}", target, error),
        ProbeOutcome::ProtocolMismatch { target, mismatch } => format!("ping: unexpected reply for {}: {}", target, mismatch),
    }
}

fn outcome_color(outcome: &ProbeOutcome) -> Option<Color> {
    match outcome {
        ProbeOutcome::Success(_) => None,
        ProbeOutcome::Timeout { .. } | ProbeOutcome::ProtocolMismatch { .. } => Some(Color::Yellow),
        ProbeOutcome::ResolutionFailure { .. } | ProbeOutcome::TransportFailure { .. } => Some(Color::Red),
    }
}

/// Writes the statistics header and summary printed at shutdown.
pub fn summary<W: Write>(out: &mut W, hostname: &str, stats: &SessionStats) -> io::Result<()> {
    out.queue(Print(format!("\n--- {} ping statistics ---\n", hostname)))?;
    out.queue(Print(format!(
        "{} packets transmitted, {} packets received, {:.1}% packet loss\n",
        stats.transmitted,
        stats.received,
        stats.loss_percent()
    )))?;
    if let (Some(min), Some(avg), Some(max)) = (stats.rtt_min, stats.rtt_avg(), stats.rtt_max) {
        out.queue(Print(format!(
            "round-trip min/avg/max = {:.3}/{:.3}/{:.3} ms\n",
            millis(min),
            millis(avg),
            millis(max)
        )))?;
    }
    out.flush()
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
