use crate::messages::{ControlMessage, ProbeOutcome};
use crate::pinger::Probe;
use crate::report;

use log::{debug, info};
use std::io::{self, Write};
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Duration;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Counters accumulated over a session. Owned by the session loop only.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionStats {
    pub transmitted: u64,
    pub received: u64,
    pub rtt_min: Option<Duration>,
    pub rtt_max: Option<Duration>,
    pub rtt_total: Duration,
}

impl SessionStats {

    /// Counts one cycle attempt; only successes count as received.
    pub fn record(&mut self, outcome: &ProbeOutcome) {
        self.transmitted += 1;
        if let ProbeOutcome::Success(success) = outcome {
            self.received += 1;
            let rtt = success.round_trip_time;
            self.rtt_min = Some(self.rtt_min.map_or(rtt, |min| min.min(rtt)));
            self.rtt_max = Some(self.rtt_max.map_or(rtt, |max| max.max(rtt)));
            self.rtt_total += rtt;
        }
    }

    /// `(transmitted - received) / transmitted * 100`, or 0 before the first probe.
    pub fn loss_percent(&self) -> f64 {
        if self.transmitted == 0 {
            return 0.0;
        }
        (self.transmitted - self.received) as f64 / self.transmitted as f64 * 100.0
    }

    pub fn rtt_avg(&self) -> Option<Duration> {
        if self.received == 0 {
            return None;
        }
        u32::try_from(self.received).ok().map(|n| self.rtt_total / n)
    }

}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Draining,
    Terminated,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub hostname: String,
    pub interval: Duration,
    /// Stop after this many probes; `None` runs until cancelled.
    pub count: Option<u64>,
}

impl SessionConfig {
    pub fn new(hostname: String) -> SessionConfig {
        SessionConfig { hostname, interval: DEFAULT_INTERVAL, count: None }
    }
}

/// Repeats probe cycles on a fixed interval until cancelled.
pub struct Session<P: Probe> {
    prober: P,
    config: SessionConfig,
    stats: SessionStats,
    state: SessionState,
}

impl<P: Probe> Session<P> {

    pub fn new(prober: P, config: SessionConfig) -> Session<P> {
        Session { prober, config, stats: SessionStats::default(), state: SessionState::Idle }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs until a [`ControlMessage::Cancel`] arrives on `cancel` or the
    /// configured count is reached, then writes the summary and returns the
    /// final statistics.
    ///
    /// A cycle already in progress is allowed to finish, so shutdown can take
    /// up to one reply timeout.
    pub fn run<W: Write>(&mut self, cancel: &Receiver<ControlMessage>, out: &mut W) -> io::Result<SessionStats> {
        self.state = SessionState::Running;
        info!("probing {} every {:?}", self.config.hostname, self.config.interval);

        while self.state == SessionState::Running {
            if cancel_requested(cancel) || self.count_reached() {
                self.state = SessionState::Draining;
                break;
            }

            let outcome = self.prober.probe(&self.config.hostname);
            self.stats.record(&outcome);
            report::probe_line(out, &outcome)?;

            if self.count_reached() || wait_for_cancel(cancel, self.config.interval) {
                self.state = SessionState::Draining;
            }
        }

        debug!("draining after {} probes", self.stats.transmitted);
        report::summary(out, &self.config.hostname, &self.stats)?;
        self.state = SessionState::Terminated;
        info!("session for {} terminated", self.config.hostname);
        Ok(self.stats)
    }

    fn count_reached(&self) -> bool {
        self.config.count.is_some_and(|count| self.stats.transmitted >= count)
    }

}

fn cancel_requested(cancel: &Receiver<ControlMessage>) -> bool {
    match cancel.try_recv() {
        Ok(ControlMessage::Cancel) => true,
        Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => false,
    }
}

/// Sleeps for `interval`, returning early with `true` if cancellation arrives.
fn wait_for_cancel(cancel: &Receiver<ControlMessage>, interval: Duration) -> bool {
    match cancel.recv_timeout(interval) {
        Ok(ControlMessage::Cancel) => true,
        Err(RecvTimeoutError::Timeout) => false,
        Err(RecvTimeoutError::Disconnected) => {
            // nobody can cancel any more, keep the pace anyway
            thread::sleep(interval);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns_resolver::Target;
    use crate::messages::EchoSuccess;
    use crate::pinger::MockProbe;
    use std::net::Ipv4Addr;
    use std::sync::mpsc;

    fn target() -> Target {
        Target { input: "127.0.0.1".to_string(), address: Ipv4Addr::LOCALHOST }
    }

    fn success(ms: u64) -> ProbeOutcome {
        ProbeOutcome::Success(EchoSuccess {
            target: target(),
            peer: Ipv4Addr::LOCALHOST,
            sequence: 1,
            bytes: 8,
            round_trip_time: Duration::from_millis(ms),
            loss_percent: 0.0,
        })
    }

    fn config(count: Option<u64>) -> SessionConfig {
        SessionConfig { hostname: "127.0.0.1".to_string(), interval: Duration::from_millis(1), count }
    }

    #[test]
    fn stats_track_successes_only() {
        let mut stats = SessionStats::default();
        stats.record(&success(2));
        stats.record(&ProbeOutcome::Timeout { target: target() });
        stats.record(&success(4));
        assert_eq!(stats.transmitted, 3);
        assert_eq!(stats.received, 2);
        assert_eq!(stats.rtt_min, Some(Duration::from_millis(2)));
        assert_eq!(stats.rtt_max, Some(Duration::from_millis(4)));
        assert_eq!(stats.rtt_avg(), Some(Duration::from_millis(3)));
    }

    #[test]
    fn loss_percent_formula() {
        assert_eq!(SessionStats::default().loss_percent(), 0.0);
        for (transmitted, received) in [(1u64, 1u64), (4, 3), (10, 0), (3, 1)] {
            let stats = SessionStats { transmitted, received, ..Default::default() };
            let expected = (transmitted - received) as f64 / transmitted as f64 * 100.0;
            assert_eq!(stats.loss_percent(), expected);
        }
    }

    #[test]
    fn cancellation_after_n_cycles() {
        let (tx, rx) = mpsc::channel();
        let mut prober = MockProbe::new();
        let mut calls = 0;
        prober.expect_probe().times(3).returning(move |_| {
            calls += 1;
            if calls == 3 {
                tx.send(ControlMessage::Cancel).unwrap();
            }
            success(1)
        });

        let mut session = Session::new(prober, config(None));
        let mut out = Vec::new();
        let stats = session.run(&rx, &mut out).unwrap();

        assert_eq!(stats.transmitted, 3);
        assert_eq!(stats.received, 3);
        assert_eq!(session.state(), SessionState::Terminated);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("3 packets transmitted, 3 packets received, 0.0% packet loss"));
    }

    #[test]
    fn failed_probes_do_not_stop_the_loop() {
        let (_tx, rx) = mpsc::channel();
        let mut prober = MockProbe::new();
        let mut calls = 0;
        prober.expect_probe().times(4).returning(move |_| {
            calls += 1;
            if calls % 2 == 0 { success(1) } else { ProbeOutcome::Timeout { target: target() } }
        });

        let mut session = Session::new(prober, config(Some(4)));
        let mut out = Vec::new();
        let stats = session.run(&rx, &mut out).unwrap();

        assert_eq!(stats.transmitted, 4);
        assert_eq!(stats.received, 2);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("Request timeout").count(), 2);
        assert!(text.contains("50.0% packet loss"));
    }

    #[test]
    fn cancelled_before_first_cycle() {
        let (tx, rx) = mpsc::channel();
        tx.send(ControlMessage::Cancel).unwrap();
        let mut prober = MockProbe::new();
        prober.expect_probe().never();

        let mut session = Session::new(prober, config(None));
        let mut out = Vec::new();
        let stats = session.run(&rx, &mut out).unwrap();

        assert_eq!(stats.transmitted, 0);
        assert!(String::from_utf8(out).unwrap().contains("0 packets transmitted, 0 packets received, 0.0% packet loss"));
    }

    #[test]
    fn repeated_cancel_is_harmless() {
        let (tx, rx) = mpsc::channel();
        let mut prober = MockProbe::new();
        prober.expect_probe().times(1).returning(move |_| {
            tx.send(ControlMessage::Cancel).unwrap();
            tx.send(ControlMessage::Cancel).unwrap();
            success(1)
        });

        let mut session = Session::new(prober, config(None));
        let stats = session.run(&rx, &mut Vec::<u8>::new()).unwrap();
        assert_eq!(stats.transmitted, 1);
    }
}
