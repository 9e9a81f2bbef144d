// src/monitor.rs
use crate::consumer::Consumer;
use crate::errors::AppError;
use crate::model::ResponseRecord;
use anyhow::bail;
use chrono::{DateTime, Duration, FixedOffset};
use log::{debug, info, trace, warn};
use std::collections::HashMap;
use tokio::sync::mpsc::Sender;

pub const DEFAULT_IDLE_SECS: f64 = 11.0;

/// Largest idle time accepted, one day.
const MAX_IDLE_SECS: f64 = 86_400.0;

/// Check a user-supplied idle time before a tracker is built with it.
pub fn idle_secs(secs: f64) -> Result<f64, AppError> {
    if secs.is_finite() && (0.0..=MAX_IDLE_SECS).contains(&secs) {
        Ok(secs)
    } else {
        Err(AppError::Config(format!("invalid timeout {} (0 to {} seconds)", secs, MAX_IDLE_SECS)))
    }
}

/// System or channel tag reported as `NONE`.
pub const TAG_NONE: i32 = -1;

fn parse_tag(raw: &str) -> i32 {
    match raw.trim() {
        "" | "NONE" => TAG_NONE,
        t => t.parse().unwrap_or(TAG_NONE),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceivingState {
    Idle,
    Receiving,
    Timeout,
}

/// The fields of one GLG poll the monitor cares about.
#[derive(Clone, Debug)]
pub struct GlgReading {
    pub time: DateTime<FixedOffset>,
    pub system: String,
    pub group: String,
    pub channel: String,
    pub frequency_tgid: String,
    pub modulation: String,
    pub ctcss_dcs: String,
    pub p25nac: String,
    pub attenuation: bool,
    pub system_tag: i32,
    pub channel_tag: i32,
    pub squelch_open: bool,
    pub muted: bool,
}

impl GlgReading {
    pub fn from_record(record: &ResponseRecord) -> Option<Self> {
        if record.command != "GLG" {
            return None;
        }
        let f = |name: &str| record.field(name).unwrap_or("").trim().to_string();
        Some(Self {
            time: record.raw.received,
            system: f("NAME1"),
            group: f("NAME2"),
            channel: f("NAME3"),
            frequency_tgid: f("FRQ_TGID"),
            modulation: f("MOD"),
            ctcss_dcs: f("CTCSS_DCS"),
            p25nac: f("P25NAC"),
            attenuation: f("ATT") == "1",
            system_tag: parse_tag(&f("SYS_TAG")),
            channel_tag: parse_tag(&f("CHAN_TAG")),
            squelch_open: f("SQL") == "1",
            muted: f("MUT") == "1",
        })
    }

    pub fn sys_id(&self) -> String {
        [self.system.as_str(), self.group.as_str(), self.channel.as_str()].join("-")
    }
}

/// Activity on one system/group/channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Reception {
    pub start: DateTime<FixedOffset>,
    pub last_active: DateTime<FixedOffset>,
    pub duration_secs: i64,
    pub system: String,
    pub group: String,
    pub channel: String,
    pub frequency_tgid: String,
    pub modulation: String,
    pub ctcss_dcs: String,
    pub p25nac: String,
    pub attenuation: bool,
    pub system_tag: i32,
    pub channel_tag: i32,
    pub muted: bool,
    /// Start of the previous reception on this system/group/channel.
    pub last_seen: Option<DateTime<FixedOffset>>,
    last_active_state: bool,
}

impl Reception {
    fn new(r: &GlgReading) -> Self {
        Self {
            start: r.time,
            last_active: r.time,
            duration_secs: 0,
            system: r.system.clone(),
            group: r.group.clone(),
            channel: r.channel.clone(),
            frequency_tgid: r.frequency_tgid.clone(),
            modulation: r.modulation.clone(),
            ctcss_dcs: r.ctcss_dcs.clone(),
            p25nac: r.p25nac.clone(),
            attenuation: r.attenuation,
            system_tag: r.system_tag,
            channel_tag: r.channel_tag,
            muted: r.muted,
            last_seen: None,
            last_active_state: true,
        }
    }

    pub fn sys_id(&self) -> String {
        [self.system.as_str(), self.group.as_str(), self.channel.as_str()].join("-")
    }

    /// Time since `last_seen` as `H:MM:SS`, or `*Forever` for a first hearing.
    pub fn last_seen_label(&self) -> String {
        match self.last_seen {
            Some(prev) => {
                let secs = (self.start - prev).num_seconds().max(0);
                format!("{}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
            }
            None => "*Forever".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ReceptionEvent {
    Started(Reception),
    Closed(Reception),
}

/// Receiving-state machine fed with successive GLG polls.
///
/// Time accumulates while squelch is open. After squelch closes the
/// reception waits up to `idle` for the same channel to come back (the gap
/// is then counted); another channel opening, or the wait running out,
/// closes it.
#[derive(Debug)]
pub struct ReceptionTracker {
    state: ReceivingState,
    idle: Duration,
    current: Option<Reception>,
    last_seen: HashMap<String, DateTime<FixedOffset>>,
}

impl ReceptionTracker {
    pub fn new(idle_secs: f64) -> Self {
        Self {
            state: ReceivingState::Idle,
            idle: Duration::milliseconds((idle_secs * 1000.0) as i64),
            current: None,
            last_seen: HashMap::new(),
        }
    }

    pub fn state(&self) -> ReceivingState {
        self.state
    }

    pub fn current(&self) -> Option<&Reception> {
        self.current.as_ref()
    }

    pub fn observe(&mut self, r: &GlgReading) -> Vec<ReceptionEvent> {
        let mut events = Vec::new();
        trace!("monitor: {:?} sql={} {}", self.state, r.squelch_open, r.sys_id());

        match self.state {
            ReceivingState::Idle => {
                if r.squelch_open {
                    self.open(r, &mut events);
                }
            }
            ReceivingState::Receiving => self.accumulate(r, &mut events),
            ReceivingState::Timeout => {
                let exceeded = match &self.current {
                    Some(rec) => r.time - rec.last_active > self.idle,
                    None => true,
                };
                if r.squelch_open || !exceeded {
                    self.accumulate(r, &mut events);
                } else {
                    debug!("monitor: timeout {}", self.current.as_ref().map(|c| c.sys_id()).unwrap_or_default());
                    self.close(r, &mut events);
                }
            }
        }
        events
    }

    /// Close whatever is in progress, at end of stream.
    pub fn flush(&mut self) -> Option<ReceptionEvent> {
        self.state = ReceivingState::Idle;
        self.current.take().map(ReceptionEvent::Closed)
    }

    fn open(&mut self, r: &GlgReading, events: &mut Vec<ReceptionEvent>) {
        let mut rec = Reception::new(r);
        rec.last_seen = self.last_seen.insert(rec.sys_id(), rec.start);
        debug!("monitor: new reception {}", rec.sys_id());
        events.push(ReceptionEvent::Started(rec.clone()));
        self.current = Some(rec);
        self.state = ReceivingState::Receiving;
    }

    fn close(&mut self, r: &GlgReading, events: &mut Vec<ReceptionEvent>) {
        if let Some(done) = self.current.take() {
            events.push(ReceptionEvent::Closed(done));
        }
        if r.squelch_open {
            self.open(r, events);
        } else {
            self.state = ReceivingState::Idle;
        }
    }

    fn accumulate(&mut self, r: &GlgReading, events: &mut Vec<ReceptionEvent>) {
        let Some(rec) = self.current.as_mut() else {
            warn!("monitor: {:?} without a reception", self.state);
            self.state = ReceivingState::Idle;
            if r.squelch_open {
                self.open(r, events);
            }
            return;
        };

        let same = r.squelch_open && r.sys_id() == rec.sys_id();
        if rec.last_active_state || same {
            rec.duration_secs = (r.time - rec.start).num_seconds();
        }
        rec.last_active_state = r.squelch_open;

        if r.squelch_open {
            self.state = ReceivingState::Receiving;
            if same {
                rec.last_active = r.time;
            } else {
                self.close(r, events);
            }
        } else {
            self.state = ReceivingState::Timeout;
        }
    }
}

/// Live channel-activity consumer. Logs receptions as they open and close
/// and forwards closed ones when a sink is attached.
pub struct ChannelMonitor {
    tracker: ReceptionTracker,
    closed_tx: Option<Sender<Reception>>,
    completed: usize,
}

impl ChannelMonitor {
    pub fn new(idle_secs: f64, closed_tx: Option<Sender<Reception>>) -> Self {
        Self {
            tracker: ReceptionTracker::new(idle_secs),
            closed_tx,
            completed: 0,
        }
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    fn report(&mut self, event: ReceptionEvent) -> anyhow::Result<()> {
        match event {
            ReceptionEvent::Started(rec) => {
                info!(
                    "{}: Sys={} Grp={} Chan={} Freq={} Mod={} C/D={} NAC={} last={}",
                    rec.start.format("%H:%M:%S"),
                    rec.system,
                    rec.group,
                    rec.channel,
                    rec.frequency_tgid,
                    rec.modulation,
                    rec.ctcss_dcs,
                    rec.p25nac,
                    rec.last_seen_label()
                );
                Ok(())
            }
            ReceptionEvent::Closed(rec) => {
                self.completed += 1;
                info!("{}: {} ended after {}s", rec.start.format("%H:%M:%S"), rec.sys_id(), rec.duration_secs);
                if let Some(tx) = &self.closed_tx {
                    if tx.try_send(rec).is_err() {
                        bail!("reception sink unavailable");
                    }
                }
                Ok(())
            }
        }
    }
}

impl Consumer for ChannelMonitor {
    fn name(&self) -> &str {
        "channel-monitor"
    }

    fn handle(&mut self, record: &ResponseRecord) -> anyhow::Result<()> {
        let Some(reading) = GlgReading::from_record(record) else {
            return Ok(());
        };
        for event in self.tracker.observe(&reading) {
            self.report(event)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        if let Some(event) = self.tracker.flush() {
            self.report(event)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64, sys: &str, open: bool) -> GlgReading {
        let base = FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        GlgReading {
            time: base + Duration::seconds(secs),
            system: sys.to_string(),
            group: "Fire".into(),
            channel: "Dispatch".into(),
            frequency_tgid: "0154.1000".into(),
            modulation: "FM".into(),
            ctcss_dcs: "0".into(),
            p25nac: "NONE".into(),
            attenuation: false,
            system_tag: TAG_NONE,
            channel_tag: TAG_NONE,
            squelch_open: open,
            muted: false,
        }
    }

    #[test]
    fn squelch_opens_and_idle_timeout_closes() {
        let mut t = ReceptionTracker::new(11.0);
        assert!(t.observe(&at(0, "A", false)).is_empty());

        let ev = t.observe(&at(1, "A", true));
        assert!(matches!(ev.as_slice(), [ReceptionEvent::Started(r)] if r.system == "A"));
        assert_eq!(t.state(), ReceivingState::Receiving);

        assert!(t.observe(&at(5, "A", true)).is_empty());
        assert!(t.observe(&at(6, "", false)).is_empty());
        assert_eq!(t.state(), ReceivingState::Timeout);
        assert_eq!(t.current().unwrap().duration_secs, 5);

        assert!(t.observe(&at(10, "", false)).is_empty());
        let ev = t.observe(&at(20, "", false));
        match ev.as_slice() {
            [ReceptionEvent::Closed(r)] => assert_eq!(r.duration_secs, 5),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(t.state(), ReceivingState::Idle);
    }

    #[test]
    fn same_channel_returning_within_idle_extends_reception() {
        let mut t = ReceptionTracker::new(11.0);
        t.observe(&at(0, "A", true));
        t.observe(&at(2, "", false));
        assert!(t.observe(&at(8, "A", true)).is_empty());
        assert_eq!(t.state(), ReceivingState::Receiving);
        assert_eq!(t.current().unwrap().duration_secs, 8);
    }

    #[test]
    fn other_channel_closes_current_and_starts_new() {
        let mut t = ReceptionTracker::new(11.0);
        t.observe(&at(0, "A", true));
        let ev = t.observe(&at(3, "B", true));
        match ev.as_slice() {
            [ReceptionEvent::Closed(a), ReceptionEvent::Started(b)] => {
                assert_eq!(a.system, "A");
                assert_eq!(a.duration_secs, 3);
                assert_eq!(b.system, "B");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(t.current().unwrap().system, "B");
    }

    #[test]
    fn idle_time_must_be_finite_and_in_range() {
        assert_eq!(idle_secs(11.0).unwrap(), 11.0);
        assert_eq!(idle_secs(0.0).unwrap(), 0.0);
        assert!(matches!(idle_secs(-1e30), Err(AppError::Config(_))));
        assert!(matches!(idle_secs(-1.0), Err(AppError::Config(_))));
        assert!(matches!(idle_secs(f64::NAN), Err(AppError::Config(_))));
        assert!(matches!(idle_secs(f64::INFINITY), Err(AppError::Config(_))));
        assert!(matches!(idle_secs(1e30), Err(AppError::Config(_))));
    }

    #[test]
    fn reopened_channel_remembers_previous_start() {
        let mut t = ReceptionTracker::new(11.0);
        let ev = t.observe(&at(0, "A", true));
        assert!(matches!(ev.as_slice(), [ReceptionEvent::Started(r)] if r.last_seen.is_none()));

        let ev = t.observe(&at(5, "B", true));
        match ev.as_slice() {
            [ReceptionEvent::Closed(_), ReceptionEvent::Started(b)] => {
                assert!(b.last_seen.is_none());
                assert_eq!(b.last_seen_label(), "*Forever");
            }
            other => panic!("unexpected {:?}", other),
        }

        let ev = t.observe(&at(3725, "A", true));
        match ev.as_slice() {
            [ReceptionEvent::Closed(_), ReceptionEvent::Started(a)] => {
                assert_eq!(a.last_seen, Some(at(0, "A", true).time));
                assert_eq!(a.last_seen_label(), "1:02:05");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn glg_reading_parses_flags_and_tags() {
        use crate::decoder::Separator;
        use crate::dispatch::Dispatcher;
        use crate::registry::FieldRegistry;
        use std::sync::Arc;

        let d = Dispatcher::new(Arc::new(FieldRegistry::builtin().unwrap()), Separator::Comma);
        let tagged = d.dispatch("GLG,0463.0000,FM,1,0,Public Safety,EMS,Med 1,1,1,12,3,NONE");
        let r = GlgReading::from_record(&tagged).unwrap();
        assert!(r.attenuation);
        assert!(r.muted);
        assert_eq!((r.system_tag, r.channel_tag), (12, 3));

        let untagged = d.dispatch("GLG,0463.0000,FM,0,0,Public Safety,EMS,Med 1,1,0,NONE,,NONE");
        let r = GlgReading::from_record(&untagged).unwrap();
        assert!(!r.attenuation);
        assert!(!r.muted);
        assert_eq!((r.system_tag, r.channel_tag), (TAG_NONE, TAG_NONE));
    }

    #[test]
    fn flush_closes_open_reception() {
        let mut t = ReceptionTracker::new(11.0);
        t.observe(&at(0, "A", true));
        assert!(matches!(t.flush(), Some(ReceptionEvent::Closed(_))));
        assert!(t.flush().is_none());
    }

    #[tokio::test]
    async fn channel_monitor_forwards_closed_receptions() {
        use crate::decoder::Separator;
        use crate::dispatch::Dispatcher;
        use crate::registry::FieldRegistry;
        use std::sync::Arc;
        use tokio::sync::mpsc;

        let d = Dispatcher::new(Arc::new(FieldRegistry::builtin().unwrap()), Separator::Comma);
        let (tx, mut rx) = mpsc::channel(4);
        let mut mon = ChannelMonitor::new(11.0, Some(tx));

        mon.handle(&d.dispatch("GLG,0463.0000,FM,0,0,Public Safety,EMS,Med 1,1,0,NONE,NONE,NONE")).unwrap();
        mon.handle(&d.dispatch("MDL,BCD996XT")).unwrap();
        mon.handle(&d.dispatch("GLG,0154.1000,NFM,0,0,County,Fire,Disp,1,0,NONE,NONE,NONE")).unwrap();
        assert_eq!(mon.completed(), 1);
        mon.finish().unwrap();
        assert_eq!(mon.completed(), 2);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.sys_id(), "Public Safety-EMS-Med 1");
        assert_eq!(first.frequency_tgid, "0463.0000");
        let second = rx.recv().await.unwrap();
        assert_eq!(second.modulation, "NFM");
    }
}
