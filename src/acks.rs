use crate::consumer::Consumer;
use crate::model::{ResponseRecord, ResponseStatus};
use anyhow::bail;
use log::debug;

/// Responses that answer keypad and volume commands. A bare `ERR` carries no
/// command name, so it is routed here as well.
pub const ACK_COMMANDS: &[&str] = &["KEY", "VOL", "SQL", "ERR"];

/// Confirms that outbound keypad/volume commands were accepted.
#[derive(Debug, Default)]
pub struct AckTracker {
    pub confirmed: usize,
    pub rejected: usize,
    /// Last level the scanner reported for VOL.
    pub volume: Option<u8>,
    pub squelch: Option<u8>,
}

impl AckTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Consumer for AckTracker {
    fn name(&self) -> &str {
        "ack-tracker"
    }

    fn handle(&mut self, record: &ResponseRecord) -> anyhow::Result<()> {
        if record.status.is_failure() {
            self.rejected += 1;
            bail!("{} rejected by scanner: {}", record.command, record.status);
        }

        if record.status == ResponseStatus::Resp {
            let level = record.field("LEVEL").and_then(|l| l.trim().parse::<u8>().ok());
            match record.command.as_str() {
                "VOL" => self.volume = level.or(self.volume),
                "SQL" => self.squelch = level.or(self.squelch),
                _ => {}
            }
        }
        self.confirmed += 1;
        debug!("ack: {} {}", record.command, record.status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Separator;
    use crate::dispatch::Dispatcher;
    use crate::registry::FieldRegistry;
    use std::sync::Arc;

    #[test]
    fn tracks_acknowledgements_and_levels() {
        let d = Dispatcher::new(Arc::new(FieldRegistry::builtin().unwrap()), Separator::Comma);
        let mut acks = AckTracker::new();

        acks.handle(&d.dispatch("KEY,OK")).unwrap();
        acks.handle(&d.dispatch("VOL,12")).unwrap();
        acks.handle(&d.dispatch("SQL,3")).unwrap();
        assert!(acks.handle(&d.dispatch("KEY,NG")).is_err());
        assert!(acks.handle(&d.dispatch("ERR")).is_err());
        acks.handle(&d.dispatch("VOL,OK")).unwrap();

        assert_eq!(acks.confirmed, 4);
        assert_eq!(acks.rejected, 2);
        assert_eq!(acks.volume, Some(12));
        assert_eq!(acks.squelch, Some(3));
    }
}
