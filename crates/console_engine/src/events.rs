use console_logging::console_debug;
use tokio::sync::mpsc::UnboundedSender;

use crate::EngineEvent;

pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Forwards events to a receiver owned by the front end.
pub struct ChannelEventSink {
    tx: UnboundedSender<EngineEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: UnboundedSender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: EngineEvent) {
        if let Err(err) = self.tx.send(event) {
            console_debug!("Event receiver gone, dropping {:?}", err.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use console_core::NoticeLevel;
    use tokio::sync::mpsc::unbounded_channel;

    fn notice(message: &str) -> EngineEvent {
        EngineEvent::Notice {
            level: NoticeLevel::Info,
            message: message.to_string(),
        }
    }

    #[test]
    fn events_arrive_in_order() {
        let (tx, mut rx) = unbounded_channel();
        let sink = ChannelEventSink::new(tx);
        sink.emit(notice("one"));
        sink.emit(notice("two"));
        assert_eq!(rx.try_recv().ok(), Some(notice("one")));
        assert_eq!(rx.try_recv().ok(), Some(notice("two")));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_receiver_is_tolerated() {
        let (tx, rx) = unbounded_channel();
        drop(rx);
        ChannelEventSink::new(tx).emit(notice("late"));
    }
}
