//! Channel-backed progress sink

use longform_tts_core::ProgressSink;
use tokio::sync::mpsc;

/// Progress notification forwarded over a channel
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Progress { fraction: f64, message: String },
    Warning { message: String },
}

/// Forwards progress and warnings as [`JobEvent`]s
///
/// Events sent after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelProgressSink {
    tx: mpsc::UnboundedSender<JobEvent>,
}

impl ChannelProgressSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgressSink {
    fn on_progress(&self, fraction: f64, message: &str) {
        let _ = self.tx.send(JobEvent::Progress {
            fraction,
            message: message.to_string(),
        });
    }

    fn on_warning(&self, message: &str) {
        let _ = self.tx.send(JobEvent::Warning {
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_forwarded_in_order() {
        let (sink, mut rx) = ChannelProgressSink::new();
        sink.on_progress(0.5, "half");
        sink.on_warning("skipped");
        drop(sink);

        assert_eq!(
            rx.recv().await,
            Some(JobEvent::Progress {
                fraction: 0.5,
                message: "half".into()
            })
        );
        assert_eq!(
            rx.recv().await,
            Some(JobEvent::Warning {
                message: "skipped".into()
            })
        );
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_closed_receiver_ignored() {
        let (sink, rx) = ChannelProgressSink::new();
        drop(rx);
        sink.on_progress(1.0, "done");
    }
}
