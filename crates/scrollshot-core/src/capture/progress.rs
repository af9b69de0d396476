//! Progress reporting for long captures
//!
//! The scheduler and pipeline report through a [`ProgressSink`]. Sinks are
//! synchronous and must not block; forward to a channel with
//! [`ChannelProgress`] when the consumer lives on another task.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::pipeline::PipelineState;

/// A progress notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A frame was captured successfully
    FrameCaptured {
        frames_done:  usize,
        total_frames: usize,
    },
    /// All frames are in; stitching begins
    StitchingStarted { frame_count: usize },
    /// The pipeline moved to a new state
    StateChanged { state: PipelineState },
}

/// Receives progress events
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn on_event(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Sink that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_event(&self, _event: ProgressEvent) {}
}

/// Sink that forwards events into an unbounded tokio channel
///
/// Events sent after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    /// Creates a sink and the receiver it feeds
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn on_event(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn test_closure_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = |event: ProgressEvent| seen.lock().unwrap().push(event);

        sink.on_event(ProgressEvent::StitchingStarted { frame_count: 3 });
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[ProgressEvent::StitchingStarted { frame_count: 3 }]
        );
    }

    #[tokio::test]
    async fn test_channel_sink_forwards_in_order() {
        let (sink, mut rx) = ChannelProgress::channel();

        sink.on_event(ProgressEvent::FrameCaptured {
            frames_done:  1,
            total_frames: 2,
        });
        sink.on_event(ProgressEvent::FrameCaptured {
            frames_done:  2,
            total_frames: 2,
        });

        assert_eq!(
            rx.recv().await,
            Some(ProgressEvent::FrameCaptured {
                frames_done:  1,
                total_frames: 2,
            })
        );
        assert_eq!(
            rx.recv().await,
            Some(ProgressEvent::FrameCaptured {
                frames_done:  2,
                total_frames: 2,
            })
        );
    }

    #[test]
    fn test_channel_sink_after_receiver_dropped() {
        let (sink, rx) = ChannelProgress::channel();
        drop(rx);
        sink.on_event(ProgressEvent::StitchingStarted { frame_count: 1 });
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(ProgressEvent::StateChanged {
            state: PipelineState::Stitching,
        })
        .unwrap();
        assert_eq!(json["event"], "state_changed");
        assert_eq!(json["state"], "stitching");
    }
}
