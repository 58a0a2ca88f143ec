//! Event-to-sink pump
//!
//! Drains one run's wire-event channel into a frame sink. The
//! `[DONE]` sentinel is written after the channel closes and also
//! after an encode failure, so a consumer can always detect the end
//! of the stream.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use agentstream_core::WireEvent;

use crate::error::Result;
use crate::frame::{format_frame, DONE_FRAME};

/// Destination for encoded SSE frames
#[async_trait]
pub trait FrameSink: Send {
    /// Write one complete frame; an error means the consumer is gone
    async fn write_frame(&mut self, frame: &str) -> Result<()>;
}

/// A sink collecting frames in memory
#[derive(Debug, Default)]
pub struct BufferSink {
    frames: Vec<String>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames written so far, in order
    pub fn frames(&self) -> &[String] {
        &self.frames
    }
}

#[async_trait]
impl FrameSink for BufferSink {
    async fn write_frame(&mut self, frame: &str) -> Result<()> {
        self.frames.push(frame.to_string());
        Ok(())
    }
}

#[async_trait]
impl FrameSink for Vec<u8> {
    async fn write_frame(&mut self, frame: &str) -> Result<()> {
        self.extend_from_slice(frame.as_bytes());
        Ok(())
    }
}

/// Pump a run's wire events into the sink as SSE frames
///
/// Returns the number of event frames written, excluding the
/// sentinel. A sink write failure aborts the pump without the
/// sentinel (the connection is gone); any other failure still
/// terminates the stream properly.
pub async fn pump<S: FrameSink>(
    mut rx: mpsc::Receiver<WireEvent>,
    sink: &mut S,
) -> Result<usize> {
    let mut written = 0usize;

    while let Some(event) = rx.recv().await {
        let frame = match format_frame(&event) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to encode event as SSE frame: {}", e);
                sink.write_frame(DONE_FRAME).await?;
                return Err(e);
            }
        };
        sink.write_frame(&frame).await?;
        written += 1;
    }

    debug!(frames = written, "Run channel closed, terminating stream");
    sink.write_frame(DONE_FRAME).await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[tokio::test]
    async fn test_pump_writes_frames_then_done() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(WireEvent::content("s1", "a1", "hello")).await.unwrap();
        tx.send(WireEvent::complete("s1", "a1", 1, 0.5)).await.unwrap();
        drop(tx);

        let mut sink = BufferSink::new();
        let written = pump(rx, &mut sink).await.unwrap();

        assert_eq!(written, 2);
        let frames = sink.frames();
        assert_eq!(frames.len(), 3);
        assert!(frames[0].contains("\"type\":\"content\""));
        assert!(frames[1].contains("\"type\":\"complete\""));
        assert_eq!(frames[2], DONE_FRAME);
    }

    #[tokio::test]
    async fn test_pump_empty_channel_still_terminates() {
        let (tx, rx) = mpsc::channel::<WireEvent>(1);
        drop(tx);

        let mut sink = BufferSink::new();
        let written = pump(rx, &mut sink).await.unwrap();

        assert_eq!(written, 0);
        assert_eq!(sink.frames(), &[DONE_FRAME.to_string()]);
    }

    #[tokio::test]
    async fn test_pump_error_event_still_gets_done() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(WireEvent::error("s1", "a1", "upstream failed"))
            .await
            .unwrap();
        drop(tx);

        let mut sink = BufferSink::new();
        pump(rx, &mut sink).await.unwrap();

        let frames = sink.frames();
        assert!(frames[0].contains("\"type\":\"error\""));
        assert_eq!(frames.last().unwrap(), DONE_FRAME);
    }

    #[tokio::test]
    async fn test_pump_sink_failure_aborts() {
        struct ClosedSink;

        #[async_trait]
        impl FrameSink for ClosedSink {
            async fn write_frame(&mut self, _frame: &str) -> Result<()> {
                Err(Error::Sink("connection reset".to_string()))
            }
        }

        let (tx, rx) = mpsc::channel(8);
        tx.send(WireEvent::content("s1", "a1", "x")).await.unwrap();
        drop(tx);

        let result = pump(rx, &mut ClosedSink).await;
        assert!(matches!(result, Err(Error::Sink(_))));
    }

    #[tokio::test]
    async fn test_pump_into_byte_sink() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(WireEvent::content("s1", "a1", "bytes")).await.unwrap();
        drop(tx);

        let mut out: Vec<u8> = Vec::new();
        pump(rx, &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\"content\":\"bytes\""));
        assert!(text.ends_with(DONE_FRAME));
    }
}
