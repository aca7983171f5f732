//! Feeds the relay from the external bus consumer's framed output.
//!
//! The consumer owns the bus protocol and hands over plain NDJSON frames;
//! this loop decodes them, converts the bus's millisecond timestamps and
//! pushes into the relay. A frame that does not decode is counted and
//! skipped, it never stops the feed.

use crate::MessageRelay;
use chrono::{TimeZone, Utc};
use psc_core::frame::{FrameReport, LineDecoder, MAX_FRAME_BYTES};
use serde::{Deserialize, Serialize};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{info, warn};

/// One broadcast message as framed by the bus consumer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BroadcastFrame {
    /// bus timestamp, milliseconds since the epoch
    pub emitted_at_ms: i64,
    pub text: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub ingested: usize,
    pub rejected: usize,
}

/// Runs until the feed reaches end of input, pushing every decodable frame
/// into the relay.
pub async fn ingest<R>(mut feed: R, relay: &MessageRelay) -> io::Result<IngestSummary>
where
    R: AsyncRead + Unpin,
{
    let mut decoder = LineDecoder::<BroadcastFrame>::new(MAX_FRAME_BYTES);
    let mut summary = IngestSummary::default();
    let mut chunk = vec![0u8; 4096];

    loop {
        let read = feed.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        apply(decoder.push_chunk(&chunk[..read]), relay, &mut summary);
    }
    apply(decoder.finish(), relay, &mut summary);

    info!(
        event = "ingest_feed_closed",
        ingested = summary.ingested,
        rejected = summary.rejected
    );
    Ok(summary)
}

fn apply(report: FrameReport<BroadcastFrame>, relay: &MessageRelay, summary: &mut IngestSummary) {
    for error in &report.errors {
        warn!(event = "ingest_bad_frame", error = %error);
        summary.rejected += 1;
    }
    for frame in report.frames {
        match Utc.timestamp_millis_opt(frame.emitted_at_ms).single() {
            Some(received_at) => {
                relay.push_at(received_at, frame.text);
                summary.ingested += 1;
            }
            None => {
                warn!(
                    event = "ingest_bad_timestamp",
                    emitted_at_ms = frame.emitted_at_ms
                );
                summary.rejected += 1;
            }
        }
    }
}
