//! Newline-delimited JSON envelope source standing in for the firehose.

use anyhow::Result;
use firehose_core::Envelope;
use firehose_metrics::MetricStore;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

pub type EnvelopeReader = Box<dyn AsyncBufRead + Unpin + Send>;

pub async fn open(path: Option<&Path>) -> Result<EnvelopeReader> {
    match path {
        Some(path) => {
            info!("Reading envelopes from {}", path.display());
            let file = tokio::fs::File::open(path).await?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => {
            info!("Reading envelopes from stdin");
            Ok(Box::new(BufReader::new(tokio::io::stdin())))
        }
    }
}

/// Malformed lines are logged and skipped.
pub fn parse_line(line: &str) -> Option<Envelope> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str(line) {
        Ok(envelope) => Some(envelope),
        Err(e) => {
            warn!("Skipping malformed envelope: {}", e);
            None
        }
    }
}

/// Feeds every envelope straight into the store.
pub async fn replay(reader: EnvelopeReader, store: &MetricStore) -> Result<usize> {
    let mut lines = reader.lines();
    let mut count = 0;

    while let Some(line) = lines.next_line().await? {
        if let Some(envelope) = parse_line(&line) {
            store.add_metric(&envelope).await;
            count += 1;
        }
    }

    Ok(count)
}

/// Reads envelopes into the ingest channel without waiting for the consumer.
///
/// When the channel is full the envelope is dropped and the store's slow
/// consumer alert is raised. Returns the number of dropped envelopes.
pub async fn pump(
    reader: EnvelopeReader,
    sender: mpsc::Sender<Envelope>,
    store: Arc<MetricStore>,
) -> Result<usize> {
    let mut lines = reader.lines();
    let mut dropped = 0;

    while let Some(line) = lines.next_line().await? {
        let Some(envelope) = parse_line(&line) else {
            continue;
        };

        match sender.try_send(envelope) {
            Ok(()) => {}
            Err(TrySendError::Full(envelope)) => {
                dropped += 1;
                store.alert_slow_consumer_error();
                warn!("Ingestion is falling behind, dropped {}", envelope.description());
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Ingest channel closed, stopping reader");
                break;
            }
        }
    }

    info!("Envelope source exhausted ({} dropped)", dropped);
    Ok(dropped)
}

pub async fn ingest(mut receiver: mpsc::Receiver<Envelope>, store: Arc<MetricStore>) {
    while let Some(envelope) = receiver.recv().await {
        store.add_metric(&envelope).await;
    }
    debug!("Ingest channel drained");
}
