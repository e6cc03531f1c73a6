//! Hub message intake over WebSocket.
//!
//! Connects to the intake endpoint, decodes every text frame as a
//! [`HubMessage`] envelope and hands it to the [`EventPipeline`]. A dropped
//! or refused connection is retried after [`RECONNECT_DELAY`] until the
//! worker shuts down.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use safehome_core::error::CoreError;
use safehome_core::messages::HubMessage;
use safehome_pipeline::{EventPipeline, PipelineError};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

type IntakeStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub async fn run(url: String, pipeline: Arc<EventPipeline>, cancel: CancellationToken) {
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = connect_async(url.as_str()) => match result {
                Ok((mut ws_stream, _response)) => {
                    tracing::info!(url = %url, attempt, "Connected to hub intake");
                    attempt = 0;
                    process_messages(&mut ws_stream, &pipeline, &cancel).await;
                }
                Err(e) => {
                    tracing::warn!(url = %url, attempt, error = %e, "Hub intake connection failed");
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
    }

    tracing::info!("Hub intake stopping");
}

/// Read frames until the connection closes or the worker shuts down.
async fn process_messages(
    ws_stream: &mut IntakeStream,
    pipeline: &EventPipeline,
    cancel: &CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                if let Err(e) = ws_stream.close(None).await {
                    tracing::debug!(error = %e, "Hub intake close failed");
                }
                return;
            }
            next = ws_stream.next() => next,
        };

        match next {
            Some(Ok(Message::Text(text))) => handle_frame(&text, pipeline).await,
            Some(Ok(Message::Binary(_))) => {
                tracing::trace!("Ignoring binary frame from hub intake");
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(?frame, "Hub intake closed");
                return;
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, "Hub intake receive error");
                return;
            }
            None => return,
        }
    }
}

async fn handle_frame(text: &str, pipeline: &EventPipeline) {
    let message = match decode(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(error = %e, "Dropping undecodable hub message");
            return;
        }
    };

    match pipeline.dispatch(&message).await {
        Ok(Some(alert)) => {
            tracing::debug!(kind = message.kind(), hub_id = message.hub_id(), alert_id = alert.id, "Hub message raised alert");
        }
        Ok(None) => {}
        Err(PipelineError::Core(CoreError::Validation(reason))) => {
            tracing::warn!(kind = message.kind(), hub_id = message.hub_id(), %reason, "Dropping invalid hub message");
        }
        Err(e) => {
            tracing::error!(kind = message.kind(), hub_id = message.hub_id(), error = %e, "Hub message handling failed");
        }
    }
}

fn decode(text: &str) -> Result<HubMessage, serde_json::Error> {
    serde_json::from_str(text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
