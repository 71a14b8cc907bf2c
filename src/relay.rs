//! Stream relay: fans gateway events out to one SSE subscriber
//!
//! One channel per execution. Token order is preserved exactly as received;
//! the terminal event (complete/error) closes the channel. Subscriber
//! disconnects propagate back to the gateway by dropping its receiver, and
//! a stall watchdog force-fails runs that stop making forward progress.

use axum::response::sse::{Event, KeepAlive, Sse};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::client::{self, ChatParams, StreamEvent, UsageCounts};
use crate::config::Config;
use crate::cost;
use crate::error::{Error, GatewayError, Result};
use crate::models::TokenUsage;
use crate::registry::Registry;

pub type WireStream = ReceiverStream<std::result::Result<Event, Infallible>>;

/// Subscribe to an execution's event stream, starting the upstream request.
/// The pending -> streaming claim is taken exclusively before the gateway
/// is invoked, so of two racing subscribers exactly one drives the run and
/// the other gets a validation error.
pub async fn subscribe(
    registry: Arc<Registry>,
    config: &Config,
    execution_id: &str,
) -> Result<Sse<WireStream>> {
    let api_key = config.require_api_key()?.to_string();
    let execution = registry.begin_streaming(execution_id).await?;
    let events = client::stream_chat(ChatParams {
        api_key,
        model: config.model.clone(),
        system_prompt: execution.system_prompt.clone(),
        user_message: execution.query.clone(),
        temperature: execution.temperature,
        max_tokens: config.max_output_tokens,
    });

    let (tx, rx) = mpsc::channel(256);
    let id = execution_id.to_string();
    let model = config.model.clone();
    let stall = config.stall_timeout;
    tokio::spawn(async move {
        pump(registry, id, model, stall, events, tx).await;
    });

    Ok(Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::default()))
}

/// Driver loop: applies gateway events to the registry in arrival order and
/// relays them to the subscriber. Split from subscribe so tests can feed
/// synthetic gateway events without a network.
pub(crate) async fn pump(
    registry: Arc<Registry>,
    execution_id: String,
    model: String,
    stall_timeout: Duration,
    mut events: mpsc::Receiver<StreamEvent>,
    tx: mpsc::Sender<std::result::Result<Event, Infallible>>,
) {
    loop {
        let event = match tokio::time::timeout(stall_timeout, events.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => {
                // gateway channel closed without a terminal event
                StreamEvent::Failed(GatewayError::Interrupted(
                    "stream ended without completion".into(),
                ))
            }
            Err(_) => StreamEvent::Failed(GatewayError::Interrupted(format!(
                "no forward progress for {}s",
                stall_timeout.as_secs()
            ))),
        };

        match event {
            StreamEvent::Token(text) => {
                match registry.append_token(&execution_id, &text).await {
                    Ok(()) => {}
                    Err(e @ Error::StaleExecution { .. }) => {
                        // benign race, drop the event
                        tracing::warn!(execution = %execution_id, error = %e, "dropping stale token");
                        continue;
                    }
                    Err(e) => {
                        tracing::error!(execution = %execution_id, error = %e, "token append failed");
                        let _ = tx.send(Ok(error_event(&e.to_string()))).await;
                        return;
                    }
                }
                let payload = json!({ "content": text }).to_string();
                if tx
                    .send(Ok(Event::default().event("token").data(payload)))
                    .await
                    .is_err()
                {
                    // Subscriber disconnected. Dropping `events` aborts the
                    // upstream request; the partial run is failed, so no
                    // artifact is ever created for it.
                    tracing::info!(execution = %execution_id, "subscriber disconnected, cancelling upstream");
                    let _ = registry.fail(&execution_id, "subscriber disconnected").await;
                    return;
                }
            }

            StreamEvent::Done(counts) => {
                let usage = finalize_usage(&registry, &execution_id, &model, counts).await;
                match registry.complete(&execution_id, usage.clone()).await {
                    Ok(artifact) => {
                        let payload = json!({
                            "artifact_id": artifact.artifact_id,
                            "token_usage": usage,
                        })
                        .to_string();
                        let _ = tx
                            .send(Ok(Event::default().event("complete").data(payload)))
                            .await;
                    }
                    Err(e @ Error::StaleExecution { .. }) => {
                        tracing::warn!(execution = %execution_id, error = %e, "dropping duplicate terminal event");
                    }
                    Err(e) => {
                        tracing::error!(execution = %execution_id, error = %e, "artifact persistence failed");
                        let _ = tx.send(Ok(error_event(&e.to_string()))).await;
                    }
                }
                return;
            }

            StreamEvent::Failed(gw) => {
                let message = gw.to_string();
                match registry.fail(&execution_id, &message).await {
                    Ok(()) => {}
                    Err(e @ Error::StaleExecution { .. }) => {
                        tracing::warn!(execution = %execution_id, error = %e, "dropping duplicate terminal event");
                        return;
                    }
                    Err(e) => {
                        tracing::error!(execution = %execution_id, error = %e, "failure transition failed");
                    }
                }
                let _ = tx.send(Ok(error_event(&message))).await;
                return;
            }
        }
    }
}

fn error_event(message: &str) -> Event {
    Event::default()
        .event("error")
        .data(json!({ "error": message }).to_string())
}

/// Provider-reported counts when present, char-based estimate otherwise,
/// plus the cost from the model's price table row.
async fn finalize_usage(
    registry: &Registry,
    execution_id: &str,
    model: &str,
    counts: UsageCounts,
) -> TokenUsage {
    let (prompt_tokens, completion_tokens) =
        if counts.prompt_tokens == 0 && counts.completion_tokens == 0 {
            match registry.get(execution_id).await {
                Ok(e) => (
                    cost::estimate_tokens(&e.system_prompt) + cost::estimate_tokens(&e.query),
                    cost::estimate_tokens(&e.output),
                ),
                Err(_) => (0, 0),
            }
        } else {
            (counts.prompt_tokens, counts.completion_tokens)
        };

    let (price_in, price_out) = cost::price_for(model);
    TokenUsage {
        prompt_tokens,
        completion_tokens,
        total_tokens: prompt_tokens + completion_tokens,
        estimated_cost: cost::estimate_cost(prompt_tokens, completion_tokens, price_in, price_out),
    }
}
