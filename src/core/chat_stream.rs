use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::message::Message;
use crate::core::model_client::{ModelClient, StreamError};

#[derive(Debug)]
pub enum StreamMessage {
    Chunk(String),
    Error(StreamError),
    End,
}

/// One step of a running generation, tagged with the thread it belongs to
/// and the stream that produced it.
#[derive(Debug)]
pub struct StreamEvent {
    pub thread_id: String,
    pub stream_id: u64,
    pub message: StreamMessage,
}

pub struct StreamParams {
    pub client: Arc<dyn ModelClient>,
    pub thread_id: String,
    pub history: Vec<Message>,
    pub cancel_token: CancellationToken,
    pub stream_id: u64,
}

/// Spawns generation tasks and funnels their output into one channel.
///
/// A task ends after forwarding `End` or a single `Error`. A cancelled task
/// forwards nothing further.
#[derive(Clone)]
pub struct ChatStreamService {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl ChatStreamService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn spawn_stream(&self, params: StreamParams) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let StreamParams {
                client,
                thread_id,
                history,
                cancel_token,
                stream_id,
            } = params;

            let send = |message: StreamMessage| {
                let _ = tx.send(StreamEvent {
                    thread_id: thread_id.clone(),
                    stream_id,
                    message,
                });
            };

            tokio::select! {
                _ = async {
                    let mut fragments = client.stream_chat(&history);
                    while let Some(item) = fragments.next().await {
                        if cancel_token.is_cancelled() {
                            return;
                        }
                        match item {
                            Ok(fragment) => {
                                if !fragment.is_empty() {
                                    send(StreamMessage::Chunk(fragment));
                                }
                            }
                            Err(err) => {
                                send(StreamMessage::Error(err));
                                return;
                            }
                        }
                    }
                    send(StreamMessage::End);
                } => {}
                _ = cancel_token.cancelled() => {
                    debug!(stream_id, "generation task cancelled");
                }
            }
        });
    }

    #[cfg(test)]
    pub fn send_for_test(&self, event: StreamEvent) {
        let _ = self.tx.send(event);
    }
}
