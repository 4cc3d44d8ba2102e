//! Sending user messages and folding streamed replies into the session.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::core::chat_stream::{ChatStreamService, StreamEvent, StreamMessage, StreamParams};
use crate::core::message::{new_id, Message};
use crate::core::model_client::ModelClient;
use crate::core::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The text was empty after trimming.
    EmptyInput,
    /// A reply is already streaming into this thread.
    Busy,
    UnknownThread,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Started { stream_id: u64 },
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    Fragment { thread_id: String, text: String },
    Completed { thread_id: String },
    Failed { thread_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Completed,
    /// The reply failed; an apology message was appended.
    Failed,
    Ignored(IgnoreReason),
}

struct InFlight {
    stream_id: u64,
    model_message_id: String,
    base_messages: Vec<Message>,
    buffer: String,
    cancel_token: CancellationToken,
}

/// Owns the session and routes every user intent that can interact with a
/// running generation.
///
/// At most one generation runs per thread. Selecting another thread,
/// creating one, or deleting the thread cancels its generation; anything the
/// cancelled task already produced stays in the thread.
pub struct ConversationController {
    session: Session,
    client: Arc<dyn ModelClient>,
    streams: ChatStreamService,
    events: mpsc::UnboundedReceiver<StreamEvent>,
    in_flight: HashMap<String, InFlight>,
    current_stream_id: u64,
}

impl ConversationController {
    pub fn new(session: Session, client: Arc<dyn ModelClient>) -> Self {
        let (streams, events) = ChatStreamService::new();
        Self {
            session,
            client,
            streams,
            events,
            in_flight: HashMap::new(),
            current_stream_id: 0,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_loading(&self, thread_id: &str) -> bool {
        self.in_flight.contains_key(thread_id)
    }

    pub fn create_thread(&mut self) -> String {
        self.cancel_active_stream();
        self.session.create_thread()
    }

    pub fn select_thread(&mut self, thread_id: &str) -> bool {
        if !self.session.contains(thread_id) {
            return false;
        }
        if self.session.active_thread_id() != Some(thread_id) {
            self.cancel_active_stream();
        }
        self.session.set_active(thread_id)
    }

    pub fn delete_thread(&mut self, thread_id: &str) -> bool {
        self.cancel_stream(thread_id);
        self.session.delete_thread(thread_id)
    }

    /// Stop the generation running for `thread_id`, if any.
    pub fn cancel_stream(&mut self, thread_id: &str) -> bool {
        match self.in_flight.remove(thread_id) {
            Some(flight) => {
                flight.cancel_token.cancel();
                info!(thread_id, stream_id = flight.stream_id, "cancelled generation");
                true
            }
            None => false,
        }
    }

    fn cancel_active_stream(&mut self) {
        if let Some(active) = self.session.active_thread_id().map(str::to_string) {
            self.cancel_stream(&active);
        }
    }

    /// Append the user's message, save it, and start generating a reply.
    pub fn submit(&mut self, thread_id: &str, text: &str) -> SubmitOutcome {
        if text.trim().is_empty() {
            return SubmitOutcome::Ignored(IgnoreReason::EmptyInput);
        }
        if self.is_loading(thread_id) {
            return SubmitOutcome::Ignored(IgnoreReason::Busy);
        }
        let Some(thread) = self.session.thread(thread_id) else {
            return SubmitOutcome::Ignored(IgnoreReason::UnknownThread);
        };

        let mut messages = thread.messages.clone();
        messages.push(Message::user(text));
        self.session.update_messages(thread_id, messages.clone());

        self.current_stream_id += 1;
        let stream_id = self.current_stream_id;
        let cancel_token = CancellationToken::new();

        self.in_flight.insert(
            thread_id.to_string(),
            InFlight {
                stream_id,
                model_message_id: new_id(),
                base_messages: messages.clone(),
                buffer: String::new(),
                cancel_token: cancel_token.clone(),
            },
        );

        debug!(thread_id, stream_id, turns = messages.len(), "starting generation");
        self.streams.spawn_stream(StreamParams {
            client: Arc::clone(&self.client),
            thread_id: thread_id.to_string(),
            history: messages,
            cancel_token,
            stream_id,
        });

        SubmitOutcome::Started { stream_id }
    }

    /// Wait for the next event from any running generation.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Fold one stream event into the session. Events for cancelled or
    /// superseded streams are dropped.
    pub fn apply(&mut self, event: StreamEvent) -> Option<StreamUpdate> {
        let StreamEvent {
            thread_id,
            stream_id,
            message,
        } = event;

        let is_current = self
            .in_flight
            .get(&thread_id)
            .is_some_and(|flight| flight.stream_id == stream_id);
        if !is_current {
            debug!(thread_id, stream_id, "dropping event from stale stream");
            return None;
        }

        match message {
            StreamMessage::Chunk(fragment) => {
                if fragment.is_empty() {
                    return None;
                }
                let flight = self.in_flight.get_mut(&thread_id)?;
                flight.buffer.push_str(&fragment);

                let mut messages = flight.base_messages.clone();
                messages.push(Message::model(
                    flight.model_message_id.clone(),
                    flight.buffer.clone(),
                ));
                self.session.update_messages(&thread_id, messages);

                Some(StreamUpdate::Fragment {
                    thread_id,
                    text: fragment,
                })
            }
            StreamMessage::Error(err) => {
                let flight = self.in_flight.remove(&thread_id)?;
                error!(thread_id, stream_id, error = %err, "generation failed");

                let mut messages = flight.base_messages;
                if !flight.buffer.is_empty() {
                    messages.push(Message::model(flight.model_message_id, flight.buffer));
                }
                messages.push(Message::apology());
                self.session.update_messages(&thread_id, messages);

                Some(StreamUpdate::Failed { thread_id })
            }
            StreamMessage::End => {
                let flight = self.in_flight.remove(&thread_id)?;
                debug!(
                    thread_id,
                    stream_id,
                    chars = flight.buffer.chars().count(),
                    "generation completed"
                );
                Some(StreamUpdate::Completed { thread_id })
            }
        }
    }

    /// Submit `text` and fold the reply until it completes or fails.
    pub async fn send(&mut self, thread_id: &str, text: &str) -> SendOutcome {
        if let SubmitOutcome::Ignored(reason) = self.submit(thread_id, text) {
            return SendOutcome::Ignored(reason);
        }

        while self.is_loading(thread_id) {
            let Some(event) = self.next_event().await else {
                break;
            };
            match self.apply(event) {
                Some(StreamUpdate::Completed { thread_id: done }) if done == thread_id => {
                    return SendOutcome::Completed;
                }
                Some(StreamUpdate::Failed { thread_id: failed }) if failed == thread_id => {
                    return SendOutcome::Failed;
                }
                _ => {}
            }
        }
        SendOutcome::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::{Role, APOLOGY_TEXT};
    use crate::core::session::THREADS_KEY;
    use crate::core::thread::Thread;
    use crate::utils::test_utils::{create_test_controller, ScriptedClient};

    fn thread<'a>(controller: &'a ConversationController, id: &str) -> &'a Thread {
        controller.session().thread(id).expect("thread exists")
    }

    fn model_message(controller: &ConversationController, id: &str) -> Message {
        thread(controller, id)
            .messages
            .last()
            .filter(|m| m.role == Role::Model)
            .cloned()
            .expect("model message")
    }

    #[tokio::test]
    async fn fragments_replace_one_model_message_in_order() {
        let client = ScriptedClient::fragments(["Hel", "lo ", "world"]);
        let (mut controller, _store) = create_test_controller(client);
        let id = controller.create_thread();

        assert!(matches!(
            controller.submit(&id, "Say hello"),
            SubmitOutcome::Started { .. }
        ));
        assert!(controller.is_loading(&id));

        let mut seen = Vec::new();
        let mut model_ids = Vec::new();
        loop {
            let event = controller.next_event().await.expect("event");
            match controller.apply(event) {
                Some(StreamUpdate::Fragment { .. }) => {
                    let message = model_message(&controller, &id);
                    seen.push(message.content.clone());
                    model_ids.push(message.id);
                    assert_eq!(thread(&controller, &id).messages.len(), 2);
                }
                Some(StreamUpdate::Completed { .. }) => break,
                other => panic!("unexpected update {other:?}"),
            }
        }

        assert_eq!(seen, ["Hel", "Hello ", "Hello world"]);
        assert!(model_ids.windows(2).all(|pair| pair[0] == pair[1]));
        assert!(!controller.is_loading(&id));
    }

    #[tokio::test]
    async fn send_persists_every_intermediate_state() {
        let client = ScriptedClient::fragments(["Hel", "lo ", "world"]);
        let (mut controller, store) = create_test_controller(client);
        let id = controller.create_thread();
        let writes_before = store.write_count();

        let outcome = controller.send(&id, "Say hello").await;
        assert_eq!(outcome, SendOutcome::Completed);

        let writes = store.writes();
        let saved: Vec<Vec<Thread>> = writes[writes_before..]
            .iter()
            .map(|(key, value)| {
                assert_eq!(key, THREADS_KEY);
                serde_json::from_str(value).expect("saved threads")
            })
            .collect();
        assert_eq!(saved.len(), 4);
        assert_eq!(saved[0][0].messages.len(), 1);
        assert_eq!(saved[0][0].messages[0].content, "Say hello");
        let replies: Vec<_> = saved[1..]
            .iter()
            .map(|threads| threads[0].messages[1].content.clone())
            .collect();
        assert_eq!(replies, ["Hel", "Hello ", "Hello world"]);
    }

    #[tokio::test]
    async fn send_derives_title_from_first_message() {
        let client = ScriptedClient::fragments(["Sure."]);
        let (mut controller, _store) = create_test_controller(client);
        let id = controller.create_thread();

        controller
            .send(&id, "Plan a trip to Norway with 12 stops along the fjords")
            .await;
        controller.send(&id, "Make it shorter").await;

        let thread = thread(&controller, &id);
        assert_eq!(thread.title, "Plan a trip to Norway with 12...");
        assert_eq!(thread.messages.len(), 4);
    }

    #[tokio::test]
    async fn failure_after_partial_reply_keeps_partial_and_apologizes() {
        let client = ScriptedClient::failing_after(["Par"]);
        let (mut controller, store) = create_test_controller(client);
        let id = controller.create_thread();

        let outcome = controller.send(&id, "Tell me something").await;
        assert_eq!(outcome, SendOutcome::Failed);
        assert!(!controller.is_loading(&id));

        let messages = &thread(&controller, &id).messages;
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "Tell me something");
        assert_eq!(messages[1].role, Role::Model);
        assert_eq!(messages[1].content, "Par");
        assert_eq!(messages[2].role, Role::Model);
        assert_eq!(messages[2].content, APOLOGY_TEXT);
        assert_ne!(messages[1].id, messages[2].id);

        let reloaded: Vec<Thread> =
            serde_json::from_str(&store.value(THREADS_KEY).expect("saved")).expect("parse");
        assert_eq!(reloaded[0].messages, *messages);
    }

    #[tokio::test]
    async fn failure_before_any_fragment_appends_only_apology() {
        let client = ScriptedClient::failing_after(Vec::<String>::new());
        let (mut controller, _store) = create_test_controller(client);
        let id = controller.create_thread();

        assert_eq!(controller.send(&id, "Hi").await, SendOutcome::Failed);

        let messages = &thread(&controller, &id).messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "Hi");
        assert_eq!(messages[1].content, APOLOGY_TEXT);
    }

    #[tokio::test]
    async fn whitespace_input_is_ignored() {
        let client = ScriptedClient::fragments(["unused"]);
        let calls = client.clone();
        let (mut controller, store) = create_test_controller(client);
        let id = controller.create_thread();
        let writes = store.write_count();

        let outcome = controller.send(&id, "  \n\t ").await;

        assert_eq!(outcome, SendOutcome::Ignored(IgnoreReason::EmptyInput));
        assert!(!controller.is_loading(&id));
        assert!(thread(&controller, &id).messages.is_empty());
        assert_eq!(store.write_count(), writes);
        assert!(calls.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_thread_is_ignored() {
        let (mut controller, _store) = create_test_controller(ScriptedClient::default());
        assert_eq!(
            controller.submit("missing", "hello"),
            SubmitOutcome::Ignored(IgnoreReason::UnknownThread)
        );
    }

    #[tokio::test]
    async fn second_submit_while_loading_is_rejected() {
        let client = ScriptedClient::pending();
        let calls = client.clone();
        let (mut controller, _store) = create_test_controller(client);
        let id = controller.create_thread();

        assert!(matches!(
            controller.submit(&id, "first"),
            SubmitOutcome::Started { .. }
        ));
        assert_eq!(
            controller.submit(&id, "second"),
            SubmitOutcome::Ignored(IgnoreReason::Busy)
        );
        assert_eq!(thread(&controller, &id).messages.len(), 1);

        tokio::task::yield_now().await;
        assert!(calls.calls().len() <= 1);
    }

    #[tokio::test]
    async fn user_message_is_saved_before_any_reply() {
        let client = ScriptedClient::pending();
        let (mut controller, store) = create_test_controller(client);
        let id = controller.create_thread();

        controller.submit(&id, "remember me");

        let saved: Vec<Thread> =
            serde_json::from_str(&store.value(THREADS_KEY).expect("saved")).expect("parse");
        assert_eq!(saved[0].messages.len(), 1);
        assert_eq!(saved[0].messages[0].content, "remember me");
    }

    #[tokio::test]
    async fn history_sent_to_model_includes_prior_turns() {
        let client = ScriptedClient::fragments(["ok"]);
        let calls = client.clone();
        let (mut controller, _store) = create_test_controller(client);
        let id = controller.create_thread();

        controller.send(&id, "one").await;
        controller.send(&id, "two").await;

        let calls = calls.calls();
        assert_eq!(calls.len(), 2);
        let second: Vec<_> = calls[1].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(second, ["one", "ok", "two"]);
        assert_eq!(calls[1].last().expect("prompt").role, Role::User);
    }

    #[tokio::test]
    async fn switching_threads_cancels_and_ignores_late_fragments() {
        let client = ScriptedClient::hanging_after(["Hel"]);
        let (mut controller, _store) = create_test_controller(client);
        let first = controller.create_thread();

        let SubmitOutcome::Started { stream_id } = controller.submit(&first, "hello") else {
            panic!("expected stream");
        };
        let event = controller.next_event().await.expect("fragment");
        assert!(matches!(
            controller.apply(event),
            Some(StreamUpdate::Fragment { .. })
        ));

        let second = controller.create_thread();
        assert!(!controller.is_loading(&first));
        assert_eq!(
            controller.session().active_thread_id(),
            Some(second.as_str())
        );

        controller.streams.send_for_test(StreamEvent {
            thread_id: first.clone(),
            stream_id,
            message: StreamMessage::Chunk("lo".to_string()),
        });
        let late = controller.next_event().await.expect("late event");
        assert_eq!(controller.apply(late), None);

        assert_eq!(model_message(&controller, &first).content, "Hel");
        assert_eq!(thread(&controller, &first).messages.len(), 2);
    }

    #[tokio::test]
    async fn selecting_same_thread_keeps_stream_running() {
        let client = ScriptedClient::pending();
        let (mut controller, _store) = create_test_controller(client);
        let id = controller.create_thread();
        controller.submit(&id, "hello");

        assert!(controller.select_thread(&id));
        assert!(controller.is_loading(&id));
        assert!(!controller.select_thread("missing"));
        assert!(controller.is_loading(&id));
    }

    #[tokio::test]
    async fn deleting_streaming_thread_cancels_it() {
        let client = ScriptedClient::pending();
        let (mut controller, _store) = create_test_controller(client);
        let keep = controller.create_thread();
        let doomed = controller.create_thread();

        let SubmitOutcome::Started { stream_id } = controller.submit(&doomed, "hello") else {
            panic!("expected stream");
        };
        assert!(controller.delete_thread(&doomed));
        assert!(!controller.is_loading(&doomed));
        assert_eq!(controller.session().active_thread_id(), Some(keep.as_str()));

        controller.streams.send_for_test(StreamEvent {
            thread_id: doomed.clone(),
            stream_id,
            message: StreamMessage::End,
        });
        let late = controller.next_event().await.expect("late event");
        assert_eq!(controller.apply(late), None);
        assert!(controller.session().thread(&doomed).is_none());
    }

    #[tokio::test]
    async fn events_from_superseded_stream_are_dropped() {
        let client = ScriptedClient::pending();
        let (mut controller, _store) = create_test_controller(client);
        let id = controller.create_thread();

        let SubmitOutcome::Started { stream_id: old } = controller.submit(&id, "first") else {
            panic!("expected stream");
        };
        assert!(controller.cancel_stream(&id));
        let SubmitOutcome::Started { stream_id: new } = controller.submit(&id, "second") else {
            panic!("expected stream");
        };
        assert_ne!(old, new);

        controller.streams.send_for_test(StreamEvent {
            thread_id: id.clone(),
            stream_id: old,
            message: StreamMessage::Chunk("stale".to_string()),
        });
        let stale = controller.next_event().await.expect("stale event");
        assert_eq!(controller.apply(stale), None);
        assert!(controller.is_loading(&id));
        assert!(thread(&controller, &id)
            .messages
            .iter()
            .all(|m| m.content != "stale"));
    }
}
