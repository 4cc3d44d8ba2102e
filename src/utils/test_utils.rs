use std::sync::{Arc, Mutex};

use futures_util::stream;

use crate::core::conversation::ConversationController;
use crate::core::message::Message;
use crate::core::model_client::{FragmentStream, ModelClient, StreamError};
use crate::core::session::Session;
use crate::core::store::MemoryStore;

#[derive(Clone, Debug)]
enum ScriptStep {
    Fragment(String),
    Fail,
}

/// [`ModelClient`] double that replays the same script on every call and
/// remembers the histories it was given.
#[derive(Clone, Default)]
pub struct ScriptedClient {
    steps: Vec<ScriptStep>,
    hang: bool,
    calls: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl ScriptedClient {
    pub fn fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            steps: fragments
                .into_iter()
                .map(|f| ScriptStep::Fragment(f.into()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn failing_after<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut client = Self::fragments(fragments);
        client.steps.push(ScriptStep::Fail);
        client
    }

    /// Yields the given fragments and then never finishes.
    pub fn hanging_after<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut client = Self::fragments(fragments);
        client.hang = true;
        client
    }

    pub fn pending() -> Self {
        Self::hanging_after(Vec::<String>::new())
    }

    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl ModelClient for ScriptedClient {
    fn stream_chat(&self, history: &[Message]) -> FragmentStream {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(history.to_vec());
        }

        let items: Vec<Result<String, StreamError>> = self
            .steps
            .iter()
            .map(|step| match step {
                ScriptStep::Fragment(text) => Ok(text.clone()),
                ScriptStep::Fail => Err(StreamError::Api {
                    status: Some(503),
                    message: "The model is overloaded".to_string(),
                }),
            })
            .collect();

        if self.hang {
            Box::pin(stream::StreamExt::chain(stream::iter(items), stream::pending()))
        } else {
            Box::pin(stream::iter(items))
        }
    }
}

pub fn create_test_controller(client: ScriptedClient) -> (ConversationController, MemoryStore) {
    let store = MemoryStore::new();
    let session = Session::load(Box::new(store.clone()));
    (ConversationController::new(session, Arc::new(client)), store)
}
