use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{stream, StreamExt};

use crate::core::app::{ConversationController, SessionContext};
use crate::core::chat_stream::{FragmentStream, ModelClient, ModelRequest, StreamError};

/// A model client that replays fixed fragments and records every request.
#[derive(Clone, Default)]
pub struct ScriptedClient {
    fragments: Vec<String>,
    trailing_error: Option<StreamError>,
    stalls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
}

impl ScriptedClient {
    pub fn fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Yield `fragments`, then fail with `error`.
    pub fn failing<I, S>(fragments: I, error: StreamError) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            trailing_error: Some(error),
            ..Self::fragments(fragments)
        }
    }

    /// The next `count` requests open a stream that never yields.
    pub fn stalling(self, count: usize) -> Self {
        self.stalls.store(count, Ordering::SeqCst);
        self
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn stream(&self, request: ModelRequest) -> Result<FragmentStream, StreamError> {
        self.requests.lock().unwrap().push(request);
        let stalled = self
            .stalls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stalled {
            return Ok(stream::pending::<Result<String, StreamError>>().boxed());
        }
        let items: Vec<Result<String, StreamError>> = self
            .fragments
            .iter()
            .cloned()
            .map(Ok)
            .chain(self.trailing_error.clone().map(Err))
            .collect();
        Ok(Box::pin(stream::iter(items)))
    }
}

pub fn controller_with(client: ScriptedClient) -> ConversationController {
    ConversationController::new(SessionContext::new(Arc::new(client)))
}
