//! Scripted provider for tests.
//!
//! Replays a fixed list of stream payloads without touching the network and
//! records every request so callers can assert on the replayed transcript.

use std::sync::Mutex;

use super::provider::{
    LlmProvider, ProviderError, ProviderResult, ProviderStreamHandle, ProviderWorker,
    StreamEventMapped, StreamEventPayload, StreamRequest, make_event_stream,
};

#[derive(Debug, Default)]
pub struct FakeProvider {
    script: Vec<StreamEventPayload>,
    fail_to_open: bool,
    hang_after_script: bool,
    requests: Mutex<Vec<StreamRequest>>,
}

impl FakeProvider {
    /// Streams `fragments` as deltas followed by `Done`.
    pub fn with_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut script = fragments
            .into_iter()
            .map(|fragment| StreamEventPayload::Delta(fragment.into()))
            .collect::<Vec<_>>();
        script.push(StreamEventPayload::Done);
        Self::with_script(script)
    }

    /// Replays `script` verbatim, including any terminal payload.
    pub fn with_script(script: Vec<StreamEventPayload>) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    /// Fails every `stream_chat` call before a stream exists.
    pub fn failing() -> Self {
        Self {
            fail_to_open: true,
            ..Self::default()
        }
    }

    /// Keeps the stream open after the script instead of closing the channel.
    pub fn hanging(mut self) -> Self {
        self.hang_after_script = true;
        self
    }

    pub fn requests(&self) -> Vec<StreamRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl LlmProvider for FakeProvider {
    fn id(&self) -> &str {
        "fake"
    }

    fn name(&self) -> &str {
        "Fake"
    }

    fn stream_chat(&self, request: StreamRequest) -> ProviderResult<ProviderStreamHandle> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if self.fail_to_open {
            return Err(ProviderError::UnsupportedProvider {
                stage: "fake-stream-chat",
                provider_id: self.id().to_string(),
            });
        }

        let target = request.target;
        let (event_tx, stream, cancel_rx) = make_event_stream(target);
        let script = self.script.clone();
        let hang = self.hang_after_script;

        let worker: ProviderWorker = Box::pin(async move {
            for payload in script {
                if event_tx.send(StreamEventMapped { target, payload }).is_err() {
                    return;
                }
            }
            if hang {
                let _ = cancel_rx.await;
            }
        });

        Ok(ProviderStreamHandle { stream, worker })
    }
}
