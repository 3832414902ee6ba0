use std::sync::Arc;
use std::time::Duration;

use mise_llm::{
    LlmProvider, ModelCatalog, ProviderError, StreamEventPayload, StreamRequest,
};
use snafu::{OptionExt, ResultExt, Snafu, ensure};
use tokio::sync::mpsc;

use super::events::TurnEvent;
use super::message::{Message, StreamTransition, StreamTransitionRejection};
use crate::session::SessionState;

/// Knobs for model selection and turn execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatOptions {
    pub default_model: String,
    pub default_max_tokens: u64,
    pub min_max_tokens: u64,
    pub stream_idle_timeout: Duration,
}

/// Model and token budget currently in effect for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model_id: String,
    pub model_name: String,
    pub max_tokens: u64,
    pub floor: u64,
    pub ceiling: u64,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ChatError {
    #[snafu(display("model '{model_id}' is not available"))]
    UnknownModel {
        stage: &'static str,
        model_id: String,
    },
    #[snafu(display("model '{model_id}' is not the model selected for this session"))]
    ModelNotSelected {
        stage: &'static str,
        model_id: String,
    },
    #[snafu(display("please enter a message"))]
    EmptyPrompt { stage: &'static str },
    #[snafu(display("a reply is already being generated for this session"))]
    TurnRejected {
        stage: &'static str,
        rejection: StreamTransitionRejection,
    },
    #[snafu(display("failed to start the completion: {source}"))]
    OpenStream {
        stage: &'static str,
        source: ProviderError,
    },
    #[snafu(display("completion failed: {message}"))]
    StreamFailed {
        stage: &'static str,
        message: String,
    },
    #[snafu(display("the model sent nothing for {timeout_secs}s"))]
    StreamTimeout {
        stage: &'static str,
        timeout_secs: u64,
    },
    #[snafu(display("the completion stream ended before the reply finished"))]
    StreamClosed { stage: &'static str },
}

pub type ChatResult<T> = Result<T, ChatError>;

/// `min(requested, ceiling)`, raised to `floor`.
pub fn clamp_max_tokens(requested: u64, ceiling: u64, floor: u64) -> u64 {
    requested.min(ceiling).max(floor)
}

pub struct ChatOrchestrator {
    provider: Arc<dyn LlmProvider>,
    catalog: ModelCatalog,
    options: ChatOptions,
}

impl ChatOrchestrator {
    pub fn new(provider: Arc<dyn LlmProvider>, catalog: ModelCatalog, options: ChatOptions) -> Self {
        Self {
            provider,
            catalog,
            options,
        }
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn options(&self) -> &ChatOptions {
        &self.options
    }

    /// Picks the model for `session`, clearing the transcript when the model changes.
    ///
    /// A missing `requested_model` keeps the stored choice (or the configured default);
    /// a missing `requested_max_tokens` keeps the stored budget unless the model changed.
    pub fn select_model(
        &self,
        session: &mut SessionState,
        requested_model: Option<&str>,
        requested_max_tokens: Option<u64>,
    ) -> ChatResult<ModelSelection> {
        let model_id = requested_model
            .map(str::trim)
            .filter(|model_id| !model_id.is_empty())
            .map(str::to_string)
            .or_else(|| session.selected_model.clone())
            .unwrap_or_else(|| self.options.default_model.clone());

        let descriptor = self.catalog.get(&model_id).context(UnknownModelSnafu {
            stage: "select-model-lookup",
            model_id: model_id.clone(),
        })?;

        let changed = session.selected_model.as_deref() != Some(model_id.as_str());
        if changed {
            tracing::info!(
                previous_model = ?session.selected_model,
                model_id = %model_id,
                dropped_messages = session.conversation.len().saturating_sub(1),
                "model changed; resetting transcript to system prompt"
            );
            session.conversation.reset_to_system_prompt();
            session.selected_model = Some(model_id.clone());
        }

        // A model switch resets the budget; the posted slider value belongs to the old model.
        let requested = if changed {
            self.options.default_max_tokens
        } else {
            requested_max_tokens
                .or(session.max_tokens)
                .unwrap_or(self.options.default_max_tokens)
        };
        let max_tokens =
            clamp_max_tokens(requested, descriptor.max_tokens, self.options.min_max_tokens);
        session.max_tokens = Some(max_tokens);

        Ok(ModelSelection {
            model_id,
            model_name: descriptor.name.clone(),
            max_tokens,
            floor: self.options.min_max_tokens,
            ceiling: descriptor.max_tokens,
        })
    }

    /// Selection in effect without changing anything the user chose.
    pub fn current_selection(&self, session: &mut SessionState) -> ChatResult<ModelSelection> {
        self.select_model(session, None, None)
    }

    /// Runs one chat turn: records the prompt, streams the reply into `sink`, and records
    /// the full reply on success. On failure only the prompt stays in the transcript.
    pub async fn handle_user_input(
        &self,
        session: &mut SessionState,
        prompt: &str,
        selection: &ModelSelection,
        sink: &mpsc::UnboundedSender<TurnEvent>,
    ) -> ChatResult<Message> {
        ensure!(
            !prompt.trim().is_empty(),
            EmptyPromptSnafu {
                stage: "validate-prompt",
            }
        );
        ensure!(
            session.selected_model.as_deref() == Some(selection.model_id.as_str()),
            ModelNotSelectedSnafu {
                stage: "validate-selection",
                model_id: selection.model_id.clone(),
            }
        );

        let target = session.next_stream_target();
        session.stream_state = session
            .stream_state
            .apply(StreamTransition::Start(target))
            .map_err(|rejection| ChatError::TurnRejected {
                stage: "start-turn",
                rejection,
            })?;

        session.conversation.append(Message::user(prompt));

        let messages = session
            .conversation
            .transcript()
            .iter()
            .map(Message::to_provider_message)
            .collect::<Vec<_>>();
        let request = StreamRequest::new(target, selection.model_id.clone(), messages)
            .with_max_tokens(selection.max_tokens);

        tracing::info!(
            target = ?target,
            model_id = %selection.model_id,
            max_tokens = selection.max_tokens,
            transcript_len = session.conversation.len(),
            "starting chat turn"
        );

        match self.stream_reply(request, sink).await {
            Ok(content) => {
                let reply = Message::assistant(content);
                session.conversation.append(reply.clone());
                session.stream_state = session
                    .stream_state
                    .apply(StreamTransition::Complete(target))
                    .unwrap_or_default();
                let _ = sink.send(TurnEvent::Completed);
                tracing::info!(
                    target = ?target,
                    reply_len = reply.content.len(),
                    "chat turn completed"
                );
                Ok(reply)
            }
            Err(error) => {
                let message = error.to_string();
                session.stream_state = session
                    .stream_state
                    .apply(StreamTransition::Fail {
                        target,
                        message: message.clone(),
                    })
                    .unwrap_or_default();
                let _ = sink.send(TurnEvent::Failed(message));
                tracing::warn!(target = ?target, error = %error, "chat turn failed");
                Err(error)
            }
        }
    }

    async fn stream_reply(
        &self,
        request: StreamRequest,
        sink: &mpsc::UnboundedSender<TurnEvent>,
    ) -> ChatResult<String> {
        let target = request.target;
        let handle = self.provider.stream_chat(request).context(OpenStreamSnafu {
            stage: "open-stream",
        })?;
        let worker = tokio::spawn(handle.worker);
        let mut stream = handle.stream;
        let idle_timeout = self.options.stream_idle_timeout;

        let mut content = String::new();
        let mut fragment_count = 0usize;

        let outcome = loop {
            let event = match tokio::time::timeout(idle_timeout, stream.recv()).await {
                Ok(Some(event)) => event,
                Ok(None) => {
                    break StreamClosedSnafu {
                        stage: "read-stream",
                    }
                    .fail();
                }
                Err(_) => {
                    break StreamTimeoutSnafu {
                        stage: "read-stream",
                        timeout_secs: idle_timeout.as_secs(),
                    }
                    .fail();
                }
            };

            if event.target != target {
                tracing::debug!(
                    expected = ?target,
                    received = ?event.target,
                    "ignoring event from a stale stream"
                );
                continue;
            }

            match event.payload {
                StreamEventPayload::Delta(fragment) => {
                    fragment_count += 1;
                    content.push_str(&fragment);
                    // A disconnected viewer does not abort the turn.
                    let _ = sink.send(TurnEvent::Fragment(fragment));
                }
                StreamEventPayload::Done => break Ok(()),
                StreamEventPayload::Error(message) => {
                    break StreamFailedSnafu {
                        stage: "stream-event",
                        message,
                    }
                    .fail();
                }
            }
        };

        drop(stream);
        if outcome.is_err() {
            worker.abort();
        }

        tracing::debug!(target = ?target, fragment_count, "stream finished");
        outcome.map(|()| content)
    }
}
