//! In-process provider with scripted replies
//!
//! Deterministic stand-in for a real backend: used by tests and by
//! `ryn-autofix run --replay`, which feeds recorded completions keyed by
//! issue id back through the pipeline without network access.

use super::{Completion, CompletionProvider, Prompt, TokenUsage};
use crate::error::ProviderErrorKind;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedReply {
    Text(String),
    Fail(ProviderErrorKind),
    /// Never answers; exercised through the gateway timeout
    Hang,
}

type Responder = dyn Fn(&Prompt) -> ScriptedReply + Send + Sync;

pub struct ScriptedProvider {
    name: String,
    responder: Box<Responder>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(
        name: impl Into<String>,
        responder: impl Fn(&Prompt) -> ScriptedReply + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
        }
    }

    /// Same reply for every prompt
    pub fn always(name: impl Into<String>, reply: ScriptedReply) -> Self {
        Self::new(name, move |_| reply.clone())
    }

    /// Reply per issue id; unknown issues get an unparseable answer
    pub fn by_issue(name: impl Into<String>, replies: HashMap<String, ScriptedReply>) -> Self {
        Self::new(name, move |prompt| {
            prompt_issue_id(prompt)
                .and_then(|id| replies.get(id).cloned())
                .unwrap_or_else(|| ScriptedReply::Text("no fix available".to_string()))
        })
    }

    /// Build from a JSON object mapping issue id to raw completion text
    ///
    /// # Errors
    /// Returns the decode error if the input is not a string-to-string map
    pub fn from_replay_json(name: impl Into<String>, raw: &str) -> serde_json::Result<Self> {
        let recorded: HashMap<String, String> = serde_json::from_str(raw)?;
        let replies = recorded
            .into_iter()
            .map(|(id, text)| (id, ScriptedReply::Text(text)))
            .collect();
        Ok(Self::by_issue(name, replies))
    }

    /// Number of `complete` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// The issue id a synthesizer prompt was built for (its `Issue ID:` line)
pub fn prompt_issue_id(prompt: &Prompt) -> Option<&str> {
    prompt
        .user
        .lines()
        .find_map(|line| line.strip_prefix("Issue ID:"))
        .map(str::trim)
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &Prompt) -> Result<Completion, ProviderErrorKind> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match (self.responder)(prompt) {
            ScriptedReply::Text(text) => Ok(Completion {
                provider: self.name.clone(),
                usage: TokenUsage {
                    input_tokens: (prompt.system.len() + prompt.user.len()) as u64 / 4,
                    output_tokens: text.len() as u64 / 4,
                },
                text,
            }),
            ScriptedReply::Fail(kind) => Err(kind),
            ScriptedReply::Hang => {
                std::future::pending::<()>().await;
                Err(ProviderErrorKind::Timeout { after_ms: 0 })
            }
        }
    }
}
