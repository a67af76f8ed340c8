//! Scripted in-memory provider for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{ChatMessage, ChatRole, LlmError, LlmProvider};

#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    ApiError(String),
    Panic,
}

/// Answers each call with the first rule whose needle appears in the last user
/// message, or the default reply when none match.
pub struct ScriptedLlm {
    rules: Vec<(String, Reply)>,
    default: Reply,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlm {
    pub fn new(default: Reply) -> Self {
        Self {
            rules: vec![],
            default,
            calls: Mutex::new(vec![]),
        }
    }

    pub fn replying(text: impl Into<String>) -> Self {
        Self::new(Reply::Text(text.into()))
    }

    pub fn on(mut self, needle: impl Into<String>, reply: Reply) -> Self {
        self.rules.push((needle.into(), reply));
        self
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        _schema: Option<&Value>,
    ) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(messages.to_vec());

        let user = messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| user.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.default.clone());

        match reply {
            Reply::Text(text) => Ok(text),
            Reply::ApiError(message) => Err(LlmError::Api {
                status: 502,
                message,
            }),
            Reply::Panic => panic!("scripted provider panic"),
        }
    }
}
