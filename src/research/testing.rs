use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::llm::{CallConfig, Generator, Message, ProviderResponse, Tooling};

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub config: CallConfig,
    pub messages: Vec<Message>,
}

/// Generator stub that replays scripted replies in order and records every call.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<ProviderResponse>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Result<ProviderResponse>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn tooling(&self) -> Vec<Tooling> {
        self.calls().iter().map(|c| c.config.tooling).collect()
    }

    pub fn count(&self, tooling: Tooling) -> usize {
        self.tooling().into_iter().filter(|t| *t == tooling).count()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, messages: &[Message], config: CallConfig) -> Result<ProviderResponse> {
        self.calls.lock().unwrap().push(RecordedCall {
            config,
            messages: messages.to_vec(),
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("no scripted reply left")))
    }
}

pub fn flat(text: &str) -> Result<ProviderResponse> {
    Ok(ProviderResponse::Flat(text.to_string()))
}
