//! Shared test helpers and mock provider.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use abacus::agent_loop::AgentLoop;
use abacus::error::AbacusError;
use abacus::provider::{ModelProvider, ProviderRequest, ProviderResponse};
use abacus::types::*;

enum Scripted {
    Response(ProviderResponse),
    Failure(u16, String),
}

/// A mock provider that replays queued responses and records every request.
pub struct MockProvider {
    model_id: String,
    responses: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl MockProvider {
    pub fn new(model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a text response.
    pub fn queue_response(&self, text: &str) {
        self.responses.lock().unwrap().push_back(Scripted::Response(ProviderResponse {
            text: text.to_string(),
            usage: Usage {
                input_tokens: 10,
                output_tokens: 20,
                total_tokens: 30,
            },
            tool_calls: vec![],
            finish_reason: Some(FinishReason::Stop),
        }));
    }

    /// Queue a response with a single tool call.
    pub fn queue_tool_call(&self, id: &str, name: &str, args: serde_json::Value) {
        self.queue_tool_calls(&[(id, name, args)]);
    }

    /// Queue a response requesting several tool calls at once.
    pub fn queue_tool_calls(&self, calls: &[(&str, &str, serde_json::Value)]) {
        let tool_calls = calls
            .iter()
            .map(|(id, name, args)| AgentToolCall {
                id: id.to_string(),
                name: name.to_string(),
                arguments: args.clone(),
            })
            .collect();
        self.responses.lock().unwrap().push_back(Scripted::Response(ProviderResponse {
            text: String::new(),
            usage: Usage {
                input_tokens: 10,
                output_tokens: 5,
                total_tokens: 15,
            },
            tool_calls,
            finish_reason: Some(FinishReason::ToolCalls),
        }));
    }

    /// Queue an API failure.
    pub fn queue_failure(&self, status: u16, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Scripted::Failure(status, message.to_string()));
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate_text(&self, request: &ProviderRequest) -> Result<ProviderResponse, AbacusError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.responses.lock().unwrap().pop_front() {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::Failure(status, message)) => Err(AbacusError::api(status, message)),
            None => Ok(ProviderResponse {
                text: "Mock response".to_string(),
                usage: Usage::default(),
                tool_calls: vec![],
                finish_reason: Some(FinishReason::Stop),
            }),
        }
    }
}

/// An agent loop over a fresh mock provider.
pub fn mock_agent() -> (Arc<MockProvider>, AgentLoop) {
    let provider = Arc::new(MockProvider::new("mock-model"));
    let agent = AgentLoop::new(provider.clone());
    (provider, agent)
}
