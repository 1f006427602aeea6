//! Integration tests for persisted threads.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

use abacus::agent_loop::{fixed_handler, AgentLoop, RunOutcome, Thread};
use abacus::error::AbacusError;
use abacus::memory::{Checkpointer, FileCheckpointer, MemoryCheckpointer};
use abacus::types::{ModelMessage, Role};

use common::MockProvider;

fn thread_with(store: Arc<dyn Checkpointer>) -> (Arc<MockProvider>, Thread) {
    let provider = Arc::new(MockProvider::new("mock-model"));
    let agent = Arc::new(AgentLoop::new(provider.clone()));
    (provider, Thread::new("work", agent, store))
}

#[tokio::test]
async fn send_then_resume_persists_history() {
    let (provider, thread) = thread_with(Arc::new(MemoryCheckpointer::new()));
    provider.queue_tool_call("call_1", "multiply", json!({"a": 3, "b": 4}));
    provider.queue_response("12");

    let outcome = thread
        .send(vec![ModelMessage::user("What is 3 times 4?")])
        .await
        .unwrap();
    assert!(!outcome.is_completed());
    assert_eq!(thread.pending().unwrap().unwrap().tool_call.id, "call_1");
    assert!(thread.history().unwrap().is_empty());

    let result = thread.resume(true).await.unwrap().completed().unwrap();
    assert_eq!(result.answer(), "12");
    assert!(thread.pending().unwrap().is_none());
    assert_eq!(thread.history().unwrap(), result.messages);
}

#[tokio::test]
async fn send_while_pending_is_invalid_state() {
    let (provider, thread) = thread_with(Arc::new(MemoryCheckpointer::new()));
    provider.queue_tool_call("call_1", "add", json!({"a": 1, "b": 2}));

    thread.send(vec![ModelMessage::user("1+2")]).await.unwrap();
    let err = thread.send(vec![ModelMessage::user("again")]).await.unwrap_err();
    assert!(matches!(err, AbacusError::InvalidState(_)));
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn resume_without_pending_is_invalid_state() {
    let (_provider, thread) = thread_with(Arc::new(MemoryCheckpointer::new()));
    let err = thread.resume(true).await.unwrap_err();
    assert!(matches!(err, AbacusError::InvalidState(_)));
}

#[tokio::test]
async fn failed_resume_keeps_checkpoint_pending() {
    let (provider, thread) = thread_with(Arc::new(MemoryCheckpointer::new()));
    provider.queue_tool_call("call_1", "divide", json!({"a": 1, "b": 0}));
    provider.queue_response("could not divide");

    thread.send(vec![ModelMessage::user("1/0")]).await.unwrap();
    assert!(thread.resume(true).await.is_err());
    assert!(thread.pending().unwrap().is_some());

    let result = thread.resume(false).await.unwrap().completed().unwrap();
    assert_eq!(result.answer(), "could not divide");
    assert!(thread.pending().unwrap().is_none());
}

#[tokio::test]
async fn later_runs_build_on_thread_history() {
    let (provider, thread) = thread_with(Arc::new(MemoryCheckpointer::new()));
    provider.queue_response("hello");
    provider.queue_response("still here");

    let first = thread
        .run(vec![ModelMessage::user("hi")], &fixed_handler(true))
        .await
        .unwrap();
    let second = thread
        .run(vec![ModelMessage::user("you there?")], &fixed_handler(true))
        .await
        .unwrap();

    assert_eq!(&second.messages[..first.messages.len()], &first.messages[..]);
    assert_eq!(thread.history().unwrap().len(), 4);
    // system + 2 stored + new input
    assert_eq!(provider.requests()[1].messages.len(), 4);
}

#[tokio::test]
async fn file_checkpointer_resumes_across_instances() {
    let dir = TempDir::new().unwrap();

    let (provider, thread) = thread_with(Arc::new(FileCheckpointer::new(dir.path().to_path_buf())));
    provider.queue_tool_call("call_1", "add", json!({"a": 20, "b": 22}));
    let outcome = thread.send(vec![ModelMessage::user("20+22?")]).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Interrupted { .. }));
    drop(thread);

    let (provider, thread) = thread_with(Arc::new(FileCheckpointer::new(dir.path().to_path_buf())));
    provider.queue_response("42");
    let request = thread.pending().unwrap().expect("pending approval on disk");
    assert_eq!(request.tool_call.name, "add");

    let result = thread.resume(true).await.unwrap().completed().unwrap();
    assert_eq!(provider.call_count(), 1);
    let roles: Vec<Role> = result.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
    assert_eq!(result.messages[2].tool_result_part().unwrap().result, json!(42));

    let store = FileCheckpointer::new(dir.path().to_path_buf());
    assert_eq!(store.load_history("work").unwrap().unwrap(), result.messages);
    assert!(store.load_pending("work").unwrap().is_none());
}
