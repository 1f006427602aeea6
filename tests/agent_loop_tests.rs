//! Integration tests for the approval-gated agent loop.

mod common;

use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use pretty_assertions::assert_eq;
use serde_json::json;

use abacus::agent_loop::*;
use abacus::error::AbacusError;
use abacus::types::{ModelMessage, Role};

use common::mock_agent;

fn interrupted(outcome: RunOutcome) -> (ApprovalRequest, Checkpoint) {
    match outcome {
        RunOutcome::Interrupted { request, checkpoint } => (request, checkpoint),
        RunOutcome::Completed(result) => panic!("expected interrupt, run completed: {result:?}"),
    }
}

#[tokio::test]
async fn approved_multiply_produces_final_answer() {
    let (provider, agent) = mock_agent();
    provider.queue_tool_call("call_1", "multiply", json!({"a": 3, "b": 4}));
    provider.queue_response("3 times 4 is 12.");

    let (request, checkpoint) = interrupted(
        agent
            .invoke(vec![ModelMessage::user("What is 3 times 4?")], None)
            .await
            .unwrap(),
    );
    assert_eq!(request.tool_call.name, "multiply");
    assert_eq!(request.tool_call.arguments, json!({"a": 3, "b": 4}));
    assert_eq!(request.action, APPROVAL_INSTRUCTION);
    assert_eq!(provider.call_count(), 1);

    let result = agent
        .resume(checkpoint, true)
        .await
        .unwrap()
        .completed()
        .expect("run should complete");

    let roles: Vec<Role> = result.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
    let tool_result = result.messages[2].tool_result_part().unwrap();
    assert_eq!(tool_result.tool_call_id, "call_1");
    assert_eq!(tool_result.result, json!(12));
    assert_eq!(result.answer(), "3 times 4 is 12.");
    assert_eq!(result.model_calls, 2);
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn rejected_call_records_rejection_and_skips_tool() {
    let (provider, agent) = mock_agent();
    provider.queue_tool_call("call_1", "divide", json!({"a": 1, "b": 0}));
    provider.queue_response("I was not allowed to divide.");

    let (_, checkpoint) = interrupted(
        agent
            .invoke(vec![ModelMessage::user("What is 1 / 0?")], None)
            .await
            .unwrap(),
    );
    let result = agent.resume(checkpoint, false).await.unwrap().completed().unwrap();

    let tool_result = result.messages[2].tool_result_part().unwrap();
    assert_eq!(tool_result.result, json!(REJECTION_RESULT));
    assert_eq!(tool_result.result, json!("Tool call rejected"));

    let second = &provider.requests()[1];
    let last = second.messages.last().unwrap();
    assert_eq!(last.role, Role::Tool);
    assert_eq!(last.tool_result_part().unwrap().result, json!("Tool call rejected"));
}

#[tokio::test]
async fn no_tool_calls_completes_after_one_model_call() {
    let (provider, agent) = mock_agent();
    provider.queue_response("Hello!");

    let result = agent
        .invoke(vec![ModelMessage::user("hi")], None)
        .await
        .unwrap()
        .completed()
        .unwrap();

    assert_eq!(provider.call_count(), 1);
    assert_eq!(result.messages.len(), 2);
    assert_eq!(result.answer(), "Hello!");
}

#[tokio::test]
async fn system_prompt_is_sent_but_not_stored() {
    let (provider, agent) = mock_agent();
    provider.queue_response("ok");

    let result = agent
        .invoke(vec![ModelMessage::user("hi")], None)
        .await
        .unwrap()
        .completed()
        .unwrap();

    let request = &provider.requests()[0];
    assert_eq!(request.messages[0].role, Role::System);
    assert_eq!(request.messages[0].text(), SYSTEM_PROMPT);
    assert_eq!(request.messages[1].text(), "hi");
    let tool_names: Vec<String> = request
        .tools
        .as_ref()
        .unwrap()
        .iter()
        .map(|t| t.name.clone())
        .collect();
    assert_eq!(tool_names, vec!["add", "multiply", "divide"]);
    assert!(result.messages.iter().all(|m| m.role != Role::System));
}

#[tokio::test]
async fn previous_history_is_a_prefix_of_the_result() {
    let (provider, agent) = mock_agent();
    provider.queue_response("first");
    let first = agent
        .invoke(vec![ModelMessage::user("one")], None)
        .await
        .unwrap()
        .completed()
        .unwrap();

    provider.queue_tool_call("call_2", "add", json!({"a": 2, "b": 2}));
    provider.queue_response("4");
    let second = agent
        .run(
            vec![ModelMessage::user("two plus two?")],
            Some(first.messages.clone()),
            &fixed_handler(true),
        )
        .await
        .unwrap();

    assert_eq!(&second.messages[..first.messages.len()], &first.messages[..]);
    assert_eq!(second.messages.len(), first.messages.len() + 4);
    assert_eq!(provider.requests()[1].messages.len(), 1 + first.messages.len() + 1);
}

#[tokio::test]
async fn resume_does_not_repeat_model_or_tool_calls() {
    let (provider, agent) = mock_agent();
    provider.queue_tool_calls(&[
        ("call_a", "add", json!({"a": 1, "b": 2})),
        ("call_b", "multiply", json!({"a": 3, "b": 4})),
    ]);
    provider.queue_response("3 and 12");

    let (first, checkpoint) = interrupted(
        agent
            .invoke(vec![ModelMessage::user("1+2 and 3*4?")], None)
            .await
            .unwrap(),
    );
    assert_eq!(first.tool_call.id, "call_a");

    let (second, checkpoint) = interrupted(agent.resume(checkpoint, true).await.unwrap());
    assert_eq!(second.tool_call.id, "call_b");
    assert_eq!(checkpoint.pending.results.len(), 1);
    assert_eq!(provider.call_count(), 1);

    let result = agent.resume(checkpoint, false).await.unwrap().completed().unwrap();
    assert_eq!(provider.call_count(), 2);

    let results: Vec<(String, serde_json::Value)> = result
        .messages
        .iter()
        .filter_map(|m| m.tool_result_part())
        .map(|r| (r.tool_call_id.clone(), r.result.clone()))
        .collect();
    assert_eq!(
        results,
        vec![
            ("call_a".to_string(), json!(3)),
            ("call_b".to_string(), json!("Tool call rejected")),
        ]
    );
}

#[tokio::test]
async fn checkpoint_survives_serialization() {
    let (provider, agent) = mock_agent();
    provider.queue_tool_call("call_1", "add", json!({"a": 5, "b": 6}));
    provider.queue_response("11");

    let (_, checkpoint) = interrupted(
        agent
            .invoke(vec![ModelMessage::user("5+6?")], None)
            .await
            .unwrap(),
    );
    let stored = serde_json::to_string(&checkpoint).unwrap();
    let restored: Checkpoint = serde_json::from_str(&stored).unwrap();
    assert_eq!(restored, checkpoint);

    let result = agent.resume(restored, true).await.unwrap().completed().unwrap();
    assert_eq!(result.run_id, checkpoint.run_id);
    assert_eq!(result.answer(), "11");
}

#[tokio::test]
async fn division_by_zero_propagates() {
    let (provider, agent) = mock_agent();
    provider.queue_tool_call("call_1", "divide", json!({"a": 1, "b": 0}));

    let err = agent
        .run(vec![ModelMessage::user("1/0")], None, &fixed_handler(true))
        .await
        .unwrap_err();
    assert!(matches!(err, AbacusError::ToolExecution { .. }));
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn unknown_tool_propagates() {
    let (provider, agent) = mock_agent();
    provider.queue_tool_call("call_1", "subtract", json!({"a": 1, "b": 2}));

    let agent = agent.with_approval_policy(ApprovalPolicy::Always);
    let err = agent
        .invoke(vec![ModelMessage::user("1-2")], None)
        .await
        .unwrap_err();
    assert!(matches!(err, AbacusError::UnknownTool(ref name) if name == "subtract"));
}

#[tokio::test]
async fn rejected_unknown_tool_is_not_looked_up() {
    let (provider, agent) = mock_agent();
    provider.queue_tool_call("call_1", "subtract", json!({"a": 1, "b": 2}));
    provider.queue_response("ok");

    let result = agent
        .with_approval_policy(ApprovalPolicy::Never)
        .invoke(vec![ModelMessage::user("1-2")], None)
        .await
        .unwrap()
        .completed()
        .unwrap();
    assert_eq!(
        result.messages[2].tool_result_part().unwrap().result,
        json!("Tool call rejected")
    );
}

#[tokio::test]
async fn always_policy_never_interrupts() {
    let (provider, agent) = mock_agent();
    provider.queue_tool_call("call_1", "multiply", json!({"a": 6, "b": 7}));
    provider.queue_response("42");

    let outcome = agent
        .with_approval_policy(ApprovalPolicy::Always)
        .invoke(vec![ModelMessage::user("6*7")], None)
        .await
        .unwrap();
    let result = outcome.completed().unwrap();
    assert_eq!(result.messages[2].tool_result_part().unwrap().result, json!(42));
}

#[tokio::test]
async fn handler_sees_each_request_in_order() {
    let (provider, agent) = mock_agent();
    provider.queue_tool_call("call_1", "add", json!({"a": 1, "b": 1}));
    provider.queue_tool_call("call_2", "multiply", json!({"a": 2, "b": 5}));
    provider.queue_response("done");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_by_handler = seen.clone();
    let handler: ApprovalHandler = Arc::new(move |request: ApprovalRequest| -> BoxFuture<'static, bool> {
        seen_by_handler.lock().unwrap().push(request.tool_call.id.clone());
        let approved = request.tool_call.name == "add";
        Box::pin(async move { approved })
    });

    let result = agent
        .run(vec![ModelMessage::user("go")], None, &handler)
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["call_1", "call_2"]);
    let results: Vec<serde_json::Value> = result
        .messages
        .iter()
        .filter_map(|m| m.tool_result_part())
        .map(|r| r.result.clone())
        .collect();
    assert_eq!(results, vec![json!(2), json!("Tool call rejected")]);
    assert_eq!(result.model_calls, 3);
}

#[tokio::test]
async fn max_iterations_stops_runaway_loops() {
    let (provider, agent) = mock_agent();
    provider.queue_tool_call("call_1", "add", json!({"a": 1, "b": 1}));
    provider.queue_tool_call("call_2", "add", json!({"a": 2, "b": 2}));

    let err = agent
        .with_approval_policy(ApprovalPolicy::Always)
        .with_max_iterations(Some(2))
        .invoke(vec![ModelMessage::user("keep adding")], None)
        .await
        .unwrap_err();
    assert!(matches!(err, AbacusError::InvalidState(_)));
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn model_failure_propagates() {
    let (provider, agent) = mock_agent();
    provider.queue_failure(500, "upstream exploded");

    let err = agent
        .invoke(vec![ModelMessage::user("hi")], None)
        .await
        .unwrap_err();
    assert!(matches!(err, AbacusError::Api { status: 500, .. }));
}

#[tokio::test]
async fn event_sink_sees_lifecycle_in_order() {
    let (provider, agent) = mock_agent();
    provider.queue_tool_call("call_1", "add", json!({"a": 1, "b": 2}));
    provider.queue_response("3");

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink_events = events.clone();
    let agent = agent.with_event_sink(Arc::new(move |event: RunEvent| {
        sink_events.lock().unwrap().push(event);
    }));

    let (_, checkpoint) = interrupted(
        agent
            .invoke(vec![ModelMessage::user("1+2")], None)
            .await
            .unwrap(),
    );
    let stored = serde_json::to_string(&checkpoint).unwrap();
    agent
        .resume(serde_json::from_str(&stored).unwrap(), true)
        .await
        .unwrap();

    let events = events.lock().unwrap();
    assert!(events.iter().all(|e| e.run_id == checkpoint.run_id));
    let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
    assert_eq!(seqs, (1..=8).collect::<Vec<u64>>());

    let kinds: Vec<&'static str> = events
        .iter()
        .map(|event| match &event.payload {
            RunEventPayload::Lifecycle { state: RunLifecycle::Started } => "started",
            RunEventPayload::Lifecycle { state: RunLifecycle::Resumed } => "resumed",
            RunEventPayload::Lifecycle { state: RunLifecycle::Interrupted } => "interrupted",
            RunEventPayload::Lifecycle { state: RunLifecycle::Completed } => "completed",
            RunEventPayload::Lifecycle { state: RunLifecycle::Failed { .. } } => "failed",
            RunEventPayload::ModelResponse { .. } => "model",
            RunEventPayload::ApprovalRequired { .. } => "approval",
            RunEventPayload::ToolResult { .. } => "tool",
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            "started",
            "model",
            "approval",
            "interrupted",
            "resumed",
            "tool",
            "model",
            "completed"
        ]
    );
}

#[tokio::test]
async fn call_model_and_execute_action_work_standalone() {
    let (provider, agent) = mock_agent();
    provider.queue_tool_call("call_1", "multiply", json!({"a": 3, "b": 4}));

    let history = vec![ModelMessage::user("3*4")];
    let assistant = agent.call_model(&history).await.unwrap();
    assert_eq!(history.len(), 1);
    let call = assistant.tool_calls()[0].clone();

    let approved = agent.execute_action(&call, true).await.unwrap();
    assert_eq!(approved.result, json!(12));
    assert_eq!(approved.tool_call_id, "call_1");

    let rejected = agent.execute_action(&call, false).await.unwrap();
    assert_eq!(rejected.result, json!("Tool call rejected"));
}

#[tokio::test]
async fn resume_without_a_waiting_call_is_invalid_state() {
    let (provider, agent) = mock_agent();
    provider.queue_tool_call("c0", "add", json!({"a": 1, "b": 1}));
    provider.queue_tool_call("c1", "multiply", json!({"a": 6, "b": 7}));

    let (_, mut checkpoint) = interrupted(
        agent
            .invoke(vec![ModelMessage::user("1+1")], None)
            .await
            .unwrap(),
    );
    let settled = agent
        .execute_action(&checkpoint.pending_call().unwrap(), true)
        .await
        .unwrap();
    checkpoint.pending.results.push(ModelMessage::tool_result(settled));
    assert!(checkpoint.pending_call().is_none());

    let err = agent.resume(checkpoint, true).await.unwrap_err();
    assert!(matches!(err, AbacusError::InvalidState(_)));
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn explicit_decision_wins_over_policy_on_resume() {
    let (provider, agent) = mock_agent();
    provider.queue_tool_call("call_1", "add", json!({"a": 1, "b": 2}));
    provider.queue_tool_call("call_2", "add", json!({"a": 3, "b": 4}));
    provider.queue_response("done");

    let (_, checkpoint) = interrupted(
        agent
            .invoke(vec![ModelMessage::user("1+2 then 3+4")], None)
            .await
            .unwrap(),
    );

    let rejecting = AgentLoop::new(provider.clone()).with_approval_policy(ApprovalPolicy::Never);
    let result = rejecting
        .resume(checkpoint, true)
        .await
        .unwrap()
        .completed()
        .unwrap();

    let results: Vec<serde_json::Value> = result
        .messages
        .iter()
        .filter_map(|m| m.tool_result_part())
        .map(|r| r.result.clone())
        .collect();
    assert_eq!(results, vec![json!(3), json!("Tool call rejected")]);
}
