//! Interactive approval prompts on the terminal.

use std::io::{BufRead, Write};
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::agent_loop::{ApprovalHandler, ApprovalRequest};

/// Interpret a typed answer. `None` means the answer was not understood.
pub fn parse_decision(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "approve" | "a" => Some(true),
        "" | "n" | "no" | "reject" | "r" => Some(false),
        _ => None,
    }
}

/// One-line description of a pending tool call.
pub fn describe(request: &ApprovalRequest) -> String {
    format!(
        "{}({}) [{}]",
        request.tool_call.name, request.tool_call.arguments, request.tool_call.id
    )
}

fn prompt_blocking(request: &ApprovalRequest) -> bool {
    let stdin = std::io::stdin();
    let mut stderr = std::io::stderr();
    loop {
        let _ = write!(stderr, "{}: {} [y/N] ", request.action, describe(request));
        let _ = stderr.flush();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => return false,
            Ok(_) => {}
        }
        if let Some(decision) = parse_decision(&line) {
            return decision;
        }
        let _ = writeln!(stderr, "Please answer y or n.");
    }
}

/// Approval handler that asks on stdin. End of input counts as a rejection.
pub fn stdin_handler() -> ApprovalHandler {
    Arc::new(|request: ApprovalRequest| -> BoxFuture<'static, bool> {
        Box::pin(async move {
            tokio::task::spawn_blocking(move || prompt_blocking(&request))
                .await
                .unwrap_or(false)
        })
    })
}
