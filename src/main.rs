//! abacus CLI binary entry point.

use std::sync::Arc;

use abacus::agent_loop::{
    AgentLoop, ApprovalPolicy, RunEvent, RunEventPayload, RunOutcome, Thread,
};
use abacus::cli::approval::{describe, stdin_handler};
use abacus::cli::{ChatArgs, Cli, Commands, ThreadArgs};
use abacus::config::AbacusConfig;
use abacus::error::AbacusError;
use abacus::memory::{Checkpointer, FileCheckpointer, MemoryCheckpointer};
use abacus::provider::format::tool_result_to_string as format_result;
use abacus::types::{GenerationSettings, ModelMessage, Role};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "abacus=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Chat(args) => handle_chat(args).await,
        Commands::Approve(args) => handle_resume(args, true).await,
        Commands::Reject(args) => handle_resume(args, false).await,
        Commands::History(args) => handle_history(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn print_event(event: RunEvent) {
    match &event.payload {
        RunEventPayload::ToolResult { call, result } => {
            eprintln!("  {} -> {}", call.name, format_result(&result.result));
        }
        RunEventPayload::ApprovalRequired { request } => {
            tracing::debug!(call = %describe(request), "awaiting approval");
        }
        _ => {}
    }
}

fn build_agent(config: &AbacusConfig, policy: ApprovalPolicy) -> Result<AgentLoop, AbacusError> {
    Ok(AgentLoop::from_config(config)?
        .with_approval_policy(policy)
        .with_event_sink(Arc::new(print_event)))
}

fn open_thread(
    config: &AbacusConfig,
    id: Option<&str>,
    agent: AgentLoop,
) -> Thread {
    let store: Arc<dyn Checkpointer> = match id {
        Some(_) => Arc::new(FileCheckpointer::new(config.threads_dir())),
        None => Arc::new(MemoryCheckpointer::new()),
    };
    Thread::new(id.unwrap_or("default"), Arc::new(agent), store)
}

fn print_outcome(thread: &Thread, outcome: RunOutcome) -> Result<(), AbacusError> {
    match outcome {
        RunOutcome::Completed(result) => {
            println!("{}", result.answer());
        }
        RunOutcome::Interrupted { request, .. } => {
            println!("{}", serde_json::to_string_pretty(&request)?);
            eprintln!(
                "Run `abacus approve --thread {0}` or `abacus reject --thread {0}` to continue.",
                thread.id()
            );
        }
    }
    Ok(())
}

async fn handle_chat(args: ChatArgs) -> Result<(), AbacusError> {
    let config = AbacusConfig::from_env()?;
    if let Some(model) = args.model {
        config.set_model(model);
    }
    if args.max_iterations.is_some() {
        config.set_max_iterations(args.max_iterations);
    }

    let policy = if args.yes {
        ApprovalPolicy::Always
    } else if args.no {
        ApprovalPolicy::Never
    } else {
        ApprovalPolicy::Ask
    };
    let mut settings = GenerationSettings::default();
    settings.temperature = args.temperature;
    let agent = build_agent(&config, policy)?.with_settings(settings);
    let thread = open_thread(&config, args.thread.as_deref(), agent);
    let input = vec![ModelMessage::user(args.prompt)];

    if args.defer {
        let outcome = thread.send(input).await?;
        return print_outcome(&thread, outcome);
    }

    let result = thread.run(input, &stdin_handler()).await?;
    println!("{}", result.answer());
    Ok(())
}

async fn handle_resume(args: ThreadArgs, approved: bool) -> Result<(), AbacusError> {
    let config = AbacusConfig::from_env()?;
    let agent = build_agent(&config, ApprovalPolicy::Ask)?;
    let thread = open_thread(&config, Some(&args.thread), agent);
    let outcome = thread.resume(approved).await?;
    print_outcome(&thread, outcome)
}

fn handle_history(args: ThreadArgs) -> Result<(), AbacusError> {
    let config = AbacusConfig::from_env()?;
    let store = FileCheckpointer::new(config.threads_dir());
    let history = store.load_history(&args.thread)?.unwrap_or_default();
    for message in &history {
        match message.role {
            Role::Tool => {
                if let Some(result) = message.tool_result_part() {
                    println!("tool[{}]: {}", result.tool_call_id, format_result(&result.result));
                }
            }
            role => {
                let calls: Vec<String> = message
                    .tool_calls()
                    .iter()
                    .map(|c| format!("{}({})", c.name, c.arguments))
                    .collect();
                if calls.is_empty() {
                    println!("{role}: {}", message.text());
                } else {
                    println!("{role}: {} -> {}", message.text(), calls.join(", "));
                }
            }
        }
    }
    if let Some(pending) = store.load_pending(&args.thread)? {
        if let Some(request) = pending.approval_request() {
            println!("(pending approval: {})", describe(&request));
        }
    }
    Ok(())
}
