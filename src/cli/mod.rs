//! CLI entry point for abacus.

pub mod approval;

use clap::{Args, Parser, Subcommand};

/// abacus CLI
#[derive(Parser, Debug)]
#[command(name = "abacus", version, about = "abacus: arithmetic agent with tool call approval")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask the agent a question
    Chat(ChatArgs),
    /// Approve the tool call a deferred thread is waiting on
    Approve(ThreadArgs),
    /// Reject the tool call a deferred thread is waiting on
    Reject(ThreadArgs),
    /// Print the stored history of a thread
    History(ThreadArgs),
}

/// Arguments for the `chat` subcommand.
#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Model to use (format: provider:model, e.g., openai:gpt-4o)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Thread to continue; history and pending approvals persist under ~/.abacus
    #[arg(short, long)]
    pub thread: Option<String>,

    /// Approve every tool call without asking
    #[arg(short, long, conflicts_with = "no")]
    pub yes: bool,

    /// Reject every tool call without asking
    #[arg(short, long)]
    pub no: bool,

    /// Stop at the first approval point and exit; settle it later with `approve`/`reject`
    #[arg(long, requires = "thread", conflicts_with_all = ["yes", "no"])]
    pub defer: bool,

    /// Temperature (0.0 - 2.0)
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Fail after this many model calls
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// User prompt
    pub prompt: String,
}

/// Arguments naming a thread.
#[derive(Args, Debug)]
pub struct ThreadArgs {
    /// Thread id
    #[arg(short, long, default_value = "default")]
    pub thread: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_chat_with_defaults() {
        let cli = Cli::try_parse_from(["abacus", "chat", "What is 3 times 4?"]).unwrap();
        match cli.command {
            Commands::Chat(args) => {
                assert_eq!(args.prompt, "What is 3 times 4?");
                assert!(args.model.is_none());
                assert!(args.thread.is_none());
                assert!(!args.yes && !args.no && !args.defer);
            }
            other => panic!("expected Chat, got {other:?}"),
        }
    }

    #[test]
    fn parse_chat_with_thread_and_defer() {
        let cli = Cli::try_parse_from([
            "abacus", "chat", "--thread", "work", "--defer", "-m", "openai:gpt-4o-mini", "2+2?",
        ])
        .unwrap();
        match cli.command {
            Commands::Chat(args) => {
                assert_eq!(args.thread.as_deref(), Some("work"));
                assert!(args.defer);
                assert_eq!(args.model.as_deref(), Some("openai:gpt-4o-mini"));
            }
            other => panic!("expected Chat, got {other:?}"),
        }
    }

    #[test]
    fn defer_requires_thread() {
        assert!(Cli::try_parse_from(["abacus", "chat", "--defer", "2+2?"]).is_err());
    }

    #[test]
    fn yes_and_no_conflict() {
        assert!(Cli::try_parse_from(["abacus", "chat", "--yes", "--no", "2+2?"]).is_err());
    }

    #[test]
    fn approve_defaults_to_default_thread() {
        let cli = Cli::try_parse_from(["abacus", "approve"]).unwrap();
        match cli.command {
            Commands::Approve(args) => assert_eq!(args.thread, "default"),
            other => panic!("expected Approve, got {other:?}"),
        }
    }

    #[test]
    fn parse_reject_and_history() {
        let cli = Cli::try_parse_from(["abacus", "reject", "-t", "work"]).unwrap();
        assert!(matches!(cli.command, Commands::Reject(ref a) if a.thread == "work"));
        let cli = Cli::try_parse_from(["abacus", "history", "--thread", "work"]).unwrap();
        assert!(matches!(cli.command, Commands::History(ref a) if a.thread == "work"));
    }
}
