//! abacus: a tool-calling arithmetic agent with human approval.
//!
//! The model decides whether to answer directly or call one of three
//! arithmetic tools (`add`, `multiply`, `divide`). Every tool call waits for
//! an approval; approved calls run and rejected ones record
//! `"Tool call rejected"`. Results are folded back into the conversation
//! until the model answers without calling a tool.
//!
//! # Quick Start
//!
//! ```no_run
//! use abacus::prelude::*;
//!
//! # async fn example() -> abacus::error::Result<()> {
//! let config = AbacusConfig::from_env()?;
//! let agent = AgentLoop::from_config(&config)?;
//!
//! let mut outcome = agent
//!     .invoke(vec![ModelMessage::user("What is 3 times 4?")], None)
//!     .await?;
//! let result = loop {
//!     match outcome {
//!         RunOutcome::Completed(result) => break result,
//!         RunOutcome::Interrupted { request, checkpoint } => {
//!             println!("approving {}", request.tool_call.name);
//!             outcome = agent.resume(checkpoint, true).await?;
//!         }
//!     }
//! };
//! println!("{}", result.answer());
//! # Ok(())
//! # }
//! ```

pub mod agent_loop;
pub mod config;
pub mod error;
pub mod memory;
pub mod models;
pub mod prelude;
pub mod provider;
pub mod tools;
pub mod types;

#[cfg(feature = "cli")]
pub mod cli;
