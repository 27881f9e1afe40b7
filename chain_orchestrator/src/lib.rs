//! Capability chain orchestrator - core library.
//!
//! Turns a free-text request into an ordered chain of capability
//! invocations: the prompt is scored and refined ([`prompt`]), capabilities
//! are ranked by keyword ([`capability`]), and the chain runs sequentially,
//! forwarding successful results to later steps ([`orchestrator`]).

pub mod capability;
pub mod cli;
pub mod discovery;
pub mod error;
pub mod invoker;
pub mod orchestrator;
pub mod prompt;
pub mod settings;
pub mod synthesis;
pub mod telemetry;

pub use capability::{CapabilityDescriptor, CapabilityRegistry};
pub use error::{ChainError, InvocationError};
pub use invoker::{CapabilityInvoker, CliInvoker, InvocationOutcome};
pub use orchestrator::{ChainOrchestrator, ChainReport};
pub use prompt::{extract_keywords, EvaluationResult, PromptEvaluator};
