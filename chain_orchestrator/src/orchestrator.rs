//! Core coordinator: evaluates a request, selects capabilities and runs them
//! as a sequential chain with accumulating context.
//!
//! A chain moves through [`ChainPhase`]s:
//!
//! ```text
//! Pending -> Invoking(0) -> Recording(0) -> Invoking(1) -> ... -> Synthesizing -> Done
//!                 \
//!                  `-> (cancellation observed) -> Synthesizing -> Cancelled
//! ```
//!
//! Cancellation is checked only at step boundaries. A failing capability
//! never stops the chain; its failure is recorded and reported inline.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::capability::{CapabilityDescriptor, CapabilityRegistry};
use crate::error::ChainError;
use crate::invoker::{CapabilityInvoker, InvocationOutcome};
use crate::prompt::{extract_keywords, EvaluationResult, PromptEvaluator};
use crate::settings::OrchestratorConfig;
use crate::synthesis::{build_capability_prompt, build_rationale, synthesize_report};

/// Everything known about one orchestration request once it has finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainReport {
    pub chain_id: Uuid,
    pub original_prompt: String,
    pub refined_prompt: String,
    pub evaluation: EvaluationResult,
    pub selected_capabilities: Vec<String>,
    pub rationale: String,
    pub outcomes: Vec<InvocationOutcome>,
    pub final_output: String,
    pub total_duration_ms: u64,
}

impl ChainReport {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }
}

/// Position of a chain in its execution state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainPhase {
    Pending,
    Invoking(usize),
    Recording(usize),
    Synthesizing,
    Done,
    Cancelled,
}

impl ChainPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, ChainPhase::Done | ChainPhase::Cancelled)
    }
}

/// Private per-request state. Never shared between requests.
struct ChainExecution<'a> {
    base_prompt: &'a str,
    capabilities: &'a [&'a CapabilityDescriptor],
    outcomes: Vec<InvocationOutcome>,
    pending: Option<InvocationOutcome>,
    cancelled: bool,
    final_output: String,
    phase: ChainPhase,
}

impl<'a> ChainExecution<'a> {
    fn new(base_prompt: &'a str, capabilities: &'a [&'a CapabilityDescriptor]) -> Self {
        Self {
            base_prompt,
            capabilities,
            outcomes: Vec::with_capacity(capabilities.len()),
            pending: None,
            cancelled: false,
            final_output: String::new(),
            phase: ChainPhase::Pending,
        }
    }

    async fn run(mut self, invoker: &dyn CapabilityInvoker, cancel: &CancellationToken) -> Self {
        while !self.phase.is_terminal() {
            let next = self.step(invoker, cancel).await;
            debug!(from = ?self.phase, to = ?next, "chain phase transition");
            self.phase = next;
        }
        self
    }

    async fn step(&mut self, invoker: &dyn CapabilityInvoker, cancel: &CancellationToken) -> ChainPhase {
        match self.phase {
            ChainPhase::Pending => self.next_after(None),
            ChainPhase::Invoking(i) => {
                if cancel.is_cancelled() {
                    warn!(completed = i, "chain cancelled before step");
                    self.cancelled = true;
                    return ChainPhase::Synthesizing;
                }
                let capability = self.capabilities[i];
                let prompt = build_capability_prompt(self.base_prompt, capability, &self.outcomes);
                debug!(capability = %capability.name, step = i + 1, "invoking capability");

                let outcome = match invoker.invoke(&capability.name, &prompt).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(capability = %capability.name, error = %e, "capability invocation error");
                        InvocationOutcome::failed(
                            capability.name.as_str(),
                            e.to_string(),
                            1,
                            std::time::Duration::ZERO,
                        )
                    }
                };
                self.pending = Some(outcome);
                ChainPhase::Recording(i)
            }
            ChainPhase::Recording(i) => {
                if let Some(outcome) = self.pending.take() {
                    info!(
                        capability = %outcome.capability,
                        success = outcome.success,
                        duration_ms = outcome.duration_ms,
                        "step recorded"
                    );
                    self.outcomes.push(outcome);
                }
                self.next_after(Some(i))
            }
            ChainPhase::Synthesizing => {
                self.final_output = synthesize_report(&self.outcomes);
                if self.cancelled {
                    ChainPhase::Cancelled
                } else {
                    ChainPhase::Done
                }
            }
            terminal @ (ChainPhase::Done | ChainPhase::Cancelled) => terminal,
        }
    }

    fn next_after(&self, step: Option<usize>) -> ChainPhase {
        let next = step.map_or(0, |i| i + 1);
        if next < self.capabilities.len() {
            ChainPhase::Invoking(next)
        } else {
            ChainPhase::Synthesizing
        }
    }
}

/// Selection and context shared by both run modes.
struct ChainPlan<'a> {
    chain_id: Uuid,
    original_prompt: &'a str,
    refined_prompt: String,
    evaluation: EvaluationResult,
    capabilities: Vec<&'a CapabilityDescriptor>,
    rationale: String,
}

/// Selects capabilities for a request and runs them as a chain.
///
/// The registry is shared read-only; every request builds its own chain
/// state, so one orchestrator can serve concurrent requests.
pub struct ChainOrchestrator {
    registry: Arc<CapabilityRegistry>,
    evaluator: PromptEvaluator,
    invoker: Arc<dyn CapabilityInvoker>,
    config: OrchestratorConfig,
}

impl ChainOrchestrator {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        evaluator: PromptEvaluator,
        invoker: Arc<dyn CapabilityInvoker>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            evaluator,
            invoker,
            config,
        }
    }

    pub fn with_defaults(
        registry: Arc<CapabilityRegistry>,
        invoker: Arc<dyn CapabilityInvoker>,
    ) -> Self {
        Self::new(
            registry,
            PromptEvaluator::default(),
            invoker,
            OrchestratorConfig::default(),
        )
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Evaluate, refine, select by keyword and run.
    pub async fn run_automatic(&self, prompt: &str) -> Result<ChainReport, ChainError> {
        self.run_automatic_with_cancel(prompt, &CancellationToken::new())
            .await
    }

    pub async fn run_automatic_with_cancel(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<ChainReport, ChainError> {
        let chain_id = Uuid::new_v4();
        let span = info_span!("chain", %chain_id, mode = "automatic");
        async {
            let start = Instant::now();
            let plan = self.plan_automatic(chain_id, prompt);
            self.execute(plan, start, cancel).await
        }
        .instrument(span)
        .await
    }

    /// Run exactly `names`, in order, on the unrefined prompt.
    ///
    /// Every name is resolved before anything is invoked; an unknown name
    /// fails the whole request with [`ChainError::NotFound`].
    pub async fn run_explicit<S: AsRef<str>>(
        &self,
        prompt: &str,
        names: &[S],
    ) -> Result<ChainReport, ChainError> {
        self.run_explicit_with_cancel(prompt, names, &CancellationToken::new())
            .await
    }

    pub async fn run_explicit_with_cancel<S: AsRef<str>>(
        &self,
        prompt: &str,
        names: &[S],
        cancel: &CancellationToken,
    ) -> Result<ChainReport, ChainError> {
        let chain_id = Uuid::new_v4();
        let span = info_span!("chain", %chain_id, mode = "explicit");
        async {
            let start = Instant::now();
            let plan = self.plan_explicit(chain_id, prompt, names)?;
            self.execute(plan, start, cancel).await
        }
        .instrument(span)
        .await
    }

    pub fn list_capabilities(&self) -> Vec<CapabilityDescriptor> {
        self.registry.iter().cloned().collect()
    }

    pub fn evaluate_prompt(&self, prompt: &str) -> EvaluationResult {
        self.evaluator.evaluate(prompt)
    }

    fn plan_automatic<'a>(&'a self, chain_id: Uuid, prompt: &'a str) -> ChainPlan<'a> {
        debug!(prompt, "evaluating prompt");
        let evaluation = self.evaluator.evaluate(prompt);
        let refined_prompt = evaluation.refined_prompt.clone();
        if !evaluation.is_clear {
            info!(original = prompt, refined = %refined_prompt, "prompt refined");
        }

        let keywords = extract_keywords(&refined_prompt);
        let mut capabilities: Vec<&CapabilityDescriptor> = self
            .registry
            .match_keywords(&keywords)
            .into_iter()
            .take(self.config.max_selected)
            .map(|m| m.descriptor)
            .collect();

        let fell_back = capabilities.is_empty();
        if fell_back {
            warn!(
                fallback_count = self.config.fallback_count,
                "no capabilities matched, falling back to registration order"
            );
            capabilities = self
                .registry
                .iter()
                .take(self.config.fallback_count)
                .collect();
        }

        let rationale = build_rationale(&keywords, &capabilities, fell_back);
        info!(
            capabilities = ?capabilities.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            %rationale,
            "capabilities selected"
        );

        ChainPlan {
            chain_id,
            original_prompt: prompt,
            refined_prompt,
            evaluation,
            capabilities,
            rationale,
        }
    }

    fn plan_explicit<'a, S: AsRef<str>>(
        &'a self,
        chain_id: Uuid,
        prompt: &'a str,
        names: &[S],
    ) -> Result<ChainPlan<'a>, ChainError> {
        let capabilities = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.registry
                    .get(name)
                    .ok_or_else(|| ChainError::NotFound(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        // Evaluated for the report only; the prompt is used as given.
        let evaluation = self.evaluator.evaluate(prompt);
        let rationale = format!(
            "Explicit chain: {}",
            capabilities
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(" -> ")
        );

        Ok(ChainPlan {
            chain_id,
            original_prompt: prompt,
            refined_prompt: prompt.to_string(),
            evaluation,
            capabilities,
            rationale,
        })
    }

    async fn execute(
        &self,
        plan: ChainPlan<'_>,
        start: Instant,
        cancel: &CancellationToken,
    ) -> Result<ChainReport, ChainError> {
        let execution = ChainExecution::new(&plan.refined_prompt, &plan.capabilities)
            .run(self.invoker.as_ref(), cancel)
            .await;
        let cancelled = execution.phase == ChainPhase::Cancelled;
        let ChainExecution {
            outcomes,
            final_output,
            ..
        } = execution;

        let report = ChainReport {
            chain_id: plan.chain_id,
            original_prompt: plan.original_prompt.to_string(),
            refined_prompt: plan.refined_prompt.clone(),
            evaluation: plan.evaluation,
            selected_capabilities: plan.capabilities.iter().map(|c| c.name.clone()).collect(),
            rationale: plan.rationale,
            outcomes,
            final_output,
            total_duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            steps = report.outcomes.len(),
            successes = report.success_count(),
            duration_ms = report.total_duration_ms,
            cancelled,
            "chain finished"
        );

        if cancelled {
            return Err(ChainError::Cancelled {
                completed: report.outcomes.len(),
                report: Box::new(report),
            });
        }
        Ok(report)
    }
}
