//! Text assembly for chains: selection rationale, per-step prompts and the
//! final report. Everything here is a pure function of its inputs.

use crate::capability::CapabilityDescriptor;
use crate::invoker::InvocationOutcome;

pub const NO_MATCH_RATIONALE: &str = "No capabilities matched the prompt keywords";

/// Explain why `selected` was chosen.
///
/// `fell_back` marks a selection that came from registration order rather
/// than keyword ranking.
pub fn build_rationale(
    keywords: &[String],
    selected: &[&CapabilityDescriptor],
    fell_back: bool,
) -> String {
    let names = selected
        .iter()
        .map(|d| d.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    if fell_back || selected.is_empty() {
        return if selected.is_empty() {
            NO_MATCH_RATIONALE.to_string()
        } else {
            format!("{NO_MATCH_RATIONALE}; falling back to: {names}")
        };
    }

    format!(
        "Selected based on keywords: {}. Capabilities: {}",
        keywords.join(", "),
        names
    )
}

/// Build the prompt sent to `capability`.
///
/// Successful outputs from `prior` are forwarded in execution order; failed
/// steps are left out entirely.
pub fn build_capability_prompt(
    base_prompt: &str,
    capability: &CapabilityDescriptor,
    prior: &[InvocationOutcome],
) -> String {
    let mut prompt = String::with_capacity(base_prompt.len() + 128);
    prompt.push_str(base_prompt);
    prompt.push_str(&format!(
        "\n\n[Context: you are {}. {}]",
        capability.name, capability.description
    ));

    let mut forwarded = prior.iter().filter(|o| o.success).peekable();
    if forwarded.peek().is_some() {
        prompt.push_str("\n\n[Previous Capability Results:]");
        for (i, outcome) in forwarded.enumerate() {
            prompt.push_str(&format!(
                "\n- Capability {} ({}): {}",
                i + 1,
                outcome.capability,
                outcome.output_text()
            ));
        }
        prompt.push_str("\n[Consider these results in your response]");
    }

    prompt
}

/// Render every outcome into the final chain report.
pub fn synthesize_report(outcomes: &[InvocationOutcome]) -> String {
    let mut out = String::from("=== Capability Chain Results ===\n\n");

    for (i, outcome) in outcomes.iter().enumerate() {
        out.push_str(&format!("## Step {}: {}\n", i + 1, outcome.capability));
        if outcome.success {
            out.push_str("Status: ✓ Success\n");
            if let Some(output) = &outcome.output {
                out.push_str(&format!("Output:\n{output}\n\n"));
            }
        } else {
            out.push_str("Status: ✗ Failed\n");
            if let Some(error) = &outcome.error {
                out.push_str(&format!("Error: {error}\n\n"));
            }
        }
    }

    let successes = outcomes.iter().filter(|o| o.success).count();
    out.push_str("\n=== Summary ===\n");
    out.push_str(&format!("Total Capabilities Executed: {}\n", outcomes.len()));
    out.push_str(&format!("Successful Executions: {successes}\n"));
    out
}
