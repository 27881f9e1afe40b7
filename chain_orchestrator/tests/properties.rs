//! Property tests for the prompt heuristics and keyword ranking.

use chain_orchestrator::{
    extract_keywords, CapabilityDescriptor, CapabilityRegistry, PromptEvaluator,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn confidence_stays_in_unit_interval(prompt in ".{0,400}") {
        let result = PromptEvaluator::default().evaluate(&prompt);
        prop_assert!((0.0..=1.0).contains(&result.confidence));
    }

    #[test]
    fn long_prompts_stay_bounded(word in "[a-z/().]{1,12}", repeat in 1usize..2_000) {
        let prompt = vec![word; repeat].join(" ");
        let result = PromptEvaluator::default().evaluate(&prompt);
        prop_assert!((0.0..=1.0).contains(&result.confidence));
    }

    #[test]
    fn refinement_never_lowers_confidence(prompt in "[a-zA-Z ./()]{0,60}") {
        let evaluator = PromptEvaluator::default();
        let first = evaluator.evaluate(&prompt);
        if !first.is_clear && !prompt.trim().is_empty() {
            let second = evaluator.evaluate(&first.refined_prompt);
            prop_assert!(second.confidence >= first.confidence);
        }
    }

    #[test]
    fn keyword_extraction_is_deterministic(prompt in ".{0,200}") {
        let first = extract_keywords(&prompt);
        prop_assert_eq!(&first, &extract_keywords(&prompt));
        let mut deduped = first.clone();
        deduped.sort();
        deduped.dedup();
        prop_assert_eq!(deduped.len(), first.len());
    }

    #[test]
    fn ranking_is_sorted_and_positive(
        keyword_sets in prop::collection::vec(
            prop::collection::vec(prop::sample::select(vec!["a", "b", "c", "d"]), 0..4),
            0..8,
        ),
        query in prop::collection::vec(prop::sample::select(vec!["a", "b", "c", "d"]), 0..4),
    ) {
        let mut registry = CapabilityRegistry::new();
        for (i, keywords) in keyword_sets.iter().enumerate() {
            registry
                .add(CapabilityDescriptor::new(format!("cap-{i}"), "").with_keywords(keywords.iter().copied()))
                .unwrap();
        }
        let query: Vec<String> = query.into_iter().map(String::from).collect();
        let ranked = registry.match_keywords(&query);

        for pair in ranked.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
            if pair[0].score == pair[1].score {
                let index = |name: &str| registry.names().iter().position(|n| *n == name);
                prop_assert!(index(pair[0].descriptor.name.as_str()) < index(pair[1].descriptor.name.as_str()));
            }
        }
        prop_assert!(ranked.iter().all(|m| m.score > 0.0));
    }
}
