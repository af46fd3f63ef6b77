//! Property-based tests for core components using proptest.

use proptest::prelude::*;

use sciagents_core::domain::Domain;
use sciagents_core::parsing::extract_field;
use sciagents_core::schemas::clamp_unit;
use sciagents_core::simulation::{GenericSimulator, linspace};
use sciagents_core::stats::{correlation_p_value, pearson};

// --- Statistics ---

proptest! {
    #[test]
    fn pearson_is_bounded(
        x in prop::collection::vec(-1e6f64..1e6, 0..50),
        y in prop::collection::vec(-1e6f64..1e6, 0..50),
    ) {
        let r = pearson(&x, &y);
        prop_assert!(r.is_finite());
        prop_assert!((-1.0..=1.0).contains(&r));
    }

    #[test]
    fn p_value_is_a_probability(r in -1.0f64..=1.0, n in 0usize..500) {
        let p = correlation_p_value(r, n);
        prop_assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn stronger_correlation_is_more_significant(r in 0.05f64..0.9, n in 5usize..80) {
        prop_assert!(correlation_p_value(r + 0.05, n) <= correlation_p_value(r, n) + 1e-9);
    }

    #[test]
    fn clamp_unit_stays_in_range(v in prop::num::f64::ANY) {
        let c = clamp_unit(v);
        prop_assert!((0.0..=1.0).contains(&c));
    }
}

// --- Domains and parsing ---

proptest! {
    #[test]
    fn classify_never_panics(text in ".{0,200}") {
        let domain = Domain::classify(&text);
        prop_assert!(Domain::ALL.contains(&domain));
    }

    #[test]
    fn ph_prefixed_words_do_not_shift_domain(words in prop::collection::vec("ph[aeiou]{1,6}", 1..5)) {
        let question = format!("How does force affect acceleration in the {}?", words.join(" "));
        prop_assert_eq!(Domain::classify(&question), Domain::Physics);
    }

    #[test]
    fn extracted_fields_are_trimmed(value in "[A-Za-z0-9 ]{0,40}") {
        let text = format!("HYPOTHESIS: {}\nCONFIDENCE: 0.5", value);
        match extract_field(&text, "HYPOTHESIS", &["CONFIDENCE:"]) {
            Some(found) => {
                prop_assert_eq!(found.trim(), found.as_str());
                prop_assert!(!found.is_empty());
            }
            None => prop_assert!(value.trim().is_empty()),
        }
    }
}

// --- Simulation ---

proptest! {
    #[test]
    fn linspace_hits_both_ends(start in -1e3f64..1e3, span in 0.1f64..1e3, count in 2usize..200) {
        let values = linspace(start, start + span, count);
        prop_assert_eq!(values.len(), count);
        prop_assert!((values[0] - start).abs() < 1e-9);
        prop_assert!((values[count - 1] - (start + span)).abs() < 1e-6);
    }

    #[test]
    fn simulator_output_is_always_finite(
        seed in any::<u64>(),
        levels in prop::collection::vec(-1e3f64..1e3, 1..20),
    ) {
        let sim = GenericSimulator::with_seed(seed);
        let mut params = serde_json::Map::new();
        params.insert("levels".into(), serde_json::json!(levels));
        let out = sim.run_experiment("general", &params, &["response".to_string()]);
        prop_assert!(out.data.values().all(|s| s.iter().all(|v| v.is_finite())));
    }
}
