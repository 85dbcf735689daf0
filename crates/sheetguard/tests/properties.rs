//! Property tests for the validation pipeline

mod common;

use common::orders_file;
use proptest::prelude::*;
use sheetguard::{
    check_syntax, classify, ErrorKind, RepairLoop, RepairOptions, RepairState, ScalarValue,
};
use tempfile::TempDir;

const SHEETS: [&str; 2] = ["Raw_Orders", "Summary"];

fn config(default_cases: u32) -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default_cases);
    ProptestConfig {
        cases,
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

fn operand() -> impl Strategy<Value = String> {
    prop_oneof![
        (1u32..500).prop_map(|n| n.to_string()),
        (0u16..8, 1u32..50).prop_map(|(c, r)| format!("{}{}", (b'A' + c as u8) as char, r)),
        Just("Raw_Orders!C2".to_string()),
        Just("SUM(C:C)".to_string()),
        Just("\"(\"".to_string()),
    ]
}

fn formula() -> impl Strategy<Value = String> {
    prop::collection::vec((operand(), prop_oneof![Just("+"), Just("*"), Just("/")]), 1..5)
        .prop_map(|parts| {
            let mut text = String::from("=");
            for (i, (op, sep)) in parts.iter().enumerate() {
                if i > 0 {
                    text.push_str(sep);
                }
                text.push_str(op);
            }
            text
        })
}

proptest! {
    #![proptest_config(config(256))]

    #[test]
    fn unbalanced_parentheses_are_syntax_errors(body in formula(), extra in 1usize..4, closing in any::<bool>()) {
        let parens = if closing { ")".repeat(extra) } else { "(".repeat(extra) };
        let text = format!("{}{}", body, parens);

        let rejection = check_syntax(&text, &SHEETS).unwrap_err();

        prop_assert_eq!(rejection.kind, ErrorKind::SyntaxError);
    }

    #[test]
    fn balanced_formulas_pass_syntax(body in formula()) {
        let normalized = check_syntax(&body, &SHEETS).unwrap();
        prop_assert_eq!(normalized, body);
    }

    #[test]
    fn classify_is_total(text in ".{0,40}") {
        let kind = classify(&text);
        prop_assert!(ErrorKind::ALL.contains(&kind));
    }
}

proptest! {
    // Every case touches the file system
    #![proptest_config(config(12))]

    #[test]
    fn attempts_never_exceed_max_retries(body in formula(), max_retries in 0usize..5, fallback in any::<bool>()) {
        let dir = TempDir::new().unwrap();
        let path = orders_file(&dir);
        let mut options = RepairOptions::default().with_max_retries(max_retries);
        if fallback {
            options = options.with_fallback(ScalarValue::Number(0.0));
        }

        let outcome = RepairLoop::new(options).run(&path, "Summary", "D5", &body).unwrap();

        prop_assert!(outcome.attempts.len() <= max_retries);
        prop_assert!(outcome.state.is_terminal());
        prop_assert_eq!(outcome.used_fallback, outcome.state == RepairState::FallbackUsed);
        prop_assert_eq!(&outcome.original_formula, &body);
        if outcome.state == RepairState::Succeeded {
            prop_assert!(outcome.attempts.last().unwrap().result.success);
        }
    }

    #[test]
    fn literal_zero_division_never_writes(body in formula()) {
        let dir = TempDir::new().unwrap();
        let path = orders_file(&dir);
        let before = std::fs::read(&path).unwrap();

        let result = sheetguard::write_and_evaluate_formula(&path, "Summary", "D5", &format!("{}/0", body)).unwrap();

        prop_assert_eq!(result.error, Some(ErrorKind::DivisionByZero));
        prop_assert_eq!(std::fs::read(&path).unwrap(), before);
    }
}
