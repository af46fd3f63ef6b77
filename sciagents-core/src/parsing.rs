//! Structured-output parsing for model responses.
//!
//! Models are asked for JSON, but often wrap it in prose or a fenced code
//! block. Parsing is attempted strictly first, then once more on a repaired
//! candidate: the body of a ```json fence if there is one, otherwise the
//! outermost `{...}` span. Anything still unparseable is surfaced as
//! [`StructuredOutput::Unparsed`] carrying the raw text.

use crate::error::ParseError;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static JSON_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```(?:json|JSON)[ \t]*\r?\n?([\s\S]*?)```").expect("fence pattern is valid")
});

/// A record type that an agent asks the model to produce.
pub trait OutputSchema: Serialize + DeserializeOwned {
    /// A representative value rendered as the JSON skeleton in the prompt.
    fn schema_example() -> serde_json::Value;

    /// Instructions appended to the agent's system prompt.
    fn format_instructions() -> String {
        let skeleton = serde_json::to_string_pretty(&Self::schema_example())
            .unwrap_or_else(|_| "{}".to_string());
        format!(
            "Respond with a single JSON object with exactly these fields and nothing else:\n```json\n{}\n```",
            skeleton
        )
    }
}

/// Raw model output that could not be coerced into the target record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseFailure {
    pub error: String,
    pub raw: String,
}

impl ParseFailure {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            error: "Failed to parse".to_string(),
            raw: raw.into(),
        }
    }
}

/// Outcome of [`parse_with_repair`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StructuredOutput<T> {
    Parsed(T),
    Unparsed(ParseFailure),
}

impl<T> StructuredOutput<T> {
    pub fn is_parsed(&self) -> bool {
        matches!(self, StructuredOutput::Parsed(_))
    }

    pub fn parsed(self) -> Option<T> {
        match self {
            StructuredOutput::Parsed(value) => Some(value),
            StructuredOutput::Unparsed(_) => None,
        }
    }

    /// The raw text when parsing failed.
    pub fn raw(&self) -> Option<&str> {
        match self {
            StructuredOutput::Parsed(_) => None,
            StructuredOutput::Unparsed(failure) => Some(&failure.raw),
        }
    }
}

/// Deserialize the whole (trimmed) text as `T`.
pub fn parse_strict<T: DeserializeOwned>(text: &str) -> Result<T, ParseError> {
    serde_json::from_str(text.trim()).map_err(|e| ParseError::MalformedJson {
        message: e.to_string(),
    })
}

/// Best-effort JSON candidate extracted from free text.
pub fn repair_json(text: &str) -> &str {
    if let Some(body) = JSON_FENCE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|body| !body.is_empty())
    {
        return body;
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text.trim(),
    }
}

/// Extract a JSON object from free text.
pub fn extract_json_object(text: &str) -> Result<serde_json::Value, ParseError> {
    let candidate = repair_json(text);
    if !(candidate.starts_with('{') && candidate.ends_with('}')) {
        return Err(ParseError::NoJsonObject);
    }
    parse_strict(candidate)
}

/// Parse `text` as `T`, attempting a single repair pass on failure.
pub fn parse_with_repair<T: DeserializeOwned>(text: &str) -> StructuredOutput<T> {
    if let Ok(value) = parse_strict(text) {
        return StructuredOutput::Parsed(value);
    }
    match parse_strict(repair_json(text)) {
        Ok(value) => StructuredOutput::Parsed(value),
        Err(e) => {
            tracing::debug!(error = %e, "Model output could not be repaired");
            StructuredOutput::Unparsed(ParseFailure::new(text))
        }
    }
}

/// Extract the value following `LABEL:` in a labelled text response.
///
/// Leading whitespace (including newlines) after the colon is skipped; the
/// value ends at the next newline or at the first of `stop_labels`.
pub fn extract_field(text: &str, label: &str, stop_labels: &[&str]) -> Option<String> {
    let marker = format!("{}:", label);
    let start = text.find(&marker)? + marker.len();
    let rest = text[start..].trim_start();
    let mut end = rest.find('\n').unwrap_or(rest.len());
    for stop in stop_labels {
        if let Some(pos) = rest[..end].find(stop) {
            end = end.min(pos);
        }
    }
    let value = rest[..end].trim().trim_matches('*').trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Extract the first decimal number following `LABEL:`.
pub fn extract_number(text: &str, label: &str) -> Option<f64> {
    let field = extract_field(text, label, &[])?;
    let number: String = field
        .chars()
        .skip_while(|c| !c.is_ascii_digit() && *c != '.')
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    number.trim_end_matches('.').parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        statement: String,
        confidence: f64,
    }

    impl OutputSchema for Sample {
        fn schema_example() -> serde_json::Value {
            serde_json::json!({"statement": "string", "confidence": 0.5})
        }
    }

    #[test]
    fn test_parse_strict() {
        let parsed: Sample = parse_strict(r#" {"statement": "x", "confidence": 0.9} "#).unwrap();
        assert_eq!(parsed.confidence, 0.9);
        assert!(parse_strict::<Sample>("not json").is_err());
    }

    #[test]
    fn test_parse_with_repair_prose_wrapped() {
        let text = "Sure! Here is my answer: {\"statement\": \"F = ma\", \"confidence\": 0.8} Hope it helps.";
        let out: StructuredOutput<Sample> = parse_with_repair(text);
        assert_eq!(
            out,
            StructuredOutput::Parsed(Sample {
                statement: "F = ma".into(),
                confidence: 0.8
            })
        );
    }

    #[test]
    fn test_parse_with_repair_fenced() {
        let text = "Analysis below.\n```json\n{\"statement\": \"rate ~ T\", \"confidence\": 0.6}\n```\nNote: {braces} later.";
        let out: StructuredOutput<Sample> = parse_with_repair(text);
        assert!(out.is_parsed());
    }

    #[test]
    fn test_parse_with_repair_failure_payload() {
        let out: StructuredOutput<Sample> = parse_with_repair("no json here at all");
        assert_eq!(out.raw(), Some("no json here at all"));
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"error": "Failed to parse", "raw": "no json here at all"})
        );
    }

    #[test]
    fn test_repair_json_greedy_span() {
        assert_eq!(repair_json("a {\"x\": {\"y\": 1}} b"), "{\"x\": {\"y\": 1}}");
        assert_eq!(repair_json("  nothing  "), "nothing");
        assert_eq!(repair_json("} backwards {"), "} backwards {");
    }

    #[test]
    fn test_extract_json_object() {
        assert!(extract_json_object("prefix {\"a\": 1} suffix").is_ok());
        assert!(matches!(
            extract_json_object("no object"),
            Err(ParseError::NoJsonObject)
        ));
        assert!(matches!(
            extract_json_object("{broken"),
            Err(ParseError::NoJsonObject)
        ));
        assert!(matches!(
            extract_json_object("{\"a\": }"),
            Err(ParseError::MalformedJson { .. })
        ));
    }

    #[test]
    fn test_format_instructions_contains_skeleton() {
        let instructions = Sample::format_instructions();
        assert!(instructions.contains("\"statement\""));
        assert!(instructions.contains("```json"));
    }

    #[test]
    fn test_extract_field_labelled_text() {
        let text = "HYPOTHESIS: Acceleration is proportional to force.\nCONFIDENCE: 0.85\nMATHEMATICAL_MODEL: a = F/m\nVARIABLES: force, acceleration, mass\n";
        assert_eq!(
            extract_field(text, "HYPOTHESIS", &["CONFIDENCE"]).as_deref(),
            Some("Acceleration is proportional to force.")
        );
        assert_eq!(
            extract_field(text, "VARIABLES", &[]).as_deref(),
            Some("force, acceleration, mass")
        );
        assert_eq!(extract_number(text, "CONFIDENCE"), Some(0.85));
        assert_eq!(extract_field(text, "REASONING", &[]), None);
    }

    #[test]
    fn test_extract_field_stops_at_label_on_same_line() {
        let text = "HYPOTHESIS: Heat speeds reactions CONFIDENCE: 0.7";
        assert_eq!(
            extract_field(text, "HYPOTHESIS", &["CONFIDENCE"]).as_deref(),
            Some("Heat speeds reactions")
        );
        assert_eq!(extract_number(text, "CONFIDENCE"), Some(0.7));
    }

    #[test]
    fn test_extract_field_skips_newline_after_colon() {
        let text = "HYPOTHESIS:\n  Light drives growth\nCONFIDENCE: high";
        assert_eq!(
            extract_field(text, "HYPOTHESIS", &["CONFIDENCE"]).as_deref(),
            Some("Light drives growth")
        );
        assert_eq!(extract_number(text, "CONFIDENCE"), None);
    }
}
