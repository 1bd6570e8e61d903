//! Intent analysis over a user utterance and the tool catalog.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use fleet_mcp_core::types::ToolCatalog;

/// Broad classes of user intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    DatabaseOperation,
    FileOperation,
    ServerOperation,
    Analysis,
    Conversational,
    Unknown,
}

/// Analyzed intent with a confidence score in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub kind: IntentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    pub reasoning: String,
    pub confidence: f64,
    /// Sub-requests when the utterance looks multi-step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_steps: Vec<String>,
}

lazy_static! {
    /// Conjunctions and ordinal cues splitting a multi-step request.
    static ref STEP_SEPARATOR: Regex =
        Regex::new(r"(?i)\b(?:and\s+then|then|after\s+that|afterwards|finally)\b").unwrap();
}

const DATABASE_WORDS: &[&str] = &[
    "database", "collection", "table", "query", "document", "index", "record",
];
const FILE_WORDS: &[&str] = &["file", "directory", "folder", "path", "read file", "write file"];
const SERVER_WORDS: &[&str] = &["server", "connect", "health", "status", "ping", "tool"];
const ANALYSIS_WORDS: &[&str] = &["analyze", "compare", "summarize", "explain", "why", "report"];
const CONVERSATIONAL_WORDS: &[&str] = &["hello", "hi ", "thanks", "thank you", "how are you"];

/// Classify an utterance against the catalog snapshot.
pub fn analyze(utterance: &str, catalog: &ToolCatalog) -> Intent {
    let lowered = utterance.to_lowercase();

    let scores = [
        (IntentKind::DatabaseOperation, hits(&lowered, DATABASE_WORDS)),
        (IntentKind::FileOperation, hits(&lowered, FILE_WORDS)),
        (IntentKind::Analysis, hits(&lowered, ANALYSIS_WORDS)),
        (IntentKind::ServerOperation, hits(&lowered, SERVER_WORDS)),
        (IntentKind::Conversational, hits(&lowered, CONVERSATIONAL_WORDS)),
    ];
    let (kind, best) = scores
        .into_iter()
        .max_by_key(|(_, score)| *score)
        .unwrap_or((IntentKind::Unknown, 0));
    let kind = if best == 0 { IntentKind::Unknown } else { kind };

    // A tool named in the utterance pins both tool and server.
    let (tool, server) = find_named_tool(&lowered, catalog);

    let confidence = if best == 0 {
        0.2
    } else {
        (0.4 + 0.15 * best as f64 + if tool.is_some() { 0.2 } else { 0.0 }).min(0.95)
    };

    let suggested_steps = split_steps(utterance);

    Intent {
        kind,
        reasoning: format!("matched {best} cue(s) for {kind:?}"),
        tool,
        server,
        parameters: Map::new(),
        confidence,
        suggested_steps,
    }
}

/// True when the utterance carries conjunction or ordinal cues.
pub fn is_multi_step(utterance: &str) -> bool {
    STEP_SEPARATOR.is_match(utterance)
}

fn hits(lowered: &str, words: &[&str]) -> usize {
    words.iter().filter(|word| lowered.contains(*word)).count()
}

fn find_named_tool(lowered: &str, catalog: &ToolCatalog) -> (Option<String>, Option<String>) {
    for (server_id, tools) in catalog {
        for tool in tools {
            if lowered.contains(&tool.name.to_lowercase()) {
                return (Some(tool.name.clone()), Some(server_id.clone()));
            }
        }
    }
    (None, None)
}

fn split_steps(utterance: &str) -> Vec<String> {
    let parts: Vec<String> = STEP_SEPARATOR
        .split(utterance)
        .map(|part| part.trim().trim_start_matches(',').trim().to_string())
        .filter(|part| !part.is_empty())
        .collect();
    if parts.len() > 1 {
        parts
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_mcp_core::types::Tool;
    use std::collections::HashMap;

    fn catalog() -> ToolCatalog {
        let mut catalog = HashMap::new();
        catalog.insert(
            "docs".to_string(),
            vec![Tool::new(
                "listDatabases",
                "enumerate databases",
                serde_json::json!({"type": "object"}),
            )],
        );
        catalog
    }

    #[test]
    fn database_utterances_classify() {
        let intent = analyze("show me every database and collection", &catalog());
        assert_eq!(intent.kind, IntentKind::DatabaseOperation);
        assert!(intent.confidence > 0.5);
    }

    #[test]
    fn named_tool_pins_server() {
        let intent = analyze("run listDatabases for me", &catalog());
        assert_eq!(intent.tool.as_deref(), Some("listDatabases"));
        assert_eq!(intent.server.as_deref(), Some("docs"));
    }

    #[test]
    fn gibberish_is_unknown_with_low_confidence() {
        let intent = analyze("flibber jabberwock", &catalog());
        assert_eq!(intent.kind, IntentKind::Unknown);
        assert!(intent.confidence <= 0.2);
    }

    #[test]
    fn multi_step_cues_split() {
        assert!(is_multi_step("list databases then count the collections"));
        assert!(!is_multi_step("list databases"));

        let intent = analyze(
            "list the databases, then show collections, finally ping the server",
            &catalog(),
        );
        assert_eq!(intent.suggested_steps.len(), 3);
        assert_eq!(intent.suggested_steps[0], "list the databases");
    }
}
