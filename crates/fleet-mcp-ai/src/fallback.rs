//! Deterministic pattern-matching fallback model.
//!
//! Used whenever the remote model fails with anything other than a
//! validation error. Maps common phrasings to canonical commands; the
//! target server id comes from configuration, never a hard-coded value.

use async_trait::async_trait;
use tracing::debug;

use fleet_mcp_core::error::FleetResult;

use crate::model::LanguageModel;
use crate::planner::HELP_NEEDED_MARKER;

/// Case table over lowercased input.
pub struct PatternModel {
    default_server: String,
}

impl PatternModel {
    /// `default_server` is the server id substituted into generated
    /// `tool exec` and `server health` commands.
    pub fn new(default_server: impl Into<String>) -> Self {
        Self {
            default_server: default_server.into(),
        }
    }

    pub fn default_server(&self) -> &str {
        &self.default_server
    }

    fn translate(&self, input: &str) -> String {
        let lowered = input.to_lowercase();
        let server = &self.default_server;

        let matched = if contains_any(&lowered, &["list databases", "show databases"]) {
            format!("tool exec {server} listDatabases")
        } else if contains_any(
            &lowered,
            &["list collections", "show collections", "show tables"],
        ) {
            format!("tool exec {server} listCollections")
        } else if contains_any(&lowered, &["list tools", "show tools", "available tools"]) {
            "tool all".to_string()
        } else if contains_any(&lowered, &["list servers", "show servers", "which servers"]) {
            "server list".to_string()
        } else if contains_any(&lowered, &["health", "status", "ping"]) {
            format!("server health {server}")
        } else if lowered.contains("help") {
            "help".to_string()
        } else {
            format!("{HELP_NEEDED_MARKER} no offline pattern matches the request")
        };

        debug!(input, command = %matched, "pattern fallback");
        matched
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

#[async_trait]
impl LanguageModel for PatternModel {
    async fn complete(&self, prompt: &str) -> FleetResult<String> {
        Ok(self.translate(prompt))
    }

    fn name(&self) -> &str {
        "pattern-fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> PatternModel {
        PatternModel::new("docs")
    }

    #[tokio::test]
    async fn database_phrases_map_to_tool_exec() {
        assert_eq!(
            model().complete("Show databases please").await.unwrap(),
            "tool exec docs listDatabases"
        );
        assert_eq!(
            model().complete("could you list collections").await.unwrap(),
            "tool exec docs listCollections"
        );
    }

    #[tokio::test]
    async fn server_phrases_map_to_server_commands() {
        assert_eq!(
            model().complete("which servers are there").await.unwrap(),
            "server list"
        );
        assert_eq!(
            model().complete("what is the health?").await.unwrap(),
            "server health docs"
        );
    }

    #[tokio::test]
    async fn default_server_is_configurable() {
        let other = PatternModel::new("warehouse");
        assert_eq!(
            other.complete("list databases").await.unwrap(),
            "tool exec warehouse listDatabases"
        );
    }

    #[tokio::test]
    async fn unknown_input_asks_for_help() {
        let out = model().complete("write me a poem").await.unwrap();
        assert!(out.starts_with(HELP_NEEDED_MARKER));
    }

    #[tokio::test]
    async fn is_deterministic() {
        let first = model().complete("list tools").await.unwrap();
        let second = model().complete("list tools").await.unwrap();
        assert_eq!(first, second);
    }
}
