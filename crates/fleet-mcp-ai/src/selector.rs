//! Model-tier selection per request.

/// Model size tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    /// Small model for latency-sensitive requests
    Fast,
    Default,
    /// Large model for long or analytical prompts
    Reasoning,
}

/// Prompts longer than this, in characters, go to the reasoning tier.
const REASONING_CHAR_THRESHOLD: usize = 500;

/// Prompts longer than this, in words, go to the reasoning tier.
const REASONING_WORD_THRESHOLD: usize = 100;

/// Words that push a prompt to the reasoning tier on their own.
const REASONING_TRIGGERS: &[&str] = &["analyze", "compare", "explain why", "reasoning", "complex"];

/// Pick a tier: fast when asked for, reasoning for long or analytical
/// prompts, default otherwise.
pub fn select_tier(prompt: &str, fast_requested: bool) -> ModelTier {
    if fast_requested {
        return ModelTier::Fast;
    }
    if prompt.chars().count() > REASONING_CHAR_THRESHOLD
        || prompt.split_whitespace().count() > REASONING_WORD_THRESHOLD
    {
        return ModelTier::Reasoning;
    }
    let lowered = prompt.to_lowercase();
    if REASONING_TRIGGERS
        .iter()
        .any(|trigger| lowered.contains(trigger))
    {
        return ModelTier::Reasoning;
    }
    ModelTier::Default
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_wins_when_requested() {
        assert_eq!(select_tier("analyze everything", true), ModelTier::Fast);
    }

    #[test]
    fn long_prompts_get_the_reasoning_tier() {
        let long = "x".repeat(501);
        assert_eq!(select_tier(&long, false), ModelTier::Reasoning);

        let wordy = "word ".repeat(101);
        assert_eq!(select_tier(&wordy, false), ModelTier::Reasoning);
    }

    #[test]
    fn trigger_words_get_the_reasoning_tier() {
        assert_eq!(
            select_tier("please Compare these servers", false),
            ModelTier::Reasoning
        );
        assert_eq!(
            select_tier("explain why this failed", false),
            ModelTier::Reasoning
        );
    }

    #[test]
    fn short_plain_prompts_get_the_default_tier() {
        assert_eq!(select_tier("list databases", false), ModelTier::Default);
    }
}
