//! Model context window limits registry.
//!
//! Provides known context window sizes for common models, with user
//! overrides supplied through configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Known model context window sizes.
pub const KNOWN_MODEL_LIMITS: &[(&str, u32)] = &[
    // OpenAI models
    ("gpt-4o", 128_000),
    ("gpt-4o-mini", 128_000),
    ("gpt-4-turbo", 128_000),
    ("gpt-4", 8_192),
    ("gpt-3.5-turbo", 16_385),
    // DeepSeek models
    ("deepseek-chat", 64_000),
    ("deepseek-reasoner", 64_000),
    // Anthropic models
    ("claude-3-5-sonnet", 200_000),
    ("claude-3-opus", 200_000),
    ("claude-3-haiku", 200_000),
    // Default fallback
    ("default", 128_000),
];

/// Model limit configuration (user-overridable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelLimit {
    /// Model identifier (partial match supported, e.g., "gpt-4" matches "gpt-4o")
    pub model_pattern: String,
    /// Maximum context window size in tokens
    pub max_context_tokens: u32,
}

impl ModelLimit {
    pub fn new(model_pattern: impl Into<String>, max_context_tokens: u32) -> Self {
        Self {
            model_pattern: model_pattern.into(),
            max_context_tokens,
        }
    }
}

/// Registry for model limits with built-in defaults and user overrides.
#[derive(Debug, Clone, Default)]
pub struct ModelLimitsRegistry {
    /// User-provided overrides (higher priority than built-in)
    user_limits: HashMap<String, ModelLimit>,
}

impl ModelLimitsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overrides(limits: impl IntoIterator<Item = ModelLimit>) -> Self {
        let mut registry = Self::new();
        for limit in limits {
            registry.add_limit(limit);
        }
        registry
    }

    pub fn add_limit(&mut self, limit: ModelLimit) {
        self.user_limits.insert(limit.model_pattern.clone(), limit);
    }

    /// Get limit for a model, with user overrides taking priority.
    ///
    /// # Matching Strategy
    /// 1. Exact match (user first, then built-in)
    /// 2. Model contains pattern (e.g., "gpt-4o-mini-2024" contains "gpt-4o-mini")
    ///
    /// For partial matches, the longest (most specific) pattern wins.
    pub fn get(&self, model: &str) -> Option<ModelLimit> {
        if let Some(limit) = self.user_limits.get(model) {
            return Some(limit.clone());
        }

        if let Some((_, tokens)) = KNOWN_MODEL_LIMITS.iter().find(|(pattern, _)| *pattern == model) {
            return Some(ModelLimit::new(model, *tokens));
        }

        let best_user_match = self
            .user_limits
            .iter()
            .filter(|(pattern, _)| model.contains(pattern.as_str()))
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(_, limit)| limit.clone());
        if best_user_match.is_some() {
            return best_user_match;
        }

        KNOWN_MODEL_LIMITS
            .iter()
            .filter(|(pattern, _)| *pattern != "default" && model.contains(*pattern))
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(pattern, tokens)| ModelLimit::new(*pattern, *tokens))
    }

    /// Get limit for a model with fallback to default.
    pub fn get_or_default(&self, model: &str) -> ModelLimit {
        self.get(model).unwrap_or_else(|| {
            let default = KNOWN_MODEL_LIMITS
                .iter()
                .find(|(k, _)| *k == "default")
                .map(|(_, v)| *v)
                .unwrap_or(128_000);
            ModelLimit::new("default", default)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_finds_builtin_by_exact_match() {
        let registry = ModelLimitsRegistry::new();
        let limit = registry.get("deepseek-chat").expect("Should find deepseek-chat");
        assert_eq!(limit.max_context_tokens, 64_000);
    }

    #[test]
    fn registry_prefers_longest_partial_match() {
        let registry = ModelLimitsRegistry::new();
        let limit = registry.get("gpt-4o-mini-2024-07-18").expect("Should match gpt-4o-mini");
        assert_eq!(limit.model_pattern, "gpt-4o-mini");
        assert_eq!(registry.get("gpt-4-0613").unwrap().max_context_tokens, 8_192);
    }

    #[test]
    fn registry_returns_default_for_unknown() {
        let registry = ModelLimitsRegistry::new();
        assert!(registry.get("unknown-model-xyz").is_none());
        let limit = registry.get_or_default("unknown-model-xyz");
        assert_eq!(limit.model_pattern, "default");
        assert_eq!(limit.max_context_tokens, 128_000);
    }

    #[test]
    fn user_override_takes_precedence() {
        let registry = ModelLimitsRegistry::with_overrides([
            ModelLimit::new("deepseek-chat", 32_000),
            ModelLimit::new("local", 4_096),
        ]);

        assert_eq!(registry.get("deepseek-chat").unwrap().max_context_tokens, 32_000);
        assert_eq!(registry.get("local-llama-3").unwrap().max_context_tokens, 4_096);
    }
}
