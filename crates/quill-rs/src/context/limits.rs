//! Per-model context window sizes.
//!
//! A static table keyed by model id, with a provider-prefix fallback for
//! ids the table doesn't know. Limits are resolved once per
//! [`ContextManager`](super::ContextManager) and never change afterwards.

/// Resolved context limits for one model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextLimits {
    /// Total context window in tokens.
    pub context_window: u32,
    /// Tokens reserved for the model's own output.
    pub output_reserve: u32,
}

impl ContextLimits {
    pub const fn new(context_window: u32, output_reserve: u32) -> Self {
        Self {
            context_window,
            output_reserve,
        }
    }

    /// Usable context: total window minus the output reserve.
    pub fn usable(&self) -> u32 {
        self.context_window.saturating_sub(self.output_reserve)
    }
}

/// Conservative fallback when neither the model id nor its provider prefix
/// is recognized.
pub const DEFAULT_LIMITS: ContextLimits = ContextLimits::new(128_000, 4_096);

/// Known model ids and their limits (OpenRouter-style identifiers).
const MODEL_LIMITS: &[(&str, ContextLimits)] = &[
    ("anthropic/claude-sonnet-4", ContextLimits::new(200_000, 8_192)),
    ("anthropic/claude-opus-4", ContextLimits::new(200_000, 8_192)),
    ("anthropic/claude-3.5-haiku", ContextLimits::new(200_000, 8_192)),
    ("openai/gpt-4o", ContextLimits::new(128_000, 16_384)),
    ("openai/gpt-4o-mini", ContextLimits::new(128_000, 16_384)),
    ("openai/gpt-4.1", ContextLimits::new(1_047_576, 32_768)),
    ("google/gemini-2.5-pro", ContextLimits::new(1_048_576, 8_192)),
    ("google/gemini-2.5-flash", ContextLimits::new(1_048_576, 8_192)),
    ("z-ai/glm-4.6", ContextLimits::new(200_000, 8_192)),
];

/// Provider-prefix fallbacks for unknown model ids.
const PROVIDER_LIMITS: &[(&str, ContextLimits)] = &[
    ("anthropic/", ContextLimits::new(200_000, 8_192)),
    ("openai/", ContextLimits::new(128_000, 16_384)),
    ("google/", ContextLimits::new(1_048_576, 8_192)),
];

/// Resolve context limits for a model id.
///
/// Exact match first, then provider prefix, then [`DEFAULT_LIMITS`].
pub fn limits_for_model(model: &str) -> ContextLimits {
    if let Some((_, limits)) = MODEL_LIMITS.iter().find(|(id, _)| *id == model) {
        return *limits;
    }
    if let Some((_, limits)) = PROVIDER_LIMITS
        .iter()
        .find(|(prefix, _)| model.starts_with(prefix))
    {
        return *limits;
    }
    DEFAULT_LIMITS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_resolves_exactly() {
        let limits = limits_for_model("anthropic/claude-sonnet-4");
        assert_eq!(limits.context_window, 200_000);
        assert_eq!(limits.output_reserve, 8_192);
    }

    #[test]
    fn unknown_model_falls_back_to_provider_prefix() {
        let limits = limits_for_model("anthropic/claude-next-9");
        assert_eq!(limits, ContextLimits::new(200_000, 8_192));

        let limits = limits_for_model("openai/gpt-7-nano");
        assert_eq!(limits, ContextLimits::new(128_000, 16_384));
    }

    #[test]
    fn unknown_provider_uses_default() {
        assert_eq!(limits_for_model("acme/some-model"), DEFAULT_LIMITS);
        assert_eq!(limits_for_model("not-even-a-slash"), DEFAULT_LIMITS);
    }

    #[test]
    fn usable_subtracts_reserve() {
        let limits = ContextLimits::new(100_000, 8_000);
        assert_eq!(limits.usable(), 92_000);
    }

    #[test]
    fn usable_saturates_when_reserve_exceeds_window() {
        let limits = ContextLimits::new(1_000, 8_000);
        assert_eq!(limits.usable(), 0);
    }
}
