//! Context management: token estimation, per-model limits, and the
//! pruning/compaction policy.
//!
//! Submodules:
//!
//! 1. [`estimator`]: pure, deterministic chars/4 token estimation over
//!    messages and their parts.
//! 2. [`limits`]: static per-model context window table with a
//!    provider-prefix fallback.
//! 3. [`manager`]: [`ContextManager`] with thresholds, tool-output pruning,
//!    summarizing compaction, and the combined per-turn policy.

pub mod estimator;
pub mod limits;
pub mod manager;

pub use estimator::{estimate_conversation, estimate_message, estimate_text};
pub use limits::{ContextLimits, limits_for_model};
pub use manager::{
    COMPACT_THRESHOLD, ContextAction, ContextManager, ContextStats, PRUNE_MIN_SAVINGS_TOKENS,
    PRUNE_PROTECT_TOKENS, PRUNE_THRESHOLD, PRUNED_PLACEHOLDER,
};
