//! Typer configuration.

use std::sync::Arc;

use crate::error::Severity;
use crate::resolver::{CoercionDistance, MatchPolicy, DEFAULT_MAX_UNION_EXPANSION};

/// How an `EXCLUDE` path that matches nothing is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExcludePolicy {
    #[default]
    Warn,
    Error,
}

impl ExcludePolicy {
    /// Severity of an unresolvable `EXCLUDE` path. The only place this choice
    /// is made.
    pub fn severity(self) -> Severity {
        match self {
            ExcludePolicy::Warn => Severity::Warning,
            ExcludePolicy::Error => Severity::Error,
        }
    }
}

/// Options for [`PlanTyper`](crate::PlanTyper).
#[derive(Debug, Clone)]
pub struct TyperConfig {
    pub exclude_policy: ExcludePolicy,
    pub match_policy: Arc<dyn MatchPolicy>,
    /// Upper bound on union member combinations tried per call.
    pub max_union_expansion: usize,
}

impl Default for TyperConfig {
    fn default() -> Self {
        Self {
            exclude_policy: ExcludePolicy::default(),
            match_policy: Arc::new(CoercionDistance),
            max_union_expansion: DEFAULT_MAX_UNION_EXPANSION,
        }
    }
}

impl TyperConfig {
    pub fn with_exclude_policy(mut self, policy: ExcludePolicy) -> Self {
        self.exclude_policy = policy;
        self
    }

    pub fn with_match_policy(mut self, policy: impl MatchPolicy + 'static) -> Self {
        self.match_policy = Arc::new(policy);
        self
    }

    pub fn with_max_union_expansion(mut self, limit: usize) -> Self {
        self.max_union_expansion = limit;
        self
    }
}
