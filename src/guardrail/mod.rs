//! Output guardrail.
//!
//! Inspects a model response for spillover — explanatory prose emitted
//! where pure code was expected — before it is accepted as a replacement
//! for file content. Checks are simple substring tests, not markdown
//! parsing, and apply only to the CODE pipeline; prose headers are
//! expected in DOCS output.

use crate::classify::FileKind;

/// Decision returned by [`validate`]. Rejection never raises; the
/// orchestrator uses it to retry the step with a stricter instruction
/// or, after exhausting retries, move on without adopting the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(&'static str),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

/// Substring patterns that indicate the model answered in prose.
const SPILLOVER_PATTERNS: &[(&str, &str)] = &[
    ("## ", "markdown section header"),
    ("Act as a", "role-play preamble"),
    ("As an AI", "assistant preamble"),
    ("Here is the", "explanatory preamble"),
];

/// Validate model output destined for the given pipeline.
pub fn validate(output: &str, target: FileKind) -> Verdict {
    if target != FileKind::Code {
        return Verdict::Accepted;
    }

    for (pattern, reason) in SPILLOVER_PATTERNS {
        if output.contains(pattern) {
            return Verdict::Rejected(reason);
        }
    }

    Verdict::Accepted
}
