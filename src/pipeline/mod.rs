//! Pipeline configuration table.
//!
//! Maps a file classification to its ordered list of transformation
//! steps. Each step carries a persona prompt; steps are applied
//! sequentially, each step's output feeding the next step's input.
//! A builder lets tests substitute fake personas without touching the
//! defaults.

use std::collections::HashMap;

use crate::classify::FileKind;

/// One transformation step: a persona applied to the evolving content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStep {
    /// Stable identifier, used in commit messages and logs.
    pub id: &'static str,
    /// Human-readable label.
    pub label: &'static str,
    /// Role persona embedded in the composed prompt.
    pub persona: String,
}

impl PipelineStep {
    pub fn new(id: &'static str, label: &'static str, persona: impl Into<String>) -> Self {
        Self {
            id,
            label,
            persona: persona.into(),
        }
    }
}

/// The classification → steps mapping for a session.
#[derive(Debug, Clone)]
pub struct PipelineTable {
    steps: HashMap<FileKind, Vec<PipelineStep>>,
    /// Persona for the roadmap (instructions rewrite) sub-flow.
    roadmap_persona: String,
}

impl PipelineTable {
    /// Ordered steps for a classification. Every kind has at least one
    /// step in the default table; a substituted table may leave a kind
    /// empty, which the orchestrator treats as "nothing to do".
    pub fn steps_for(&self, kind: FileKind) -> &[PipelineStep] {
        self.steps.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn roadmap_persona(&self) -> &str {
        &self.roadmap_persona
    }

    pub fn builder() -> PipelineTableBuilder {
        PipelineTableBuilder::default()
    }
}

impl Default for PipelineTable {
    fn default() -> Self {
        Self::builder()
            .steps(
                FileKind::Code,
                vec![
                    PipelineStep::new(
                        "refactor",
                        "structural refactor",
                        "You are a senior software engineer. Refactor the following source \
                         file for clarity and maintainability without changing its observable \
                         behavior. Return only the complete, updated file content.",
                    ),
                    PipelineStep::new(
                        "harden",
                        "robustness pass",
                        "You are a defensive-programming specialist. Improve error handling \
                         and input validation in the following source file without changing \
                         its public interface. Return only the complete, updated file content.",
                    ),
                ],
            )
            .steps(
                FileKind::Config,
                vec![PipelineStep::new(
                    "tidy-config",
                    "configuration hygiene",
                    "You are a build-and-release engineer. Normalize and tidy the following \
                     configuration file, preserving every key and value's meaning. Return \
                     only the complete, updated file content.",
                )],
            )
            .steps(
                FileKind::Docs,
                vec![PipelineStep::new(
                    "clarify-docs",
                    "documentation clarity",
                    "You are a technical writer. Improve the clarity and structure of the \
                     following document while preserving all factual content. Return only \
                     the complete, updated document.",
                )],
            )
            .roadmap_persona(
                "You are the project's planning assistant. Given the roadmap below and the \
                 name of a file that was just improved, update the roadmap to reflect the \
                 completed work and sharpen the next priorities. Return only the complete, \
                 updated roadmap.",
            )
            .build()
    }
}

/// Builder so tests can substitute fake personas.
#[derive(Debug, Default)]
pub struct PipelineTableBuilder {
    steps: HashMap<FileKind, Vec<PipelineStep>>,
    roadmap_persona: Option<String>,
}

impl PipelineTableBuilder {
    pub fn steps(mut self, kind: FileKind, steps: Vec<PipelineStep>) -> Self {
        self.steps.insert(kind, steps);
        self
    }

    pub fn roadmap_persona(mut self, persona: impl Into<String>) -> Self {
        self.roadmap_persona = Some(persona.into());
        self
    }

    pub fn build(self) -> PipelineTable {
        PipelineTable {
            steps: self.steps,
            roadmap_persona: self.roadmap_persona.unwrap_or_default(),
        }
    }
}
