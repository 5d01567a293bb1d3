//! Company policy documents, looked up by topic.
//!
//! The agent layer cross-references these with the insight artifact.
//! `lookup_or_explain` never fails so callers can hand its text straight
//! back to a user.

use crate::error::{PipelineError, PipelineResult};
use std::path::{Path, PathBuf};

/// topic → document file name. Support questions share the retention doc.
static TOPICS: [(&str, &str); 3] = [
    ("pricing", "pricing_policy.md"),
    ("retention", "retention_strategy.md"),
    ("support", "retention_strategy.md"),
];

pub struct PolicyLibrary {
    dir: PathBuf,
}

impl PolicyLibrary {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn topics() -> impl Iterator<Item = &'static str> {
        TOPICS.iter().map(|(t, _)| *t)
    }

    pub fn document_for(topic: &str) -> Option<&'static str> {
        let topic = topic.trim().to_ascii_lowercase();
        TOPICS.iter().find(|(t, _)| *t == topic).map(|(_, f)| *f)
    }

    /// Raw document text for `topic`.
    pub fn lookup(&self, topic: &str) -> PipelineResult<String> {
        let file = Self::document_for(topic).ok_or_else(|| {
            PipelineError::MissingSource(format!("no documentation found for topic: {topic}"))
        })?;
        let path = self.dir.join(file);
        std::fs::read_to_string(&path).map_err(|e| {
            PipelineError::MissingSource(format!("policy document {} unavailable: {e}", path.display()))
        })
    }

    /// As lookup, but degrades to an explanatory sentence.
    pub fn lookup_or_explain(&self, topic: &str) -> String {
        match self.lookup(topic) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("policy: {e}");
                e.to_string()
            }
        }
    }
}
