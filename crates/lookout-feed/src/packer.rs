//! Content packer — turns raw discovered content into a bounded digest.
//!
//! The packer's job is bounding, merging, and deduplicating; the fallback
//! extraction algorithms themselves belong to the external [`TextAnalyzer`].
//! Every section prefers structure the extraction stage already produced and
//! falls back to heuristic extraction only when that structure is absent.

use std::collections::HashSet;
use std::sync::Arc;

use lookout_core::{
    defaults, split_sentences, truncate_at_boundary, PackedDigest, RawContent, TextAnalyzer,
    TimelineEntry,
};

/// Bounds applied to a packed digest.
#[derive(Debug, Clone, Copy)]
pub struct PackerBounds {
    pub max_summary_sentences: usize,
    pub max_facts: usize,
    pub fact_min_chars: usize,
    pub max_entities: usize,
    pub max_timeline: usize,
    pub content_budget: usize,
}

impl Default for PackerBounds {
    fn default() -> Self {
        Self {
            max_summary_sentences: defaults::PACK_SUMMARY_SENTENCES,
            max_facts: defaults::PACK_MAX_FACTS,
            fact_min_chars: defaults::PACK_FACT_MIN_CHARS,
            max_entities: defaults::PACK_MAX_ENTITIES,
            max_timeline: defaults::PACK_MAX_TIMELINE,
            content_budget: defaults::PACK_CONTENT_BUDGET,
        }
    }
}

/// Packs [`RawContent`] into a [`PackedDigest`] and composes the memory
/// content string.
#[derive(Clone)]
pub struct ContentPacker {
    analyzer: Arc<dyn TextAnalyzer>,
    bounds: PackerBounds,
}

impl ContentPacker {
    pub fn new(analyzer: Arc<dyn TextAnalyzer>) -> Self {
        Self {
            analyzer,
            bounds: PackerBounds::default(),
        }
    }

    /// Override the digest bounds (mainly for tests).
    pub fn with_bounds(mut self, bounds: PackerBounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Produce the bounded digest for one piece of content.
    pub fn pack(&self, content: &RawContent) -> PackedDigest {
        PackedDigest {
            summary: self.pack_summary(content),
            facts: self.pack_facts(content),
            entities: self.pack_entities(content),
            timeline: self.pack_timeline(content),
        }
    }

    /// Summary from existing summary/why-it-matters text, capped by sentence
    /// count. Falls back to the opening sentences of the full text.
    fn pack_summary(&self, content: &RawContent) -> String {
        let mut sentences: Vec<String> = Vec::new();

        if let Some(summary) = content.summary.as_deref() {
            sentences.extend(split_sentences(summary));
        }
        if let Some(why) = content.why_it_matters.as_deref() {
            sentences.extend(split_sentences(why));
        }
        if sentences.is_empty() {
            sentences = split_sentences(&content.full_text);
        }

        sentences.truncate(self.bounds.max_summary_sentences);
        sentences.join(" ")
    }

    /// Facts prefer existing structure; heuristic key points otherwise.
    /// Entries below the minimum length are dropped either way.
    fn pack_facts(&self, content: &RawContent) -> Vec<String> {
        let existing: Vec<String> = content
            .facts
            .iter()
            .map(|f| f.trim().to_string())
            .filter(|f| f.len() >= self.bounds.fact_min_chars)
            .collect();

        let mut facts = if existing.is_empty() {
            self.analyzer
                .extract_key_points(&content.full_text, self.bounds.max_facts)
                .into_iter()
                .map(|f| f.trim().to_string())
                .filter(|f| f.len() >= self.bounds.fact_min_chars)
                .collect()
        } else {
            existing
        };

        facts.truncate(self.bounds.max_facts);
        facts
    }

    /// Entity names, deduplicated case-insensitively, existing metadata
    /// winning over heuristic extraction.
    fn pack_entities(&self, content: &RawContent) -> Vec<String> {
        let source = if content.entities.is_empty() {
            self.analyzer.extract_entities(&content.full_text)
        } else {
            content.entities.clone()
        };

        let mut seen: HashSet<String> = HashSet::new();
        let mut entities = Vec::new();
        for entity in source {
            let name = entity.name.trim().to_string();
            if name.is_empty() {
                continue;
            }
            if seen.insert(name.to_lowercase()) {
                entities.push(name);
            }
            if entities.len() == self.bounds.max_entities {
                break;
            }
        }
        entities
    }

    /// Timeline entries require both a date and a description.
    fn pack_timeline(&self, content: &RawContent) -> Vec<TimelineEntry> {
        let valid = |entry: &TimelineEntry| {
            !entry.date.trim().is_empty() && !entry.content.trim().is_empty()
        };

        let existing: Vec<TimelineEntry> = content
            .timeline
            .iter()
            .filter(|e| valid(e))
            .cloned()
            .collect();

        let mut timeline = if existing.is_empty() {
            self.analyzer
                .extract_timeline(&content.full_text)
                .into_iter()
                .filter(|e| valid(e))
                .collect()
        } else {
            existing
        };

        timeline.truncate(self.bounds.max_timeline);
        timeline
    }

    /// Compose the memory content string fed to the agent, truncated to the
    /// character budget at a sentence or word boundary.
    pub fn compose_memory_content(&self, content: &RawContent, digest: &PackedDigest) -> String {
        let mut sections: Vec<String> = Vec::new();

        sections.push(format!("# {}", content.title));
        if let Some(url) = content.url.as_deref() {
            sections.push(format!("Source: {url}"));
        }
        if !digest.summary.is_empty() {
            sections.push(digest.summary.clone());
        }
        if !digest.facts.is_empty() {
            let facts = digest
                .facts
                .iter()
                .map(|f| format!("- {f}"))
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(format!("Key facts:\n{facts}"));
        }
        if !digest.entities.is_empty() {
            sections.push(format!("Entities: {}", digest.entities.join(", ")));
        }
        if !digest.timeline.is_empty() {
            let timeline = digest
                .timeline
                .iter()
                .map(|e| format!("- {}: {}", e.date, e.content))
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(format!("Timeline:\n{timeline}"));
        }

        truncate_at_boundary(&sections.join("\n\n"), self.bounds.content_budget)
    }
}
