//! Formats retrieved snippets into the `{context}` block of the answer prompt.

use super::retriever::Snippet;
use crate::core::config::defaults::NO_CONTEXT_FOUND;

#[derive(Debug, Clone, Default)]
pub struct RagContextBuilder {
    /// Maximum total context length in characters; `None` keeps every snippet.
    max_context_length: Option<usize>,
}

impl RagContextBuilder {
    pub fn new(max_context_length: Option<usize>) -> Self {
        Self { max_context_length }
    }

    /// Snippets in the given (ranked) order, each tagged with its source.
    pub fn build(&self, snippets: &[Snippet]) -> String {
        let mut blocks = Vec::with_capacity(snippets.len());
        let mut current_length = 0;

        for (i, snippet) in snippets.iter().enumerate() {
            let block = format!(
                "Document {}:\nSource: {}\nContent: {}\nRelevance: {:.3}",
                i + 1,
                snippet.source,
                snippet.text,
                snippet.score
            );
            // blocks are joined with a blank line
            let addition = block.chars().count() + if blocks.is_empty() { 0 } else { 2 };
            if let Some(max) = self.max_context_length {
                if current_length + addition > max {
                    break;
                }
            }
            current_length += addition;
            blocks.push(block);
        }

        if blocks.is_empty() {
            return NO_CONTEXT_FOUND.to_string();
        }
        blocks.join("\n\n")
    }

    /// Distinct sources in first-seen order.
    pub fn sources(snippets: &[Snippet]) -> Vec<String> {
        let mut sources: Vec<String> = Vec::new();
        for snippet in snippets {
            if !snippet.source.is_empty() && !sources.contains(&snippet.source) {
                sources.push(snippet.source.clone());
            }
        }
        sources
    }
}
