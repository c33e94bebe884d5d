//! `documentsQuery`: passage retrieval over a local document folder.
//!
//! [`DocumentIndex::load`] reads every `.txt` and `.md` file in a directory,
//! cuts them into passages of roughly [`PASSAGE_CHARS`] characters along
//! paragraph breaks, and ranks passages against a query by term overlap
//! weighted with inverse document frequency. The index is read-only once
//! built and shared behind an `Arc`.

use agentloop_core::error::ToolError;
use agentloop_core::tool::Tool;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::required_str;

pub const PASSAGE_CHARS: usize = 1000;
pub const NO_MATCH: &str = "No relevant passages found in the documents.";

const DESCRIPTION: &str = "documents about the Hong Kong Securities and Futures Commission's \
Online Distribution and Advisory Platforms Guilelines - useful for questions about selling \
investments online in Hong Kong, the core principles, requirements, robo-advice, client \
profiling, suitability requirement and other conduct requirements applicable to the sale of \
investment products, and guidelines about complex products.";

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "how", "in", "is", "it",
    "of", "on", "or", "that", "the", "to", "was", "what", "when", "which", "who", "with",
];

/// One retrievable chunk of a source document.
#[derive(Debug, Clone)]
pub struct Passage {
    pub source: String,
    pub text: String,
    terms: HashMap<String, usize>,
}

#[derive(Debug, Default)]
pub struct DocumentIndex {
    passages: Vec<Passage>,
    /// Number of passages containing each term
    doc_freq: HashMap<String, usize>,
}

impl DocumentIndex {
    /// Build an index from `(source, text)` pairs.
    pub fn from_documents<S, T>(documents: impl IntoIterator<Item = (S, T)>) -> Self
    where
        S: Into<String>,
        T: AsRef<str>,
    {
        let mut index = Self::default();
        for (source, text) in documents {
            let source = source.into();
            for chunk in split_passages(text.as_ref(), PASSAGE_CHARS) {
                let terms = term_counts(&chunk);
                for term in terms.keys() {
                    *index.doc_freq.entry(term.clone()).or_default() += 1;
                }
                index.passages.push(Passage {
                    source: source.clone(),
                    text: chunk,
                    terms,
                });
            }
        }
        index
    }

    /// Load every `.txt` / `.md` file directly inside `dir`.
    ///
    /// Fails when the directory cannot be read or holds no text at all, so the
    /// caller can leave the tool out of the catalog.
    pub fn load(dir: &Path) -> Result<Self, ToolError> {
        let unavailable = |reason: String| ToolError::Unavailable(format!("{}: {reason}", dir.display()));

        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .map_err(|e| unavailable(e.to_string()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && matches!(
                        p.extension().and_then(|e| e.to_str()),
                        Some("txt") | Some("md")
                    )
            })
            .collect();
        paths.sort();

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| unavailable(format!("{}: {e}", path.display())))?;
            let source = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            documents.push((source, text));
        }

        let index = Self::from_documents(documents);
        if index.is_empty() {
            return Err(unavailable("no passages to index".into()));
        }
        info!(dir = %dir.display(), passages = index.len(), "Document index loaded");
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Best `top_k` passages for `query`, highest score first. Passages that
    /// share no term with the query are never returned.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<&Passage> {
        let query_terms: HashSet<String> = term_counts(query).into_keys().collect();
        let n = self.passages.len() as f64;

        let mut scored: Vec<(f64, usize)> = self
            .passages
            .iter()
            .enumerate()
            .filter_map(|(i, passage)| {
                let score: f64 = query_terms
                    .iter()
                    .filter_map(|term| {
                        let tf = *passage.terms.get(term)? as f64;
                        let df = self.doc_freq.get(term).copied().unwrap_or(1) as f64;
                        Some((1.0 + tf.ln()) * (1.0 + n / df).ln())
                    })
                    .sum();
                (score > 0.0).then_some((score, i))
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        scored
            .into_iter()
            .take(top_k)
            .map(|(_, i)| &self.passages[i])
            .collect()
    }
}

/// Greedily pack paragraphs into passages of at most `max_chars` characters.
/// A single paragraph longer than that is split on word boundaries.
fn split_passages(text: &str, max_chars: usize) -> Vec<String> {
    let mut passages = Vec::new();
    let mut current = String::new();

    let paragraphs = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty());

    for paragraph in paragraphs {
        for piece in split_long(paragraph, max_chars) {
            let needed = if current.is_empty() { 0 } else { 2 } + piece.chars().count();
            if !current.is_empty() && current.chars().count() + needed > max_chars {
                passages.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(&piece);
        }
    }
    if !current.is_empty() {
        passages.push(current);
    }
    passages
}

fn split_long(paragraph: &str, max_chars: usize) -> Vec<String> {
    if paragraph.chars().count() <= max_chars {
        return vec![paragraph.to_string()];
    }
    let mut pieces = Vec::new();
    let mut current = String::new();
    for word in paragraph.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > max_chars {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

fn term_counts(text: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 1)
    {
        let word = word.to_lowercase();
        if !STOPWORDS.contains(&word.as_str()) {
            *counts.entry(word).or_insert(0) += 1;
        }
    }
    counts
}

pub struct DocumentsQueryTool {
    index: Arc<DocumentIndex>,
    top_k: usize,
}

impl DocumentsQueryTool {
    pub fn new(index: Arc<DocumentIndex>, top_k: usize) -> Self {
        Self {
            index,
            top_k: top_k.max(1),
        }
    }
}

#[async_trait]
impl Tool for DocumentsQueryTool {
    fn name(&self) -> &str {
        "documentsQuery"
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "input": { "type": "string", "description": "What to look for in the documents" }
            },
            "required": ["input"]
        })
    }

    async fn invoke(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let query = required_str(&arguments, "input")?;
        let hits = self.index.search(query, self.top_k);
        debug!(query, hits = hits.len(), "Document search");

        if hits.is_empty() {
            return Ok(NO_MATCH.into());
        }
        Ok(hits
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> DocumentIndex {
        DocumentIndex::from_documents([
            (
                "platforms.md",
                "Robo-advice platforms must assess client suitability.\n\n\
                 Client profiling covers risk tolerance and investment horizon.",
            ),
            (
                "complex.md",
                "Complex products require additional disclosure and warning statements.",
            ),
        ])
    }

    #[test]
    fn search_ranks_matching_passages() {
        let index = sample_index();
        let hits = index.search("What disclosure do complex products need?", 2);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, "complex.md");
    }

    #[test]
    fn unrelated_query_finds_nothing() {
        let index = sample_index();
        assert!(index.search("volcano eruptions", 3).is_empty());
    }

    #[test]
    fn long_documents_are_split() {
        let paragraph = "word ".repeat(150);
        let text = [paragraph.as_str(); 4].join("\n\n");
        let passages = split_passages(&text, PASSAGE_CHARS);
        assert!(passages.len() > 1);
        assert!(passages.iter().all(|p| p.chars().count() <= PASSAGE_CHARS));

        let huge = "token ".repeat(500);
        let pieces = split_passages(&huge, 100);
        assert!(pieces.iter().all(|p| p.chars().count() <= 100));
    }

    #[test]
    fn load_reads_text_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "Suitability requirement applies.").unwrap();
        std::fs::write(dir.path().join("b.md"), "Robo-advice guidance.").unwrap();
        std::fs::write(dir.path().join("c.pdf"), "ignored suitability").unwrap();

        let index = DocumentIndex::load(dir.path()).unwrap();
        assert_eq!(index.len(), 2);
        let hits = index.search("suitability", 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, "a.txt");
    }

    #[test]
    fn load_fails_for_missing_or_empty_dir() {
        assert!(DocumentIndex::load(Path::new("/nonexistent/docs")).is_err());
        let dir = tempfile::tempdir().unwrap();
        let err = DocumentIndex::load(dir.path()).unwrap_err();
        assert!(matches!(err, ToolError::Unavailable(_)));
    }

    #[tokio::test]
    async fn tool_returns_passages() {
        let tool = DocumentsQueryTool::new(Arc::new(sample_index()), 4);
        let out = tool
            .invoke(serde_json::json!({"input": "client profiling"}))
            .await
            .unwrap();
        assert!(out.contains("Client profiling covers risk tolerance"));

        let out = tool
            .invoke(serde_json::json!({"input": "volcano"}))
            .await
            .unwrap();
        assert_eq!(out, NO_MATCH);
    }
}
