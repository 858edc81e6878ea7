//! Context assembly under a character budget.
//!
//! Snippets are joined with a separator and accumulated in order. A snippet
//! that would push the context past the budget is left out and the next one
//! is tried. Snippets are never cut. Lengths are counted in characters,
//! separators included, so the result never exceeds the budget.
//!
//! Two sources of snippets:
//! - retrieval mode passes the retriever's ordered output to [`ContextAssembler::assemble`];
//! - sampling mode draws random fixed-length windows from enriched texts
//!   with [`ContextAssembler::sample`].

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct ContextAssembler {
    char_budget: usize,
    separator: String,
    min_snippet_len: usize,
}

impl ContextAssembler {
    pub fn new(char_budget: usize, separator: impl Into<String>) -> Self {
        Self {
            char_budget,
            separator: separator.into(),
            min_snippet_len: 1,
        }
    }

    /// Window length in sampling mode; shorter texts are not eligible.
    pub fn with_min_snippet_len(mut self, len: usize) -> Self {
        self.min_snippet_len = len.max(1);
        self
    }

    pub fn char_budget(&self) -> usize {
        self.char_budget
    }

    /// Whole snippets in the given order, up to the budget.
    pub fn assemble(&self, snippets: &[String]) -> Result<String> {
        if snippets.iter().all(|s| s.trim().is_empty()) {
            return Err(Error::NoContextAvailable {
                reason: "no snippets to assemble".to_string(),
            });
        }

        let context = self.fill(snippets.iter().filter(|s| !s.trim().is_empty()));
        if context.is_empty() {
            return Err(Error::NoContextAvailable {
                reason: format!(
                    "every snippet is longer than the {} character budget",
                    self.char_budget
                ),
            });
        }
        Ok(context)
    }

    /// Random windows from `texts`, shuffled, up to the budget.
    pub fn sample<R: Rng + ?Sized>(&self, texts: &[String], rng: &mut R) -> Result<String> {
        let windows = self.sample_windows(texts, rng);
        if windows.is_empty() {
            return Err(Error::NoContextAvailable {
                reason: format!(
                    "no text has at least {} characters",
                    self.min_snippet_len
                ),
            });
        }

        let context = self.fill(windows.iter());
        if context.is_empty() {
            return Err(Error::NoContextAvailable {
                reason: format!(
                    "a {} character window does not fit the {} character budget",
                    self.min_snippet_len, self.char_budget
                ),
            });
        }
        Ok(context)
    }

    /// One window of `min_snippet_len` characters per eligible text, at a
    /// random offset, in shuffled order.
    pub fn sample_windows<R: Rng + ?Sized>(&self, texts: &[String], rng: &mut R) -> Vec<String> {
        let len = self.min_snippet_len;
        let mut windows: Vec<String> = texts
            .iter()
            .filter_map(|text| {
                let chars: Vec<char> = text.chars().collect();
                if chars.len() < len {
                    return None;
                }
                let start = rng.random_range(0..=chars.len() - len);
                Some(chars[start..start + len].iter().collect())
            })
            .collect();
        windows.shuffle(rng);
        windows
    }

    fn fill<'s>(&self, snippets: impl Iterator<Item = &'s String>) -> String {
        let sep_len = self.separator.chars().count();
        let mut context = String::new();
        let mut used = 0usize;

        for snippet in snippets {
            let overhead = if context.is_empty() { 0 } else { sep_len };
            let len = snippet.chars().count();
            if used + overhead + len > self.char_budget {
                continue;
            }
            if !context.is_empty() {
                context.push_str(&self.separator);
            }
            context.push_str(snippet);
            used += overhead + len;
        }

        context
    }
}
