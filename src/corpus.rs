//! Corpus directory scanning.
//!
//! Lists the raw documents that feed the incremental pass: regular files
//! directly inside `corpus.source_dir` whose names match
//! `corpus.include_globs`. Subdirectories are not descended into.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::models::SourceDocument;

pub fn scan_corpus(config: &CorpusConfig) -> Result<Vec<SourceDocument>> {
    let root = &config.source_dir;
    if !root.is_dir() {
        bail!("Corpus directory does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut documents = Vec::new();

    let walker = WalkDir::new(root).min_depth(1).max_depth(1);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        if !include_set.is_match(&name) {
            continue;
        }

        documents.push(SourceDocument::new(entry.path()));
    }

    // Sort for deterministic ordering
    documents.sort_by(|a, b| a.filename.cmp(&b.filename));

    Ok(documents)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
