//! Recent searches, most recent first, persisted as a JSON array.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::SearchConfig;

#[derive(Debug, Clone)]
pub struct RecentSearches {
    path: PathBuf,
    max: usize,
    terms: Vec<String>,
}

impl RecentSearches {
    /// Load from `config.history_path`. A missing or corrupt file starts an
    /// empty list.
    pub fn load(config: &SearchConfig) -> Self {
        Self {
            terms: read_terms(&config.history_path, config.max_recent),
            path: config.history_path.clone(),
            max: config.max_recent.max(1),
        }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Put `term` first, dropping any case-insensitive duplicate and
    /// anything beyond the limit. Blank terms are ignored.
    pub fn add(&mut self, term: &str) -> io::Result<()> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(());
        }
        let lowered = term.to_lowercase();
        self.terms.retain(|t| t.to_lowercase() != lowered);
        self.terms.insert(0, term.to_string());
        self.terms.truncate(self.max);
        self.save()
    }

    pub fn clear(&mut self) -> io::Result<()> {
        self.terms.clear();
        self.save()
    }

    fn save(&self) -> io::Result<()> {
        let json = serde_json::to_string(&self.terms)?;
        fs::write(&self.path, json).inspect_err(|err| {
            tracing::error!(
                path = %self.path.display(),
                error = %err,
                "failed to save recent searches"
            );
        })
    }
}

fn read_terms(path: &Path, max: usize) -> Vec<String> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to read recent searches");
            return Vec::new();
        }
    };
    match serde_json::from_str::<Vec<String>>(&contents) {
        Ok(mut terms) => {
            terms.truncate(max);
            terms
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to parse recent searches");
            Vec::new()
        }
    }
}
