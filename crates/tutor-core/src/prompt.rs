//! System prompt library
//!
//! Prompts are markdown fragments in a directory (`<dir>/<name>.md`). A role
//! names an ordered list of fragments joined with a blank line.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, TutorError};

/// Used when no fragment for a role could be loaded
pub const FALLBACK_PROMPT: &str = "You are a helpful programming tutor. Guide the student toward the answer with questions, and use the file tools to look at their code when it helps.";

const SEPARATOR: &str = "\n\n";

#[derive(Debug)]
pub struct PromptLibrary {
    dir: PathBuf,
    cache: HashMap<String, String>,
}

impl PromptLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: HashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fragment names making up `role`
    pub fn parts_for(role: &str) -> &'static [&'static str] {
        match role {
            "simple" => &["simple_tutor", "tool_usage"],
            "short" => &["short_tutor", "tool_usage"],
            _ => &["socratic_tutor", "problem_progression", "tool_usage"],
        }
    }

    /// Load one fragment, trimmed
    pub fn load(&mut self, name: &str) -> Result<String> {
        if let Some(cached) = self.cache.get(name) {
            return Ok(cached.clone());
        }

        let path = self.dir.join(format!("{name}.md"));
        if !path.is_file() {
            return Err(TutorError::Configuration(format!(
                "Prompt file not found: {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(&path)?.trim().to_string();
        self.cache.insert(name.to_string(), content.clone());
        Ok(content)
    }

    /// Join the fragments that load; missing ones are skipped with a warning
    pub fn combine(&mut self, names: &[&str]) -> String {
        let mut parts = Vec::with_capacity(names.len());
        for name in names {
            match self.load(name) {
                Ok(content) => parts.push(content),
                Err(e) => tracing::warn!(prompt = %name, error = %e, "Could not load prompt"),
            }
        }
        parts.join(SEPARATOR)
    }

    /// Full system prompt for `role`
    pub fn system_prompt(&mut self, role: &str) -> String {
        let prompt = self.combine(Self::parts_for(role));
        if prompt.is_empty() {
            tracing::warn!(role = %role, dir = %self.dir.display(), "No prompts loaded, using built-in prompt");
            return FALLBACK_PROMPT.to_string();
        }
        prompt
    }

    /// `base` fragments followed by free-form additions
    pub fn custom(&mut self, base: &[&str], additions: &str) -> String {
        let prompt = self.combine(base);
        if prompt.is_empty() {
            return additions.to_string();
        }
        format!("{prompt}{SEPARATOR}{additions}")
    }

    /// Names of every fragment in the directory, sorted
    pub fn available(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        let mut names: Vec<String> = entries
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "md"))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        names
    }

    /// Drop cached fragments so edits on disk are picked up
    pub fn reload(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> (tempfile::TempDir, PromptLibrary) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("simple_tutor.md"), "Be direct.\n").unwrap();
        fs::write(dir.path().join("tool_usage.md"), "\nUse tools.\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let library = PromptLibrary::new(dir.path());
        (dir, library)
    }

    #[test]
    fn test_role_prompt_is_joined_in_order() {
        let (_dir, mut library) = library();
        assert_eq!(library.system_prompt("simple"), "Be direct.\n\nUse tools.");
    }

    #[test]
    fn test_missing_parts_are_skipped() {
        let (_dir, mut library) = library();
        // socratic_tutor and problem_progression do not exist
        assert_eq!(library.system_prompt("tutor"), "Use tools.");
    }

    #[test]
    fn test_fallback_when_nothing_loads() {
        let mut library = PromptLibrary::new("/no/such/prompt/dir");
        assert_eq!(library.system_prompt("tutor"), FALLBACK_PROMPT);
        assert!(library.available().is_empty());
    }

    #[test]
    fn test_cache_until_reload() {
        let (dir, mut library) = library();
        assert_eq!(library.load("simple_tutor").unwrap(), "Be direct.");

        fs::write(dir.path().join("simple_tutor.md"), "Changed.").unwrap();
        assert_eq!(library.load("simple_tutor").unwrap(), "Be direct.");

        library.reload();
        assert_eq!(library.load("simple_tutor").unwrap(), "Changed.");
    }

    #[test]
    fn test_available_and_custom() {
        let (_dir, mut library) = library();
        assert_eq!(library.available(), vec!["simple_tutor", "tool_usage"]);
        assert_eq!(
            library.custom(&["tool_usage"], "Focus on Rust."),
            "Use tools.\n\nFocus on Rust."
        );
    }
}
