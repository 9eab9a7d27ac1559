use std::sync::Arc;

use crate::error::{FmtError, Result};
use crate::language::LanguageFormatter;

/// The set of languages the format goal knows about, fixed at startup.
#[derive(Clone, Default)]
pub struct FmtRegistry {
    languages: Vec<Arc<dyn LanguageFormatter>>,
}

impl FmtRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a language. Language names must be unique.
    pub fn register(mut self, language: Arc<dyn LanguageFormatter>) -> Result<Self> {
        if self
            .languages
            .iter()
            .any(|existing| existing.language() == language.language())
        {
            return Err(FmtError::DuplicateLanguage(language.language().to_string()));
        }
        self.languages.push(language);
        Ok(self)
    }

    /// Languages in registration order.
    pub fn languages(&self) -> &[Arc<dyn LanguageFormatter>] {
        &self.languages
    }

    pub fn len(&self) -> usize {
        self.languages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }
}

impl std::fmt::Debug for FmtRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.languages.iter().map(|l| l.language().to_string()))
            .finish()
    }
}
