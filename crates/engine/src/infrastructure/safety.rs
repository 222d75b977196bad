//! Safety-category lookup table.
//!
//! Backends report harm categories with their own identifiers. The gateway
//! translates them into short tags that are shown to the user as-is, so the
//! convergence loop never sees backend-specific names.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct SafetyCategoryMap {
    tags: HashMap<String, String>,
}

impl SafetyCategoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, category: impl Into<String>, tag: impl Into<String>) -> Self {
        self.tags.insert(category.into(), tag.into());
        self
    }

    /// Harm categories of the Google Generative Language API.
    pub fn gemini() -> Self {
        Self::new()
            .with("HARM_CATEGORY_HATE_SPEECH", "hate speech")
            .with("HARM_CATEGORY_DANGEROUS_CONTENT", "dangerous content")
            .with("HARM_CATEGORY_SEXUALLY_EXPLICIT", "sexually explicit")
            .with("HARM_CATEGORY_HARASSMENT", "harassment")
            .with("HARM_CATEGORY_CIVIC_INTEGRITY", "civic integrity")
    }

    /// Tag for `category`. Unknown categories are humanized rather than
    /// dropped: `HARM_CATEGORY_NEW_THING` becomes `new thing`.
    pub fn tag(&self, category: &str) -> String {
        if let Some(tag) = self.tags.get(category) {
            return tag.clone();
        }
        category
            .trim_start_matches("HARM_CATEGORY_")
            .replace('_', " ")
            .to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_categories_use_their_tag() {
        let map = SafetyCategoryMap::gemini();
        assert_eq!(map.tag("HARM_CATEGORY_HARASSMENT"), "harassment");
    }

    #[test]
    fn unknown_categories_are_humanized() {
        let map = SafetyCategoryMap::new();
        assert_eq!(map.tag("HARM_CATEGORY_MEDICAL_ADVICE"), "medical advice");
        assert_eq!(map.tag("OTHER"), "other");
    }
}
