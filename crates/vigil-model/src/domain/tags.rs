use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Order-preserving tag list with no duplicates.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(Vec<String>);

impl Tags {
    /// Create an empty tag list.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Returns `true` if no tags are present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the given tag is present.
    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    /// Iterate through all tags.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|s| s.as_str())
    }

    /// Parse raw tag inputs into a normalized list.
    ///
    /// Entries containing commas are split into several tags. Duplicates
    /// keep their first position. Tags containing whitespace or quote
    /// characters are rejected.
    pub fn parse<I, S>(raw: I) -> ModelResult<Tags>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tags = Tags::new();
        for entry in raw {
            for piece in entry.as_ref().split(',') {
                let piece = piece.trim();
                if piece.is_empty() {
                    continue;
                }
                tags.push(piece)?;
            }
        }
        Ok(tags)
    }

    /// Append a tag, keeping the list unique.
    ///
    /// Returns `true` when the tag was added, `false` when it was already
    /// present.
    pub fn push(&mut self, tag: &str) -> ModelResult<bool> {
        validate_tag(tag)?;
        if self.contains(tag) {
            return Ok(false);
        }
        self.0.push(tag.to_string());
        Ok(true)
    }

    /// Append every tag from `other` that is not already present.
    pub fn merge(&mut self, other: &Tags) {
        for tag in other.iter() {
            if !self.contains(tag) {
                self.0.push(tag.to_string());
            }
        }
    }
}

impl From<Tags> for Vec<String> {
    fn from(tags: Tags) -> Self {
        tags.0
    }
}

fn validate_tag(tag: &str) -> ModelResult<()> {
    if tag.is_empty() {
        return Err(ModelError::InvalidTag("empty tag".to_string()));
    }
    if tag.chars().any(char::is_whitespace) {
        return Err(ModelError::InvalidTag(format!("tag contains whitespace: {tag}")));
    }
    if tag.contains('\'') || tag.contains('"') {
        return Err(ModelError::InvalidTag(format!("tag contains quotes: {tag}")));
    }
    Ok(())
}
