use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ShelfError;

/// Rule by which two records count as duplicates of one another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EquivalenceMode {
    /// Identical, known content hashes.
    #[serde(rename = "hash")]
    ExactContent,
    /// Same normalized title and author.
    #[default]
    #[serde(rename = "title")]
    TitleAuthor,
}

impl EquivalenceMode {
    pub const ALL: [EquivalenceMode; 2] = [EquivalenceMode::ExactContent, EquivalenceMode::TitleAuthor];

    /// Tag used on the wire and in config files.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExactContent => "hash",
            Self::TitleAuthor => "title",
        }
    }

    /// Label for the non-keeper byte total in this mode.
    pub fn savings_label(self) -> &'static str {
        match self {
            Self::ExactContent => "wasted",
            Self::TitleAuthor => "potential savings",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::ExactContent => "Files with identical content (SHA-256)",
            Self::TitleAuthor => "Audiobooks with the same title and author",
        }
    }
}

impl fmt::Display for EquivalenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EquivalenceMode {
    type Err = ShelfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hash" | "exact" | "content" | "exact-content" => Ok(Self::ExactContent),
            "title" | "title-author" | "fuzzy" => Ok(Self::TitleAuthor),
            other => Err(ShelfError::ValidationError(format!(
                "unknown duplicate mode '{other}' (expected 'hash' or 'title')"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_wire_tags() {
        assert_eq!(
            serde_json::to_string(&EquivalenceMode::ExactContent).unwrap(),
            "\"hash\""
        );
        let mode: EquivalenceMode = serde_json::from_str("\"title\"").unwrap();
        assert_eq!(mode, EquivalenceMode::TitleAuthor);
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("HASH".parse::<EquivalenceMode>().unwrap(), EquivalenceMode::ExactContent);
        assert_eq!("title-author".parse::<EquivalenceMode>().unwrap(), EquivalenceMode::TitleAuthor);
        assert!("size".parse::<EquivalenceMode>().is_err());
    }
}
