use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Catalog identity of an audiobook. Lower ids were imported first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(RecordId)
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    M4b,
    M4a,
    Mp3,
    Opus,
    Ogg,
    Flac,
    Aac,
    Wav,
    #[default]
    Other,
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::M4b => "m4b",
            Self::M4a => "m4a",
            Self::Mp3 => "mp3",
            Self::Opus => "opus",
            Self::Ogg => "ogg",
            Self::Flac => "flac",
            Self::Aac => "aac",
            Self::Wav => "wav",
            Self::Other => "other",
        };
        write!(f, "{s}")
    }
}

impl AudioFormat {
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "m4b" => Self::M4b,
            "m4a" => Self::M4a,
            "mp3" => Self::Mp3,
            "opus" => Self::Opus,
            "ogg" | "oga" => Self::Ogg,
            "flac" => Self::Flac,
            "aac" => Self::Aac,
            "wav" => Self::Wav,
            _ => Self::Other,
        }
    }
}

/// A catalog entry as the duplicate workflow sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudiobookRecord {
    pub id: RecordId,
    pub title: String,
    pub author: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrator: Option<String>,

    #[serde(default)]
    pub format: AudioFormat,

    #[serde(default)]
    pub duration_seconds: u64,

    #[serde(default)]
    pub file_size_bytes: u64,

    pub file_path: String,

    /// SHA-256 of the file; absent until a hashing pass has run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,

    #[serde(default = "default_edition_count")]
    pub edition_count: u32,

    #[serde(default)]
    pub supplement_count: u32,
}

fn default_edition_count() -> u32 {
    1
}

impl AudiobookRecord {
    pub fn new(id: impl Into<RecordId>, title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            author: author.into(),
            narrator: None,
            format: AudioFormat::Other,
            duration_seconds: 0,
            file_size_bytes: 0,
            file_path: String::new(),
            content_hash: None,
            edition_count: 1,
            supplement_count: 0,
        }
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    pub fn with_size(mut self, bytes: u64) -> Self {
        self.file_size_bytes = bytes;
        self
    }

    pub fn with_editions(mut self, editions: u32) -> Self {
        self.edition_count = editions;
        self
    }

    /// `"12h 5m"` style duration, as shown in listings.
    pub fn duration_formatted(&self) -> String {
        let hours = self.duration_seconds / 3600;
        let minutes = (self.duration_seconds % 3600) / 60;
        format!("{hours}h {minutes}m")
    }
}

/// An audiobook about to enter the catalog. The store assigns its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAudiobook {
    pub title: String,
    pub author: String,
    pub narrator: Option<String>,
    pub format: AudioFormat,
    pub duration_seconds: u64,
    pub file_size_bytes: u64,
    pub file_path: String,
    pub content_hash: Option<String>,
    pub edition_count: u32,
    pub supplement_count: u32,
    pub genres: Vec<String>,
}

impl NewAudiobook {
    pub fn new(title: impl Into<String>, author: impl Into<String>, file_path: impl Into<String>) -> Self {
        let file_path = file_path.into();
        let format = std::path::Path::new(&file_path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(AudioFormat::from_extension)
            .unwrap_or_default();
        Self {
            title: title.into(),
            author: author.into(),
            narrator: None,
            format,
            duration_seconds: 0,
            file_size_bytes: 0,
            file_path,
            content_hash: None,
            edition_count: 1,
            supplement_count: 0,
            genres: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_format_from_extension() {
        assert_eq!(AudioFormat::from_extension("m4b"), AudioFormat::M4b);
        assert_eq!(AudioFormat::from_extension(".OPUS"), AudioFormat::Opus);
        assert_eq!(AudioFormat::from_extension("xyz"), AudioFormat::Other);
    }

    #[test]
    fn test_record_id_parse() {
        assert_eq!("42".parse::<RecordId>().unwrap(), RecordId(42));
        assert!("abc".parse::<RecordId>().is_err());
    }

    #[test]
    fn test_duration_formatted() {
        let mut rec = AudiobookRecord::new(1, "Dune", "Frank Herbert");
        rec.duration_seconds = 21 * 3600 + 2 * 60 + 59;
        assert_eq!(rec.duration_formatted(), "21h 2m");
    }

    #[test]
    fn test_record_json_defaults() {
        let rec: AudiobookRecord = serde_json::from_str(
            r#"{"id": 7, "title": "Emma", "author": "Jane Austen", "file_path": "/a/emma.m4b"}"#,
        )
        .unwrap();
        assert_eq!(rec.id, RecordId(7));
        assert_eq!(rec.edition_count, 1);
        assert!(rec.content_hash.is_none());
    }
}
