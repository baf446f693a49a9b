use serde::{Deserialize, Serialize};

/// Progress of the content-hashing pass, shaped like the `/hash-stats` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HashStats {
    pub hash_column_exists: bool,
    pub total_audiobooks: usize,
    pub hashed_count: usize,
    pub unhashed_count: usize,
    pub duplicate_groups: usize,
    #[serde(default)]
    pub hashed_percentage: f64,
}

impl HashStats {
    pub fn new(total: usize, hashed: usize, duplicate_groups: usize) -> Self {
        let hashed_percentage = if total > 0 {
            (hashed as f64 * 1000.0 / total as f64).round() / 10.0
        } else {
            0.0
        };
        Self {
            hash_column_exists: true,
            total_audiobooks: total,
            hashed_count: hashed,
            unhashed_count: total.saturating_sub(hashed),
            duplicate_groups,
            hashed_percentage,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.unhashed_count == 0
    }
}

/// Catalog-wide totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryStats {
    pub total_audiobooks: usize,
    pub total_hours: u64,
    pub total_size_bytes: u64,
    pub unique_authors: usize,
    pub unique_narrators: usize,
}

impl LibraryStats {
    pub fn total_days(&self) -> u64 {
        (self.total_hours as f64 / 24.0).round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_stats_percentage() {
        let stats = HashStats::new(3, 1, 0);
        assert_eq!(stats.unhashed_count, 2);
        assert_eq!(stats.hashed_percentage, 33.3);
        assert!(!stats.is_complete());
    }

    #[test]
    fn test_hash_stats_empty_library() {
        let stats = HashStats::new(0, 0, 0);
        assert_eq!(stats.hashed_percentage, 0.0);
        assert!(stats.is_complete());
    }

    #[test]
    fn test_hash_stats_deserializes_without_percentage() {
        let stats: HashStats = serde_json::from_str(
            r#"{"hash_column_exists": false, "total_audiobooks": 0, "hashed_count": 0,
                "unhashed_count": 0, "duplicate_groups": 0}"#,
        )
        .unwrap();
        assert!(!stats.hash_column_exists);
    }
}
