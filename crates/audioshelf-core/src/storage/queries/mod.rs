mod stats;

pub use stats::{HashStatsQuery, LibraryStatsQuery};
