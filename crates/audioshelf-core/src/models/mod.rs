pub mod audiobook;
pub mod stats;

pub use audiobook::{AudioFormat, AudiobookRecord, NewAudiobook, RecordId};
pub use stats::{HashStats, LibraryStats};
