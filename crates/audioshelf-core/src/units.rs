//! Size conversions shared by reports and the wire format.

const MIB: f64 = 1024.0 * 1024.0;

/// Human readable size with one decimal, 1024 based.
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if size < 1024.0 {
            return format!("{size:.1}{unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1}PB")
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / MIB
}

/// Megabytes rounded to two decimals, as the catalog API reports them.
pub fn bytes_to_mb_rounded(bytes: u64) -> f64 {
    (bytes_to_mb(bytes) * 100.0).round() / 100.0
}

pub fn mb_to_bytes(mb: f64) -> u64 {
    if mb.is_finite() && mb > 0.0 {
        (mb * MIB).round() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(0), "0.0B");
        assert_eq!(format_size(1023), "1023.0B");
        assert_eq!(format_size(1536), "1.5KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0GB");
    }

    #[test]
    fn test_mb_conversions() {
        assert_eq!(mb_to_bytes(1.0), 1_048_576);
        assert_eq!(mb_to_bytes(-3.0), 0);
        assert_eq!(mb_to_bytes(f64::NAN), 0);
        assert_eq!(bytes_to_mb_rounded(1_572_864), 1.5);
    }
}
