//! Gzip compression settings for snapshot archives
//!
//! Archives are a single tar stream wrapped in one gzip stream. The level
//! trades CPU time for archive size and has no effect on what the reader
//! accepts: any level decompresses the same way.
//!
//! ## Examples
//!
//! ```rust
//! use snapshot::compression::CompressionLevel;
//!
//! let level = CompressionLevel::Best;
//! assert_eq!(level.as_flate2().level(), 9);
//!
//! let custom = CompressionLevel::Custom(3);
//! assert!(custom.validate().is_ok());
//! assert!(CompressionLevel::Custom(12).validate().is_err());
//! ```

use crate::error::{Result, SnapshotError};
use serde::{Deserialize, Serialize};

/// Gzip level used when writing archives
///
/// # Examples
///
/// ```rust
/// use snapshot::compression::CompressionLevel;
///
/// // Default balances speed and size
/// assert_eq!(CompressionLevel::default(), CompressionLevel::Default);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    /// Level 0, store only
    None,
    /// Level 1, fastest
    Fast,
    /// Level 6, zlib's default
    #[default]
    Default,
    /// Level 9, smallest output
    Best,
    /// Explicit level in `0..=9`
    Custom(u32),
}

impl CompressionLevel {
    /// Numeric gzip level
    pub fn level(&self) -> u32 {
        match self {
            CompressionLevel::None => 0,
            CompressionLevel::Fast => 1,
            CompressionLevel::Default => 6,
            CompressionLevel::Best => 9,
            CompressionLevel::Custom(level) => *level,
        }
    }

    /// Convert to the flate2 representation
    pub fn as_flate2(&self) -> flate2::Compression {
        flate2::Compression::new(self.level())
    }

    /// Reject levels outside what gzip supports
    pub fn validate(&self) -> Result<()> {
        if self.level() > 9 {
            return Err(SnapshotError::InvalidConfiguration(format!(
                "compression level {} is out of range 0..=9",
                self.level()
            )));
        }
        Ok(())
    }
}

impl std::str::FromStr for CompressionLevel {
    type Err = SnapshotError;

    fn from_str(s: &str) -> Result<Self> {
        let level = match s.trim().to_ascii_lowercase().as_str() {
            "none" => CompressionLevel::None,
            "fast" => CompressionLevel::Fast,
            "default" => CompressionLevel::Default,
            "best" => CompressionLevel::Best,
            other => {
                let level = other.parse::<u32>().map_err(|_| {
                    SnapshotError::InvalidConfiguration(format!(
                        "unknown compression level '{}'",
                        s
                    ))
                })?;
                CompressionLevel::Custom(level)
            }
        };
        level.validate()?;
        Ok(level)
    }
}
