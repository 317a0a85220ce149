//! Scan-order ranks for pattern definitions.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Rank deciding scan order; higher ranks are scanned first and win overlaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub i32);

impl Priority {
    pub const HIGHEST: Priority = Priority(100_000);
    pub const HIGH: Priority = Priority(1_000);
    pub const NORMAL: Priority = Priority(0);
    pub const LOW: Priority = Priority(-1_000);
    pub const LOWEST: Priority = Priority(-100_000);
}

impl Default for Priority {
    fn default() -> Self {
        Priority::NORMAL
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Priority(value)
    }
}

/// Accepts a rank name (`highest`, `high`, `normal`, `low`, `lowest`) or an
/// integer.
impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "highest" => Ok(Priority::HIGHEST),
            "high" => Ok(Priority::HIGH),
            "normal" => Ok(Priority::NORMAL),
            "low" => Ok(Priority::LOW),
            "lowest" => Ok(Priority::LOWEST),
            other => other
                .parse::<i32>()
                .map(Priority)
                .map_err(|_| Error::InvalidPriority(s.to_string())),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_ranks() {
        assert_eq!("high".parse::<Priority>().unwrap(), Priority::HIGH);
        assert_eq!("Lowest".parse::<Priority>().unwrap(), Priority::LOWEST);
        assert_eq!("-5".parse::<Priority>().unwrap(), Priority(-5));
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_ordering() {
        assert!(Priority::HIGHEST > Priority::HIGH);
        assert!(Priority::NORMAL > Priority::LOW);
        assert_eq!(Priority::default(), Priority::NORMAL);
    }
}
