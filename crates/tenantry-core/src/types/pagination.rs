//! Skip/take pagination bounds.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::result::AppResult;

/// Hard ceiling on `take`.
pub const MAX_TAKE: i64 = 1000;

/// A validated skip/take pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipTake {
    /// Number of records to skip.
    pub skip: u64,
    /// Maximum number of records to return.
    pub take: u64,
}

impl SkipTake {
    /// Validates raw caller input.
    pub fn new(skip: i64, take: i64) -> AppResult<Self> {
        if skip < 0 {
            return Err(AppError::validation("skip must not be negative"));
        }
        if take < 0 {
            return Err(AppError::validation("take must not be negative"));
        }
        if take > MAX_TAKE {
            return Err(AppError::validation(format!(
                "take must not exceed {MAX_TAKE}"
            )));
        }
        Ok(Self {
            skip: skip as u64,
            take: take as u64,
        })
    }

    /// Applies the window to an iterator.
    pub fn apply<I: IntoIterator>(&self, items: I) -> Vec<I::Item> {
        items
            .into_iter()
            .skip(self.skip as usize)
            .take(self.take as usize)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_take_boundary() {
        assert!(SkipTake::new(0, 1000).is_ok());
        let err = SkipTake::new(0, 1001).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn test_negative_values_rejected() {
        assert!(SkipTake::new(-1, 10).is_err());
        assert!(SkipTake::new(0, -1).is_err());
    }

    #[test]
    fn test_apply_window() {
        let page = SkipTake::new(2, 2).unwrap();
        assert_eq!(page.apply(1..=10), vec![3, 4]);
    }
}
