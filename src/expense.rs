// 💸 Expense Record Model
// A candidate (`NewExpense`) becomes a record (`Expense`) only inside the store,
// which is the single place ids are assigned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category used when an input leaves the category blank
pub const DEFAULT_CATEGORY: &str = "Other";

/// Description used when an import row leaves the description blank
pub const DEFAULT_DESCRIPTION: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpenseError {
    #[error("Amount must be positive (got {0})")]
    NonPositiveAmount(f64),
    #[error("Amount is not a finite number")]
    NonFiniteAmount,
    #[error("Description cannot be empty")]
    EmptyDescription,
}

// ============================================================================
// CANDIDATE RECORD
// ============================================================================

/// NewExpense - parsed or typed-in expense that has not been stored yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpense {
    pub description: String,
    pub amount: f64,
    pub category: String,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NewExpense {
    /// Create a candidate with required fields; a blank category becomes "Other"
    pub fn new(description: &str, amount: f64, category: &str, date: DateTime<Utc>) -> Self {
        let category = category.trim();
        NewExpense {
            description: description.trim().to_string(),
            amount,
            category: if category.is_empty() {
                DEFAULT_CATEGORY.to_string()
            } else {
                category.to_string()
            },
            date,
            notes: None,
        }
    }

    /// Builder pattern: add optional notes (blank notes stay absent)
    pub fn with_notes(mut self, notes: &str) -> Self {
        let notes = notes.trim();
        self.notes = if notes.is_empty() {
            None
        } else {
            Some(notes.to_string())
        };
        self
    }

    pub fn validate(&self) -> Result<(), ExpenseError> {
        if !self.amount.is_finite() {
            return Err(ExpenseError::NonFiniteAmount);
        }
        if self.amount <= 0.0 {
            return Err(ExpenseError::NonPositiveAmount(self.amount));
        }
        if self.description.trim().is_empty() {
            return Err(ExpenseError::EmptyDescription);
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

// ============================================================================
// STORED RECORD
// ============================================================================

/// Expense - immutable once created; there is no update path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub description: String,
    pub amount: f64,
    pub category: String,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Expense {
    pub fn from_candidate(id: String, candidate: NewExpense) -> Self {
        Expense {
            id,
            description: candidate.description,
            amount: candidate.amount,
            category: candidate.category,
            date: candidate.date,
            notes: candidate.notes,
        }
    }
}

/// Anything with a date can be period-filtered
pub trait Dated {
    fn date(&self) -> DateTime<Utc>;
}

impl Dated for Expense {
    fn date(&self) -> DateTime<Utc> {
        self.date
    }
}

impl Dated for NewExpense {
    fn date(&self) -> DateTime<Utc> {
        self.date
    }
}

impl<T: Dated> Dated for &T {
    fn date(&self) -> DateTime<Utc> {
        (*self).date()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn jan_15() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_blank_category_defaults_to_other() {
        let e = NewExpense::new("Coffee", 4.5, "   ", jan_15());
        assert_eq!(e.category, "Other");
        assert!(e.is_valid());
    }

    #[test]
    fn test_validate_rejects_bad_amounts() {
        let zero = NewExpense::new("Coffee", 0.0, "Food", jan_15());
        assert_eq!(zero.validate(), Err(ExpenseError::NonPositiveAmount(0.0)));

        let negative = NewExpense::new("Refund", -3.0, "Food", jan_15());
        assert!(!negative.is_valid());

        let nan = NewExpense::new("Broken", f64::NAN, "Food", jan_15());
        assert_eq!(nan.validate(), Err(ExpenseError::NonFiniteAmount));
    }

    #[test]
    fn test_validate_rejects_empty_description() {
        let e = NewExpense::new("  ", 10.0, "Food", jan_15());
        assert_eq!(e.validate(), Err(ExpenseError::EmptyDescription));
    }

    #[test]
    fn test_with_notes_skips_blank() {
        let e = NewExpense::new("Coffee", 4.5, "Food", jan_15()).with_notes(" ");
        assert_eq!(e.notes, None);

        let e = e.with_notes("Morning coffee");
        assert_eq!(e.notes.as_deref(), Some("Morning coffee"));
    }

    #[test]
    fn test_serialized_shape() {
        let e = Expense::from_candidate(
            "abc".to_string(),
            NewExpense::new("Coffee", 4.5, "Food", jan_15()),
        );
        let json = serde_json::to_value(&e).unwrap();

        assert_eq!(json["id"], "abc");
        assert_eq!(json["date"], "2024-01-15T09:30:00Z");
        assert!(json.get("notes").is_none());
    }
}
