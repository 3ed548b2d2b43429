// 📊 Aggregator
// Totals, averages and per-category sums over any set of expenses.

use crate::expense::Expense;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub total: f64,
    pub count: usize,
    pub average: f64,
    /// Categories in first-seen order; only categories that occur are listed
    pub by_category: Vec<CategoryTotal>,
    pub top_category: Option<CategoryTotal>,
}

impl Summary {
    pub fn category_total(&self, category: &str) -> Option<f64> {
        self.by_category
            .iter()
            .find(|c| c.category == category)
            .map(|c| c.total)
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Summarize a set of expenses.
///
/// `top_category` is the largest category sum; on a tie the category seen first wins.
pub fn summarize<'a, I>(records: I) -> Summary
where
    I: IntoIterator<Item = &'a Expense>,
{
    let mut total = 0.0;
    let mut count = 0;
    let mut by_category: Vec<CategoryTotal> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();

    for expense in records {
        total += expense.amount;
        count += 1;

        let slot = *index.entry(expense.category.as_str()).or_insert_with(|| {
            by_category.push(CategoryTotal {
                category: expense.category.clone(),
                total: 0.0,
                count: 0,
            });
            by_category.len() - 1
        });
        by_category[slot].total += expense.amount;
        by_category[slot].count += 1;
    }

    let mut top_category: Option<&CategoryTotal> = None;
    for candidate in &by_category {
        match top_category {
            Some(best) if candidate.total <= best.total => {}
            _ => top_category = Some(candidate),
        }
    }
    let top_category = top_category.cloned();

    Summary {
        total,
        count,
        average: if count > 0 { total / count as f64 } else { 0.0 },
        by_category,
        top_category,
    }
}
