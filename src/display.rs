// Shared formatting for the CLI and TUI

use chrono::{DateTime, Local, TimeZone, Utc};

/// USD with thousands separators: `$1,234.50`, `-$3.00`
pub fn format_amount(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let dollars = (cents / 100).to_string();

    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
    for (i, ch) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

/// `Jan 15, 2024`, in the local time zone
pub fn format_date(date: &DateTime<Utc>) -> String {
    format_date_in(date, &Local)
}

pub fn format_date_in<Tz: TimeZone>(date: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    date.with_timezone(tz).format("%b %-d, %Y").to_string()
}

/// "Showing 1 expense" / "Showing 3 expenses"
pub fn expense_count_label(count: usize) -> String {
    format!(
        "Showing {} expense{}",
        count,
        if count == 1 { "" } else { "s" }
    )
}

pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
