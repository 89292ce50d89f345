use std::fmt::Display;

use chrono::{DateTime, TimeZone};
use rust_decimal::{Decimal, RoundingStrategy};

pub const CURRENCY_SYMBOL: &str = "₴";

/// `1 500,5 ₴`: space-grouped thousands, decimal comma, at most two decimals.
pub fn fmt_money(d: &Decimal) -> String {
    let rounded = d
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .normalize();
    let text = rounded.abs().to_string();
    let (int_part, frac_part) = match text.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (text.as_str(), None),
    };

    let mut grouped = String::with_capacity(text.len() + text.len() / 3 + 4);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        grouped.push('-');
    }
    let digits = int_part.len();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (digits - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    if let Some(frac) = frac_part {
        grouped.push(',');
        grouped.push_str(frac);
    }
    grouped.push(' ');
    grouped.push_str(CURRENCY_SYMBOL);
    grouped
}

pub fn fmt_percent(p: &Decimal) -> String {
    format!("{:.1}%", p.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero))
}

pub fn fmt_date<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    at.format("%d.%m.%Y").to_string()
}
