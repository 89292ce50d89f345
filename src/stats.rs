//! Spend-vs-budget arithmetic over in-memory cost entries. No I/O.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::database::models::{CostCategory, CostEntry};

/// Usage above this percentage is flagged as a warning.
pub const WARNING_PERCENT: Decimal = Decimal::from_parts(80, 0, 0, false, 0);

/// Largest budget or amount accepted on input.
pub const MAX_MONEY: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// Money is kept to whole kopecks.
pub const MONEY_SCALE: u32 = 2;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Whether a value fits the accepted money range and precision.
pub fn is_money(value: Decimal) -> bool {
    value.abs() <= MAX_MONEY && value.normalize().scale() <= MONEY_SCALE
}

/// Saturates at `Decimal::MAX` instead of overflowing.
fn sum(amounts: impl Iterator<Item = Decimal>) -> Decimal {
    amounts.fold(Decimal::ZERO, |acc, amount| {
        acc.checked_add(amount).unwrap_or(Decimal::MAX)
    })
}

/// `part` as a percentage of a positive `whole`, saturating on overflow.
fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    part.checked_mul(HUNDRED)
        .and_then(|scaled| scaled.checked_div(whole))
        .or_else(|| part.checked_div(whole).and_then(|ratio| ratio.checked_mul(HUNDRED)))
        .unwrap_or(Decimal::MAX)
}

pub fn total_spent(entries: &[CostEntry]) -> Decimal {
    sum(entries.iter().map(|entry| entry.amount))
}

/// Negative when the project is over budget.
pub fn remaining(budget: Decimal, entries: &[CostEntry]) -> Decimal {
    budget
        .checked_sub(total_spent(entries))
        .unwrap_or(Decimal::MIN)
}

/// Share of the budget already spent, in percent. Zero for a zero (or
/// negative) budget; not clamped, so overruns read above 100.
pub fn usage_percent(budget: Decimal, entries: &[CostEntry]) -> Decimal {
    if budget <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    percent_of(total_spent(entries), budget)
}

/// Entries that count towards one project's spend.
pub fn project_entries(entries: &[CostEntry], project_id: Uuid) -> Vec<CostEntry> {
    entries
        .iter()
        .filter(|entry| entry.project_id == Some(project_id))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryShare<'a> {
    pub category: &'a CostCategory,
    pub total: Decimal,
    pub percent: Decimal,
}

/// Per-category totals in category-list order. Categories nobody spent on are
/// left out; entries without a known category only count towards the total.
pub fn category_breakdown<'a>(
    entries: &[CostEntry],
    categories: &'a [CostCategory],
) -> Vec<CategoryShare<'a>> {
    let spent = total_spent(entries);
    categories
        .iter()
        .filter_map(|category| {
            let total = sum(
                entries
                    .iter()
                    .filter(|entry| entry.category_id.as_deref() == Some(category.id.as_str()))
                    .map(|entry| entry.amount),
            );
            if total.is_zero() {
                return None;
            }
            let percent = if spent.is_zero() {
                Decimal::ZERO
            } else {
                percent_of(total, spent)
            };
            Some(CategoryShare {
                category,
                total,
                percent,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetHealth {
    Healthy,
    Warning,
    Over,
}

/// Everything a budget card shows for one project.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetSummary {
    pub budget: Decimal,
    pub spent: Decimal,
    pub remaining: Decimal,
    pub usage_percent: Decimal,
}

impl BudgetSummary {
    pub fn new(budget: Decimal, entries: &[CostEntry]) -> Self {
        let spent = total_spent(entries);
        Self {
            budget,
            spent,
            remaining: budget.checked_sub(spent).unwrap_or(Decimal::MIN),
            usage_percent: usage_percent(budget, entries),
        }
    }

    pub fn is_over_budget(&self) -> bool {
        self.remaining < Decimal::ZERO
    }

    pub fn health(&self) -> BudgetHealth {
        if self.is_over_budget() {
            BudgetHealth::Over
        } else if self.usage_percent > WARNING_PERCENT {
            BudgetHealth::Warning
        } else {
            BudgetHealth::Healthy
        }
    }

    /// Usage for a progress bar, clamped to `0.0..=1.0`.
    pub fn bar_ratio(&self) -> f64 {
        let clamped = self.usage_percent.clamp(Decimal::ZERO, HUNDRED) / HUNDRED;
        clamped.to_f64().unwrap_or(0.0)
    }
}
