//! Recurring source scheduling and materialization
//!
//! Every obligation variant answers the same two questions:
//! - `is_due_on(d)`: does an occurrence fall on `d`?
//! - `plan_occurrence(d)`: what happens when it does?
//!
//! Variant rules (installment caps, loan amortization) live here so the
//! automation loop and the forecast simulation stay uniform and agree.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{
    first_of_month, last_of_month, Direction, IdempotencyKey, NewLedgerTransaction, Provenance,
    RecurringSource, SourceKind, SourceStatus,
};

/// Interest/principal split of one loan payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanSplit {
    pub interest: Decimal,
    pub principal: Decimal,
}

/// Split a monthly payment against the outstanding balance.
///
/// Interest is `remaining × annual_rate / 12`, rounded to cents. Principal is
/// the remainder, never negative and never more than what is owed.
pub fn split_loan_payment(
    remaining_balance: Decimal,
    annual_rate_percent: Decimal,
    payment: Decimal,
) -> LoanSplit {
    let periodic_rate = annual_rate_percent / Decimal::from(100) / Decimal::from(12);
    let interest = (remaining_balance * periodic_rate).round_dp(2);
    let principal = (payment - interest)
        .max(Decimal::ZERO)
        .min(remaining_balance.max(Decimal::ZERO));
    LoanSplit {
        interest,
        principal,
    }
}

/// Progress fields after an occurrence is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceProgress {
    Fixed,
    Installment {
        payments_completed: u32,
    },
    Loan {
        payments_made: u32,
        remaining_balance: Decimal,
    },
}

/// Outcome of one scheduled occurrence
#[derive(Debug, Clone, PartialEq)]
pub enum Occurrence {
    /// Write this transaction and advance the source
    Materialize {
        transaction: NewLedgerTransaction,
        progress: SourceProgress,
        /// The occurrence is the final one; the source becomes completed
        completes: bool,
        loan_split: Option<LoanSplit>,
    },
    /// Nothing left to pay; mark completed without a transaction
    Exhausted,
}

impl RecurringSource {
    /// The occurrence date in the given month, if the source's active window
    /// contains it. Trigger days past the month's end clamp to its last day.
    pub fn occurrence_in_month(&self, year: i32, month: u32) -> Option<NaiveDate> {
        let last = last_of_month(year, month);
        let day = self.day_of_month.clamp(1, last.day());
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        self.window_contains(date).then_some(date)
    }

    pub fn window_contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && self.end_date.map_or(true, |end| date <= end)
    }

    /// Active, not completed, and scheduled on `date`
    pub fn is_due_on(&self, date: NaiveDate) -> bool {
        self.is_active
            && self.status == SourceStatus::Active
            && self.occurrence_in_month(date.year(), date.month()) == Some(date)
    }

    /// All occurrence dates within `[from, to]` (inclusive)
    pub fn occurrences_between(&self, from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        if from > to {
            return dates;
        }
        let mut cursor = first_of_month(from.year(), from.month());
        while cursor <= to {
            if let Some(d) = self.occurrence_in_month(cursor.year(), cursor.month()) {
                if d >= from && d <= to {
                    dates.push(d);
                }
            }
            cursor = match last_of_month(cursor.year(), cursor.month()).succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
        dates
    }

    /// No further occurrences will produce money movement
    pub fn is_exhausted(&self) -> bool {
        match &self.kind {
            SourceKind::Fixed => false,
            SourceKind::Installment {
                number_of_payments,
                payments_completed,
            } => payments_completed >= number_of_payments,
            SourceKind::Loan {
                remaining_balance, ..
            } => *remaining_balance <= Decimal::ZERO,
        }
    }

    pub fn idempotency_key(&self, date: NaiveDate) -> IdempotencyKey {
        IdempotencyKey {
            source_type: self.source_type(),
            source_id: self.id,
            occurrence_date: date,
        }
    }

    /// Decide what the occurrence on `date` does. Pure; nothing is written.
    pub fn plan_occurrence(&self, date: NaiveDate) -> Occurrence {
        if self.is_exhausted() {
            return Occurrence::Exhausted;
        }

        let provenance = Some(Provenance {
            source_type: self.source_type(),
            source_id: self.id,
        });
        let mut transaction = NewLedgerTransaction {
            scope: self.scope,
            amount: self.amount,
            currency: self.currency.clone(),
            direction: self.direction,
            category_id: self.category_id,
            occurrence_date: date,
            description: self.name.clone(),
            provenance,
        };

        match &self.kind {
            SourceKind::Fixed => Occurrence::Materialize {
                transaction,
                progress: SourceProgress::Fixed,
                completes: false,
                loan_split: None,
            },
            SourceKind::Installment {
                number_of_payments,
                payments_completed,
            } => {
                let completed = (payments_completed + 1).min(*number_of_payments);
                transaction.description =
                    format!("{} ({}/{})", self.name, completed, number_of_payments);
                Occurrence::Materialize {
                    transaction,
                    progress: SourceProgress::Installment {
                        payments_completed: completed,
                    },
                    completes: completed >= *number_of_payments,
                    loan_split: None,
                }
            }
            SourceKind::Loan {
                interest_rate,
                total_payments,
                payments_made,
                remaining_balance,
            } => {
                let split = split_loan_payment(*remaining_balance, *interest_rate, self.amount);
                let remaining = (*remaining_balance - split.principal).max(Decimal::ZERO);
                let made = payments_made + 1;
                transaction.direction = Direction::Expense;
                transaction.description = if *total_payments > 0 {
                    format!("{} (payment {}/{})", self.name, made, total_payments)
                } else {
                    format!("{} (payment {})", self.name, made)
                };
                Occurrence::Materialize {
                    transaction,
                    progress: SourceProgress::Loan {
                        payments_made: made,
                        remaining_balance: remaining,
                    },
                    completes: remaining.is_zero(),
                    loan_split: Some(split),
                }
            }
        }
    }

    /// Apply progress in memory (used by the forecast simulation)
    pub fn apply_progress(&mut self, progress: &SourceProgress) {
        match (&mut self.kind, progress) {
            (
                SourceKind::Installment {
                    payments_completed, ..
                },
                SourceProgress::Installment {
                    payments_completed: next,
                },
            ) => *payments_completed = *next,
            (
                SourceKind::Loan {
                    payments_made,
                    remaining_balance,
                    ..
                },
                SourceProgress::Loan {
                    payments_made: next_made,
                    remaining_balance: next_remaining,
                },
            ) => {
                *payments_made = *next_made;
                *remaining_balance = *next_remaining;
            }
            _ => {}
        }
    }
}
