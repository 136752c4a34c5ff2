use jiff::Span;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq, Eq)]
pub struct ScheduledPayment {
    /// Billing record this milestone is paid through, if one exists yet
    pub bill_id: Option<Uuid>,
    /// Days after the previous milestone, or after signing for the first one
    pub days_after_previous: Option<u32>,
    /// Human readable label
    pub description: Option<String>,
}

impl ScheduledPayment {
    pub fn new(days_after_previous: u32, description: impl Into<String>) -> Self {
        Self {
            bill_id: None,
            days_after_previous: Some(days_after_previous),
            description: Some(description.into()),
        }
    }
}

/// A single field of a [`ScheduledPayment`], used for partial updates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentField {
    DaysAfterPrevious(Option<u32>),
    Description(Option<String>),
    BillId(Option<Uuid>),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("No scheduled payment at position {index} (schedule has {len})")]
    OutOfRange { index: usize, len: usize },

    #[error("Scheduled payments at positions {} have no day offset", format_positions(.0))]
    UndefinedOffsets(Vec<usize>),

    #[error("Due date overflows the calendar at position {index}: {reason}")]
    DateOverflow { index: usize, reason: String },
}

fn format_positions(positions: &[usize]) -> String {
    positions
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Ordered payment milestones. Each offset counts from the previous
/// milestone's due date; the first counts from the signing date.
#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq, Eq)]
#[serde(transparent)]
pub struct ScheduledPaymentList {
    entries: Vec<ScheduledPayment>,
}

impl ScheduledPaymentList {
    pub fn new(entries: Vec<ScheduledPayment>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScheduledPayment> {
        self.entries.iter()
    }

    pub fn get(&self, index: usize) -> Option<&ScheduledPayment> {
        self.entries.get(index)
    }

    pub fn append(&mut self, payment: ScheduledPayment) -> usize {
        self.entries.push(payment);
        self.entries.len() - 1
    }

    /// Adds a blank milestone for the caller to fill in afterwards.
    pub fn append_empty(&mut self) -> usize {
        self.append(ScheduledPayment::default())
    }

    pub fn remove_at(&mut self, index: usize) -> Result<ScheduledPayment, ScheduleError> {
        self.check_index(index)?;
        Ok(self.entries.remove(index))
    }

    pub fn update_at(&mut self, index: usize, field: PaymentField) -> Result<(), ScheduleError> {
        self.check_index(index)?;
        let entry = &mut self.entries[index];
        match field {
            PaymentField::DaysAfterPrevious(days) => entry.days_after_previous = days,
            PaymentField::Description(description) => entry.description = description,
            PaymentField::BillId(bill_id) => entry.bill_id = bill_id,
        }
        Ok(())
    }

    pub fn missing_offsets(&self) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, p)| p.days_after_previous.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    /// Absolute due date of every milestone, in order.
    ///
    /// `due[0] = signed_on + offset[0]`, `due[i] = due[i - 1] + offset[i]`.
    /// Fails if any milestone is missing its offset.
    pub fn compute_due_dates(&self, signed_on: Date) -> Result<Vec<Date>, ScheduleError> {
        let missing = self.missing_offsets();
        if !missing.is_empty() {
            return Err(ScheduleError::UndefinedOffsets(missing));
        }

        let mut due_dates = Vec::with_capacity(self.entries.len());
        let mut previous = signed_on;
        for (index, payment) in self.entries.iter().enumerate() {
            let days = payment.days_after_previous.unwrap_or_default();
            let due = Span::new()
                .try_days(i64::from(days))
                .and_then(|span| previous.checked_add(span))
                .map_err(|e| ScheduleError::DateOverflow {
                    index,
                    reason: e.to_string(),
                })?;
            due_dates.push(due);
            previous = due;
        }

        Ok(due_dates)
    }

    fn check_index(&self, index: usize) -> Result<(), ScheduleError> {
        if index >= self.entries.len() {
            return Err(ScheduleError::OutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        Ok(())
    }
}

impl From<Vec<ScheduledPayment>> for ScheduledPaymentList {
    fn from(entries: Vec<ScheduledPayment>) -> Self {
        Self::new(entries)
    }
}
