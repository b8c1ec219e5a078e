use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{BillingError, Result};

use super::aggregate::aggregate;

/// One customer line of a meter movement.
///
/// Numeric fields are optional: an absent value prints as an empty cell and
/// counts as 0 in every calculation.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct MeterReadingRow {
    #[serde(default)]
    pub customer_no: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub meter_number: String,
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub previous_reading: Option<f64>,
    #[serde(default)]
    pub current_reading: Option<f64>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub balance: Option<f64>,
    #[serde(default)]
    pub subscription_fees: Option<f64>,
    #[serde(default)]
    pub difference: Option<f64>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub total_all: Option<f64>,
    /// Print selection. `None` means the row never opted in or out.
    #[serde(default)]
    pub print: Option<bool>,
    #[serde(default)]
    pub linked_invoice: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl MeterReadingRow {
    pub fn new(customer_name: impl Into<String>, meter_number: impl Into<String>) -> Self {
        Self {
            customer_name: customer_name.into(),
            meter_number: meter_number.into(),
            ..Default::default()
        }
    }

    /// Whether the print orchestrator should include this row.
    pub fn is_selected(&self) -> bool {
        self.print.unwrap_or(true)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionState {
    #[default]
    Draft,
    Submitted,
    Cancelled,
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionState::Draft => write!(f, "Draft"),
            SubmissionState::Submitted => write!(f, "Submitted"),
            SubmissionState::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// A meter movement: one billing period for one electricity type, with a
/// row per customer.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct MovementDocument {
    pub id: String,
    #[serde(default)]
    pub electricity_type: Option<String>,
    #[serde(default)]
    pub from_date: Option<NaiveDate>,
    #[serde(default)]
    pub to_date: Option<NaiveDate>,
    #[serde(default)]
    pub posting_date: Option<NaiveDate>,
    #[serde(default)]
    pub submission_state: SubmissionState,
    #[serde(default)]
    pub total_consumption: f64,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub rows: Vec<MeterReadingRow>,
}

impl MovementDocument {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_electricity_type(mut self, electricity_type: impl Into<String>) -> Self {
        self.electricity_type = Some(electricity_type.into());
        self
    }

    pub fn with_period(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.from_date = from;
        self.to_date = to;
        self
    }

    pub fn is_draft(&self) -> bool {
        self.submission_state == SubmissionState::Draft
    }

    /// Fails unless rows may still be changed.
    pub fn ensure_draft(&self) -> Result<()> {
        if self.is_draft() {
            Ok(())
        } else {
            Err(BillingError::DocumentNotDraft {
                id: self.id.clone(),
                state: self.submission_state,
            })
        }
    }

    pub(crate) fn ensure_state(&self, expected: SubmissionState) -> Result<()> {
        if self.submission_state == expected {
            Ok(())
        } else {
            Err(BillingError::InvalidTransition {
                id: self.id.clone(),
                expected,
                actual: self.submission_state,
            })
        }
    }

    pub fn row(&self, index: usize) -> Result<&MeterReadingRow> {
        self.rows.get(index).ok_or(BillingError::RowNotFound {
            row: index + 1,
            count: self.rows.len(),
        })
    }

    pub fn row_mut(&mut self, index: usize) -> Result<&mut MeterReadingRow> {
        let count = self.rows.len();
        self.rows.get_mut(index).ok_or(BillingError::RowNotFound {
            row: index + 1,
            count,
        })
    }

    /// Recompute document totals from the current rows.
    pub fn refresh_totals(&mut self) {
        let totals = aggregate(&self.rows);
        self.total_consumption = totals.total_consumption;
        self.total = totals.total;
    }
}
