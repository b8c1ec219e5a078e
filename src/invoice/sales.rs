use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceStatus {
    Submitted,
    Cancelled,
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceStatus::Submitted => write!(f, "SUBMITTED"),
            InvoiceStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// A single-line sales invoice raised for one movement row.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SalesInvoice {
    pub id: String,
    pub customer: String,
    pub posting_date: NaiveDate,
    pub item_code: String,
    pub qty: f64,
    pub rate: f64,
    pub amount: f64,
    pub description: String,
    #[serde(default)]
    pub remarks: String,
    /// Id of the movement this invoice bills.
    pub meter_movement: String,
    /// 1-based row of that movement.
    pub movement_row: usize,
    pub status: InvoiceStatus,
}
