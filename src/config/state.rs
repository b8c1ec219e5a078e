use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{BillingError, Result};
use crate::invoice::SalesInvoice;
use crate::movement::MovementDocument;

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct State {
    #[serde(default)]
    pub counter: Counter,
    #[serde(default)]
    pub ledger: Ledger,
    #[serde(default)]
    pub movements: Vec<MovementDocument>,
}

/// Yearly sequence used for document numbers.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Counter {
    pub last_number: u32,
    pub last_year: u32,
}

impl Default for Counter {
    fn default() -> Self {
        Self {
            last_number: 0,
            last_year: chrono::Utc::now().year() as u32,
        }
    }
}

impl Counter {
    /// Sequence number the next document of `year` would get.
    pub fn peek(&self, year: u32) -> u32 {
        if self.last_year == year {
            self.last_number + 1
        } else {
            1 // Reset for new year
        }
    }

    pub fn advance(&mut self, year: u32) -> u32 {
        let seq = self.peek(year);
        self.last_number = seq;
        self.last_year = year;
        seq
    }
}

/// Sales invoices raised from movements and the last known meter reading
/// per customer.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct Ledger {
    #[serde(default)]
    pub invoice_counter: Counter,
    #[serde(default)]
    pub invoices: Vec<SalesInvoice>,
    #[serde(default)]
    pub readings: BTreeMap<String, f64>,
}

impl Ledger {
    pub fn last_reading(&self, customer: &str) -> Option<f64> {
        self.readings.get(customer).copied()
    }

    pub fn invoice(&self, id: &str) -> Option<&SalesInvoice> {
        self.invoices.iter().find(|inv| inv.id == id)
    }

    pub fn invoice_mut(&mut self, id: &str) -> Option<&mut SalesInvoice> {
        self.invoices.iter_mut().find(|inv| inv.id == id)
    }

    /// Invoices carrying a back-reference to `movement_id`.
    pub fn invoices_for<'a>(&'a self, movement_id: &'a str) -> impl Iterator<Item = &'a SalesInvoice> {
        self.invoices
            .iter()
            .filter(move |inv| inv.meter_movement == movement_id)
    }
}

impl State {
    /// Resolve a movement reference to its position in `movements`.
    /// Accepts a 1-based index as shown by 'list' (newest first) or the
    /// full movement id.
    pub fn resolve_movement(&self, reference: &str) -> Result<usize> {
        if let Ok(idx) = reference.parse::<usize>() {
            if idx == 0 || idx > self.movements.len() {
                return Err(BillingError::InvalidMovementIndex(reference.to_string()));
            }
            return Ok(self.movements.len() - idx);
        }

        self.movements
            .iter()
            .position(|m| m.id == reference)
            .ok_or_else(|| BillingError::MovementNotFound(reference.to_string()))
    }
}
