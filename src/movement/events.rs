use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::error::{BillingError, Result};

use super::calculator::{recompute, Advisory};
use super::model::{MeterReadingRow, MovementDocument};
use super::value::parse_lenient;

/// Editable fields of a movement row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowField {
    CustomerNo,
    CustomerName,
    MeterNumber,
    ItemName,
    PreviousReading,
    CurrentReading,
    Price,
    Balance,
    SubscriptionFees,
}

impl RowField {
    /// Fields whose edits change `difference`/`total`/`total_all`.
    pub const CALCULATED_INPUTS: [RowField; 4] = [
        RowField::PreviousReading,
        RowField::CurrentReading,
        RowField::Price,
        RowField::Balance,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RowField::CustomerNo => "customer_no",
            RowField::CustomerName => "customer_name",
            RowField::MeterNumber => "meter_number",
            RowField::ItemName => "item_name",
            RowField::PreviousReading => "previous_reading",
            RowField::CurrentReading => "current_reading",
            RowField::Price => "price",
            RowField::Balance => "balance",
            RowField::SubscriptionFees => "subscription_fees",
        }
    }

    /// Write a raw user value into the row. Numeric fields parse leniently;
    /// a blank value clears them.
    pub fn apply(self, row: &mut MeterReadingRow, raw: &str) {
        let number = || {
            if raw.trim().is_empty() {
                None
            } else {
                Some(parse_lenient(raw))
            }
        };

        match self {
            RowField::CustomerNo => row.customer_no = raw.to_string(),
            RowField::CustomerName => row.customer_name = raw.to_string(),
            RowField::MeterNumber => row.meter_number = raw.to_string(),
            RowField::ItemName => row.item_name = raw.to_string(),
            RowField::PreviousReading => row.previous_reading = number(),
            RowField::CurrentReading => row.current_reading = number(),
            RowField::Price => row.price = number(),
            RowField::Balance => row.balance = number(),
            RowField::SubscriptionFees => row.subscription_fees = number(),
        }
    }
}

impl fmt::Display for RowField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RowField {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self> {
        let field = match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "customer_no" => RowField::CustomerNo,
            "customer_name" | "customer" => RowField::CustomerName,
            "meter_number" | "meter" => RowField::MeterNumber,
            "item_name" | "item" => RowField::ItemName,
            "previous_reading" | "previous" => RowField::PreviousReading,
            "current_reading" | "current" => RowField::CurrentReading,
            "price" => RowField::Price,
            "balance" => RowField::Balance,
            "subscription_fees" | "subscription" => RowField::SubscriptionFees,
            _ => return Err(BillingError::UnknownField(s.to_string())),
        };
        Ok(field)
    }
}

/// Change handler run after a field of row `index` was written.
pub type FieldHandler = Box<dyn Fn(&mut MovementDocument, usize) -> Option<Advisory>>;

/// Per-field subscription lists, dispatched synchronously on every edit.
#[derive(Default)]
pub struct FormEvents {
    handlers: HashMap<RowField, Vec<FieldHandler>>,
}

impl FormEvents {
    /// No subscriptions at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the row and the document totals whenever a reading, the
    /// price or the balance changes.
    pub fn standard() -> Self {
        let mut events = Self::new();
        for field in RowField::CALCULATED_INPUTS {
            events.subscribe(field, Box::new(recompute_row_and_totals));
        }
        events
    }

    pub fn subscribe(&mut self, field: RowField, handler: FieldHandler) {
        self.handlers.entry(field).or_default().push(handler);
    }

    pub fn subscriber_count(&self, field: RowField) -> usize {
        self.handlers.get(&field).map_or(0, Vec::len)
    }

    /// Write `raw` into `field` of row `index`, then run that field's
    /// handlers in subscription order. Returns the advisories they raised.
    pub fn set_field(
        &self,
        doc: &mut MovementDocument,
        index: usize,
        field: RowField,
        raw: &str,
    ) -> Result<Vec<Advisory>> {
        doc.ensure_draft()?;
        field.apply(doc.row_mut(index)?, raw);

        let advisories: Vec<Advisory> = self
            .handlers
            .get(&field)
            .into_iter()
            .flatten()
            .filter_map(|handler| handler(doc, index))
            .collect();

        for advisory in &advisories {
            warn!(document = %doc.id, row = index + 1, "{advisory}");
        }
        Ok(advisories)
    }

    /// Append a row, compute it and refresh the totals. Returns the new
    /// row's index alongside any advisory.
    pub fn add_row(
        &self,
        doc: &mut MovementDocument,
        row: MeterReadingRow,
    ) -> Result<(usize, Option<Advisory>)> {
        doc.ensure_draft()?;
        doc.rows.push(row);
        let index = doc.rows.len() - 1;
        let advisory = recompute_row_and_totals(doc, index);
        Ok((index, advisory))
    }

    /// Remove row `index` and refresh the totals.
    pub fn remove_row(&self, doc: &mut MovementDocument, index: usize) -> Result<MeterReadingRow> {
        doc.ensure_draft()?;
        doc.row(index)?;
        let removed = doc.rows.remove(index);
        doc.refresh_totals();
        Ok(removed)
    }
}

fn recompute_row_and_totals(doc: &mut MovementDocument, index: usize) -> Option<Advisory> {
    let row = doc.rows.get_mut(index)?;
    let (updated, advisory) = recompute(row);
    *row = updated;
    doc.refresh_totals();
    advisory
}
