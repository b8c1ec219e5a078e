use chrono::{Datelike, NaiveDate};
use tracing::info;

use crate::config::Ledger;
use crate::error::{BillingError, Result};
use crate::movement::{format_number, MovementDocument, SubmissionState};

use super::sales::{InvoiceStatus, SalesInvoice};

/// Check that a movement is complete enough to submit.
pub fn validate(doc: &MovementDocument) -> Result<()> {
    if doc.rows.is_empty() {
        return Err(BillingError::Validation(
            "Customer table cannot be empty".to_string(),
        ));
    }

    for (idx, row) in doc.rows.iter().enumerate() {
        if row.customer_name.trim().is_empty() {
            return Err(BillingError::Validation(format!(
                "Customer name is required in row {}",
                idx + 1
            )));
        }
        if row.item_name.trim().is_empty() {
            return Err(BillingError::Validation(format!(
                "Item name is required in row {}",
                idx + 1
            )));
        }
    }
    Ok(())
}

/// Submit a draft movement: remark every row, raise one sales invoice per
/// row and carry each customer's current reading forward.
///
/// Returns the ids of the invoices created.
pub fn submit(doc: &mut MovementDocument, ledger: &mut Ledger, today: NaiveDate) -> Result<Vec<String>> {
    doc.ensure_state(SubmissionState::Draft)?;
    validate(doc)?;

    let posting_date = *doc.posting_date.get_or_insert(today);

    for row in &mut doc.rows {
        row.remarks = Some(format!(
            "Consumption charge of {} at {} for {}",
            format_number(row.difference.unwrap_or(0.0)),
            format_number(row.price.unwrap_or(0.0)),
            row.customer_name
        ));
    }

    let mut created = Vec::with_capacity(doc.rows.len());
    for idx in 0..doc.rows.len() {
        created.push(raise_invoice(doc, idx, ledger, posting_date));

        let row = &doc.rows[idx];
        if let Some(current) = row.current_reading {
            ledger.readings.insert(row.customer_name.clone(), current);
        }
    }

    doc.submission_state = SubmissionState::Submitted;
    info!(document = %doc.id, invoices = created.len(), "submitted movement");
    Ok(created)
}

/// Raise invoices for the rows of a submitted movement that have none yet.
/// Returns how many were created.
pub fn create_missing_invoices(
    doc: &mut MovementDocument,
    ledger: &mut Ledger,
    today: NaiveDate,
) -> Result<usize> {
    doc.ensure_state(SubmissionState::Submitted)?;
    let posting_date = doc.posting_date.unwrap_or(today);

    let missing: Vec<usize> = doc
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| row.linked_invoice.is_none())
        .map(|(idx, _)| idx)
        .collect();

    for &idx in &missing {
        raise_invoice(doc, idx, ledger, posting_date);
    }

    info!(document = %doc.id, created = missing.len(), "created missing invoices");
    Ok(missing.len())
}

/// Cancel a submitted movement: cancel and unlink its invoices and restore
/// every customer's last reading to the row's previous reading.
///
/// Returns how many invoices were cancelled.
pub fn cancel(doc: &mut MovementDocument, ledger: &mut Ledger) -> Result<usize> {
    doc.ensure_state(SubmissionState::Submitted)?;

    let cancelled = cancel_linked(doc, ledger);
    for row in &doc.rows {
        if !row.customer_name.is_empty() {
            ledger
                .readings
                .insert(row.customer_name.clone(), row.previous_reading.unwrap_or(0.0));
        }
    }

    doc.submission_state = SubmissionState::Cancelled;
    info!(document = %doc.id, cancelled, "cancelled movement");
    Ok(cancelled)
}

/// Cancel and unlink the invoices of a submitted movement, leaving the
/// movement and the recorded readings as they are. The rows can then be
/// invoiced again with [`create_missing_invoices`].
///
/// Returns how many invoices were cancelled.
pub fn cancel_invoices(doc: &mut MovementDocument, ledger: &mut Ledger) -> Result<usize> {
    doc.ensure_state(SubmissionState::Submitted)?;

    let cancelled = cancel_linked(doc, ledger);
    info!(document = %doc.id, cancelled, "cancelled sales invoices");
    Ok(cancelled)
}

fn cancel_linked(doc: &mut MovementDocument, ledger: &mut Ledger) -> usize {
    let mut cancelled = 0;
    for row in &mut doc.rows {
        let Some(invoice_id) = row.linked_invoice.take() else {
            continue;
        };
        if let Some(invoice) = ledger.invoice_mut(&invoice_id) {
            if invoice.status == InvoiceStatus::Submitted {
                invoice.status = InvoiceStatus::Cancelled;
                cancelled += 1;
            }
        }
    }
    cancelled
}

fn raise_invoice(
    doc: &mut MovementDocument,
    idx: usize,
    ledger: &mut Ledger,
    posting_date: NaiveDate,
) -> String {
    let year = posting_date.year() as u32;
    let seq = ledger.invoice_counter.advance(year);
    let id = format!("SINV-{}-{:05}", year, seq);

    let row = &mut doc.rows[idx];
    ledger.invoices.push(SalesInvoice {
        id: id.clone(),
        customer: row.customer_name.clone(),
        posting_date,
        item_code: row.item_name.clone(),
        qty: row.difference.unwrap_or(0.0),
        rate: row.price.unwrap_or(0.0),
        amount: row.total.unwrap_or(0.0),
        description: format!("Electricity consumption for meter: {}", row.meter_number),
        remarks: row.remarks.clone().unwrap_or_default(),
        meter_movement: doc.id.clone(),
        movement_row: idx + 1,
        status: InvoiceStatus::Submitted,
    });
    row.linked_invoice = Some(id.clone());
    id
}
