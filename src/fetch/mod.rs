mod http;
mod record;

pub use http::HttpCustomerSource;
pub use record::CustomerRecord;

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::error::{BillingError, Result};
use crate::movement::{recompute, MeterReadingRow, MovementDocument};

/// Anything that can list the customers of an electricity type.
pub trait CustomerSource {
    fn fetch_customers(&self, electricity_type: &str) -> Result<Vec<CustomerRecord>>;
}

impl<F> CustomerSource for F
where
    F: Fn(&str) -> Result<Vec<CustomerRecord>>,
{
    fn fetch_customers(&self, electricity_type: &str) -> Result<Vec<CustomerRecord>> {
        self(electricity_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Rows were replaced by this many customers.
    Populated(usize),
    /// The lookup succeeded but returned nobody; the rows are now empty.
    NoCustomers,
}

/// Fills a movement's rows from a [`CustomerSource`], one fetch at a time.
#[derive(Debug, Default)]
pub struct CustomerFetcher {
    in_flight: AtomicBool,
}

/// Held while a fetch is pending; releases the fetcher when dropped.
#[derive(Debug)]
pub struct FetchGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl CustomerFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Claim the fetcher. Fails with [`BillingError::FetchInProgress`] while
    /// another guard is alive.
    pub fn try_begin(&self) -> Result<FetchGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| BillingError::FetchInProgress)?;
        Ok(FetchGuard {
            flag: &self.in_flight,
        })
    }

    /// Replace `doc`'s rows with the customers of its electricity type.
    ///
    /// Nothing is touched unless the lookup succeeds. An empty result clears
    /// the rows and reports [`FetchOutcome::NoCustomers`]. Fetched rows are
    /// computed straight away so carried balances show up as amounts due;
    /// they have no current reading yet, so no advisory is raised for them.
    pub fn populate<S>(&self, doc: &mut MovementDocument, source: &S) -> Result<FetchOutcome>
    where
        S: CustomerSource + ?Sized,
    {
        let electricity_type = doc
            .electricity_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(BillingError::ElectricityTypeRequired)?
            .to_string();
        doc.ensure_draft()?;

        let _guard = self.try_begin()?;

        let customers = source.fetch_customers(&electricity_type).map_err(|e| {
            warn!(document = %doc.id, %electricity_type, "customer lookup failed: {e}");
            match e {
                BillingError::Transport(_) => e,
                other => BillingError::Transport(other.to_string()),
            }
        })?;

        doc.rows.clear();
        doc.rows.extend(customers.iter().map(fetched_row));
        doc.refresh_totals();

        info!(
            document = %doc.id,
            %electricity_type,
            count = customers.len(),
            "replaced movement rows from customer lookup"
        );

        if customers.is_empty() {
            Ok(FetchOutcome::NoCustomers)
        } else {
            Ok(FetchOutcome::Populated(customers.len()))
        }
    }
}

fn fetched_row(record: &CustomerRecord) -> MeterReadingRow {
    let (row, advisory) = recompute(&record.to_row());
    if let Some(advisory) = advisory {
        debug!(customer = %row.customer_name, "ignored on fetch: {advisory}");
    }
    row
}
