pub mod bill;
pub mod config;
pub mod error;
pub mod fetch;
pub mod invoice;
pub mod movement;

pub use bill::{print_selection, render_bill, BillContext, BillFragment, FileSurface, PrintSurface};
pub use config::{Config, Ledger, State};
pub use error::{BillingError, Result};
pub use fetch::{CustomerFetcher, CustomerRecord, CustomerSource, FetchOutcome, HttpCustomerSource};
pub use invoice::{Navigation, SalesInvoice};
pub use movement::{
    aggregate, recompute, Advisory, FormEvents, MeterReadingRow, MovementDocument, RowField,
    SubmissionState, Totals,
};
