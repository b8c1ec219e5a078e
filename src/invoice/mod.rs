mod navigation;
mod sales;
mod workflow;

pub use navigation::Navigation;
pub use sales::{InvoiceStatus, SalesInvoice};
pub use workflow::{cancel, cancel_invoices, create_missing_invoices, submit, validate};
