mod aggregate;
mod calculator;
mod events;
mod model;
mod value;

pub use aggregate::{aggregate, Totals};
pub use calculator::{recompute, Advisory};
pub use events::{FieldHandler, FormEvents, RowField};
pub use model::{MeterReadingRow, MovementDocument, SubmissionState};
pub use value::{format_number, parse_lenient};
