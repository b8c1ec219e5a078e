use std::path::PathBuf;
use thiserror::Error;

use crate::movement::SubmissionState;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Config directory not found at {0}. Run 'meter init' to create it.")]
    ConfigNotFound(PathBuf),

    #[error("Config file not found: {0}")]
    ConfigFileNotFound(PathBuf),

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to write state file: {0}")]
    StateWrite(#[from] toml::ser::Error),

    #[error("Config directory already exists at {0}")]
    AlreadyInitialized(PathBuf),

    #[error("Select an electricity type before fetching customers (use 'meter new --electricity-type <type>')")]
    ElectricityTypeRequired,

    #[error("A customer fetch is already in progress for this document")]
    FetchInProgress,

    #[error("Another fetch is running on this config (lock file {0}). Remove the file if no fetch is running.")]
    StateLocked(PathBuf),

    #[error("Customer lookup failed: {0}")]
    Transport(String),

    #[error("Invalid customer lookup response: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    #[error("Movement '{0}' not found")]
    MovementNotFound(String),

    #[error("Invalid movement index '{0}'. Use 'meter list' to see available movements.")]
    InvalidMovementIndex(String),

    #[error("Row {row} does not exist (document has {count} row(s))")]
    RowNotFound { row: usize, count: usize },

    #[error("Unknown field '{0}'. Expected one of: previous_reading, current_reading, price, balance, subscription_fees, customer_name, customer_no, meter_number, item_name")]
    UnknownField(String),

    #[error("Document {id} is {state}; rows can only be changed while it is Draft")]
    DocumentNotDraft { id: String, state: SubmissionState },

    #[error("Document {id} must be {expected} (currently {actual})")]
    InvalidTransition {
        id: String,
        expected: SubmissionState,
        actual: SubmissionState,
    },

    #[error("{0}")]
    Validation(String),

    #[error("No rows selected for printing. Mark the rows to print first.")]
    NothingSelected,

    #[error("Invalid date '{0}'. Expected YYYY-MM-DD.")]
    InvalidDate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BillingError>;
