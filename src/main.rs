use chrono::{Datelike, Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tabled::{settings::Style, Table, Tabled};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use meter_billing::bill::{print_selection, BillContext, FileSurface};
use meter_billing::config::{
    config_dir, load_config, load_state, lock_state, resolve_output_dir, save_state,
    CONFIG_TEMPLATE,
};
use meter_billing::error::{BillingError, Result};
use meter_billing::fetch::{CustomerFetcher, FetchOutcome, HttpCustomerSource};
use meter_billing::invoice::{self, Navigation};
use meter_billing::movement::{
    format_number, FormEvents, MeterReadingRow, MovementDocument, RowField,
};

#[derive(Parser)]
#[command(name = "meter")]
#[command(version, about = "Electricity meter movement billing", long_about = None)]
struct Cli {
    /// Path to config directory (default: ~/.meter or XDG config)
    #[arg(short = 'C', long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config directory with a template config.toml
    Init,

    /// Start a new draft meter movement
    New {
        /// Electricity type whose customers will be fetched
        #[arg(short, long)]
        electricity_type: Option<String>,

        /// First day of the billing period (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Last day of the billing period (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Posting date used on bills and invoices (default: submit date)
        #[arg(long)]
        posting_date: Option<String>,
    },

    /// List meter movements
    List,

    /// Show the rows and totals of a movement
    Show {
        /// Movement id or index from 'list' (e.g., 1 or MM-2026-0001)
        movement: String,
    },

    /// Replace a movement's rows with the customers of its electricity type
    Fetch {
        /// Movement id or index from 'list'
        movement: String,
    },

    /// Add a customer row by hand
    AddRow {
        /// Movement id or index from 'list'
        movement: String,

        /// Customer name
        #[arg(short, long)]
        customer: String,

        /// Customer number
        #[arg(long)]
        customer_no: Option<String>,

        /// Meter number
        #[arg(short, long)]
        meter: Option<String>,

        /// Item billed on the sales invoice
        #[arg(short, long)]
        item: Option<String>,

        /// Previous reading (default: customer's last recorded reading)
        #[arg(long)]
        previous: Option<String>,

        /// Current reading
        #[arg(long)]
        current: Option<String>,

        /// Price per unit
        #[arg(long)]
        price: Option<String>,

        /// Carried balance / arrears
        #[arg(long)]
        balance: Option<String>,

        /// Subscription fee shown on the bill
        #[arg(long)]
        subscription: Option<String>,
    },

    /// Change one field of a row and recalculate
    Set {
        /// Movement id or index from 'list'
        movement: String,

        /// 1-based row number from 'show'
        row: usize,

        /// Field name (e.g., current_reading, price, balance)
        field: String,

        /// New value (empty string clears a number)
        value: String,
    },

    /// Remove a row
    RemoveRow {
        /// Movement id or index from 'list'
        movement: String,

        /// 1-based row number from 'show'
        row: usize,
    },

    /// Choose which rows are printed
    Select {
        /// Movement id or index from 'list'
        movement: String,

        /// 1-based rows to print; every other row is deselected
        rows: Vec<usize>,

        /// Mark every row for printing
        #[arg(long, conflicts_with_all = ["rows", "clear"])]
        all: bool,

        /// Forget the selection so every row prints
        #[arg(long, conflicts_with = "rows")]
        clear: bool,
    },

    /// Write the bills of the selected rows to a printable HTML document
    Print {
        /// Movement id or index from 'list'
        movement: String,

        /// Custom output file path (default: output_dir/<movement>.html)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Open the document with the system default viewer to print it
        #[arg(long)]
        open: bool,
    },

    /// Submit a movement and raise its sales invoices
    Submit {
        /// Movement id or index from 'list'
        movement: String,
    },

    /// Raise sales invoices for submitted rows that have none
    CreateInvoices {
        /// Movement id or index from 'list'
        movement: String,
    },

    /// Cancel a submitted movement and its sales invoices
    Cancel {
        /// Movement id or index from 'list'
        movement: String,
    },

    /// Cancel a submitted movement's sales invoices but keep the movement
    CancelInvoices {
        /// Movement id or index from 'list'
        movement: String,
    },

    /// Show the sales invoices raised from a movement
    Invoices {
        /// Movement id or index from 'list'
        movement: String,
    },
}

fn main() {
    init_tracing();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "meter_billing=error".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let cfg_dir = match cli.config_dir {
        Some(p) => p,
        None => config_dir()?,
    };

    match cli.command {
        Commands::Init => cmd_init(&cfg_dir),
        Commands::New {
            electricity_type,
            from,
            to,
            posting_date,
        } => cmd_new(&cfg_dir, electricity_type, from, to, posting_date),
        Commands::List => cmd_list(&cfg_dir),
        Commands::Show { movement } => cmd_show(&cfg_dir, &movement),
        Commands::Fetch { movement } => cmd_fetch(&cfg_dir, &movement),
        Commands::AddRow {
            movement,
            customer,
            customer_no,
            meter,
            item,
            previous,
            current,
            price,
            balance,
            subscription,
        } => {
            let fields = [
                (RowField::CustomerNo, customer_no),
                (RowField::MeterNumber, meter),
                (RowField::ItemName, item),
                (RowField::PreviousReading, previous),
                (RowField::CurrentReading, current),
                (RowField::Price, price),
                (RowField::Balance, balance),
                (RowField::SubscriptionFees, subscription),
            ];
            cmd_add_row(&cfg_dir, &movement, &customer, &fields)
        }
        Commands::Set {
            movement,
            row,
            field,
            value,
        } => cmd_set(&cfg_dir, &movement, row, &field, &value),
        Commands::RemoveRow { movement, row } => cmd_remove_row(&cfg_dir, &movement, row),
        Commands::Select {
            movement,
            rows,
            all,
            clear,
        } => cmd_select(&cfg_dir, &movement, &rows, all, clear),
        Commands::Print {
            movement,
            output,
            open,
        } => cmd_print(&cfg_dir, &movement, output, open),
        Commands::Submit { movement } => cmd_submit(&cfg_dir, &movement),
        Commands::CreateInvoices { movement } => cmd_create_invoices(&cfg_dir, &movement),
        Commands::Cancel { movement } => cmd_cancel(&cfg_dir, &movement),
        Commands::CancelInvoices { movement } => cmd_cancel_invoices(&cfg_dir, &movement),
        Commands::Invoices { movement } => cmd_invoices(&cfg_dir, &movement),
    }
}

/// Initialize config directory with template files
fn cmd_init(cfg_dir: &Path) -> Result<()> {
    use std::fs;

    if cfg_dir.exists() {
        return Err(BillingError::AlreadyInitialized(cfg_dir.to_path_buf()));
    }

    fs::create_dir_all(cfg_dir)?;
    fs::create_dir_all(cfg_dir.join("output"))?;
    fs::write(cfg_dir.join("config.toml"), CONFIG_TEMPLATE)?;

    println!("Initialized meter config at: {}", cfg_dir.display());
    println!();
    println!("Next steps:");
    println!(
        "  1. Set the issuer name and server URL:  $EDITOR {}/config.toml",
        cfg_dir.display()
    );
    println!("  2. Start a movement:  meter new --electricity-type <type>");
    println!("  3. Load customers:    meter fetch 1");

    Ok(())
}

fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| BillingError::InvalidDate(input.to_string()))
}

fn parse_optional_date(input: Option<String>) -> Result<Option<NaiveDate>> {
    input.as_deref().map(parse_date).transpose()
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Convert a 1-based row number from the CLI to an index.
fn row_index(doc: &MovementDocument, row: usize) -> Result<usize> {
    row.checked_sub(1).ok_or(BillingError::RowNotFound {
        row,
        count: doc.rows.len(),
    })
}

/// Start a draft movement
fn cmd_new(
    cfg_dir: &Path,
    electricity_type: Option<String>,
    from: Option<String>,
    to: Option<String>,
    posting_date: Option<String>,
) -> Result<()> {
    load_config(cfg_dir)?;
    let mut state = load_state(cfg_dir)?;

    let from = parse_optional_date(from)?;
    let to = parse_optional_date(to)?;
    let posting_date = parse_optional_date(posting_date)?;

    let year = today().year() as u32;
    let seq = state.counter.advance(year);
    let id = format!("MM-{}-{:04}", year, seq);

    let mut doc = MovementDocument::new(&id).with_period(from, to);
    doc.electricity_type = electricity_type.filter(|t| !t.trim().is_empty());
    doc.posting_date = posting_date;
    state.movements.push(doc);
    save_state(cfg_dir, &state)?;

    println!("Created {}", id);
    Ok(())
}

#[derive(Tabled)]
struct MovementRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "TYPE")]
    electricity_type: String,
    #[tabled(rename = "PERIOD")]
    period: String,
    #[tabled(rename = "ROWS")]
    rows: usize,
    #[tabled(rename = "CONSUMPTION")]
    consumption: String,
    #[tabled(rename = "TOTAL")]
    total: String,
    #[tabled(rename = "STATE")]
    state: String,
}

#[derive(Tabled)]
struct ReadingRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "CUSTOMER")]
    customer: String,
    #[tabled(rename = "METER")]
    meter: String,
    #[tabled(rename = "PREV")]
    previous: String,
    #[tabled(rename = "CURR")]
    current: String,
    #[tabled(rename = "DIFF")]
    difference: String,
    #[tabled(rename = "PRICE")]
    price: String,
    #[tabled(rename = "TOTAL")]
    total: String,
    #[tabled(rename = "BALANCE")]
    balance: String,
    #[tabled(rename = "DUE")]
    total_all: String,
    #[tabled(rename = "PRINT")]
    print: String,
    #[tabled(rename = "INVOICE")]
    invoice: String,
}

#[derive(Tabled)]
struct InvoiceRow {
    #[tabled(rename = "ROW")]
    row: usize,
    #[tabled(rename = "INVOICE")]
    id: String,
    #[tabled(rename = "CUSTOMER")]
    customer: String,
    #[tabled(rename = "QTY")]
    qty: String,
    #[tabled(rename = "RATE")]
    rate: String,
    #[tabled(rename = "AMOUNT")]
    amount: String,
    #[tabled(rename = "STATUS")]
    status: String,
}

fn cell(value: Option<f64>) -> String {
    value.map(format_number).unwrap_or_default()
}

fn money(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_default()
}

/// List movements, newest first
fn cmd_list(cfg_dir: &Path) -> Result<()> {
    load_config(cfg_dir)?;
    let state = load_state(cfg_dir)?;

    if state.movements.is_empty() {
        println!("No movements yet.");
        return Ok(());
    }

    let rows: Vec<MovementRow> = state
        .movements
        .iter()
        .rev()
        .enumerate()
        .map(|(idx, doc)| MovementRow {
            index: idx + 1,
            id: doc.id.clone(),
            electricity_type: doc.electricity_type.clone().unwrap_or_default(),
            period: format_period(doc),
            rows: doc.rows.len(),
            consumption: format_number(doc.total_consumption),
            total: format!("{:.2}", doc.total),
            state: doc.submission_state.to_string(),
        })
        .collect();

    println!("{}", Table::new(rows).with(Style::rounded()));
    println!();
    println!("Use index number or id with show/fetch/print/submit (e.g., 'meter show 1')");
    Ok(())
}

fn format_period(doc: &MovementDocument) -> String {
    match (doc.from_date, doc.to_date) {
        (None, None) => String::new(),
        (from, to) => format!(
            "{} → {}",
            from.map(|d| d.to_string()).unwrap_or_default(),
            to.map(|d| d.to_string()).unwrap_or_default()
        ),
    }
}

/// Show rows and totals of one movement
fn cmd_show(cfg_dir: &Path, reference: &str) -> Result<()> {
    load_config(cfg_dir)?;
    let state = load_state(cfg_dir)?;
    let doc = &state.movements[state.resolve_movement(reference)?];

    println!("Movement:          {}", doc.id);
    println!("State:             {}", doc.submission_state);
    println!(
        "Electricity type:  {}",
        doc.electricity_type.as_deref().unwrap_or("(not set)")
    );
    let period = format_period(doc);
    if !period.is_empty() {
        println!("Period:            {}", period);
    }
    if let Some(date) = doc.posting_date {
        println!("Posting date:      {}", date);
    }
    println!();

    if doc.rows.is_empty() {
        println!("No rows. Use 'meter fetch' or 'meter add-row' to add customers.");
    } else {
        let rows: Vec<ReadingRow> = doc
            .rows
            .iter()
            .enumerate()
            .map(|(idx, row)| reading_row(idx, row))
            .collect();
        println!("{}", Table::new(rows).with(Style::rounded()));
        println!();
    }

    println!("Total consumption: {}", format_number(doc.total_consumption));
    println!("Total:             {:.2}", doc.total);
    Ok(())
}

fn reading_row(idx: usize, row: &MeterReadingRow) -> ReadingRow {
    ReadingRow {
        index: idx + 1,
        customer: row.customer_name.clone(),
        meter: row.meter_number.clone(),
        previous: cell(row.previous_reading),
        current: cell(row.current_reading),
        difference: cell(row.difference),
        price: cell(row.price),
        total: money(row.total),
        balance: money(row.balance),
        total_all: money(row.total_all),
        print: match row.print {
            Some(true) => "yes".to_string(),
            Some(false) => "no".to_string(),
            None => "-".to_string(),
        },
        invoice: row.linked_invoice.clone().unwrap_or_default(),
    }
}

/// Fetch customers into a movement
fn cmd_fetch(cfg_dir: &Path, reference: &str) -> Result<()> {
    let config = load_config(cfg_dir)?;
    let _lock = lock_state(cfg_dir)?;
    let mut state = load_state(cfg_dir)?;
    let idx = state.resolve_movement(reference)?;

    let source = HttpCustomerSource::new(&config.server);
    debug!(endpoint = source.endpoint(), "fetching customers");
    let fetcher = CustomerFetcher::new();
    let outcome = fetcher.populate(&mut state.movements[idx], &source)?;
    save_state(cfg_dir, &state)?;

    match outcome {
        FetchOutcome::Populated(count) => {
            println!("Added {} customer(s) to {}", count, state.movements[idx].id)
        }
        FetchOutcome::NoCustomers => println!("No customers found."),
    }
    Ok(())
}

/// Add a row by hand
fn cmd_add_row(
    cfg_dir: &Path,
    reference: &str,
    customer: &str,
    fields: &[(RowField, Option<String>)],
) -> Result<()> {
    load_config(cfg_dir)?;
    let mut state = load_state(cfg_dir)?;
    let idx = state.resolve_movement(reference)?;

    let mut row = MeterReadingRow::new(customer, "");
    for (field, value) in fields {
        if let Some(value) = value {
            field.apply(&mut row, value);
        }
    }
    if row.previous_reading.is_none() {
        row.previous_reading = state.ledger.last_reading(customer);
    }

    let events = FormEvents::standard();
    let (row_idx, advisory) = events.add_row(&mut state.movements[idx], row)?;
    if let Some(advisory) = advisory {
        eprintln!("Warning: {advisory}");
    }
    save_state(cfg_dir, &state)?;

    let doc = &state.movements[idx];
    println!("Added row {} to {}", row_idx + 1, doc.id);
    println!("  Total: {}", money(doc.rows[row_idx].total_all));
    Ok(())
}

/// Set one field and recalculate
fn cmd_set(cfg_dir: &Path, reference: &str, row: usize, field: &str, value: &str) -> Result<()> {
    load_config(cfg_dir)?;
    let mut state = load_state(cfg_dir)?;
    let idx = state.resolve_movement(reference)?;
    let field: RowField = field.parse()?;

    let row_idx = row_index(&state.movements[idx], row)?;
    let events = FormEvents::standard();
    let advisories = events.set_field(&mut state.movements[idx], row_idx, field, value)?;
    for advisory in &advisories {
        eprintln!("Warning: {advisory}");
    }
    save_state(cfg_dir, &state)?;

    let doc = &state.movements[idx];
    let updated = doc.row(row_idx)?;
    println!("Updated {} of row {} in {}", field, row, doc.id);
    println!(
        "  Difference: {}  Total: {}  Due: {}",
        cell(updated.difference),
        money(updated.total),
        money(updated.total_all)
    );
    println!(
        "  Document: consumption {}, total {:.2}",
        format_number(doc.total_consumption),
        doc.total
    );
    Ok(())
}

/// Remove a row
fn cmd_remove_row(cfg_dir: &Path, reference: &str, row: usize) -> Result<()> {
    load_config(cfg_dir)?;
    let mut state = load_state(cfg_dir)?;
    let idx = state.resolve_movement(reference)?;

    let row_idx = row_index(&state.movements[idx], row)?;
    let events = FormEvents::standard();
    let removed = events.remove_row(&mut state.movements[idx], row_idx)?;
    save_state(cfg_dir, &state)?;

    let doc = &state.movements[idx];
    println!("Removed row {} ({}) from {}", row, removed.customer_name, doc.id);
    println!(
        "  Document: consumption {}, total {:.2}",
        format_number(doc.total_consumption),
        doc.total
    );
    Ok(())
}

/// Set print flags
fn cmd_select(cfg_dir: &Path, reference: &str, rows: &[usize], all: bool, clear: bool) -> Result<()> {
    load_config(cfg_dir)?;
    let mut state = load_state(cfg_dir)?;
    let idx = state.resolve_movement(reference)?;
    let doc = &mut state.movements[idx];

    for &row in rows {
        doc.row(row_index(doc, row)?)?;
    }

    for (i, row) in doc.rows.iter_mut().enumerate() {
        row.print = if clear {
            None
        } else if all {
            Some(true)
        } else {
            Some(rows.contains(&(i + 1)))
        };
    }

    let selected = doc.rows.iter().filter(|r| r.is_selected()).count();
    let total = doc.rows.len();
    let id = doc.id.clone();
    save_state(cfg_dir, &state)?;

    println!(
        "{} of {} row(s) selected for printing in {}",
        selected, total, id
    );
    Ok(())
}

/// Print the selected bills
fn cmd_print(cfg_dir: &Path, reference: &str, output: Option<PathBuf>, open: bool) -> Result<()> {
    let config = load_config(cfg_dir)?;
    let state = load_state(cfg_dir)?;
    let doc = &state.movements[state.resolve_movement(reference)?];

    let path = output.unwrap_or_else(|| {
        resolve_output_dir(&config.print.output_dir, cfg_dir).join(format!("{}.html", doc.id))
    });

    let ctx = BillContext::for_document(
        doc,
        config.issuer.name.as_str(),
        config.print.payment_note.as_str(),
        today(),
    );
    let mut surface = FileSurface::new(&path, open);
    let delay = Duration::from_millis(config.print.delay_ms);
    let summary = print_selection(doc, &ctx, &mut surface, delay)?;

    println!("Printed {} bill(s) from {}", summary.pages, doc.id);
    println!("  Saved: {}", path.display());
    Ok(())
}

/// Submit and raise sales invoices
fn cmd_submit(cfg_dir: &Path, reference: &str) -> Result<()> {
    load_config(cfg_dir)?;
    let mut state = load_state(cfg_dir)?;
    let idx = state.resolve_movement(reference)?;

    let created = invoice::submit(&mut state.movements[idx], &mut state.ledger, today())?;
    save_state(cfg_dir, &state)?;

    println!("Submitted {}", state.movements[idx].id);
    for id in &created {
        println!("  Sales invoice {} created", id);
    }
    Ok(())
}

fn cmd_create_invoices(cfg_dir: &Path, reference: &str) -> Result<()> {
    load_config(cfg_dir)?;
    let mut state = load_state(cfg_dir)?;
    let idx = state.resolve_movement(reference)?;

    let count =
        invoice::create_missing_invoices(&mut state.movements[idx], &mut state.ledger, today())?;
    save_state(cfg_dir, &state)?;

    if count > 0 {
        println!("Created {} sales invoice(s)", count);
    } else {
        println!("All sales invoices already exist");
    }
    Ok(())
}

fn cmd_cancel(cfg_dir: &Path, reference: &str) -> Result<()> {
    load_config(cfg_dir)?;
    let mut state = load_state(cfg_dir)?;
    let idx = state.resolve_movement(reference)?;

    let cancelled = invoice::cancel(&mut state.movements[idx], &mut state.ledger)?;
    save_state(cfg_dir, &state)?;

    println!("Cancelled {}", state.movements[idx].id);
    println!("  {} sales invoice(s) cancelled, readings restored", cancelled);
    Ok(())
}

fn cmd_cancel_invoices(cfg_dir: &Path, reference: &str) -> Result<()> {
    load_config(cfg_dir)?;
    let mut state = load_state(cfg_dir)?;
    let idx = state.resolve_movement(reference)?;

    let cancelled = invoice::cancel_invoices(&mut state.movements[idx], &mut state.ledger)?;
    save_state(cfg_dir, &state)?;

    println!(
        "Cancelled {} sales invoice(s) of {}",
        cancelled, state.movements[idx].id
    );
    if cancelled > 0 {
        println!("  Use 'meter create-invoices' to raise them again");
    }
    Ok(())
}

/// List invoices linked to a movement with desk links
fn cmd_invoices(cfg_dir: &Path, reference: &str) -> Result<()> {
    let config = load_config(cfg_dir)?;
    let state = load_state(cfg_dir)?;
    let doc = &state.movements[state.resolve_movement(reference)?];
    let nav = Navigation::new(&config.server.url);

    let rows: Vec<InvoiceRow> = state
        .ledger
        .invoices_for(&doc.id)
        .map(|inv| InvoiceRow {
            row: inv.movement_row,
            id: inv.id.clone(),
            customer: inv.customer.clone(),
            qty: format_number(inv.qty),
            rate: format_number(inv.rate),
            amount: format!("{:.2}", inv.amount),
            status: inv.status.to_string(),
        })
        .collect();

    if rows.is_empty() {
        println!("No sales invoices for {}.", doc.id);
    } else {
        println!("{}", Table::new(rows).with(Style::rounded()));
    }

    println!();
    println!("All invoices: {}", nav.related_invoices(&doc.id));
    for (idx, row) in doc.rows.iter().enumerate() {
        if let Some(id) = &row.linked_invoice {
            println!("  Row {}: {}", idx + 1, nav.invoice(id));
        }
    }
    Ok(())
}
