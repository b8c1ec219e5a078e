mod print;
mod render;

pub use print::{assemble_document, print_selection, select_rows, FileSurface, PrintSummary, PrintSurface};
pub use render::{escape_html, render_bill, BillContext, BillFragment};
