use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::info;

use crate::error::{BillingError, Result};
use crate::movement::{MeterReadingRow, MovementDocument};

use super::render::{render_bill, BillContext, BillFragment};

const FRAGMENT_SEPARATOR: &str = "\n<div class=\"page-break\"></div>\n";

const DOCUMENT_HEAD: &str = r#"<!doctype html>
<html lang="ar" dir="rtl">
<head>
<meta charset="utf-8">
<title>فاتورة كهرباء</title>
<style>
body{font-family: Arial, Tahoma, "Segoe UI", sans-serif;direction: rtl;}
.bill{width:800px;margin:10px auto;border:2px solid #c00;padding:6px}
.bill table{width:100%;border-collapse:collapse}
.bill td, .bill th{border:1px solid #c00;padding:6px;text-align:center}
.header{background:#dff0fb;font-weight:bold;font-size:18px}
.big{font-size:20px;font-weight:bold}
.note{color:#c00;padding:8px}
.page-break{page-break-after:always}
</style>
</head>
<body>
"#;

const DOCUMENT_TAIL: &str = "\n</body>\n</html>\n";

const AUTO_PRINT_SCRIPT: &str =
    "<script>window.addEventListener(\"load\", function () { window.print(); });</script>\n";

/// Where assembled bills go: shown first, then asked to print.
pub trait PrintSurface {
    fn show(&mut self, html: &str) -> Result<()>;
    fn print(&mut self) -> Result<()>;

    /// How long to wait between `show` and `print` given the configured
    /// delay.
    fn layout_delay(&self, configured: Duration) -> Duration {
        configured
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrintSummary {
    pub pages: usize,
    pub customers: Vec<String>,
}

/// Rows the print run includes: flagged rows, plus rows with no flag.
pub fn select_rows(doc: &MovementDocument) -> Vec<&MeterReadingRow> {
    doc.rows.iter().filter(|row| row.is_selected()).collect()
}

/// One standalone HTML document with a page break between bills.
pub fn assemble_document(fragments: &[BillFragment]) -> String {
    let body = fragments
        .iter()
        .map(BillFragment::as_str)
        .collect::<Vec<_>>()
        .join(FRAGMENT_SEPARATOR);

    let mut html = String::with_capacity(DOCUMENT_HEAD.len() + body.len() + DOCUMENT_TAIL.len());
    html.push_str(DOCUMENT_HEAD);
    html.push_str(&body);
    html.push_str(DOCUMENT_TAIL);
    html
}

/// Render the selected rows of `doc`, show them on `surface`, wait for the
/// surface to lay them out (see [`PrintSurface::layout_delay`]), then ask it
/// to print.
///
/// An empty selection fails with [`BillingError::NothingSelected`] before
/// the surface is touched.
pub fn print_selection<S>(
    doc: &MovementDocument,
    ctx: &BillContext,
    surface: &mut S,
    delay: Duration,
) -> Result<PrintSummary>
where
    S: PrintSurface + ?Sized,
{
    let rows = select_rows(doc);
    if rows.is_empty() {
        return Err(BillingError::NothingSelected);
    }

    let fragments: Vec<BillFragment> = rows.iter().map(|row| render_bill(row, ctx)).collect();
    let html = assemble_document(&fragments);

    surface.show(&html)?;
    let delay = surface.layout_delay(delay);
    if !delay.is_zero() {
        thread::sleep(delay);
    }
    surface.print()?;

    info!(document = %doc.id, pages = fragments.len(), "printed bills");
    Ok(PrintSummary {
        pages: fragments.len(),
        customers: fragments
            .iter()
            .map(|f| f.customer_name().to_string())
            .collect(),
    })
}

/// Writes the bills to an HTML file that prints itself once loaded, and
/// optionally opens it with the system viewer. The page's own load handler
/// triggers printing, so no layout delay applies.
#[derive(Debug)]
pub struct FileSurface {
    path: PathBuf,
    open_viewer: bool,
}

impl FileSurface {
    pub fn new(path: impl Into<PathBuf>, open_viewer: bool) -> Self {
        Self {
            path: path.into(),
            open_viewer,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PrintSurface for FileSurface {
    fn show(&mut self, html: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let with_script = match html.rfind("</body>") {
            Some(pos) => format!("{}{}{}", &html[..pos], AUTO_PRINT_SCRIPT, &html[pos..]),
            None => format!("{html}{AUTO_PRINT_SCRIPT}"),
        };
        fs::write(&self.path, with_script)?;
        Ok(())
    }

    fn print(&mut self) -> Result<()> {
        if self.open_viewer {
            open_path(&self.path)?;
        }
        Ok(())
    }

    fn layout_delay(&self, _configured: Duration) -> Duration {
        Duration::ZERO
    }
}

fn open_path(path: &Path) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(path).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(path).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", ""])
            .arg(path)
            .spawn()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::time::Instant;
    use tempfile::TempDir;

    const PAGE_BREAK: &str = r#"<div class="page-break"></div>"#;

    #[derive(Default)]
    struct RecordingSurface {
        shown: Vec<String>,
        printed: usize,
    }

    impl PrintSurface for RecordingSurface {
        fn show(&mut self, html: &str) -> Result<()> {
            self.shown.push(html.to_string());
            Ok(())
        }

        fn print(&mut self) -> Result<()> {
            assert_eq!(self.shown.len(), self.printed + 1, "print before show");
            self.printed += 1;
            Ok(())
        }
    }

    fn ctx() -> BillContext {
        BillContext {
            issuer: "Station".to_string(),
            issue_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            from_date: None,
            to_date: None,
            payment_note: String::new(),
        }
    }

    fn doc(rows: Vec<(&str, Option<bool>)>) -> MovementDocument {
        let mut doc = MovementDocument::new("MM-2026-0001");
        for (name, print) in rows {
            let mut row = MeterReadingRow::new(name, "M");
            row.print = print;
            doc.rows.push(row);
        }
        doc
    }

    #[test]
    fn test_only_flagged_rows_print() {
        let doc = doc(vec![("First", Some(false)), ("Second", Some(true))]);
        let mut surface = RecordingSurface::default();

        let summary = print_selection(&doc, &ctx(), &mut surface, Duration::ZERO).unwrap();

        assert_eq!(summary.pages, 1);
        assert_eq!(summary.customers, vec!["Second"]);
        assert!(!surface.shown[0].contains("First"));
        assert!(surface.shown[0].contains("Second"));
        assert_eq!(surface.printed, 1);
    }

    #[test]
    fn test_rows_without_flag_all_print() {
        let doc = doc(vec![("First", None), ("Second", None)]);
        let mut surface = RecordingSurface::default();

        let summary = print_selection(&doc, &ctx(), &mut surface, Duration::ZERO).unwrap();

        assert_eq!(summary.customers, vec!["First", "Second"]);
        assert_eq!(surface.shown[0].matches(PAGE_BREAK).count(), 1);
    }

    #[test]
    fn test_empty_selection_touches_nothing() {
        let mut surface = RecordingSurface::default();

        for rows in [vec![], vec![("Only", Some(false))]] {
            let err = print_selection(&doc(rows), &ctx(), &mut surface, Duration::ZERO).unwrap_err();
            assert!(matches!(err, BillingError::NothingSelected));
        }
        assert!(surface.shown.is_empty());
        assert_eq!(surface.printed, 0);
    }

    #[test]
    fn test_document_shell() {
        let doc = doc(vec![("A", None), ("B", None), ("C", None)]);
        let fragments: Vec<BillFragment> = doc.rows.iter().map(|r| render_bill(r, &ctx())).collect();

        let html = assemble_document(&fragments);

        assert!(html.starts_with("<!doctype html>"));
        assert!(html.contains(r#"<html lang="ar" dir="rtl">"#));
        assert!(html.contains(r#"<meta charset="utf-8">"#));
        assert_eq!(html.matches(PAGE_BREAK).count(), 2);
        assert_eq!(html.matches(r#"<div class="bill">"#).count(), 3);
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn test_file_surface_writes_self_printing_document() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bills").join("MM-2026-0001.html");
        let doc = doc(vec![("Amal", Some(true))]);
        let mut surface = FileSurface::new(&path, false);

        print_selection(&doc, &ctx(), &mut surface, Duration::ZERO).unwrap();

        let written = fs::read_to_string(surface.path()).unwrap();
        assert!(written.contains("Amal"));
        assert!(written.contains("window.print()"));
        assert!(written.find("window.print()").unwrap() < written.find("</body>").unwrap());
    }

    #[test]
    fn test_layout_delay_defaults_to_configured() {
        let surface = RecordingSurface::default();
        assert_eq!(
            surface.layout_delay(Duration::from_millis(500)),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_file_surface_skips_layout_delay() {
        let temp = TempDir::new().unwrap();
        let mut surface = FileSurface::new(temp.path().join("bills.html"), false);
        assert_eq!(surface.layout_delay(Duration::from_secs(3)), Duration::ZERO);

        let started = Instant::now();
        let doc = doc(vec![("Amal", None)]);
        print_selection(&doc, &ctx(), &mut surface, Duration::from_secs(3)).unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
