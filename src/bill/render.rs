use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use crate::movement::{format_number, MeterReadingRow, MovementDocument};

/// Embedded bill layout. `{{key}}` placeholders are filled with escaped
/// values by [`render_bill`]; unknown keys are left untouched.
const BILL_TEMPLATE: &str = r#"<div class="bill">
<table>
<tr><td class="header" colspan="2">فاتورة كهرباء</td><td class="header" colspan="2">{{issuer}}</td></tr>
<tr><td>تاريخ الإصدار</td><td>{{issue_date}}</td><td>الفترة</td><td>{{from_date}} - {{to_date}}</td></tr>
<tr><td>رقم المشترك</td><td class="big">{{customer_no}}</td><td>رقم العداد</td><td>{{meter_number}}</td></tr>
<tr><td>اسم المشترك</td><td colspan="3">{{customer_name}}</td></tr>
<tr><th>السابقة</th><th>الحالية</th><th>فارق القراءة</th><th>قيمة الاستهلاك</th></tr>
<tr><td>{{previous_reading}}</td><td>{{current_reading}}</td><td>{{difference}}</td><td>{{consumption_value}}</td></tr>
<tr><td>رسوم الإشتراك</td><td>{{subscription_fees}}</td><td>السعر</td><td>{{price}}</td></tr>
<tr><td>الرصيد السابق</td><td>{{balance}}</td><td>قيمة الاستهلاك المستحقة</td><td>{{total}}</td></tr>
<tr><td colspan="3">إجمالي المبلغ المستحق</td><td class="big">{{total_all}}</td></tr>
</table>
<div class="note">{{payment_note}}</div>
</div>"#;

/// Document-level values shared by every bill of one print run.
#[derive(Debug, Clone, Serialize)]
pub struct BillContext {
    pub issuer: String,
    pub issue_date: NaiveDate,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub payment_note: String,
}

impl BillContext {
    /// Context for `doc`; the issue date is the posting date, else `today`.
    pub fn for_document(
        doc: &MovementDocument,
        issuer: impl Into<String>,
        payment_note: impl Into<String>,
        today: NaiveDate,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            issue_date: doc.posting_date.unwrap_or(today),
            from_date: doc.from_date,
            to_date: doc.to_date,
            payment_note: payment_note.into(),
        }
    }
}

/// Markup for one customer's bill. Every interpolated value is escaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillFragment {
    customer_name: String,
    markup: String,
}

impl BillFragment {
    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    pub fn as_str(&self) -> &str {
        &self.markup
    }
}

impl fmt::Display for BillFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.markup)
    }
}

/// Render the bill of one row. Never fails: missing values print as empty
/// cells. The consumption value is recomputed from difference and price
/// rather than read from the stored total.
pub fn render_bill(row: &MeterReadingRow, ctx: &BillContext) -> BillFragment {
    let consumption_value = row.difference.unwrap_or(0.0) * row.price.unwrap_or(0.0);

    let markup = fill_template(BILL_TEMPLATE, |key| {
        let value = match key {
            "issuer" => ctx.issuer.clone(),
            "issue_date" => ctx.issue_date.to_string(),
            "from_date" => date_cell(ctx.from_date),
            "to_date" => date_cell(ctx.to_date),
            "customer_no" => row.customer_no.clone(),
            "customer_name" => row.customer_name.clone(),
            "meter_number" => row.meter_number.clone(),
            "previous_reading" => number_cell(row.previous_reading),
            "current_reading" => number_cell(row.current_reading),
            "difference" => number_cell(row.difference),
            "consumption_value" => format_number(consumption_value),
            "subscription_fees" => number_cell(row.subscription_fees),
            "price" => number_cell(row.price),
            "balance" => number_cell(row.balance),
            "total" => number_cell(row.total),
            "total_all" => number_cell(row.total_all),
            "payment_note" => ctx.payment_note.clone(),
            _ => return None,
        };
        Some(value)
    });

    BillFragment {
        customer_name: row.customer_name.clone(),
        markup,
    }
}

fn number_cell(value: Option<f64>) -> String {
    value.map(format_number).unwrap_or_default()
}

fn date_cell(value: Option<NaiveDate>) -> String {
    value.map(|d| d.to_string()).unwrap_or_default()
}

/// Single pass over `template`; substituted values are never rescanned.
pub(crate) fn fill_template<F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len() + 256);
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = &after[..end];
                match lookup(key.trim()) {
                    Some(value) => out.push_str(&escape_html(&value)),
                    None => {
                        out.push_str("{{");
                        out.push_str(key);
                        out.push_str("}}");
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> BillContext {
        BillContext {
            issuer: "Al-Faqih Station".to_string(),
            issue_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            from_date: NaiveDate::from_ymd_opt(2026, 2, 1),
            to_date: None,
            payment_note: "Pay within two days".to_string(),
        }
    }

    fn full_row() -> MeterReadingRow {
        MeterReadingRow {
            customer_no: "CUST-0042".to_string(),
            customer_name: "Amal Saeed".to_string(),
            meter_number: "MTR-7".to_string(),
            previous_reading: Some(100.0),
            current_reading: Some(150.0),
            price: Some(3.0),
            balance: Some(20.0),
            subscription_fees: Some(5.0),
            difference: Some(50.0),
            total: Some(150.0),
            total_all: Some(170.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_render_fills_every_block() {
        let bill = render_bill(&full_row(), &ctx());
        let html = bill.as_str();

        assert!(html.contains("Al-Faqih Station"));
        assert!(html.contains("<td>2026-03-01</td>"));
        assert!(html.contains("<td>2026-02-01 - </td>"));
        assert!(html.contains(r#"<td class="big">CUST-0042</td>"#));
        assert!(html.contains("<td>MTR-7</td>"));
        assert!(html.contains(r#"<td colspan="3">Amal Saeed</td>"#));
        assert!(html.contains("<td>100</td><td>150</td><td>50</td><td>150</td>"));
        assert!(html.contains("<td>5</td>"));
        assert!(html.contains(r#"<td class="big">170</td>"#));
        assert!(html.contains("Pay within two days"));
        assert!(!html.contains("{{"));
        assert_eq!(bill.customer_name(), "Amal Saeed");
    }

    #[test]
    fn test_consumption_value_ignores_stored_total() {
        let mut row = full_row();
        row.total = Some(999.0);

        let html = render_bill(&row, &ctx()).to_string();

        assert!(html.contains("<td>50</td><td>150</td></tr>"));
        assert!(html.contains("<td>999</td>"));
    }

    #[test]
    fn test_missing_fields_render_empty() {
        let row = MeterReadingRow::new("Badr", "");
        let html = render_bill(&row, &ctx()).to_string();

        assert!(html.contains("<td></td><td></td><td></td><td>0</td>"));
        assert!(html.contains(r#"<td class="big"></td>"#));
    }

    #[test]
    fn test_customer_text_is_escaped() {
        let mut row = full_row();
        row.customer_name = "<script>alert('x')</script> & co".to_string();

        let html = render_bill(&row, &ctx()).to_string();

        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; co"));
    }

    #[test]
    fn test_values_are_not_rescanned_as_placeholders() {
        let mut row = full_row();
        row.customer_name = "{{issuer}}".to_string();

        let html = render_bill(&row, &ctx()).to_string();

        assert!(html.contains(r#"<td colspan="3">{{issuer}}</td>"#));
    }

    #[test]
    fn test_render_does_not_mutate_row() {
        let row = full_row();
        let before = row.clone();
        let _ = render_bill(&row, &ctx());
        assert_eq!(row, before);
    }

    #[test]
    fn test_fill_template_leaves_unknown_and_unterminated() {
        let out = fill_template("a {{known}} b {{other}} c {{open", |key| {
            (key == "known").then(|| "K".to_string())
        });
        assert_eq!(out, "a K b {{other}} c {{open");
    }
}
