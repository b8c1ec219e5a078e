/// Desk links to the sales invoices raised from a movement.
#[derive(Debug, Clone)]
pub struct Navigation {
    base_url: String,
}

impl Navigation {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// List view of every invoice whose back-reference is `movement_id`.
    pub fn related_invoices(&self, movement_id: &str) -> String {
        format!(
            "{}/app/sales-invoice?custom_meter_movement={}",
            self.base_url,
            encode_component(movement_id)
        )
    }

    pub fn invoice(&self, invoice_id: &str) -> String {
        format!(
            "{}/app/sales-invoice/{}",
            self.base_url,
            encode_component(invoice_id)
        )
    }
}

fn encode_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
