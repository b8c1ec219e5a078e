use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::movement::{parse_lenient, MeterReadingRow};

/// One customer as returned by `get_customers_for_meter_movement`.
///
/// The service is loose about types: meter numbers may arrive as numbers,
/// readings as numeric strings or `""`, and any key may be missing.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct CustomerRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    pub customer_no: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub customer_name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub customer_full_name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub meter_number: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub previous_reading: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub item_name: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub price_per_kilo: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub balance: Option<f64>,
}

impl CustomerRecord {
    /// Display name, falling back to the full name field.
    pub fn display_name(&self) -> &str {
        if self.customer_name.is_empty() {
            &self.customer_full_name
        } else {
            &self.customer_name
        }
    }

    /// A fresh movement row for this customer. Absent numbers become 0.
    pub fn to_row(&self) -> MeterReadingRow {
        MeterReadingRow {
            customer_no: self.customer_no.clone(),
            customer_name: self.display_name().to_string(),
            meter_number: self.meter_number.clone(),
            item_name: self.item_name.clone(),
            previous_reading: Some(self.previous_reading.unwrap_or(0.0)),
            price: Some(self.price_per_kilo.unwrap_or(0.0)),
            balance: Some(self.balance.unwrap_or(0.0)),
            ..Default::default()
        }
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) if !s.trim().is_empty() => Some(parse_lenient(&s)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_loose_payload() {
        let json = r#"{
            "customer_no": "CUST-0001",
            "customer_name": "Omar",
            "meter_number": 12345,
            "previous_reading": "250.5",
            "item_name": "Electricity",
            "price_per_kilo": 3,
            "balance": null
        }"#;
        let record: CustomerRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.meter_number, "12345");
        assert_eq!(record.previous_reading, Some(250.5));
        assert_eq!(record.price_per_kilo, Some(3.0));
        assert_eq!(record.balance, None);
    }

    #[test]
    fn test_missing_fields_default() {
        let record: CustomerRecord =
            serde_json::from_str(r#"{"customer_full_name": "Mona", "previous_reading": ""}"#)
                .unwrap();

        let row = record.to_row();
        assert_eq!(row.customer_name, "Mona");
        assert_eq!(row.meter_number, "");
        assert_eq!(row.item_name, "");
        assert_eq!(row.previous_reading, Some(0.0));
        assert_eq!(row.price, Some(0.0));
        assert_eq!(row.balance, Some(0.0));
        assert_eq!(row.current_reading, None);
        assert_eq!(row.print, None);
    }

    #[test]
    fn test_customer_name_preferred_over_full_name() {
        let record = CustomerRecord {
            customer_name: "Short".to_string(),
            customer_full_name: "Long Name".to_string(),
            ..Default::default()
        };
        assert_eq!(record.display_name(), "Short");
    }
}
