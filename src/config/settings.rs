use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct Config {
    pub issuer: IssuerSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub print: PrintSettings,
}

/// Who the bills are issued by.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct IssuerSettings {
    pub name: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerSettings {
    pub url: String,
    #[serde(default = "default_rpc_method")]
    pub rpc_method: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
            rpc_method: default_rpc_method(),
            api_key: None,
            api_secret: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PrintSettings {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Pause between showing the bills and asking for print, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_payment_note")]
    pub payment_note: String,
}

impl Default for PrintSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            delay_ms: default_delay_ms(),
            payment_note: default_payment_note(),
        }
    }
}

fn default_rpc_method() -> String {
    "electricity_meter_management.electricity_meter_management.doctype.meter_movement.meter_movement.get_customers_for_meter_movement".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_delay_ms() -> u64 {
    500
}

fn default_payment_note() -> String {
    "تنبيه: يرجى التسديد خلال يومين من استلام الفاتورة".to_string()
}
