use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};
use ureq::Agent;

use crate::config::ServerSettings;
use crate::error::{BillingError, Result};

use super::{CustomerRecord, CustomerSource};

/// Envelope of a whitelisted server method response.
#[derive(Debug, Deserialize)]
struct MethodResponse {
    #[serde(default)]
    message: Value,
}

/// Calls the customer lookup method over HTTP.
pub struct HttpCustomerSource {
    agent: Agent,
    endpoint: String,
    authorization: Option<String>,
}

impl HttpCustomerSource {
    pub fn new(settings: &ServerSettings) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(settings.timeout_secs)))
            .build()
            .into();

        let authorization = match (&settings.api_key, &settings.api_secret) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Some(format!("token {key}:{secret}"))
            }
            _ => None,
        };

        Self {
            agent,
            endpoint: method_url(&settings.url, &settings.rpc_method),
            authorization,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl CustomerSource for HttpCustomerSource {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    fn fetch_customers(&self, electricity_type: &str) -> Result<Vec<CustomerRecord>> {
        let mut request = self
            .agent
            .get(&self.endpoint)
            .query("electricity_type", electricity_type)
            .header("Accept", "application/json");
        if let Some(auth) = &self.authorization {
            request = request.header("Authorization", auth);
        }

        let body: String = request
            .call()
            .map_err(|e| BillingError::Transport(e.to_string()))?
            .body_mut()
            .read_to_string()
            .map_err(|e| BillingError::Transport(e.to_string()))?;

        debug!(bytes = body.len(), "customer lookup response received");
        parse_customers(&body)
    }
}

/// `{base}/api/method/{method}` with exactly one slash between the parts.
pub(crate) fn method_url(base: &str, method: &str) -> String {
    format!(
        "{}/api/method/{}",
        base.trim_end_matches('/'),
        method.trim_start_matches('/')
    )
}

/// Decode the `message` array. Anything other than an array means nobody
/// was found.
pub(crate) fn parse_customers(body: &str) -> Result<Vec<CustomerRecord>> {
    let response: MethodResponse = serde_json::from_str(body)?;
    match response.message {
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(BillingError::from))
            .collect(),
        _ => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Answer one request with `body` and hand back the raw request head.
    fn serve_once(body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&head).into_owned()
        });
        (url, handle)
    }

    fn settings(url: &str) -> ServerSettings {
        ServerSettings {
            url: url.to_string(),
            rpc_method: "billing.get_customers".to_string(),
            api_key: Some("k".to_string()),
            api_secret: Some("s".to_string()),
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_method_url_joins_cleanly() {
        assert_eq!(
            method_url("https://erp.example.com/", "/billing.get_customers"),
            "https://erp.example.com/api/method/billing.get_customers"
        );
        assert_eq!(
            method_url("http://localhost:8000", "billing.get_customers"),
            "http://localhost:8000/api/method/billing.get_customers"
        );
    }

    #[test]
    fn test_parse_customers_reads_message_array() {
        let body = r#"{"message": [
            {"customer_no": "C-1", "customer_name": "Amal", "meter_number": "A1", "previous_reading": 10, "item_name": "Power", "price_per_kilo": 2, "balance": 5.5},
            {"customer_no": "C-2", "customer_full_name": "Badr Saleh", "meter_number": 77}
        ]}"#;

        let customers = parse_customers(body).unwrap();

        assert_eq!(customers.len(), 2);
        assert_eq!(customers[0].balance, Some(5.5));
        assert_eq!(customers[1].display_name(), "Badr Saleh");
        assert_eq!(customers[1].meter_number, "77");
    }

    #[test]
    fn test_parse_customers_without_array_is_empty() {
        assert!(parse_customers(r#"{"message": null}"#).unwrap().is_empty());
        assert!(parse_customers(r#"{}"#).unwrap().is_empty());
        assert!(parse_customers(r#"{"message": "nothing"}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_customers_rejects_non_json() {
        assert!(matches!(
            parse_customers("<html>502</html>"),
            Err(BillingError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_token_header_only_with_both_parts() {
        let mut settings = ServerSettings::default();
        assert!(HttpCustomerSource::new(&settings).authorization.is_none());

        settings.api_key = Some("key".to_string());
        assert!(HttpCustomerSource::new(&settings).authorization.is_none());

        settings.api_secret = Some("secret".to_string());
        assert_eq!(
            HttpCustomerSource::new(&settings).authorization.as_deref(),
            Some("token key:secret")
        );
    }

    #[test]
    fn test_fetch_customers_over_http() {
        let (url, server) = serve_once(
            r#"{"message": [{"customer_name": "Amal", "meter_number": "A1", "previous_reading": 120, "balance": "10"}]}"#,
        );
        let source = HttpCustomerSource::new(&settings(&url));
        assert_eq!(source.endpoint(), format!("{url}/api/method/billing.get_customers"));

        let customers = source.fetch_customers("Residential").unwrap();

        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].customer_name, "Amal");
        assert_eq!(customers[0].previous_reading, Some(120.0));
        assert_eq!(customers[0].balance, Some(10.0));

        let request = server.join().unwrap();
        let request_line = request.lines().next().unwrap();
        assert_eq!(
            request_line,
            "GET /api/method/billing.get_customers?electricity_type=Residential HTTP/1.1"
        );
        assert!(request
            .to_ascii_lowercase()
            .contains("\r\nauthorization: token k:s\r\n"));
    }

    #[test]
    fn test_fetch_customers_empty_message() {
        let (url, server) = serve_once(r#"{"message": []}"#);
        let mut settings = settings(&url);
        settings.api_key = None;

        let customers = HttpCustomerSource::new(&settings)
            .fetch_customers("Commercial")
            .unwrap();

        assert!(customers.is_empty());
        let request = server.join().unwrap();
        assert!(request.contains("?electricity_type=Commercial "));
        assert!(!request.to_ascii_lowercase().contains("authorization:"));
    }
}
