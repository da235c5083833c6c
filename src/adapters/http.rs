//! HTTP client adapter.
//!
//! Implements [`HttpPort`] for the one-shot registration exchange.
//! One request per call, no retries, no redirects, bounded body.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspHttpConnection` behind the `embedded_svc`
//!   blocking client.
//! - **all other targets**: a canned backend that records every request.

use log::{debug, warn};

use crate::app::ports::{HttpError, HttpPort, HttpResponse};

/// Bound on one exchange, connect included.
pub const HTTP_TIMEOUT_MS: u64 = 10_000;

/// Larger registration bodies are truncated, which fails parsing.
const MAX_RESPONSE_BODY: usize = 1024;

/// Map a transport return code onto the port's error taxonomy.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
fn classify(code: i32) -> HttpError {
    // ESP_ERR_TIMEOUT and ESP_ERR_HTTP_EAGAIN
    const TIMEOUT: i32 = 0x107;
    const EAGAIN: i32 = 0x7007;
    match code {
        TIMEOUT | EAGAIN => HttpError::Timeout,
        _ => HttpError::Connect,
    }
}

pub struct HttpAdapter {
    /// Simulation: the response every request receives.
    #[cfg(not(target_os = "espidf"))]
    sim_response: Result<HttpResponse, HttpError>,
    /// Simulation: `(url, body)` of every request.
    #[cfg(not(target_os = "espidf"))]
    sim_requests: Vec<(String, String)>,
}

impl Default for HttpAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new() -> Self {
        Self {}
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            sim_response: Ok(HttpResponse {
                status: 201,
                body: r#"{"device_id":"sim-device","mqtt_username":"sim-device","mqtt_password":"sim-secret"}"#
                    .to_string(),
            }),
            sim_requests: Vec::new(),
        }
    }

    /// Simulation: replace the canned response.
    #[cfg(not(target_os = "espidf"))]
    pub fn respond_with(&mut self, response: Result<HttpResponse, HttpError>) {
        self.sim_response = response;
    }

    /// Simulation: requests seen so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn requests(&self) -> &[(String, String)] {
        &self.sim_requests
    }
}

impl HttpPort for HttpAdapter {
    #[cfg(target_os = "espidf")]
    fn post_json(&mut self, url: &str, body: &str) -> Result<HttpResponse, HttpError> {
        use core::time::Duration;
        use embedded_svc::http::client::Client as HttpClient;
        use embedded_svc::http::Status;
        use embedded_svc::io::{Read, Write};
        use esp_idf_svc::http::client::{Configuration, EspHttpConnection};

        let conf = Configuration {
            timeout: Some(Duration::from_millis(HTTP_TIMEOUT_MS)),
            ..Default::default()
        };
        let conn = EspHttpConnection::new(&conf).map_err(|e| classify(e.code()))?;
        let mut client = HttpClient::wrap(conn);

        let content_length = body.len().to_string();
        let headers = [
            ("Content-Type", "application/json"),
            ("Content-Length", content_length.as_str()),
        ];
        let mut request = client
            .post(url, &headers)
            .map_err(|e| classify(e.0.code()))?;
        request
            .write_all(body.as_bytes())
            .map_err(|e| classify(e.0.code()))?;
        request.flush().map_err(|e| classify(e.0.code()))?;
        let mut response = request.submit().map_err(|e| classify(e.0.code()))?;

        let status = response.status();
        let mut buf = [0u8; MAX_RESPONSE_BODY];
        let mut len = 0;
        while len < buf.len() {
            let n = response.read(&mut buf[len..]).map_err(|e| {
                warn!("Reg: body read failed: {}", e);
                HttpError::Read
            })?;
            if n == 0 {
                break;
            }
            len += n;
        }
        debug!("Reg: HTTP {} ({} bytes)", status, len);

        Ok(HttpResponse {
            status,
            body: String::from_utf8_lossy(&buf[..len]).into_owned(),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn post_json(&mut self, url: &str, body: &str) -> Result<HttpResponse, HttpError> {
        self.sim_requests.push((url.to_string(), body.to_string()));
        let mut response = self.sim_response.clone().inspect_err(|e| warn!("Reg(sim): {}", e))?;
        response.body.truncate(MAX_RESPONSE_BODY);
        debug!("Reg(sim): HTTP {} ({} bytes)", response.status, response.body.len());
        Ok(response)
    }
}
