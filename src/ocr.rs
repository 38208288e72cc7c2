use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::blocking::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::Credentials;
use crate::error::OcrError;
use crate::types::{DocumentMode, LicenseField, OcrToken, RawFieldResult};

pub const BAIDU_BASE_URL: &str = "https://aip.baidubce.com";

/// Remote recognition capability: image bytes in, raw fields out.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, mode: DocumentMode, image_bytes: &[u8]) -> Result<RawFieldResult, OcrError>;
}

/// Baidu AI vehicle OCR (`vehicle_license` / `vehicle_invoice`).
pub struct BaiduOcr {
    client: Client,
    base_url: String,
    access_token: String,
}

impl BaiduOcr {
    /// Build the HTTP client and exchange the API key pair for an access token.
    pub fn connect(credentials: &Credentials, timeout: Duration) -> Result<Self, OcrError> {
        Self::connect_to(BAIDU_BASE_URL, credentials, timeout)
    }

    pub fn connect_to(base_url: &str, credentials: &Credentials, timeout: Duration) -> Result<Self, OcrError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.trim_end_matches('/').to_string();
        let access_token = fetch_access_token(&client, &base_url, credentials)?;
        Ok(Self { client, base_url, access_token })
    }

    fn endpoint(&self, mode: DocumentMode) -> String {
        let name = match mode {
            DocumentMode::License => "vehicle_license",
            DocumentMode::Invoice => "vehicle_invoice",
        };
        format!("{}/rest/2.0/ocr/v1/{}", self.base_url, name)
    }
}

impl OcrBackend for BaiduOcr {
    fn recognize(&self, mode: DocumentMode, image_bytes: &[u8]) -> Result<RawFieldResult, OcrError> {
        let image = BASE64.encode(image_bytes);
        let response = self
            .client
            .post(self.endpoint(mode))
            .query(&[("access_token", self.access_token.as_str())])
            .header("Accept", "application/json")
            .form(&[("image", image.as_str())])
            .send()?;

        let status = response.status();
        let body = response.text()?;
        let json: Value = serde_json::from_str(&body).map_err(|e| {
            OcrError::Malformed(format!("HTTP {status}: {e}: {}", truncate(&body, 200)))
        })?;
        tracing::debug!("OCR result: {}", json);
        parse_response(mode, &json)
    }
}

fn fetch_access_token(client: &Client, base_url: &str, credentials: &Credentials) -> Result<String, OcrError> {
    let url = format!("{base_url}/oauth/2.0/token");
    let json: Value = client
        .get(&url)
        .query(&[
            ("grant_type", "client_credentials"),
            ("client_id", credentials.api_key.as_str()),
            ("client_secret", credentials.secret_key.as_str()),
        ])
        .send()?
        .json()?;

    match json.get("access_token").and_then(Value::as_str) {
        Some(token) if !token.is_empty() => Ok(token.to_string()),
        _ => {
            let reason = json
                .get("error_description")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| json.to_string());
            Err(OcrError::Auth(format!("check your API key and secret key ({reason})")))
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Decode a service response body into the shape expected for `mode`.
pub fn parse_response(mode: DocumentMode, json: &Value) -> Result<RawFieldResult, OcrError> {
    if let Some(code) = json.get("error_code") {
        let code = code
            .as_i64()
            .or_else(|| code.as_str().and_then(|s| s.parse().ok()))
            .unwrap_or(-1);
        let message = json.get("error_msg").and_then(Value::as_str).unwrap_or("unknown error").to_string();
        return Err(OcrError::Service { code, message });
    }
    let words = json
        .get("words_result")
        .ok_or_else(|| OcrError::Malformed("no words_result in response".to_string()))?;

    match mode {
        DocumentMode::License => parse_license(words).map(RawFieldResult::License),
        DocumentMode::Invoice => parse_invoice(words),
    }
}

fn parse_license(words: &Value) -> Result<HashMap<String, LicenseField>, OcrError> {
    let obj = words
        .as_object()
        .ok_or_else(|| OcrError::Malformed("license words_result is not an object".to_string()))?;
    Ok(obj
        .iter()
        .map(|(label, entry)| (label.clone(), LicenseField { words: text_of(entry) }))
        .collect())
}

fn parse_invoice(words: &Value) -> Result<RawFieldResult, OcrError> {
    match words {
        Value::Array(items) => Ok(RawFieldResult::Invoice(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let position = item
                        .get("index")
                        .and_then(Value::as_u64)
                        .map(|n| n as usize)
                        .unwrap_or(i);
                    let value = item.get("value").map(text_of);
                    OcrToken { position, text: text_of(item), value }
                })
                .collect(),
        )),
        // Object form is already keyed by label; key order carries no layout.
        Value::Object(obj) => Ok(RawFieldResult::InvoiceFields(
            obj.iter().map(|(label, entry)| (label.clone(), text_of(entry))).collect(),
        )),
        _ => Err(OcrError::Malformed("invoice words_result is neither a list nor an object".to_string())),
    }
}

/// Text of a result entry: a bare string, or the `words` member of an object.
fn text_of(entry: &Value) -> String {
    match entry {
        Value::String(s) => s.clone(),
        Value::Object(obj) => obj.get("words").map(text_of).unwrap_or_default(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Backend driven by a closure; counts how many images it was asked to recognize.
pub struct MockOcr<F> {
    respond: F,
    calls: AtomicUsize,
}

impl<F> MockOcr<F>
where
    F: Fn(DocumentMode, &[u8]) -> Result<RawFieldResult, OcrError> + Send + Sync,
{
    pub fn new(respond: F) -> Self {
        Self { respond, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<F> OcrBackend for MockOcr<F>
where
    F: Fn(DocumentMode, &[u8]) -> Result<RawFieldResult, OcrError> + Send + Sync,
{
    fn recognize(&self, mode: DocumentMode, image_bytes: &[u8]) -> Result<RawFieldResult, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)(mode, image_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn license_response_unwraps_words() {
        let body = json!({
            "log_id": 1,
            "words_result_num": 2,
            "words_result": {
                "号牌号码": {"words": "粤a12345"},
                "注册日期": {"words": "2019-05-06", "location": {"top": 1}}
            }
        });
        let RawFieldResult::License(map) = parse_response(DocumentMode::License, &body).unwrap() else {
            panic!("expected license result");
        };
        assert_eq!(map["号牌号码"].words, "粤a12345");
        assert_eq!(map["注册日期"].words, "2019-05-06");
    }

    #[test]
    fn error_code_is_service_error() {
        let body = json!({"error_code": 17, "error_msg": "Open api daily request limit reached"});
        match parse_response(DocumentMode::License, &body) {
            Err(OcrError::Service { code, message }) => {
                assert_eq!(code, 17);
                assert!(message.contains("limit"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_words_result_is_malformed() {
        let body = json!({"log_id": 3});
        assert!(matches!(parse_response(DocumentMode::Invoice, &body), Err(OcrError::Malformed(_))));
    }

    #[test]
    fn invoice_token_list() {
        let body = json!({
            "words_result": [
                {"words": "发票代码", "value": "144001900111"},
                {"words": "车辆类型"},
                {"words": "轿车", "index": 7}
            ]
        });
        let RawFieldResult::Invoice(tokens) = parse_response(DocumentMode::Invoice, &body).unwrap() else {
            panic!("expected invoice result");
        };
        assert_eq!(tokens[0], OcrToken::with_value(0, "发票代码", "144001900111"));
        assert_eq!(tokens[1], OcrToken::new(1, "车辆类型"));
        assert_eq!(tokens[2].position, 7);
    }

    #[test]
    fn invoice_object_is_already_paired() {
        let body = json!({"words_result": {"发票号码": "00123456", "车辆类型": {"words": "轿车"}}});
        let RawFieldResult::InvoiceFields(fields) = parse_response(DocumentMode::Invoice, &body).unwrap() else {
            panic!("expected keyed invoice fields");
        };
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["发票号码"], "00123456");
        assert_eq!(fields["车辆类型"], "轿车");
    }

    #[test]
    fn license_shape_mismatch_is_malformed() {
        let body = json!({"words_result": ["a", "b"]});
        assert!(matches!(parse_response(DocumentMode::License, &body), Err(OcrError::Malformed(_))));
    }

    #[test]
    fn mock_counts_calls() {
        let ocr = MockOcr::new(|_: DocumentMode, _: &[u8]| Ok(RawFieldResult::Invoice(vec![])));
        ocr.recognize(DocumentMode::Invoice, b"x").unwrap();
        ocr.recognize(DocumentMode::Invoice, b"y").unwrap();
        assert_eq!(ocr.calls(), 2);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("车辆类型", 2), "车辆");
        assert_eq!(truncate("ab", 5), "ab");
    }
}
