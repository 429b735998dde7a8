use crate::utils::mask_sensitive;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};

const NOT_READY: &str = "CAPCHA_NOT_READY";

#[derive(Debug, Error)]
pub enum CaptchaError {
    #[error("captcha service unreachable: {0}")]
    Http(#[from] reqwest::Error),
    #[error("captcha service rejected the request: {0}")]
    Rejected(String),
    #[error("captcha was not solved within the deadline")]
    Timeout,
}

#[derive(Debug, PartialEq)]
pub enum PollStatus {
    Ready(String),
    NotReady,
}

/// Client for the 2captcha reCAPTCHA v2 solving service. Submission and
/// polling are the in.php / res.php pair of the legacy API.
pub struct TwoCaptcha {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl TwoCaptcha {
    pub fn new(api_key: String, poll_interval: Duration, poll_timeout: Duration) -> Self {
        Self::with_base_url(api_key, "http://2captcha.com".to_string(), poll_interval, poll_timeout)
    }

    pub fn with_base_url(
        api_key: String,
        base_url: String,
        poll_interval: Duration,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            api_key,
            base_url,
            http: reqwest::Client::new(),
            poll_interval,
            poll_timeout,
        }
    }

    /// Submits the challenge and polls until the token is ready or the
    /// deadline expires.
    pub async fn solve(&self, site_key: &str, page_url: &str) -> Result<String, CaptchaError> {
        let request_id = self.submit(site_key, page_url).await?;
        tracing::info!(
            "🧩 Captcha submitted | request_id: {} | key: {}",
            request_id,
            mask_sensitive(&self.api_key)
        );

        let deadline = Instant::now() + self.poll_timeout;
        loop {
            sleep(self.poll_interval).await;

            match self.poll(&request_id).await? {
                PollStatus::Ready(token) => {
                    tracing::info!("🧩 Captcha solved | request_id: {}", request_id);
                    return Ok(token);
                }
                PollStatus::NotReady => {
                    if Instant::now() >= deadline {
                        tracing::warn!("🧩 Captcha poll deadline reached | request_id: {}", request_id);
                        return Err(CaptchaError::Timeout);
                    }
                    tracing::debug!("🧩 Captcha not ready yet | request_id: {}", request_id);
                }
            }
        }
    }

    async fn submit(&self, site_key: &str, page_url: &str) -> Result<String, CaptchaError> {
        let body: Value = self
            .http
            .post(format!("{}/in.php", self.base_url))
            .form(&[
                ("key", self.api_key.as_str()),
                ("method", "userrecaptcha"),
                ("googlekey", site_key),
                ("pageurl", page_url),
                ("json", "1"),
            ])
            .send()
            .await?
            .json()
            .await?;

        parse_submit_response(&body)
    }

    async fn poll(&self, request_id: &str) -> Result<PollStatus, CaptchaError> {
        let body: Value = self
            .http
            .get(format!("{}/res.php", self.base_url))
            .query(&[
                ("key", self.api_key.as_str()),
                ("action", "get"),
                ("id", request_id),
                ("json", "1"),
            ])
            .send()
            .await?
            .json()
            .await?;

        parse_poll_response(&body)
    }

    /// Current account balance in USD, used at startup to surface an
    /// exhausted account before tasks start failing.
    pub async fn balance(&self) -> Result<String, CaptchaError> {
        let body: Value = self
            .http
            .get(format!("{}/res.php", self.base_url))
            .query(&[
                ("key", self.api_key.as_str()),
                ("action", "getbalance"),
                ("json", "1"),
            ])
            .send()
            .await?
            .json()
            .await?;

        if body.get("status").and_then(Value::as_i64) == Some(1) {
            Ok(body
                .get("request")
                .and_then(Value::as_str)
                .unwrap_or("0")
                .to_string())
        } else {
            Err(CaptchaError::Rejected(request_field(&body)))
        }
    }
}

pub fn parse_submit_response(body: &Value) -> Result<String, CaptchaError> {
    if body.get("status").and_then(Value::as_i64) == Some(1) {
        Ok(request_field(body))
    } else {
        Err(CaptchaError::Rejected(request_field(body)))
    }
}

pub fn parse_poll_response(body: &Value) -> Result<PollStatus, CaptchaError> {
    let request = request_field(body);
    if body.get("status").and_then(Value::as_i64) == Some(1) {
        Ok(PollStatus::Ready(request))
    } else if request == NOT_READY {
        Ok(PollStatus::NotReady)
    } else {
        Err(CaptchaError::Rejected(request))
    }
}

fn request_field(body: &Value) -> String {
    body.get("request")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_submit_ok() {
        let body = json!({"status": 1, "request": "123456789"});
        assert_eq!(parse_submit_response(&body).unwrap(), "123456789");
    }

    #[test]
    fn test_submit_rejected() {
        let body = json!({"status": 0, "request": "ERROR_WRONG_USER_KEY"});
        match parse_submit_response(&body) {
            Err(CaptchaError::Rejected(msg)) => assert_eq!(msg, "ERROR_WRONG_USER_KEY"),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_poll_not_ready() {
        let body = json!({"status": 0, "request": "CAPCHA_NOT_READY"});
        assert_eq!(parse_poll_response(&body).unwrap(), PollStatus::NotReady);
    }

    #[test]
    fn test_poll_ready() {
        let body = json!({"status": 1, "request": "03AGdBq26token"});
        assert_eq!(
            parse_poll_response(&body).unwrap(),
            PollStatus::Ready("03AGdBq26token".to_string())
        );
    }

    #[test]
    fn test_poll_error() {
        let body = json!({"status": 0, "request": "ERROR_CAPTCHA_UNSOLVABLE"});
        assert!(matches!(
            parse_poll_response(&body),
            Err(CaptchaError::Rejected(_))
        ));
    }
}
