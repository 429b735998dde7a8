use crate::browser::Interactor;
use crate::captcha::solver::{CaptchaError, TwoCaptcha};
use crate::error::ScrapeError;
use crate::flow::selectors::Selectors;
use crate::models::ChallengeDescriptor;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;

/// Walks the live reCAPTCHA client configuration for each widget on the
/// page and reports its sitekey and callback location.
const FIND_RECAPTCHA_SCRIPT: &str = r#"
    function findRecaptchaClients() {
        if (typeof (___grecaptcha_cfg) !== 'undefined') {
            return Object.entries(___grecaptcha_cfg.clients).map(([cid, client]) => {
                const data = { id: cid, version: cid >= 10000 ? 'V3' : 'V2' };
                const objects = Object.entries(client).filter(([_, value]) =>
                    value && typeof value === 'object');

                objects.forEach(([toplevelKey, toplevel]) => {
                    const found = Object.entries(toplevel).find(([_, value]) =>
                        value && typeof value === 'object' && 'sitekey' in value && 'size' in value);

                    if (typeof toplevel === 'object' && toplevel instanceof HTMLElement
                        && toplevel['tagName'] === 'DIV') {
                        data.pageurl = toplevel.baseURI;
                    }

                    if (found) {
                        const [sublevelKey, sublevel] = found;
                        data.sitekey = sublevel.sitekey;
                        const callbackKey = data.version === 'V2' ? 'callback' : 'promise-callback';
                        const callback = sublevel[callbackKey];
                        if (!callback) {
                            data.callback = null;
                            data.function = null;
                        } else {
                            data.function = callback;
                            const keys = [cid, toplevelKey, sublevelKey, callbackKey]
                                .map((key) => `['${key}']`).join('');
                            data.callback = `___grecaptcha_cfg.clients${keys}`;
                        }
                    }
                });
                return data;
            });
        }
        return [];
    }
    return findRecaptchaClients();
"#;

/// Finds the reCAPTCHA completion callback inside the widget configuration
/// and invokes it with the solved token.
const INJECT_TOKEN_SCRIPT: &str = r#"
    window.retrieveCallback = function(obj, visited = new Set()) {
        if (typeof obj === 'function') {
            return obj;
        }
        if (obj && typeof obj === 'object' && !visited.has(obj)) {
            visited.add(obj);
            for (const key of Object.keys(obj)) {
                const value = obj[key];
                const result = window.retrieveCallback(value, visited);
                if (result) {
                    return result;
                }
            }
        }
        return null;
    };
    const token = arguments[0];
    const callback = window.retrieveCallback(window.___grecaptcha_cfg.clients[0]);
    if (callback) {
        callback(token);
        return true;
    }
    return false;
"#;

/// Forces the checkbox widget to re-initialize by reassigning its own src.
const RELOAD_IFRAME_SCRIPT: &str = r#"
    const iframe = document.evaluate(
        "//iframe[contains(@title, 'reCAPTCHA')]", document, null,
        XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
    if (iframe) {
        iframe.src = iframe.src;
        return true;
    }
    return false;
"#;

/// Drives the on-page reCAPTCHA widget: clicks the checkbox, probes the
/// widget configuration for the sitekey, solves through the external
/// service and injects the token back.
pub struct ChallengeSolver<'a> {
    interactor: &'a Interactor,
    solver: &'a TwoCaptcha,
    task_id: String,
    frame_retries: u32,
}

impl<'a> ChallengeSolver<'a> {
    pub fn new(
        interactor: &'a Interactor,
        solver: &'a TwoCaptcha,
        task_id: impl Into<String>,
        frame_retries: u32,
    ) -> Self {
        Self {
            interactor,
            solver,
            task_id: task_id.into(),
            frame_retries,
        }
    }

    /// Runs the full challenge sequence. Exhausted retries yield Ok(None):
    /// the flow proceeds without a token and the site decides whether to
    /// accept the submission.
    pub async fn solve(&self, page_url: &str) -> Result<Option<String>, ScrapeError> {
        for attempt in 1..=self.frame_retries {
            tracing::info!(
                "TID: {} | 🧩 Challenge attempt {}/{}",
                self.task_id,
                attempt,
                self.frame_retries
            );

            match self.attempt(page_url).await {
                Ok(Some(token)) => return Ok(Some(token)),
                Ok(None) => {}
                Err(ScrapeError::WebDriver(msg)) => return Err(ScrapeError::WebDriver(msg)),
                Err(e) => {
                    tracing::warn!("TID: {} | 🧩 Challenge attempt failed: {}", self.task_id, e);
                }
            }

            self.reload_widget().await;
            sleep(Duration::from_secs(2)).await;
        }

        tracing::warn!(
            "TID: {} | 🧩 Challenge unsolved after {} attempts, proceeding without token",
            self.task_id,
            self.frame_retries
        );
        Ok(None)
    }

    async fn attempt(&self, page_url: &str) -> Result<Option<String>, ScrapeError> {
        let Some(frame) = self
            .interactor
            .check_element(
                "reCAPTCHA iframe",
                Selectors::RECAPTCHA_IFRAME,
                Duration::from_secs(15),
            )
            .await?
        else {
            tracing::debug!("TID: {} | 🧩 No challenge widget on page", self.task_id);
            return Ok(None);
        };

        frame.enter_frame().await.map_err(crate::error::ElementError::from)?;

        let clicked = self
            .interactor
            .click(
                "reCAPTCHA checkbox",
                Selectors::RECAPTCHA_CHECKBOX,
                Duration::from_secs(20),
            )
            .await?;

        self.interactor
            .client()
            .enter_parent_frame()
            .await
            .map_err(crate::error::ElementError::from)?;

        if !clicked {
            return Ok(None);
        }
        sleep(Duration::from_secs(2)).await;

        let probe = self.interactor.execute(FIND_RECAPTCHA_SCRIPT, vec![]).await?;
        let Some(descriptor) = parse_challenge_probe(&probe) else {
            tracing::debug!("TID: {} | 🧩 Probe found no active widget", self.task_id);
            return Ok(None);
        };

        tracing::info!(
            "TID: {} | 🧩 Widget probed | sitekey: {}",
            self.task_id,
            descriptor.site_key
        );

        let url = descriptor.page_url.as_deref().unwrap_or(page_url);
        let token = match self.solver.solve(&descriptor.site_key, url).await {
            Ok(token) => token,
            Err(CaptchaError::Timeout) => {
                tracing::warn!("TID: {} | 🧩 Solver deadline expired", self.task_id);
                return Ok(None);
            }
            Err(e) => {
                tracing::warn!("TID: {} | 🧩 Solver error: {}", self.task_id, e);
                return Ok(None);
            }
        };

        let injected = self
            .interactor
            .execute(
                INJECT_TOKEN_SCRIPT,
                vec![Value::String(token.clone())],
            )
            .await?;

        if injected.as_bool().unwrap_or(false) {
            tracing::info!("TID: {} | 🧩 Token injected", self.task_id);
            Ok(Some(token))
        } else {
            tracing::warn!("TID: {} | 🧩 No completion callback found", self.task_id);
            Ok(None)
        }
    }

    async fn reload_widget(&self) {
        match self.interactor.execute(RELOAD_IFRAME_SCRIPT, vec![]).await {
            Ok(v) if v.as_bool().unwrap_or(false) => {
                tracing::debug!("TID: {} | 🧩 Widget iframe reloaded", self.task_id);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("TID: {} | 🧩 Widget reload failed: {}", self.task_id, e);
            }
        }
    }
}

/// Extracts the first usable widget from the probe output. Tolerates zero,
/// one or many widgets; a widget without a sitekey is skipped.
pub fn parse_challenge_probe(probe: &Value) -> Option<ChallengeDescriptor> {
    let entries = probe.as_array()?;

    entries.iter().find_map(|entry| {
        let site_key = entry.get("sitekey").and_then(Value::as_str)?;
        if site_key.is_empty() {
            return None;
        }
        Some(ChallengeDescriptor {
            site_key: site_key.to_string(),
            page_url: entry
                .get("pageurl")
                .and_then(Value::as_str)
                .map(str::to_string),
            callback_ref: entry
                .get("callback")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_probe_empty() {
        assert!(parse_challenge_probe(&json!([])).is_none());
        assert!(parse_challenge_probe(&json!(null)).is_none());
    }

    #[test]
    fn test_probe_single_widget() {
        let probe = json!([{
            "id": "0",
            "version": "V2",
            "sitekey": "6LcAbcdEF",
            "pageurl": "https://www.preventivass.it/dati-principali",
            "callback": "___grecaptcha_cfg.clients['0']['X']['Y']['callback']"
        }]);
        let d = parse_challenge_probe(&probe).unwrap();
        assert_eq!(d.site_key, "6LcAbcdEF");
        assert_eq!(
            d.page_url.as_deref(),
            Some("https://www.preventivass.it/dati-principali")
        );
        assert!(d.callback_ref.is_some());
    }

    #[test]
    fn test_probe_skips_keyless_widget() {
        let probe = json!([
            {"id": "0", "version": "V2", "sitekey": ""},
            {"id": "1", "version": "V2", "sitekey": "6LcRealKey"}
        ]);
        let d = parse_challenge_probe(&probe).unwrap();
        assert_eq!(d.site_key, "6LcRealKey");
    }

    #[test]
    fn test_probe_missing_callback_is_fine() {
        let probe = json!([{"id": "0", "version": "V2", "sitekey": "6LcKey", "callback": null}]);
        let d = parse_challenge_probe(&probe).unwrap();
        assert!(d.callback_ref.is_none());
    }
}
