use crate::config::Config;
use crate::error::ElementError;
use crate::flow::selectors::Selectors;
use fantoccini::elements::Element;
use fantoccini::{Client, Locator};
use std::time::Duration;
use tokio::time::{sleep, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Forced click: the SPA disables buttons mid-transition and renders some
/// targets off-screen, so a plain WebDriver click is not reliable.
const JS_FORCE_CLICK: &str = r#"
    const button = arguments[0];
    if (button) {
        if (button.scrollIntoViewIfNeeded) {
            button.scrollIntoViewIfNeeded();
        }
        if (button.scrollIntoView) {
            button.scrollIntoView(true);
        }
        button.disabled = false;
        if (button.click) {
            button.click();
        }
    }
"#;

/// Angular reactive forms only pick up values announced through input and
/// change events; setting .value alone is invisible to them.
const JS_SET_VALUE: &str = r#"
    const element = arguments[0];
    if (element) {
        if (element.scrollIntoView) {
            element.scrollIntoView(true);
        }
        if (element.focus) {
            element.focus();
        }
        element.value = '';
        element.dispatchEvent(new Event('input'));
        element.value = arguments[1];
        element.dispatchEvent(new Event('input'));
        element.dispatchEvent(new Event('change'));
        if (element.blur) {
            element.blur();
        }
    }
"#;

/// ng-select opens its panel on an Enter keydown on the host element.
const JS_OPEN_SELECT: &str = r#"
    const select = arguments[0];
    const event = new KeyboardEvent("keydown", {
        key: 'Enter',
        code: 'Enter',
        keyCode: 13,
        charCode: 13,
        which: 13,
        bubbles: true
    });
    if (select) {
        select.dispatchEvent(event);
    }
"#;

const JS_APPEND_CHAR: &str = r#"
    const inputElement = arguments[0];
    const char = arguments[1];
    inputElement.value += char;
    inputElement.dispatchEvent(new Event('input', { bubbles: true }));
"#;

/// Robust primitives over the interactive target. No business logic lives
/// here: a missing element is reported as Ok(false)/Ok(None) and the caller
/// decides whether that is fatal.
pub struct Interactor {
    client: Client,
    task_id: String,
    type_delay: Duration,
    dropdown_timeout: Duration,
}

impl Interactor {
    pub fn new(client: Client, config: &Config, task_id: impl Into<String>) -> Self {
        Self {
            client,
            task_id: task_id.into(),
            type_delay: Duration::from_millis(config.type_delay_ms),
            dropdown_timeout: Duration::from_millis(config.dropdown_timeout_ms),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Waits for an element to be present, polling up to the timeout.
    /// Absence after the timeout is Ok(None); only a dead session errors.
    pub async fn check_element(
        &self,
        descriptor: &str,
        xpath: &str,
        timeout: Duration,
    ) -> Result<Option<Element>, ElementError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.client.find(Locator::XPath(xpath)).await {
                Ok(elem) => return Ok(Some(elem)),
                Err(e) if e.is_no_such_element() => {
                    if Instant::now() >= deadline {
                        tracing::debug!(
                            "TID: {} | Element Activity | Description: {} | not present within {:?}",
                            self.task_id,
                            descriptor,
                            timeout
                        );
                        return Ok(None);
                    }
                    sleep(POLL_INTERVAL).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Clicks the element located by xpath. Missing element is Ok(false).
    pub async fn click(
        &self,
        descriptor: &str,
        xpath: &str,
        timeout: Duration,
    ) -> Result<bool, ElementError> {
        let Some(button) = self.check_element(descriptor, xpath, timeout).await? else {
            tracing::warn!(
                "TID: {} | Button Activity | Description: {} | not found",
                self.task_id,
                descriptor
            );
            return Ok(false);
        };

        self.client
            .execute(JS_FORCE_CLICK, vec![serde_json::to_value(&button)?])
            .await?;

        tracing::debug!(
            "TID: {} | Button Activity | Description: {} | clicked",
            self.task_id,
            descriptor
        );
        sleep(Duration::from_millis(500)).await;
        Ok(true)
    }

    /// Fills a text input through JS value assignment plus the event storm
    /// the reactive form expects. Missing element is Ok(false).
    pub async fn enter_text(
        &self,
        descriptor: &str,
        xpath: &str,
        value: &str,
    ) -> Result<bool, ElementError> {
        let Some(element) = self
            .check_element(descriptor, xpath, Duration::from_secs(5))
            .await?
        else {
            tracing::warn!(
                "TID: {} | Input Activity | Description: {} | not found",
                self.task_id,
                descriptor
            );
            return Ok(false);
        };

        self.client
            .execute(
                JS_SET_VALUE,
                vec![
                    serde_json::to_value(&element)?,
                    serde_json::Value::String(value.to_string()),
                ],
            )
            .await?;

        tracing::debug!(
            "TID: {} | Input Activity | Description: {} | filled",
            self.task_id,
            descriptor
        );
        sleep(Duration::from_millis(500)).await;
        Ok(true)
    }

    /// Simulates character-by-character typing into an already-located
    /// input, so type-ahead widgets see each keystroke.
    pub async fn type_chars(&self, element: &Element, text: &str) -> Result<(), ElementError> {
        for ch in text.chars() {
            self.client
                .execute(
                    JS_APPEND_CHAR,
                    vec![
                        serde_json::to_value(element)?,
                        serde_json::Value::String(ch.to_string()),
                    ],
                )
                .await?;
            sleep(self.type_delay).await;
        }
        sleep(Duration::from_millis(500)).await;
        Ok(())
    }

    /// Selects an option from an ng-select by exact label, falling back to
    /// the first rendered option when the exact label is not offered.
    pub async fn select(
        &self,
        parent_descriptor: &str,
        parent_label: &str,
        option_label: &str,
    ) -> Result<bool, ElementError> {
        let parent_xpath = Selectors::ng_select(parent_label);
        let Some(parent) = self
            .check_element(parent_descriptor, &parent_xpath, Duration::from_secs(8))
            .await?
        else {
            tracing::warn!(
                "TID: {} | Select Activity | Description: {} | control not found",
                self.task_id,
                parent_descriptor
            );
            return Ok(false);
        };

        self.open_select(&parent).await?;

        if self
            .check_element(
                "dropdown panel",
                &Selectors::ng_options(&parent_xpath),
                self.dropdown_timeout,
            )
            .await?
            .is_none()
        {
            tracing::warn!(
                "TID: {} | Select Activity | Description: {} | panel never rendered",
                self.task_id,
                parent_descriptor
            );
            return Ok(false);
        }

        let exact_xpath = Selectors::ng_option_exact(&parent_xpath, option_label);
        if self
            .check_element(option_label, &exact_xpath, Duration::from_secs(5))
            .await?
            .is_some()
        {
            self.click(option_label, &exact_xpath, Duration::from_secs(5))
                .await
        } else {
            tracing::debug!(
                "TID: {} | Select Activity | '{}' not offered, taking first option",
                self.task_id,
                option_label
            );
            self.click(
                "first available option",
                &Selectors::ng_option_first(&parent_xpath),
                Duration::from_secs(5),
            )
            .await
        }
    }

    /// Free-text dropdown selection. Types the query character by character
    /// and clicks the first option whose visible text contains it
    /// (case-insensitive); falls back to the first rendered option. The
    /// remote UI sometimes offers no exact match for normalized input
    /// (city-name variants), hence the three tiers.
    pub async fn select_with_query(
        &self,
        parent_descriptor: &str,
        parent_label: &str,
        query: &str,
    ) -> Result<bool, ElementError> {
        let parent_xpath = Selectors::ng_select(parent_label);
        let Some(parent) = self
            .check_element(parent_descriptor, &parent_xpath, Duration::from_secs(9))
            .await?
        else {
            tracing::warn!(
                "TID: {} | Select&Input Activity | Description: {} | control not found",
                self.task_id,
                parent_descriptor
            );
            return Ok(false);
        };

        self.open_select(&parent).await?;

        let input_xpath = Selectors::ng_select_input(&parent_xpath);
        let Some(input) = self
            .check_element(
                &format!("{} input element", parent_descriptor),
                &input_xpath,
                Duration::from_secs(10),
            )
            .await?
        else {
            return Ok(false);
        };

        let query = query.to_lowercase();
        self.type_chars(&input, &query).await?;

        if self
            .check_element(
                "filtered dropdown panel",
                &Selectors::ng_options(&parent_xpath),
                self.dropdown_timeout,
            )
            .await?
            .is_none()
        {
            tracing::warn!(
                "TID: {} | Select&Input Activity | Description: {} | no suggestions for '{}'",
                self.task_id,
                parent_descriptor,
                query
            );
            return Ok(false);
        }

        let contains_xpath = Selectors::ng_option_contains(&parent_xpath, &query);
        if self
            .check_element(&query, &contains_xpath, Duration::from_secs(5))
            .await?
            .is_some()
        {
            self.click(
                &format!("{} option matching '{}'", parent_descriptor, query),
                &contains_xpath,
                Duration::from_secs(5),
            )
            .await
        } else {
            self.click(
                &format!("first option of {}", parent_descriptor),
                &Selectors::ng_option_first(&parent_xpath),
                Duration::from_secs(5),
            )
            .await
        }
    }

    /// Best-effort text read; None when the element is absent.
    pub async fn read_text(
        &self,
        descriptor: &str,
        xpath: &str,
        timeout: Duration,
    ) -> Result<Option<String>, ElementError> {
        match self.check_element(descriptor, xpath, timeout).await? {
            Some(elem) => Ok(Some(elem.text().await?)),
            None => Ok(None),
        }
    }

    pub async fn execute(
        &self,
        script: &str,
        args: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, ElementError> {
        Ok(self.client.execute(script, args).await?)
    }

    async fn open_select(&self, parent: &Element) -> Result<(), ElementError> {
        self.client
            .execute(JS_OPEN_SELECT, vec![serde_json::to_value(parent)?])
            .await?;
        sleep(Duration::from_millis(500)).await;
        Ok(())
    }
}
