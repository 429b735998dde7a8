//! XPath selectors for the preventivass.it Angular Material flow.

pub struct Selectors;

impl Selectors {
    // Entry screen
    pub const CONSENT_BUTTON: &'static str = "//button[.//span[text()=' Acconsento ']]";
    pub const NEW_POLICY_RADIO: &'static str = "//label[.//span[text()='Nuova Polizza']]";
    pub const RENEW_POLICY_RADIO: &'static str = "//label[.//span[text()='Rinnovo Polizza']]";
    pub const HAS_PLATE_RADIO: &'static str = "//label[.//input[contains(@value, 'true')]]";

    // Personal detail screen
    pub const HAS_LICENSE_RADIO: &'static str =
        "//label[.//span[text()='Sono in possesso della patente di guida']]";

    // Fatal indicators, checked after every submission
    pub const DIALOG_ERROR: &'static str = "//app-dialog-error";
    pub const DIALOG_CHECK_ADDRESS: &'static str = "//app-dialog-check-address";
    pub const SERVICE_ERROR_PAGE: &'static str =
        "//app-service-error-page//div[contains(text(), 'Pagina di Errore')]";

    // Risk guidance screen
    pub const EXPERT_GUIDE_HEADER: &'static str =
        "//div[contains(@class, 'header')][.//div[text()=' Guida Esperta ' or text()='Guida Esperta']]";
    pub const EXPERT_GUIDE_CHECKBOX: &'static str =
        "//div[contains(@class, 'header')][.//div[text()=' Guida Esperta ' or text()='Guida Esperta']]/ancestor::div//ivass-switcher//input[contains(@type, 'checkbox')]";

    // Results screen
    pub const SUMMARY_DIALOG_HEADING: &'static str = "//mat-dialog-container//h2";
    pub const SUMMARY_DIALOG_ROOT: &'static str = "//mat-dialog-container";
    pub const QUOTE_CARDS: &'static str =
        "//ivass-card-preventivo//ivass-card-simple//div[contains(@class, 'ivass-card-simple')]";
    pub const CARD_TITLE: &'static str = ".//div[contains(@class, 'title')][@role='heading']";
    pub const CARD_PRICE_DISCOUNTED: &'static str = ".//div[contains(@class, 'fix-width-min')]";
    pub const CARD_PRICE_STANDARD: &'static str = ".//div[contains(@class, 'price-container')]";

    // Captcha
    pub const RECAPTCHA_IFRAME: &'static str = "//iframe[contains(@title, 'reCAPTCHA')]";
    pub const RECAPTCHA_CHECKBOX: &'static str = "//div[@class='recaptcha-checkbox-checkmark']";

    /// Icon button on the vehicle picker, matched through its aria-label.
    pub fn vehicle_picker(tipo_veicolo: &str) -> String {
        format!(
            "//app-vehicle-picker//mat-button-toggle//button[contains(@aria-label, '{}') or contains(@aria-label, '{}')]",
            tipo_veicolo.to_lowercase(),
            tipo_veicolo
        )
    }

    /// Text input inside a mat-form-field identified by its mat-label.
    pub fn mat_input(label: &str) -> String {
        format!(
            "//mat-label[text()='{}']/ancestor::mat-form-field//input",
            label
        )
    }

    /// The ng-select control carrying the given placeholder label.
    pub fn ng_select(label: &str) -> String {
        format!(
            "//div[text()='{}' or text()='{}']/ancestor::ng-select",
            label.to_lowercase(),
            label
        )
    }

    /// Any rendered option inside an open ng-select panel.
    pub fn ng_options(parent_xpath: &str) -> String {
        format!(
            "{}//ng-dropdown-panel//div[contains(@class, 'ng-option')]",
            parent_xpath
        )
    }

    /// Option whose visible text equals the label (the SPA renders some
    /// labels lowercased, so both spellings are accepted).
    pub fn ng_option_exact(parent_xpath: &str, label: &str) -> String {
        format!(
            "{}//ng-dropdown-panel//div[contains(@class, 'ng-option')][.//span[text()='{}' or text()='{}']]",
            parent_xpath,
            label.to_lowercase(),
            label
        )
    }

    /// Case-insensitive contains match against the typed query. The query is
    /// lowercased here and the option text lowered via translate(), so the
    /// selection is idempotent under input case.
    pub fn ng_option_contains(parent_xpath: &str, query: &str) -> String {
        format!(
            r#"{}//ng-dropdown-panel//div[contains(@class, 'ng-option')][.//span[contains(translate(text(), 'ABCDEFGHIJKLMNOPQRSTUVWXYZ', 'abcdefghijklmnopqrstuvwxyz'), "{}")]]"#,
            parent_xpath,
            query.to_lowercase()
        )
    }

    /// Last-resort fallback: the first rendered option.
    pub fn ng_option_first(parent_xpath: &str) -> String {
        format!(
            "{}//ng-dropdown-panel//div[contains(@class, 'ng-option')][1]",
            parent_xpath
        )
    }

    pub fn ng_select_input(parent_xpath: &str) -> String {
        format!("{}//input", parent_xpath)
    }

    /// The Prosegui button, optionally scoped under a dialog root.
    pub fn continue_button(parent_xpath: &str) -> String {
        format!(
            "{}//button[.//span[text()=' Prosegui ' or text()='Prosegui']]",
            parent_xpath
        )
    }
}
