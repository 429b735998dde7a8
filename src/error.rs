use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Interaction-level failure: the WebDriver command itself failed.
/// A missing element is not an error here, primitives report that as
/// `Ok(false)` / `Ok(None)` so the flow can degrade per field.
#[derive(Debug, Error)]
pub enum ElementError {
    #[error("WebDriver command failed: {0}")]
    Cmd(#[from] fantoccini::error::CmdError),

    #[error("Element serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Task-terminating failures. Everything else is absorbed locally and
/// recorded in the field ledger.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Egress check failed: {0}")]
    ProxyCountry(String),

    #[error("Cilindrata rule violated: {0}")]
    Displacement(String),

    #[error("Pre-registration already done for this profile")]
    PreRegistration,

    #[error("Address rejected by target, improper parsing of address")]
    AddressRejected,

    #[error("Service error page reached, invalid data or bad egress configuration")]
    ServiceErrorPage,

    #[error("Entry page did not load: {0}")]
    PageLoad(String),

    #[error("WebDriver error: {0}")]
    WebDriver(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    ProxyCountry,
    DisplacementRule,
    PreRegistration,
    AddressRejected,
    ServiceError,
    PageLoad,
    EmptyResults,
    WebDriver,
    Internal,
}

impl ScrapeError {
    pub fn reason(&self) -> FailureReason {
        match self {
            ScrapeError::ProxyCountry(_) => FailureReason::ProxyCountry,
            ScrapeError::Displacement(_) => FailureReason::DisplacementRule,
            ScrapeError::PreRegistration => FailureReason::PreRegistration,
            ScrapeError::AddressRejected => FailureReason::AddressRejected,
            ScrapeError::ServiceErrorPage => FailureReason::ServiceError,
            ScrapeError::PageLoad(_) => FailureReason::PageLoad,
            ScrapeError::WebDriver(_) => FailureReason::WebDriver,
            ScrapeError::Internal(_) => FailureReason::Internal,
        }
    }

    /// Retrying the same profile cannot succeed for these.
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            ScrapeError::Displacement(_) | ScrapeError::PreRegistration
        )
    }
}

impl From<ElementError> for ScrapeError {
    fn from(err: ElementError) -> Self {
        ScrapeError::WebDriver(err.to_string())
    }
}

impl From<fantoccini::error::CmdError> for ScrapeError {
    fn from(err: fantoccini::error::CmdError) -> Self {
        ScrapeError::WebDriver(err.to_string())
    }
}

impl From<fantoccini::error::NewSessionError> for ScrapeError {
    fn from(err: fantoccini::error::NewSessionError) -> Self {
        ScrapeError::WebDriver(format!("WebDriver session could not be created: {}", err))
    }
}

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        ScrapeError::Internal(err.to_string())
    }
}
