use crate::config::Config;
use fantoccini::error::NewSessionError;
use fantoccini::{Client, ClientBuilder};
use serde_json::json;

/// Fingerprint cleanup run on every new document before any site script.
const STEALTH_SCRIPT: &str = r#"
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
    Object.defineProperty(navigator, 'languages', { get: () => ['it-IT', 'it', 'en'] });
    Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
    window.chrome = { runtime: {} };
"#;

/// Creates a Chrome session against the configured WebDriver endpoint.
/// The proxy, when present, is applied at the browser level so every
/// request of the session egresses through it.
pub async fn create_webdriver_client(
    config: &Config,
    proxy_url: Option<&str>,
) -> Result<Client, NewSessionError> {
    let mut args = vec![
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-infobars".to_string(),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--window-size=1920,1080".to_string(),
        "--lang=it-IT".to_string(),
        format!("--user-agent={}", config.user_agent),
    ];

    if config.headless {
        args.push("--headless=new".to_string());
    }

    if let Some(proxy) = proxy_url {
        args.push(format!("--proxy-server={}", proxy));
    }

    let mut caps = serde_json::map::Map::new();
    caps.insert(
        "goog:chromeOptions".to_string(),
        json!({
            "args": args,
            "excludeSwitches": ["enable-automation"],
        }),
    );

    let client = ClientBuilder::native()
        .capabilities(caps)
        .connect(&config.webdriver_url)
        .await?;

    // Best effort; a failed stealth injection is not worth aborting the
    // session over.
    if let Err(e) = client
        .execute(STEALTH_SCRIPT, vec![])
        .await
    {
        tracing::warn!("⚠️ Stealth script injection failed: {}", e);
    }

    Ok(client)
}
