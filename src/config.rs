use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMode {
    Local,
    Remote,
}

#[derive(Debug, Clone)]
pub struct Config {
    // Target
    pub target_url: String,

    // Browser
    pub webdriver_url: String,
    pub headless: bool,
    pub user_agent: String,

    // Egress
    pub use_proxy: bool,
    pub proxy_type: String,
    pub proxy: Option<String>,

    // External services
    pub here_api_key: String,
    pub apikey_2captcha: String,
    pub collector_url: Option<String>,

    // Captcha
    pub captcha_poll_interval_ms: u64,
    pub captcha_poll_timeout_ms: u64,
    pub captcha_frame_retries: u32,

    // Interaction timing
    pub page_load_retries: u32,
    pub dropdown_timeout_ms: u64,
    pub type_delay_ms: u64,

    // Scheduler
    pub workers: usize,
    pub queue_mode: QueueMode,
    pub task_endpoint: Option<String>,
    pub task_poll_interval_ms: u64,
    pub task_pacing_ms: u64,
    pub tasks_file: String,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let queue_mode = match env::var("QUEUE_MODE")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "remote" => QueueMode::Remote,
            _ => QueueMode::Local,
        };

        Ok(Config {
            target_url: env::var("TARGET_URL")
                .unwrap_or_else(|_| "https://www.preventivass.it/dati-principali".to_string()),

            webdriver_url: env::var("WEBDRIVER_URL")
                .unwrap_or_else(|_| "http://localhost:9515".to_string()),
            headless: env::var("HEADLESS")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            user_agent: env::var("USER_AGENT").unwrap_or_else(|_| {
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36".to_string()
            }),

            use_proxy: env::var("USE_PROXY")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            proxy_type: env::var("PROXY_TYPE").unwrap_or_else(|_| "socks4".to_string()),
            proxy: env::var("PROXY").ok().filter(|s| !s.is_empty()),

            here_api_key: env::var("HERE_API_KEY").unwrap_or_default(),
            apikey_2captcha: env::var("APIKEY_2CAPTCHA").unwrap_or_default(),
            collector_url: env::var("COLLECTOR_URL").ok().filter(|s| !s.is_empty()),

            captcha_poll_interval_ms: env::var("CAPTCHA_POLL_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2_000),
            captcha_poll_timeout_ms: env::var("CAPTCHA_POLL_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(120_000),
            captcha_frame_retries: env::var("CAPTCHA_FRAME_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),

            page_load_retries: env::var("PAGE_LOAD_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            dropdown_timeout_ms: env::var("DROPDOWN_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60_000),
            type_delay_ms: env::var("TYPE_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),

            workers: env::var("WORKERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            queue_mode,
            task_endpoint: env::var("TASK_ENDPOINT").ok().filter(|s| !s.is_empty()),
            task_poll_interval_ms: env::var("TASK_POLL_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3_000),
            task_pacing_ms: env::var("TASK_PACING_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1_000),
            tasks_file: env::var("TASKS_FILE").unwrap_or_else(|_| "tasks.json".to_string()),
        })
    }

    /// Proxy string with scheme applied, as chromedriver and reqwest want it.
    /// A per-task proxy always wins; the configured default only applies
    /// when USE_PROXY is on.
    pub fn proxy_url(&self, task_proxy: Option<&str>) -> Option<String> {
        let default = if self.use_proxy {
            self.proxy.as_deref()
        } else {
            None
        };
        task_proxy.or(default).map(|p| {
            if p.contains("://") {
                p.to_string()
            } else {
                format!("{}://{}", self.proxy_type, p)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_config() -> Config {
        Config {
            target_url: String::new(),
            webdriver_url: String::new(),
            headless: true,
            user_agent: String::new(),
            use_proxy: true,
            proxy_type: "socks4".to_string(),
            proxy: Some("10.0.0.1:1080".to_string()),
            here_api_key: String::new(),
            apikey_2captcha: String::new(),
            collector_url: None,
            captcha_poll_interval_ms: 2_000,
            captcha_poll_timeout_ms: 120_000,
            captcha_frame_retries: 5,
            page_load_retries: 3,
            dropdown_timeout_ms: 60_000,
            type_delay_ms: 300,
            workers: 2,
            queue_mode: QueueMode::Local,
            task_endpoint: None,
            task_poll_interval_ms: 3_000,
            task_pacing_ms: 1_000,
            tasks_file: "tasks.json".to_string(),
        }
    }

    #[test]
    fn test_proxy_url_applies_scheme() {
        let config = dummy_config();
        assert_eq!(
            config.proxy_url(None).as_deref(),
            Some("socks4://10.0.0.1:1080")
        );
        assert_eq!(
            config.proxy_url(Some("1.2.3.4:9050")).as_deref(),
            Some("socks4://1.2.3.4:9050")
        );
        assert_eq!(
            config.proxy_url(Some("socks5://1.2.3.4:9050")).as_deref(),
            Some("socks5://1.2.3.4:9050")
        );
    }

    #[test]
    fn test_proxy_disabled_unless_task_provides_one() {
        let mut config = dummy_config();
        config.use_proxy = false;
        assert_eq!(config.proxy_url(None), None);
        assert_eq!(
            config.proxy_url(Some("1.2.3.4:9050")).as_deref(),
            Some("socks4://1.2.3.4:9050")
        );
    }
}
