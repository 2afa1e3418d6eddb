//! W3C WebDriver client over HTTP.
//!
//! Talks to a running driver (`msedgedriver`, `chromedriver`) or spawns one.
//! Only the handful of endpoints the compression flow needs are wrapped.

use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde_json::{json, Map, Value};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tracing::{debug, info};

use super::config::{BrowserConfig, CompressionConfig};
use super::error::AutomationError;
use super::session::{AutomationDriver, AutomationSession, ElementHandle, SessionOptions};
use super::types::Locator;

/// Key of an element reference in W3C responses.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Ceiling for any single driver command. Stage budgets are usually tighter.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Ceiling for one `/status` check while waiting for the driver.
const STATUS_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Driver error codes meaning the element is not (or no longer) there.
const MISSING_ELEMENT_ERRORS: &[&str] = &["no such element", "stale element reference"];

/// Preferences applied to every session before user overrides.
fn default_prefs() -> Map<String, Value> {
    let mut prefs = Map::new();
    prefs.insert("download.prompt_for_download".into(), json!(false));
    prefs.insert("download.directory_upgrade".into(), json!(true));
    prefs.insert("safebrowsing.enabled".into(), json!(false));
    prefs.insert("credentials_enable_service".into(), json!(false));
    prefs.insert("profile.password_manager_enabled".into(), json!(false));
    prefs.insert("profile.default_content_settings.popups".into(), json!(0));
    prefs
}

/// Error payload of a failed command.
#[derive(Debug)]
struct WireError {
    status: StatusCode,
    error: String,
    message: String,
}

impl WireError {
    fn is_missing_element(&self) -> bool {
        MISSING_ELEMENT_ERRORS.contains(&self.error.as_str())
    }
}

/// Failure of one command.
#[derive(Debug)]
enum CommandError {
    /// The driver answered with an error payload.
    Wire(WireError),
    /// The driver could not be reached or answered garbage.
    Transport(String),
}

impl From<CommandError> for AutomationError {
    fn from(e: CommandError) -> Self {
        match e {
            CommandError::Wire(w) => {
                AutomationError::Driver(format!("{} ({}): {}", w.error, w.status, w.message))
            }
            CommandError::Transport(message) => AutomationError::Driver(message),
        }
    }
}

#[derive(Debug, Clone)]
struct Wire {
    http: reqwest::Client,
}

impl Wire {
    /// Sends one command and returns its `value`.
    async fn command(&self, method: Method, url: &str, body: Option<Value>) -> Result<Value, CommandError> {
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| CommandError::Transport(e.to_string()))?;
        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| CommandError::Transport(format!("invalid response: {e}")))?;
        let value = payload.get("value").cloned().unwrap_or(Value::Null);

        if status.is_success() {
            return Ok(value);
        }
        let field = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Err(CommandError::Wire(WireError {
            status,
            error: field("error"),
            message: field("message"),
        }))
    }

    /// Like [`Wire::command`], treating every failure as a driver error.
    async fn call(&self, method: Method, url: &str, body: Option<Value>) -> Result<Value, AutomationError> {
        Ok(self.command(method, url, body).await?)
    }
}

/// Opens browser sessions through a WebDriver endpoint.
pub struct WebDriverClient {
    wire: Wire,
    base_url: String,
    browser: BrowserConfig,
    /// Spawned driver process, killed on drop.
    _driver: Mutex<Option<Child>>,
}

impl WebDriverClient {
    /// Client for an already running endpoint.
    pub fn new(config: &CompressionConfig) -> Result<Self, AutomationError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AutomationError::Driver(e.to_string()))?;
        Ok(Self {
            wire: Wire { http },
            base_url: config.webdriver_url.trim_end_matches('/').to_string(),
            browser: config.browser.clone(),
            _driver: Mutex::new(None),
        })
    }

    /// Spawns `driver_path` when configured and waits until it answers.
    pub async fn start(config: &CompressionConfig) -> Result<Self, AutomationError> {
        let mut client = Self::new(config)?;
        if let Some(driver_path) = &config.driver_path {
            let url = Url::parse(&client.base_url)
                .map_err(|e| AutomationError::SessionStart(format!("invalid webdriver_url: {e}")))?;
            let port = url.port_or_known_default().unwrap_or(9515);

            info!(driver = %driver_path.display(), port, "Spawning WebDriver");
            let child = Command::new(driver_path)
                .arg(format!("--port={port}"))
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| {
                    AutomationError::SessionStart(format!(
                        "failed to spawn {}: {e}",
                        driver_path.display()
                    ))
                })?;
            client._driver = Mutex::new(Some(child));
        }

        client
            .wait_ready(Duration::from_secs(config.driver_startup_secs))
            .await?;
        Ok(client)
    }

    /// Polls `/status` until the driver reports ready.
    pub async fn wait_ready(&self, limit: Duration) -> Result<(), AutomationError> {
        let deadline = Instant::now() + limit;
        let url = format!("{}/status", self.base_url);
        loop {
            let check_limit = deadline
                .saturating_duration_since(Instant::now())
                .clamp(Duration::from_millis(100), STATUS_CHECK_TIMEOUT);
            match tokio::time::timeout(check_limit, self.wire.call(Method::GET, &url, None)).await {
                Ok(Ok(value)) if value.get("ready").and_then(Value::as_bool).unwrap_or(false) => {
                    debug!(url = %self.base_url, "WebDriver ready");
                    return Ok(());
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => debug!(error = %e, "WebDriver not reachable yet"),
                Err(_) => debug!(url = %self.base_url, "WebDriver status check timed out"),
            }
            if Instant::now() >= deadline {
                return Err(AutomationError::SessionStart(format!(
                    "WebDriver at {} not ready after {:.1}s",
                    self.base_url,
                    limit.as_secs_f64()
                )));
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// New-session capabilities for a browser downloading into the session's
    /// directory.
    pub fn capabilities(&self, options: &SessionOptions) -> Value {
        let mut args = self.browser.args.clone();
        if self.browser.headless && !args.iter().any(|a| a.starts_with("--headless")) {
            args.push("--headless=new".to_string());
        }

        let mut prefs = default_prefs();
        prefs.extend(self.browser.prefs.clone());
        prefs.insert(
            "download.default_directory".into(),
            json!(options.download_dir.to_string_lossy()),
        );

        let mut vendor = Map::new();
        vendor.insert("args".into(), json!(args));
        vendor.insert("prefs".into(), Value::Object(prefs));
        if let Some(binary) = &self.browser.binary {
            vendor.insert("binary".into(), json!(binary.to_string_lossy()));
        }

        let mut always_match = Map::new();
        always_match.insert("browserName".into(), json!(self.browser.name));
        always_match.insert(self.browser.options_key.clone(), Value::Object(vendor));

        json!({ "capabilities": { "alwaysMatch": always_match } })
    }
}

#[async_trait]
impl AutomationDriver for WebDriverClient {
    async fn open_session(
        &self,
        options: &SessionOptions,
    ) -> Result<Box<dyn AutomationSession>, AutomationError> {
        let url = format!("{}/session", self.base_url);
        let value = self
            .wire
            .command(Method::POST, &url, Some(self.capabilities(options)))
            .await
            .map_err(|e| AutomationError::SessionStart(AutomationError::from(e).to_string()))?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| AutomationError::SessionStart("response has no sessionId".to_string()))?;
        debug!(session = session_id, "WebDriver session created");

        Ok(Box::new(WebDriverSession {
            wire: self.wire.clone(),
            url: format!("{}/session/{}", self.base_url, session_id),
        }))
    }
}

struct WebDriverSession {
    wire: Wire,
    url: String,
}

impl WebDriverSession {
    async fn element_command(
        &self,
        element: &ElementHandle,
        command: &str,
        body: Value,
    ) -> Result<(), AutomationError> {
        let url = format!("{}/element/{}/{}", self.url, element.0, command);
        match self.wire.command(Method::POST, &url, Some(body)).await {
            Ok(_) => Ok(()),
            Err(CommandError::Wire(wire)) if wire.is_missing_element() => {
                Err(AutomationError::ElementMissing {
                    locator: element.0.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl AutomationSession for WebDriverSession {
    async fn navigate(&self, url: &str) -> Result<(), AutomationError> {
        self.wire
            .call(Method::POST, &format!("{}/url", self.url), Some(json!({ "url": url })))
            .await
            .map(|_| ())
    }

    async fn find_element(
        &self,
        locator: &Locator,
    ) -> Result<Option<ElementHandle>, AutomationError> {
        let body = json!({ "using": locator.strategy(), "value": locator.value() });
        match self
            .wire
            .command(Method::POST, &format!("{}/element", self.url), Some(body))
            .await
        {
            Ok(value) => value
                .get(ELEMENT_KEY)
                .and_then(Value::as_str)
                .map(|id| Some(ElementHandle(id.to_string())))
                .ok_or_else(|| AutomationError::Driver("element response has no reference".to_string())),
            Err(CommandError::Wire(wire)) if wire.is_missing_element() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn send_keys(&self, element: &ElementHandle, text: &str) -> Result<(), AutomationError> {
        self.element_command(element, "value", json!({ "text": text }))
            .await
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), AutomationError> {
        self.element_command(element, "click", json!({})).await
    }

    async fn quit(self: Box<Self>) -> Result<(), AutomationError> {
        self.wire
            .call(Method::DELETE, &self.url, None)
            .await
            .map(|_| ())
    }
}
