//! Minimal W3C WebDriver client used to render JavaScript-driven listing pages.
//!
//! Each [`PageRenderer::render`] call opens its own browser session and closes
//! it before returning, whether rendering succeeded or not.

use crate::error::CollectError;
use crate::models::CollectorOptions;
use crate::traits::{PageFetcher, PageRenderer};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

const ELEMENT_NOT_FOUND: &str = "no such element";

pub struct WebDriverRenderer {
    client: Client,
    endpoint: String,
    headless: bool,
    wait: Duration,
    poll_interval: Duration,
}

impl WebDriverRenderer {
    pub fn new(
        endpoint: impl Into<String>,
        headless: bool,
        options: &CollectorOptions,
    ) -> Result<Self, CollectError> {
        let client = Client::builder()
            .timeout(options.render_wait + Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            headless,
            wait: options.render_wait,
            poll_interval: options.poll_interval,
        })
    }

    async fn open_session(&self) -> Result<BrowserSession<'_>, CollectError> {
        let response = self
            .client
            .post(format!("{}/session", self.endpoint))
            .json(&chrome_capabilities(self.headless))
            .send()
            .await?;
        let value = read_value("create session", response).await?;
        let id = value
            .pointer("/sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| CollectError::WebDriver {
                action: "create session".to_string(),
                details: "session id missing in response".to_string(),
            })?
            .to_string();

        debug!(session = %id, "webdriver session opened");
        Ok(BrowserSession { driver: self, id })
    }
}

#[async_trait]
impl PageRenderer for WebDriverRenderer {
    async fn render(&self, url: &str, wait_for: &str) -> Result<String, CollectError> {
        let session = self.open_session().await?;
        let rendered = session.load(url, wait_for).await;
        session.close().await;
        rendered
    }
}

struct BrowserSession<'a> {
    driver: &'a WebDriverRenderer,
    id: String,
}

impl BrowserSession<'_> {
    fn command_url(&self, command: &str) -> String {
        format!("{}/session/{}/{}", self.driver.endpoint, self.id, command)
    }

    async fn load(&self, url: &str, wait_for: &str) -> Result<String, CollectError> {
        let response = self
            .driver
            .client
            .post(self.command_url("url"))
            .json(&json!({ "url": url }))
            .send()
            .await?;
        read_value("navigate", response).await?;

        self.wait_for(url, wait_for).await?;

        let response = self.driver.client.get(self.command_url("source")).send().await?;
        let source = read_value("page source", response).await?;
        source
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CollectError::WebDriver {
                action: "page source".to_string(),
                details: "source is not a string".to_string(),
            })
    }

    async fn wait_for(&self, url: &str, selector: &str) -> Result<(), CollectError> {
        let deadline = Instant::now() + self.driver.wait;
        loop {
            let response = self
                .driver
                .client
                .post(self.command_url("element"))
                .json(&json!({ "using": "css selector", "value": selector }))
                .send()
                .await?;

            match read_value("find element", response).await {
                Ok(_) => return Ok(()),
                Err(CollectError::WebDriver { details, .. })
                    if details.starts_with(ELEMENT_NOT_FOUND) => {}
                Err(error) => return Err(error),
            }

            if Instant::now() >= deadline {
                return Err(CollectError::RenderTimeout {
                    url: url.to_string(),
                    selector: selector.to_string(),
                    seconds: self.driver.wait.as_secs(),
                });
            }
            sleep(self.driver.poll_interval).await;
        }
    }

    async fn close(self) {
        let result = self
            .driver
            .client
            .delete(format!("{}/session/{}", self.driver.endpoint, self.id))
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                debug!(session = %self.id, "webdriver session closed");
            }
            Ok(response) => {
                warn!(session = %self.id, status = %response.status(), "webdriver session close rejected");
            }
            Err(error) => warn!(session = %self.id, %error, "webdriver session close failed"),
        }
    }
}

async fn read_value(action: &str, response: reqwest::Response) -> Result<Value, CollectError> {
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    let value = body.get("value").cloned().unwrap_or(Value::Null);

    if let Some(error) = value.get("error").and_then(Value::as_str) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown webdriver error");
        return Err(CollectError::WebDriver {
            action: action.to_string(),
            details: format!("{error}: {message}"),
        });
    }
    if !status.is_success() {
        return Err(CollectError::WebDriver {
            action: action.to_string(),
            details: format!("http {}", status.as_u16()),
        });
    }
    Ok(value)
}

fn chrome_capabilities(headless: bool) -> Value {
    let mut args = vec![
        "--disable-gpu".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--no-first-run".to_string(),
        "--window-size=1400,1200".to_string(),
    ];
    if headless {
        args.push("--headless".to_string());
    }
    if !cfg!(target_os = "macos") {
        args.push("--no-sandbox".to_string());
    }

    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                "goog:chromeOptions": { "args": args }
            }
        }
    })
}

/// Plain HTTP page fetcher for pages that need no script execution.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(options: &CollectorOptions) -> Result<Self, CollectError> {
        let client = Client::builder().timeout(options.fetch_timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, CollectError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CollectError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SESSION: &str = "/session/abc";

    fn quick_options() -> CollectorOptions {
        CollectorOptions {
            render_wait: Duration::from_millis(50),
            poll_interval: Duration::from_millis(10),
            ..CollectorOptions::default()
        }
    }

    fn webdriver_error(error: &str, message: &str) -> ResponseTemplate {
        ResponseTemplate::new(404).set_body_json(json!({
            "value": { "error": error, "message": message, "stacktrace": "" }
        }))
    }

    /// Driver that opens session `abc` and expects it to be deleted exactly once.
    async fn driver() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": { "sessionId": "abc", "capabilities": {} }
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(SESSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": null })))
            .expect(1)
            .mount(&server)
            .await;
        server
    }

    async fn navigate_ok(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path(format!("{SESSION}/url")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": null })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn renders_source_and_closes_the_session() {
        let server = driver().await;
        navigate_ok(&server).await;
        Mock::given(method("POST"))
            .and(path(format!("{SESSION}/element")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": { "element-6066-11e4-a52e-4f735466cecf": "node-1" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{SESSION}/source")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "value": "<html><nav>1</nav></html>" })),
            )
            .mount(&server)
            .await;

        let renderer = WebDriverRenderer::new(server.uri(), true, &quick_options()).unwrap();
        let html = renderer
            .render("https://directory.example/listing", "nav")
            .await
            .unwrap();
        assert_eq!(html, "<html><nav>1</nav></html>");
        server.verify().await;
    }

    #[tokio::test]
    async fn wait_timeout_still_closes_the_session() {
        let server = driver().await;
        navigate_ok(&server).await;
        Mock::given(method("POST"))
            .and(path(format!("{SESSION}/element")))
            .respond_with(webdriver_error("no such element", "Unable to locate element"))
            .mount(&server)
            .await;

        let renderer = WebDriverRenderer::new(server.uri(), true, &quick_options()).unwrap();
        let result = renderer
            .render("https://directory.example/listing", ".pagination")
            .await;
        assert!(matches!(result, Err(CollectError::RenderTimeout { .. })));
        server.verify().await;
    }

    #[tokio::test]
    async fn navigation_error_still_closes_the_session() {
        let server = driver().await;
        Mock::given(method("POST"))
            .and(path(format!("{SESSION}/url")))
            .respond_with(webdriver_error("unknown error", "net::ERR_NAME_NOT_RESOLVED"))
            .mount(&server)
            .await;

        let renderer = WebDriverRenderer::new(server.uri(), true, &quick_options()).unwrap();
        let result = renderer.render("https://unreachable.example/", "nav").await;
        match result {
            Err(CollectError::WebDriver { action, details }) => {
                assert_eq!(action, "navigate");
                assert!(details.contains("ERR_NAME_NOT_RESOLVED"));
            }
            other => panic!("expected a navigate error, got {other:?}"),
        }
        server.verify().await;
    }

    #[test]
    fn headless_flag_controls_chrome_args() {
        let headless = chrome_capabilities(true);
        let args = headless
            .pointer("/capabilities/alwaysMatch/goog:chromeOptions/args")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        assert!(args.iter().any(|arg| arg == "--headless"));

        let windowed = chrome_capabilities(false);
        let args = windowed
            .pointer("/capabilities/alwaysMatch/goog:chromeOptions/args")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        assert!(!args.iter().any(|arg| arg == "--headless"));
    }
}
