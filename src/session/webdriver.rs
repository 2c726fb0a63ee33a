//! W3C WebDriver 探测会话
//!
//! 通过 HTTP 连接 Selenium Grid 或独立的浏览器驱动。每个工作线程持有一个浏览器会话：
//! 访问地址后执行脚本读取 `window.origin`，不透明源 `"null"` 表示访问被限制。

use super::{ProbeSession, SessionError, SessionFactory};
use crate::config::SessionConfig;
use serde_json::{Value, json};
use std::time::Duration;

/// 驱动在页面存在未处理的 alert 时返回的错误码
const UNEXPECTED_ALERT_OPEN: &str = "unexpected alert open";

/// HTTP 超时在页面加载超时之外额外留出的余量
const HTTP_TIMEOUT_MARGIN: Duration = Duration::from_secs(30);

/// WebDriver 会话工厂
pub struct WebDriverFactory {
    settings: SessionConfig,
    agent: ureq::Agent,
}

impl WebDriverFactory {
    pub fn new(settings: SessionConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(settings.page_load_timeout() + HTTP_TIMEOUT_MARGIN)
            .build();
        Self { settings, agent }
    }

    pub fn settings(&self) -> &SessionConfig {
        &self.settings
    }

    /// 新建会话请求体
    pub fn capabilities(&self) -> Value {
        capabilities(&self.settings)
    }
}

impl SessionFactory for WebDriverFactory {
    type Session = WebDriverSession;

    fn acquire(&self, worker_id: usize) -> Result<WebDriverSession, SessionError> {
        let endpoint = self.settings.webdriver_url.trim_end_matches('/');

        #[cfg(feature = "logging")]
        tracing::info!(
            "工作线程 {} 正在创建浏览器会话: {} @ {}",
            worker_id,
            self.settings.browser,
            endpoint
        );

        let response = self
            .agent
            .post(&format!("{endpoint}/session"))
            .send_json(self.capabilities())
            .map_err(into_session_error)?;
        let body: Value = response
            .into_json()
            .map_err(|e| SessionError::Driver(format!("无法解析新会话响应: {e}")))?;

        // W3C 响应在 value.sessionId，旧版 JSON Wire 协议在顶层
        let session_id = body
            .pointer("/value/sessionId")
            .or_else(|| body.get("sessionId"))
            .and_then(Value::as_str)
            .ok_or_else(|| SessionError::Driver(format!("新会话响应缺少 sessionId: {body}")))?;

        #[cfg(feature = "logging")]
        tracing::debug!("工作线程 {} 获得会话 {}", worker_id, session_id);

        Ok(WebDriverSession {
            agent: self.agent.clone(),
            base: format!("{endpoint}/session/{session_id}"),
            signal_script: self.settings.signal_script.clone(),
            blocked_origin: self.settings.blocked_origin.clone(),
            released: false,
        })
    }
}

/// 一个浏览器会话
pub struct WebDriverSession {
    agent: ureq::Agent,
    base: String,
    signal_script: String,
    blocked_origin: String,
    released: bool,
}

impl WebDriverSession {
    fn post(&self, command: &str, body: Value) -> Result<Value, SessionError> {
        let response = self
            .agent
            .post(&format!("{}/{command}", self.base))
            .send_json(body)
            .map_err(into_session_error)?;
        let body: Value = response
            .into_json()
            .map_err(|e| SessionError::Driver(format!("无法解析驱动响应: {e}")))?;
        Ok(body.get("value").cloned().unwrap_or(Value::Null))
    }

    fn delete_session(&mut self) -> Result<(), SessionError> {
        self.released = true;
        self.agent.delete(&self.base).call().map_err(into_session_error)?;
        Ok(())
    }
}

impl ProbeSession for WebDriverSession {
    fn visit(&mut self, address: &str) -> Result<(), SessionError> {
        self.post("url", json!({ "url": address })).map(|_| ())
    }

    fn signal(&mut self) -> Result<bool, SessionError> {
        let value =
            self.post("execute/sync", json!({ "script": self.signal_script, "args": [] }))?;
        Ok(value.as_str() == Some(self.blocked_origin.as_str()))
    }

    fn release(mut self) -> Result<(), SessionError> {
        self.delete_session()
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        // 工作线程 panic 时也尽量关闭远端浏览器
        if !self.released {
            let _ = self.delete_session();
        }
    }
}

/// 按浏览器类型生成新会话的 capabilities
fn capabilities(settings: &SessionConfig) -> Value {
    let browser = settings.browser.to_ascii_lowercase();
    let (browser_name, options_key) = match browser.as_str() {
        "edge" | "msedge" | "microsoftedge" => ("MicrosoftEdge", Some("ms:edgeOptions")),
        "chrome" | "chromium" => ("chrome", Some("goog:chromeOptions")),
        "firefox" => ("firefox", Some("moz:firefoxOptions")),
        _ => (settings.browser.as_str(), None),
    };

    let mut args = Vec::new();
    match (browser_name, &settings.user_data_dir) {
        ("firefox", Some(dir)) => {
            args.push("-profile".to_string());
            args.push(dir.clone());
        }
        (_, Some(dir)) => args.push(format!("--user-data-dir={dir}")),
        (_, None) => {}
    }
    if settings.headless {
        let headless = if browser_name == "firefox" { "-headless" } else { "--headless=new" };
        args.push(headless.to_string());
    }

    let page_load_ms = settings.page_load_timeout().as_millis() as u64;
    let mut always_match = json!({
        "browserName": browser_name,
        "timeouts": { "pageLoad": page_load_ms },
    });
    if let Some(key) = options_key {
        always_match[key] = json!({ "args": args });
    }

    json!({ "capabilities": { "alwaysMatch": always_match } })
}

/// 把 HTTP 层错误转换为会话错误，未处理的 alert 单独识别
fn into_session_error(err: ureq::Error) -> SessionError {
    match err {
        ureq::Error::Status(code, response) => {
            let body: Value = response.into_json().unwrap_or(Value::Null);
            let error = body.pointer("/value/error").and_then(Value::as_str);
            let message = body
                .pointer("/value/message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {code}"));

            match error {
                Some(UNEXPECTED_ALERT_OPEN) => SessionError::UnexpectedPrompt(message),
                Some(error) => SessionError::Driver(format!("{error}: {message}")),
                None => SessionError::Driver(message),
            }
        }
        ureq::Error::Transport(transport) => SessionError::Driver(transport.to_string()),
    }
}
