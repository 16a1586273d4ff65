use crate::browser::launcher;
use crate::config::BrowserConfig;
use crate::error::{FlowsyncError, Result};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

/// Global port counter for CDP connections (starts at 9222, increments for each new client)
static CDP_PORT_COUNTER: AtomicU16 = AtomicU16::new(9222);

fn get_next_cdp_port() -> u16 {
    let port = CDP_PORT_COUNTER.fetch_add(1, Ordering::SeqCst);
    // Wrap around if we exceed practical port range
    if port > 65500 {
        CDP_PORT_COUNTER.store(9222, Ordering::SeqCst);
        return 9222;
    }
    port
}

/// Escape a string for embedding in single quotes inside evaluated JS
pub(crate) fn js_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

type WsSink = futures::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    WsMessage,
>;

/// CDP client over a raw WebSocket to the page target.
///
/// One client drives one Chrome instance and the single page target it
/// exposes. Commands are correlated to responses by message id; the
/// reader task resolves the matching oneshot.
pub struct CdpClient {
    ws_tx: Option<Arc<Mutex<WsSink>>>,
    responses: Arc<Mutex<HashMap<u32, tokio::sync::oneshot::Sender<serde_json::Value>>>>,
    chrome_pid: std::sync::Mutex<Option<u32>>,
    msg_id: AtomicU32,
    cdp_port: u16,
}

impl CdpClient {
    pub fn new() -> Self {
        Self {
            ws_tx: None,
            responses: Arc::new(Mutex::new(HashMap::new())),
            chrome_pid: std::sync::Mutex::new(None),
            msg_id: AtomicU32::new(1),
            cdp_port: get_next_cdp_port(),
        }
    }

    /// Launch Chrome with CDP enabled and connect to its page target
    pub async fn launch(&mut self, config: &BrowserConfig) -> Result<()> {
        let mut cmd = launcher::build_command(config, self.cdp_port);

        let child = cmd
            .spawn()
            .map_err(|e| FlowsyncError::Launch(format!("Failed to launch Chrome: {}", e)))?;
        *self.chrome_pid.lock().unwrap() = Some(child.id());

        // Give Chrome time to start and be ready for CDP connections
        let mut retries = 0;
        const MAX_RETRIES: u32 = 30;
        let mut last_error = String::new();

        while retries < MAX_RETRIES {
            tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;

            match self.try_connect().await {
                Ok(()) => {
                    tracing::info!(port = self.cdp_port, "CDP client connected");

                    // Enable required CDP domains
                    self.send_command("Page.enable", json!({})).await?;
                    self.send_command("Runtime.enable", json!({})).await?;
                    self.send_command("Network.enable", json!({})).await?;

                    return Ok(());
                }
                Err(e) => last_error = e.to_string(),
            }

            retries += 1;
            tracing::debug!("Retry {}/{}: {}", retries, MAX_RETRIES, last_error);
        }

        Err(FlowsyncError::Launch(format!(
            "Failed to connect to Chrome after {} retries: {}",
            MAX_RETRIES, last_error
        )))
    }

    /// One connection attempt: discover the page target, open the WebSocket,
    /// start the reader task
    async fn try_connect(&mut self) -> Result<()> {
        let list_url = format!("http://localhost:{}/json/list", self.cdp_port);

        let response = reqwest::get(&list_url).await?;
        if !response.status().is_success() {
            return Err(FlowsyncError::Cdp(format!(
                "HTTP error: {}",
                response.status()
            )));
        }
        let targets: serde_json::Value = response.json().await?;

        let page_target = targets
            .as_array()
            .and_then(|arr| {
                arr.iter()
                    .find(|t| t.get("type").and_then(|v| v.as_str()) == Some("page"))
            })
            .ok_or_else(|| FlowsyncError::Cdp("No page target found".to_string()))?;

        let ws_url = page_target
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| FlowsyncError::Cdp("No webSocketDebuggerUrl in page target".to_string()))?;

        let (ws_stream, _) = connect_async(ws_url)
            .await
            .map_err(|e| FlowsyncError::Cdp(format!("Failed to connect WebSocket: {}", e)))?;
        let (tx, mut rx) = StreamExt::split(ws_stream);

        self.ws_tx = Some(Arc::new(Mutex::new(tx)));

        // Reader task: route responses to the waiting sender by id
        let responses = self.responses.clone();
        tokio::spawn(async move {
            while let Some(msg) = StreamExt::next(&mut rx).await {
                match msg {
                    Ok(WsMessage::Text(text)) => {
                        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) {
                            if let Some(id) = value.get("id").and_then(|i| i.as_u64()) {
                                if let Some(sender) =
                                    responses.lock().await.remove(&(id as u32))
                                {
                                    let _ = sender.send(value);
                                }
                            }
                        }
                    }
                    Ok(WsMessage::Close(_)) => {
                        tracing::debug!("WebSocket closed");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!("WebSocket error: {:?}", e);
                    }
                    _ => {}
                }
            }
        });

        Ok(())
    }

    /// Send a CDP command and wait for its result object
    pub async fn send_command(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let tx = self
            .ws_tx
            .as_ref()
            .ok_or_else(|| FlowsyncError::Cdp("WebSocket not connected".to_string()))?;

        let id = self.msg_id.fetch_add(1, Ordering::SeqCst);
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        self.responses.lock().await.insert(id, reply_tx);

        let command = json!({
            "id": id,
            "method": method,
            "params": params
        });

        {
            let mut tx_guard = tx.lock().await;
            tx_guard
                .send(WsMessage::Text(command.to_string()))
                .await
                .map_err(|e| FlowsyncError::Cdp(format!("Failed to send command: {}", e)))?;
        }

        // Wait for response with timeout
        let response = match tokio::time::timeout(
            tokio::time::Duration::from_secs(30),
            reply_rx,
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(FlowsyncError::Cdp("Response channel closed".to_string()))
            }
            Err(_) => {
                self.responses.lock().await.remove(&id);
                return Err(FlowsyncError::Cdp(format!("{} timed out", method)));
            }
        };

        if let Some(err) = response.get("error") {
            return Err(FlowsyncError::Cdp(format!("{} failed: {}", method, err)));
        }
        Ok(response.get("result").cloned().unwrap_or(serde_json::Value::Null))
    }

    /// Evaluate a JS expression and return its value
    pub async fn evaluate(&self, expression: &str) -> Result<serde_json::Value> {
        let result = self
            .send_command(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true
                }),
            )
            .await?;

        if let Some(details) = result.get("exceptionDetails") {
            return Err(FlowsyncError::Cdp(format!(
                "evaluate raised: {}",
                details.get("text").and_then(|t| t.as_str()).unwrap_or("unknown")
            )));
        }

        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(serde_json::Value::Null))
    }

    pub async fn evaluate_bool(&self, expression: &str) -> Result<bool> {
        Ok(self.evaluate(expression).await?.as_bool().unwrap_or(false))
    }

    /// Navigate to a URL
    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.send_command("Page.navigate", json!({"url": url})).await?;
        tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;
        tracing::info!("Navigated to: {}", url);
        Ok(())
    }

    /// Reload the current page
    pub async fn reload(&self) -> Result<()> {
        self.send_command("Page.reload", json!({})).await?;
        tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;
        tracing::info!("Reloaded page");
        Ok(())
    }

    /// Current (hostname, pathname) of the page
    pub async fn current_location(&self) -> Result<(String, String)> {
        let value = self
            .evaluate("({h: window.location.hostname, p: window.location.pathname})")
            .await?;
        let host = value
            .get("h")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let path = value
            .get("p")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Ok((host, path))
    }

    /// Check whether a selector matches anything
    pub async fn exists(&self, selector: &str) -> Result<bool> {
        self.evaluate_bool(&format!(
            "!!document.querySelector('{}')",
            js_escape(selector)
        ))
        .await
    }

    /// Click the first element matching the selector. Returns false when
    /// nothing matched.
    pub async fn click(&self, selector: &str) -> Result<bool> {
        self.evaluate_bool(&format!(
            "(function() {{ const el = document.querySelector('{}'); if (el) {{ el.click(); return true; }} return false; }})()",
            js_escape(selector)
        ))
        .await
    }

    /// Focus the first element matching the selector
    pub async fn focus(&self, selector: &str) -> Result<bool> {
        self.evaluate_bool(&format!(
            "(function() {{ const el = document.querySelector('{}'); if (el) {{ el.focus(); return true; }} return false; }})()",
            js_escape(selector)
        ))
        .await
    }

    /// Read all cookie values with the given name visible to the current
    /// page, HTTP-only cookies included
    pub async fn cookie_values(&self, name: &str) -> Result<Vec<String>> {
        let result = self.send_command("Network.getCookies", json!({})).await?;

        let values = result
            .get("cookies")
            .and_then(|c| c.as_array())
            .map(|cookies| {
                cookies
                    .iter()
                    .filter(|c| c.get("name").and_then(|n| n.as_str()) == Some(name))
                    .filter_map(|c| c.get("value").and_then(|v| v.as_str()))
                    .map(|v| v.to_string())
                    .collect()
            })
            .unwrap_or_default();

        Ok(values)
    }

    /// Kill Chrome. Safe to call more than once; Drop is the backstop.
    pub fn terminate(&self) {
        if let Some(pid) = self.chrome_pid.lock().unwrap().take() {
            kill_chrome(pid);
            tracing::info!("Chrome terminated");
        }
    }
}

impl Default for CdpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        // Ensure Chrome is killed when the client is dropped
        self.terminate();
    }
}

fn kill_chrome(pid: u32) {
    #[cfg(unix)]
    {
        let _ = std::process::Command::new("kill").arg(pid.to_string()).spawn();
    }
    #[cfg(windows)]
    {
        let _ = std::process::Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/F"])
            .spawn();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_escape() {
        assert_eq!(js_escape("input[type='password']"), "input[type=\\'password\\']");
        assert_eq!(js_escape("a\\b"), "a\\\\b");
        assert_eq!(js_escape("#passwordNext"), "#passwordNext");
    }

    #[test]
    fn test_port_counter_advances() {
        let a = get_next_cdp_port();
        let b = get_next_cdp_port();
        assert!(b > a || b == 9222);
    }
}
