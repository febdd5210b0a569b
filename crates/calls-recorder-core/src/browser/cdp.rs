use crate::{
    CoreResult, RecorderError,
    browser::{BrowserPage, console::log_page_event},
    process::{ProcessHandle, shutdown_process},
};

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::{
    net::TcpStream,
    sync::{Mutex as AsyncMutex, oneshot},
    task::JoinHandle,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message as WsMessage,
};
use tracing::{debug, info, instrument, warn};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);
const BLANK_PAGE: &str = "about:blank";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type CommandReply = Result<Value, String>;
type PendingCommands = Arc<Mutex<Pending>>;

/// Commands awaiting a reply. Once `closed`, no new command may register.
#[derive(Default)]
struct Pending {
    closed: bool,
    replies: HashMap<u64, oneshot::Sender<CommandReply>>,
}

#[derive(Serialize)]
struct CommandFrame<'a> {
    id: u64,
    method: &'a str,
    params: Value,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct IncomingFrame {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<ProtocolError>,
    method: Option<String>,
    #[serde(default)]
    params: Value,
}

#[derive(Deserialize)]
struct ProtocolError {
    code: i64,
    message: String,
}

/// A DevTools protocol websocket to the browser endpoint.
///
/// Replies are matched to commands by id. Unsolicited events are logged.
pub(crate) struct CdpConnection {
    sink: AsyncMutex<SplitSink<WsStream, WsMessage>>,
    pending: PendingCommands,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
}

impl CdpConnection {
    #[instrument]
    pub(crate) async fn connect(ws_url: &str) -> CoreResult<Self> {
        let (stream, _) = connect_async(ws_url)
            .await
            .map_err(|e| RecorderError::browser(format!("failed to connect to DevTools: {e}")))?;

        let (sink, stream) = stream.split();
        let pending = PendingCommands::default();
        let reader = tokio::spawn(read_frames(stream, Arc::clone(&pending)));

        debug!("Connected to DevTools endpoint");

        Ok(Self {
            sink: AsyncMutex::new(sink),
            pending,
            next_id: AtomicU64::new(1),
            reader,
        })
    }

    /// Send a command and wait for its reply.
    pub(crate) async fn call(
        &self,
        method: &str,
        params: Value,
        session_id: Option<&str>,
    ) -> CoreResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = serde_json::to_string(&CommandFrame {
            id,
            method,
            params,
            session_id,
        })
        .map_err(|e| RecorderError::payload("DevTools command", e))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let mut pending = lock_pending(&self.pending);
            if pending.closed {
                return Err(RecorderError::browser(format!(
                    "{method}: DevTools connection closed"
                )));
            }
            pending.replies.insert(id, reply_tx);
        }

        let sent = self.sink.lock().await.send(WsMessage::Text(frame.into())).await;
        if let Err(e) = sent {
            lock_pending(&self.pending).replies.remove(&id);
            return Err(RecorderError::browser(format!("{method}: send failed: {e}")));
        }

        match tokio::time::timeout(COMMAND_TIMEOUT, reply_rx).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(message))) => Err(RecorderError::browser(format!("{method}: {message}"))),
            Ok(Err(_)) => Err(RecorderError::browser(format!(
                "{method}: DevTools connection closed"
            ))),
            Err(_) => {
                lock_pending(&self.pending).replies.remove(&id);
                Err(RecorderError::browser(format!(
                    "{method}: no reply within {COMMAND_TIMEOUT:?}"
                )))
            }
        }
    }
}

impl Drop for CdpConnection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn lock_pending(pending: &Mutex<Pending>) -> MutexGuard<'_, Pending> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn read_frames(mut stream: SplitStream<WsStream>, pending: PendingCommands) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(WsMessage::Text(text)) => dispatch_frame(&text, &pending),
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "DevTools socket closed with error");
                break;
            }
        }
    }

    // Dropping the reply senders fails every command still in flight.
    let mut pending = lock_pending(&pending);
    pending.closed = true;
    pending.replies.clear();
}

fn dispatch_frame(text: &str, pending: &PendingCommands) {
    let frame: IncomingFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "Ignoring malformed DevTools frame");
            return;
        }
    };

    if let Some(id) = frame.id {
        let Some(reply_tx) = lock_pending(pending).replies.remove(&id) else {
            debug!(id, "Reply for unknown DevTools command");
            return;
        };
        let reply = match frame.error {
            Some(err) => Err(format!("{} ({})", err.message, err.code)),
            None => Ok(frame.result.unwrap_or(Value::Null)),
        };
        let _ = reply_tx.send(reply);
        return;
    }

    if let Some(method) = frame.method {
        log_page_event(&method, &frame.params);
    }
}

/// A Chromium tab attached through a flat DevTools session.
pub struct CdpPage {
    connection: CdpConnection,
    target_id: String,
    session_id: String,
    process: Option<Box<dyn ProcessHandle>>,
    exit_grace: Duration,
}

impl CdpPage {
    /// Open a blank tab on `connection` and attach to it.
    pub(crate) async fn open(
        connection: CdpConnection,
        mut process: Box<dyn ProcessHandle>,
        exit_grace: Duration,
    ) -> CoreResult<Self> {
        let (target_id, session_id) = match open_target(&connection).await {
            Ok(ids) => ids,
            Err(e) => {
                shutdown_process(process.as_mut(), exit_grace).await;
                return Err(e);
            }
        };
        info!(target_id = %target_id, "Browser page attached");
        Ok(Self {
            connection,
            target_id,
            session_id,
            process: Some(process),
            exit_grace,
        })
    }

    async fn page_call(&self, method: &str, params: Value) -> CoreResult<Value> {
        self.connection
            .call(method, params, Some(&self.session_id))
            .await
    }

    async fn evaluate(&self, expression: &str) -> CoreResult<Value> {
        let reply = self
            .page_call(
                "Runtime.evaluate",
                json!({ "expression": expression, "returnByValue": true }),
            )
            .await?;

        if let Some(details) = reply.get("exceptionDetails") {
            let text = details["exception"]["description"]
                .as_str()
                .or_else(|| details["text"].as_str())
                .unwrap_or("exception thrown");
            return Err(RecorderError::browser(format!(
                "evaluation failed: {text}"
            )));
        }

        Ok(reply["result"]["value"].clone())
    }
}

async fn open_target(connection: &CdpConnection) -> CoreResult<(String, String)> {
    let created = connection
        .call("Target.createTarget", json!({ "url": BLANK_PAGE }), None)
        .await?;
    let target_id = string_field(&created, "targetId", "Target.createTarget")?;

    let attached = connection
        .call(
            "Target.attachToTarget",
            json!({ "targetId": target_id, "flatten": true }),
            None,
        )
        .await?;
    let session_id = string_field(&attached, "sessionId", "Target.attachToTarget")?;

    connection
        .call("Runtime.enable", json!({}), Some(&session_id))
        .await?;

    Ok((target_id, session_id))
}

fn string_field(reply: &Value, field: &str, method: &str) -> CoreResult<String> {
    reply[field]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| RecorderError::browser(format!("{method}: reply has no {field}")))
}

#[async_trait]
impl BrowserPage for CdpPage {
    #[instrument(skip(self, url))]
    async fn navigate(&mut self, url: &str) -> CoreResult<()> {
        let reply = self.page_call("Page.navigate", json!({ "url": url })).await?;
        if let Some(error_text) = reply.get("errorText").and_then(Value::as_str) {
            return Err(RecorderError::browser(format!(
                "navigation failed: {error_text}"
            )));
        }
        Ok(())
    }

    async fn evaluate_bool(&mut self, expression: &str) -> CoreResult<bool> {
        let value = self.evaluate(expression).await?;
        value.as_bool().ok_or_else(|| {
            RecorderError::browser(format!("expression did not yield a boolean: {value}"))
        })
    }

    async fn run_script(&mut self, script: &str) -> CoreResult<()> {
        self.evaluate(script).await.map(|_| ())
    }

    #[instrument(skip(self), fields(target_id = %self.target_id))]
    async fn reset(&mut self) -> CoreResult<()> {
        if let Err(e) = self
            .connection
            .call(
                "Target.closeTarget",
                json!({ "targetId": self.target_id }),
                None,
            )
            .await
        {
            warn!(error = %e, "Failed to close browsing context");
        }

        let (target_id, session_id) = open_target(&self.connection).await?;
        self.target_id = target_id;
        self.session_id = session_id;
        info!(target_id = %self.target_id, "Opened fresh browsing context");
        Ok(())
    }

    async fn close(&mut self) -> CoreResult<()> {
        // Browser.close may never be acknowledged: the socket goes down with the browser.
        if let Err(e) = self.connection.call("Browser.close", json!({}), None).await {
            debug!(error = %e, "Browser.close was not acknowledged");
        }

        if let Some(mut process) = self.process.take() {
            match tokio::time::timeout(self.exit_grace, process.wait()).await {
                Ok(Ok(code)) => info!(exit_code = ?code, "Browser exited"),
                Ok(Err(e)) => warn!(error = %e, "Failed waiting for browser to exit"),
                Err(_) => shutdown_process(process.as_mut(), self.exit_grace).await,
            }
        }
        Ok(())
    }
}
