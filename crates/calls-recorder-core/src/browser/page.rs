use crate::CoreResult;

use async_trait::async_trait;

/// The call client object has been created by the recording page.
pub(crate) const CLIENT_INITIALIZED: &str = "!!window.callsClient";

/// The call client is connected and has not been closed.
pub(crate) const CLIENT_CONNECTED: &str =
    "Boolean(window.callsClient) && Boolean(window.callsClient.connected) && !window.callsClient.closed";

/// The call client is gone or closed.
pub(crate) const CLIENT_DISCONNECTED: &str = "!window.callsClient || window.callsClient.closed";

/// Leave the call from inside the page.
pub(crate) const DISCONNECT_SCRIPT: &str = "window.callsClient.disconnect();";

/// A single remotely driven browser page.
///
/// Page state is only observable through expression evaluation, so the
/// interface stays narrow: navigate, evaluate a boolean, run a script.
#[async_trait]
pub trait BrowserPage: Send {
    /// Load `url` in the page.
    async fn navigate(&mut self, url: &str) -> CoreResult<()>;

    /// Evaluate a JavaScript expression that must yield a boolean.
    async fn evaluate_bool(&mut self, expression: &str) -> CoreResult<bool>;

    /// Evaluate a JavaScript statement, ignoring its value.
    async fn run_script(&mut self, script: &str) -> CoreResult<()>;

    /// Drop the current browsing context and open a fresh, blank one.
    async fn reset(&mut self) -> CoreResult<()>;

    /// Shut the browser down.
    async fn close(&mut self) -> CoreResult<()>;
}

/// Starts a browser and hands back its page.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launch the browser and open a blank page.
    async fn launch(&self) -> CoreResult<Box<dyn BrowserPage>>;
}
