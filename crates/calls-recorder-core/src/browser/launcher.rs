use crate::{
    CoreResult, RecorderConfig, RecorderError, RecorderSettings,
    browser::{BrowserLauncher, BrowserPage, CdpConnection, CdpPage},
    config::DISPLAY_ID,
    process::{CommandRunner, shutdown_process},
};

use std::{panic::Location, sync::Arc, time::Duration};

use async_trait::async_trait;
use error_location::ErrorLocation;
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, info, instrument};
use url::Url;

const ENDPOINT_POLL_INTERVAL: Duration = Duration::from_millis(250);
const PROFILE_DIR_NAME: &str = "calls-recorder-browser";

const DEV_MODE_ORIGINS: [&str; 4] = [
    "http://172.17.0.1:8065",
    "http://host.docker.internal:8065",
    "http://mm-server:8065",
    "http://host.minikube.internal:8065",
];

#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
}

/// Launches Chromium on the virtual display and drives it over DevTools.
pub struct ChromiumLauncher {
    runner: Arc<dyn CommandRunner>,
    binary: String,
    args: String,
    debugging_port: u16,
    launch_timeout: Duration,
    exit_grace: Duration,
    http: reqwest::Client,
}

impl ChromiumLauncher {
    /// Build a launcher for the given job.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::InvalidConfig`] if the site URL cannot be parsed.
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        cfg: &RecorderConfig,
        settings: &RecorderSettings,
    ) -> CoreResult<Self> {
        let args = chromium_args(cfg, settings)?.join(" ");
        let http = reqwest::Client::builder()
            .timeout(ENDPOINT_POLL_INTERVAL * 4)
            .build()
            .map_err(|e| RecorderError::request("build DevTools client", e))?;

        Ok(Self {
            runner,
            binary: settings.browser_binary.clone(),
            args,
            debugging_port: settings.debugging_port,
            launch_timeout: settings.timings.browser_launch_timeout,
            exit_grace: settings.timings.browser_close_timeout,
            http,
        })
    }

    async fn discover_endpoint(&self) -> CoreResult<String> {
        let url = format!("http://127.0.0.1:{}/json/version", self.debugging_port);
        let deadline = Instant::now() + self.launch_timeout;

        loop {
            match self.http.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => match resp.json::<VersionInfo>().await {
                    Ok(info) => return Ok(info.web_socket_debugger_url),
                    Err(e) => debug!(error = %e, "Unreadable DevTools version info"),
                },
                Ok(resp) => debug!(status = %resp.status(), "DevTools endpoint not ready"),
                Err(e) => debug!(error = %e, "DevTools endpoint not reachable yet"),
            }

            if Instant::now() >= deadline {
                return Err(RecorderError::browser(format!(
                    "DevTools endpoint did not come up within {:?}",
                    self.launch_timeout
                )));
            }
            tokio::time::sleep(ENDPOINT_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    #[instrument(skip(self), fields(binary = %self.binary, port = self.debugging_port))]
    async fn launch(&self) -> CoreResult<Box<dyn BrowserPage>> {
        let mut process = self.runner.run(&self.binary, &self.args)?;

        let connected = match self.discover_endpoint().await {
            Ok(ws_url) => CdpConnection::connect(&ws_url).await,
            Err(e) => Err(e),
        };
        let connection = match connected {
            Ok(connection) => connection,
            Err(e) => {
                shutdown_process(process.as_mut(), self.exit_grace).await;
                return Err(e);
            }
        };

        info!("Browser launched");

        let page = CdpPage::open(connection, process, self.exit_grace).await?;
        Ok(Box::new(page))
    }
}

/// Chromium command line for rendering the call into the virtual display.
#[track_caller]
pub(crate) fn chromium_args(
    cfg: &RecorderConfig,
    settings: &RecorderSettings,
) -> CoreResult<Vec<String>> {
    let profile_dir = std::env::temp_dir().join(PROFILE_DIR_NAME);

    let mut args: Vec<String> = [
        "--no-first-run",
        "--no-default-browser-check",
        "--disable-gpu",
        "--disable-infobars",
        "--disable-background-networking",
        "--enable-features=NetworkService,NetworkServiceInProcess",
        "--disable-background-timer-throttling",
        "--disable-backgrounding-occluded-windows",
        "--disable-breakpad",
        "--disable-client-side-phishing-detection",
        "--disable-default-apps",
        "--disable-dev-shm-usage",
        "--disable-extensions",
        "--disable-features=site-per-process,TranslateUI,BlinkGenPropertyTrees",
        "--disable-hang-monitor",
        "--disable-ipc-flooding-protection",
        "--disable-popup-blocking",
        "--disable-prompt-on-repost",
        "--disable-renderer-backgrounding",
        "--disable-sync",
        "--force-color-profile=srgb",
        "--metrics-recording-only",
        "--safebrowsing-disable-auto-update",
        "--password-store=basic",
        "--use-mock-keychain",
        "--use-fake-ui-for-media-stream",
        "--use-fake-device-for-media-stream",
        "--incognito",
        "--kiosk",
        "--autoplay-policy=no-user-gesture-required",
        "--window-position=0,0",
    ]
    .into_iter()
    .map(str::to_string)
    .collect();

    args.push(format!("--window-size={},{}", cfg.width, cfg.height));
    args.push(format!("--display=:{DISPLAY_ID}"));
    args.push(format!("--remote-debugging-port={}", settings.debugging_port));
    args.push(format!("--user-data-dir={}", profile_dir.display()));

    if settings.dev_mode {
        args.push("--no-sandbox".to_string());
    }

    let origins = insecure_origins(&cfg.site_url, settings.dev_mode)?;
    if !origins.is_empty() {
        info!(origins = %origins.join(","), "Adding insecure origin exceptions");
        args.push(format!(
            "--unsafely-treat-insecure-origin-as-secure={}",
            origins.join(",")
        ));
    }

    args.push("about:blank".to_string());

    Ok(args)
}

/// Origins the browser must treat as secure so media capture works over plain http.
#[track_caller]
pub(crate) fn insecure_origins(site_url: &str, dev_mode: bool) -> CoreResult<Vec<String>> {
    let site = Url::parse(site_url).map_err(|e| RecorderError::InvalidConfig {
        reason: format!("SiteURL parsing failed: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let mut origins = Vec::new();
    if site.scheme() == "http" {
        origins.push(site_url.to_string());
    }
    if dev_mode {
        origins.extend(DEV_MODE_ORIGINS.iter().map(|o| o.to_string()));
    }

    Ok(origins)
}
