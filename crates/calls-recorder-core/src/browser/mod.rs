mod cdp;
mod console;
mod driver;
mod launcher;
mod page;

pub(crate) use {
    cdp::CdpConnection,
    driver::{BrowserDriver, DriverHandle},
    page::{CLIENT_CONNECTED, CLIENT_DISCONNECTED, CLIENT_INITIALIZED, DISCONNECT_SCRIPT},
};

#[cfg(test)]
pub(crate) use {
    console::{format_console_call, sanitize_console_log},
    driver::{PollError, poll_expression},
    launcher::{chromium_args, insecure_origins},
};

pub use {
    cdp::CdpPage,
    launcher::ChromiumLauncher,
    page::{BrowserLauncher, BrowserPage},
};
