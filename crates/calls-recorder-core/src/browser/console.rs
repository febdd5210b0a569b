use std::{borrow::Cow, sync::LazyLock};

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

static ICE_PASSWORD_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"ice-pwd:[\w|\+|/]+").ok());

/// Mask ICE passwords found in browser console output.
pub(crate) fn sanitize_console_log(line: &str) -> Cow<'_, str> {
    match ICE_PASSWORD_RE.as_ref() {
        Some(re) => re.replace_all(line, "ice-pwd:XXX"),
        None => Cow::Borrowed(line),
    }
}

/// Log a DevTools event if it carries page console output.
pub(crate) fn log_page_event(method: &str, params: &Value) {
    match method {
        "Runtime.consoleAPICalled" => {
            let line = format_console_call(params);
            debug!(target: "browser_console", "{}", sanitize_console_log(&line));
        }
        "Runtime.exceptionThrown" => {
            let details = &params["exceptionDetails"];
            let text = details["exception"]["description"]
                .as_str()
                .or_else(|| details["text"].as_str())
                .unwrap_or("unknown exception");
            warn!(target: "browser_console", "chrome exception {}", sanitize_console_log(text));
        }
        _ => {}
    }
}

/// `chrome console <type> <args...>`, with primitive values printed bare.
pub(crate) fn format_console_call(params: &Value) -> String {
    let kind = params["type"].as_str().unwrap_or("log");
    let args = params["args"]
        .as_array()
        .map(|args| {
            args.iter()
                .map(|arg| match &arg["value"] {
                    Value::Null => arg["description"].as_str().unwrap_or_default().to_string(),
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();

    format!("chrome console {kind} {args}")
}
