//! Operator alerts and panic reporting.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::sync::{Arc, Once};
use std::time::Duration;

use axum::{
    body::Body,
    http::Response,
    response::IntoResponse,
};
use serde::Serialize;
use tower_http::catch_panic::ResponseForPanic;
use tracing::{error, info, warn};

use solbal_core::constants::MAX_ALERT_LEN;
use solbal_core::error::{Result, SolbalError};
use solbal_core::traits::AlertSink;

use crate::error::ApiError;

/// Webhook request timeout in seconds.
const WEBHOOK_TIMEOUT_SECS: u64 = 10;

/// Stack lines included in a panic alert.
const PANIC_STACK_LINES: usize = 10;

thread_local! {
    static PANIC_STACK: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Posts alerts to a Discord webhook.
///
/// Each alert is sent from its own task; failures are logged and dropped.
pub struct DiscordAlertSink {
    webhook_url: String,
    http_client: reqwest::Client,
}

#[derive(Serialize)]
struct WebhookPayload {
    content: String,
}

impl DiscordAlertSink {
    /// Creates a sink for `webhook_url`.
    pub fn new(webhook_url: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .build()
            .map_err(|e| SolbalError::HttpError(e.to_string()))?;

        Ok(Self {
            webhook_url: webhook_url.into(),
            http_client,
        })
    }
}

impl AlertSink for DiscordAlertSink {
    fn notify(&self, message: String) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime available, alert dropped");
            return;
        };

        let request = self
            .http_client
            .post(&self.webhook_url)
            .json(&WebhookPayload {
                content: truncate_alert(message),
            });

        runtime.spawn(async move {
            match request.send().await {
                Ok(response) => info!(status = %response.status(), "Alert delivered"),
                Err(e) => warn!(error = %e, "Failed to send alert"),
            }
        });
    }
}

/// Alert sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn notify(&self, message: String) {
        error!(alert = %message, "Alert raised");
    }
}

/// Shortens `message` to the webhook limit, marking the cut with `…`.
pub(crate) fn truncate_alert(message: String) -> String {
    let cut = message.char_indices().nth(MAX_ALERT_LEN).map(|(i, _)| i);
    match cut {
        Some(cut) => {
            let mut short = message[..cut].to_owned();
            short.push('…');
            short
        }
        None => message,
    }
}

/// Turns handler panics into a 500 response and an alert.
#[derive(Clone)]
pub struct PanicAlerter {
    alerts: Arc<dyn AlertSink>,
}

impl PanicAlerter {
    /// Reports panics to `alerts`.
    ///
    /// Also installs a process-wide panic hook that records the panicking
    /// thread's backtrace. The hook chains to the one it replaces.
    pub fn new(alerts: Arc<dyn AlertSink>) -> Self {
        install_panic_hook();
        Self { alerts }
    }
}

fn install_panic_hook() {
    static INSTALLED: Once = Once::new();
    INSTALLED.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let stack = Backtrace::force_capture().to_string();
            PANIC_STACK.with(|slot| *slot.borrow_mut() = Some(stack));
            previous(info);
        }));
    });
}

/// Takes the backtrace recorded by the last panic on this thread.
fn take_panic_stack() -> Option<String> {
    PANIC_STACK.with(|slot| slot.borrow_mut().take())
}

/// First [`PANIC_STACK_LINES`] lines of a backtrace.
fn stack_head(stack: &str) -> String {
    stack
        .lines()
        .take(PANIC_STACK_LINES)
        .collect::<Vec<_>>()
        .join("\n")
}

impl ResponseForPanic for PanicAlerter {
    type ResponseBody = Body;

    fn response_for_panic(&mut self, err: Box<dyn Any + Send + 'static>) -> Response<Body> {
        let detail = if let Some(s) = err.downcast_ref::<String>() {
            s.as_str()
        } else if let Some(s) = err.downcast_ref::<&str>() {
            s
        } else {
            "unknown panic payload"
        };

        let stack = take_panic_stack().map(|stack| stack_head(&stack));
        error!(panic = detail, stack = stack.as_deref(), "Handler panicked");

        let message = match stack {
            Some(stack) => format!("⚠️ PANIC: {detail}\n{stack}"),
            None => format!("⚠️ PANIC: {detail}"),
        };
        self.alerts.notify(message);

        ApiError::internal().into_response()
    }
}
