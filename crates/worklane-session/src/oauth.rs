//! OAuth handshake coordination.
//!
//! The handshake with the external provider is an explicit finite state
//! machine rather than ad hoc listeners, so cancellation rules and origin
//! filtering are invariants of the type instead of scattered checks.
//!
//! Two transports feed the same machine:
//! - a loopback [`CallbackListener`] that receives the provider's redirect
//!   and emits one [`HandshakeMessage`]
//! - a redirect landing URL consumed exactly once via
//!   [`OAuthCoordinator::consume_redirect`]

use crate::error::{AuthError, AuthResult};
use rust_fsm::*;
use std::sync::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

/// Default port for the loopback callback listener.
pub const DEFAULT_CALLBACK_PORT: u16 = 8743;

/// Default seconds to wait for the provider redirect.
pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 180;

// Handshake FSM. Cancel is deliberately absent from Processing: a handshake
// mid-resolution must finish before it can be disposed, otherwise the token
// manager could be left indeterminate.
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub handshake_machine(Waiting)

    Waiting => {
        TokenMessage => Processing,
        ErrorMessage => Failed,
        Cancel => Closed
    },
    Processing => {
        Resolved => Succeeded,
        Rejected => Failed
    },
    Succeeded => {
        Cancel => Closed
    },
    Failed => {
        Cancel => Closed
    }
}

pub use handshake_machine::Input as HandshakeInput;
pub use handshake_machine::State as HandshakeMachineState;
pub use handshake_machine::StateMachine as HandshakeMachine;

/// Handshake state for external consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Provider window open, waiting for a message.
    Waiting,
    /// A credential arrived and is being resolved into a session.
    Processing,
    /// Resolution finished successfully.
    Succeeded,
    /// The provider reported an error or resolution failed.
    Failed,
    /// Cancelled and disposed.
    Closed,
}

impl From<&HandshakeMachineState> for HandshakeState {
    fn from(state: &HandshakeMachineState) -> Self {
        match state {
            HandshakeMachineState::Waiting => HandshakeState::Waiting,
            HandshakeMachineState::Processing => HandshakeState::Processing,
            HandshakeMachineState::Succeeded => HandshakeState::Succeeded,
            HandshakeMachineState::Failed => HandshakeState::Failed,
            HandshakeMachineState::Closed => HandshakeState::Closed,
        }
    }
}

/// Body of a cross-window handshake message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakePayload {
    /// Successful exchange carrying the bearer credential.
    Token(String),
    /// Provider-reported failure with a reason.
    Error(String),
}

/// A message received from the provider window or redirect landing.
#[derive(Debug, Clone)]
pub struct HandshakeMessage {
    /// Origin the message arrived from.
    pub origin: String,
    pub payload: HandshakePayload,
}

/// Handle to the provider window.
///
/// For the loopback transport this owns the listener task; closing aborts
/// it.
pub struct ProviderWindow {
    handle: tokio::task::JoinHandle<()>,
}

impl ProviderWindow {
    pub fn new(handle: tokio::task::JoinHandle<()>) -> Self {
        Self { handle }
    }

    /// Close the window, aborting the listener task.
    pub fn close(self) {
        self.handle.abort();
    }
}

/// Coordinates one OAuth handshake.
///
/// Messages from any origin other than the expected one are discarded
/// silently; that is a security invariant, not an optimization.
pub struct OAuthCoordinator {
    expected_origin: String,
    fsm: Mutex<HandshakeMachine>,
    window: Mutex<Option<ProviderWindow>>,
    redirect_consumed: Mutex<bool>,
    failure: Mutex<Option<String>>,
}

impl OAuthCoordinator {
    /// Create a coordinator scoped to the given origin.
    pub fn new(expected_origin: impl Into<String>) -> Self {
        Self {
            expected_origin: expected_origin.into(),
            fsm: Mutex::new(HandshakeMachine::new()),
            window: Mutex::new(None),
            redirect_consumed: Mutex::new(false),
            failure: Mutex::new(None),
        }
    }

    /// The current handshake state.
    pub fn state(&self) -> HandshakeState {
        HandshakeState::from(self.fsm.lock().unwrap().state())
    }

    /// The failure reason, if the handshake failed.
    pub fn failure(&self) -> Option<String> {
        self.failure.lock().unwrap().clone()
    }

    /// Attach the provider window handle, released on completion or cancel.
    pub fn attach_window(&self, window: ProviderWindow) {
        *self.window.lock().unwrap() = Some(window);
    }

    fn transition(&self, input: &HandshakeInput) -> AuthResult<HandshakeState> {
        let mut fsm = self.fsm.lock().unwrap();
        fsm.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in handshake state {:?}",
                input,
                fsm.state()
            ))
        })?;
        let state = HandshakeState::from(fsm.state());
        debug!(state = ?state, "Handshake transition");
        Ok(state)
    }

    fn release_window(&self) {
        if let Some(window) = self.window.lock().unwrap().take() {
            window.close();
        }
    }

    /// Deliver a handshake message.
    ///
    /// A message from a foreign origin is discarded without a state change
    /// and without an error, returning `Ok(None)`. A token message moves the
    /// handshake to `Processing` and hands the payload back so the engine
    /// can resolve it; an error message fails the handshake.
    pub fn deliver(&self, message: HandshakeMessage) -> AuthResult<Option<HandshakePayload>> {
        if message.origin != self.expected_origin {
            debug!(origin = %message.origin, "Discarding handshake message from foreign origin");
            return Ok(None);
        }
        if self.state() == HandshakeState::Closed {
            return Err(AuthError::HandshakeClosed);
        }

        match &message.payload {
            HandshakePayload::Token(_) => {
                self.transition(&HandshakeInput::TokenMessage)?;
            }
            HandshakePayload::Error(reason) => {
                self.transition(&HandshakeInput::ErrorMessage)?;
                *self.failure.lock().unwrap() = Some(reason.clone());
                self.release_window();
            }
        }

        Ok(Some(message.payload))
    }

    /// Mark the in-flight resolution as successful.
    pub fn resolve(&self) -> AuthResult<()> {
        self.transition(&HandshakeInput::Resolved)?;
        self.release_window();
        info!("OAuth handshake resolved");
        Ok(())
    }

    /// Mark the in-flight resolution as failed.
    pub fn reject(&self, reason: &str) -> AuthResult<()> {
        self.transition(&HandshakeInput::Rejected)?;
        *self.failure.lock().unwrap() = Some(reason.to_string());
        self.release_window();
        warn!(reason = %reason, "OAuth handshake rejected");
        Ok(())
    }

    /// Cancel the handshake, closing the provider window.
    ///
    /// Legal from every state except `Processing`: a credential mid-
    /// resolution must finish first.
    pub fn cancel(&self) -> AuthResult<()> {
        match self.state() {
            HandshakeState::Processing => return Err(AuthError::HandshakeBusy),
            HandshakeState::Closed => return Ok(()),
            _ => {}
        }

        self.transition(&HandshakeInput::Cancel)?;
        self.release_window();
        info!("OAuth handshake cancelled");
        Ok(())
    }

    /// Extract the handshake message from a redirect landing URL.
    ///
    /// The `token`/`error` query parameters are consumed exactly once; any
    /// later call returns `Ok(None)`. A URL carrying neither parameter is
    /// not a landing and does not consume.
    pub fn consume_redirect(&self, url: &Url) -> AuthResult<Option<HandshakeMessage>> {
        let mut consumed = self.redirect_consumed.lock().unwrap();
        if *consumed {
            return Ok(None);
        }

        let mut token = None;
        let mut error = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "token" => token = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                _ => {}
            }
        }

        let payload = match (token, error) {
            (_, Some(reason)) => HandshakePayload::Error(reason),
            (Some(token), None) => HandshakePayload::Token(token),
            (None, None) => return Ok(None),
        };

        *consumed = true;
        Ok(Some(HandshakeMessage {
            origin: url.origin().ascii_serialization(),
            payload,
        }))
    }
}

/// Loopback HTTP listener for the provider's redirect.
pub struct CallbackListener {
    port: u16,
    timeout_secs: u64,
}

impl CallbackListener {
    /// Create a listener on the given port with the given timeout.
    pub fn new(port: u16, timeout_secs: u64) -> Self {
        Self { port, timeout_secs }
    }

    /// Create with default settings.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CALLBACK_PORT, DEFAULT_CALLBACK_TIMEOUT_SECS)
    }

    /// The callback URL the provider redirects back to.
    pub fn callback_url(&self) -> String {
        format!("http://127.0.0.1:{}/callback", self.port)
    }

    /// The origin messages from this listener carry.
    pub fn origin(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Build the provider-initiated URL to open in the user's browser.
    pub fn provider_url(&self, web_app_url: &str, provider: &str) -> String {
        let login_id = Uuid::new_v4();
        let redirect: String = url::form_urlencoded::byte_serialize(
            self.callback_url().as_bytes(),
        )
        .collect();
        format!(
            "{}/oauth/start?provider={}&login_id={}&redirect_uri={}",
            web_app_url.trim_end_matches('/'),
            provider,
            login_id,
            redirect
        )
    }

    /// Listen for the provider redirect and return its handshake message.
    ///
    /// Binds the loopback port, waits for `GET /callback?...` carrying a
    /// `token` or `error` parameter, answers with a small HTML page, and
    /// shuts down. A timeout yields an error-typed message rather than a
    /// transport error so the coordinator can fail the handshake cleanly.
    pub async fn wait_for_message(&self) -> AuthResult<HandshakeMessage> {
        let addr = format!("127.0.0.1:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| AuthError::OAuth(format!("Failed to bind {}: {}", addr, e)))?;

        info!(port = self.port, "OAuth callback listener ready");

        let (tx, rx) = oneshot::channel::<HandshakeMessage>();
        let tx = std::sync::Arc::new(tokio::sync::Mutex::new(Some(tx)));
        let fallback_origin = self.origin();

        let accept_loop = tokio::spawn({
            let tx = tx.clone();
            async move {
                loop {
                    match listener.accept().await {
                        Ok((mut socket, _)) => {
                            let tx = tx.clone();
                            let fallback_origin = fallback_origin.clone();
                            tokio::spawn(async move {
                                if let Err(e) =
                                    handle_connection(&mut socket, tx, &fallback_origin).await
                                {
                                    error!("Error handling callback connection: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                            break;
                        }
                    }
                }
            }
        });

        let timeout = tokio::time::Duration::from_secs(self.timeout_secs);
        let message = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(message)) => message,
            Ok(Err(_)) => HandshakeMessage {
                origin: self.origin(),
                payload: HandshakePayload::Error("callback channel closed".to_string()),
            },
            Err(_) => HandshakeMessage {
                origin: self.origin(),
                payload: HandshakePayload::Error(
                    "timed out waiting for the provider redirect".to_string(),
                ),
            },
        };

        accept_loop.abort();

        Ok(message)
    }
}

/// Handle one incoming HTTP connection on the callback port.
async fn handle_connection(
    socket: &mut tokio::net::TcpStream,
    tx: std::sync::Arc<tokio::sync::Mutex<Option<oneshot::Sender<HandshakeMessage>>>>,
    fallback_origin: &str,
) -> AuthResult<()> {
    let (reader, mut writer) = socket.split();
    let mut reader = BufReader::new(reader);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;
    debug!(request = %request_line.trim(), "Callback request");

    // Drain headers, keeping Host to derive the message origin
    let mut host = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some(value) = line.strip_prefix("Host:").or_else(|| line.strip_prefix("host:")) {
            host = Some(value.trim().to_string());
        }
    }

    if !request_line.starts_with("GET ") {
        send_response(&mut writer, 405, "Method Not Allowed", "Method Not Allowed").await?;
        return Ok(());
    }

    let path_end = request_line.find(" HTTP/").unwrap_or(request_line.len());
    let path = &request_line[4..path_end];

    if !path.starts_with("/callback") {
        send_response(&mut writer, 404, "Not Found", "Not Found").await?;
        return Ok(());
    }

    let query = path.find('?').map(|idx| &path[idx + 1..]).unwrap_or("");
    let mut token = None;
    let mut error_param = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "token" => token = Some(value.into_owned()),
            "error" => error_param = Some(value.into_owned()),
            _ => {}
        }
    }

    let origin = host
        .map(|h| format!("http://{}", h))
        .unwrap_or_else(|| fallback_origin.to_string());

    let payload = if let Some(reason) = error_param {
        send_response(&mut writer, 200, "OK", &error_page(&reason)).await?;
        HandshakePayload::Error(reason)
    } else if let Some(token) = token {
        send_response(&mut writer, 200, "OK", &success_page()).await?;
        HandshakePayload::Token(token)
    } else {
        send_response(&mut writer, 200, "OK", &error_page("missing token parameter")).await?;
        HandshakePayload::Error("missing token parameter".to_string())
    };

    if let Some(tx) = tx.lock().await.take() {
        let _ = tx.send(HandshakeMessage { origin, payload });
    }

    Ok(())
}

async fn send_response(
    writer: &mut tokio::net::tcp::WriteHalf<'_>,
    status_code: u16,
    status_text: &str,
    body: &str,
) -> AuthResult<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_code,
        status_text,
        body.len(),
        body
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

fn success_page() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>Worklane - Signed In</title></head>
<body style="font-family: system-ui; text-align: center; padding: 60px; background: #fafaf7;">
<h1 style="color: #16a34a;">Signed in</h1>
<p style="color: #555;">You can close this tab and return to Worklane.</p>
<script>setTimeout(() => window.close(), 2000);</script>
</body>
</html>"#
        .to_string()
}

fn error_page(reason: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Worklane - Sign In Failed</title></head>
<body style="font-family: system-ui; text-align: center; padding: 60px; background: #fafaf7;">
<h1 style="color: #dc2626;">Sign in failed</h1>
<p style="color: #555;">{}</p>
<p style="color: #888; font-size: 14px;">Close this tab and try again.</p>
</body>
</html>"#,
        reason
    )
}
