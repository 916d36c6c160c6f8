//! HTTP polling signaling transport.
//!
//! Protocol:
//! - `PUT {url}/signaling` creates a signaling session, answering `{"sessionId": ..}`.
//! - `GET {url}/signaling?fromtime={t}` with a `Session-Id` header returns
//!   `{"messages": [..], "datetime": t}`; the next poll asks from that time.
//! - `POST {url}/signaling/{kind}` with the message body sends one message.
//!
//! The session is created lazily by the first poll or send. Poll failures are
//! logged and retried on the next tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use streamhost_core::{
    DispatchContext, MessageSink, SessionError, SignalingMessage, SignalingTransport,
    TransportParams,
};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const SESSION_HEADER: &str = "Session-Id";

#[derive(Deserialize)]
struct CreateSessionResponse {
    #[serde(rename = "sessionId")]
    session_id: String,
}

#[derive(Deserialize)]
struct PollResponse {
    #[serde(default)]
    messages: Vec<serde_json::Value>,
    #[serde(default)]
    datetime: i64,
}

struct PollBatch {
    messages: Vec<SignalingMessage>,
    datetime: i64,
}

fn http_error(e: reqwest::Error) -> SessionError {
    SessionError::Transport(e.to_string())
}

fn check_status(response: &reqwest::Response, what: &str) -> Result<(), SessionError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(SessionError::Transport(format!("{what} returned {status}")))
    }
}

/// Shared between the transport handle and its poll task.
struct HttpClient {
    base_url: String,
    client: reqwest::Client,
    session_id: Mutex<Option<String>>,
}

impl HttpClient {
    async fn ensure_session(&self) -> Result<String, SessionError> {
        if let Some(id) = self.session_id.lock().clone() {
            return Ok(id);
        }

        let response = self
            .client
            .put(format!("{}/signaling", self.base_url))
            .send()
            .await
            .map_err(http_error)?;
        check_status(&response, "create session")?;
        let body: CreateSessionResponse = response.json().await.map_err(http_error)?;

        debug!(signaling_session = %body.session_id, "signaling session created");
        *self.session_id.lock() = Some(body.session_id.clone());
        Ok(body.session_id)
    }

    async fn poll(&self, from_time: i64) -> Result<PollBatch, SessionError> {
        let session = self.ensure_session().await?;
        let response = self
            .client
            .get(format!("{}/signaling", self.base_url))
            .query(&[("fromtime", from_time)])
            .header(SESSION_HEADER, session)
            .send()
            .await
            .map_err(http_error)?;
        check_status(&response, "poll")?;
        let body: PollResponse = response.json().await.map_err(http_error)?;

        let messages = body
            .messages
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<SignalingMessage>(raw) {
                Ok(msg) => Some(msg),
                Err(e) => {
                    debug!(error = %e, "skipping unrecognized signaling message");
                    None
                }
            })
            .collect();
        Ok(PollBatch {
            messages,
            datetime: body.datetime,
        })
    }

    async fn post(&self, message: &SignalingMessage) -> Result<(), SessionError> {
        let session = self.ensure_session().await?;
        let response = self
            .client
            .post(format!("{}/signaling/{}", self.base_url, message.kind()))
            .header(SESSION_HEADER, session)
            .json(message)
            .send()
            .await
            .map_err(http_error)?;
        check_status(&response, message.kind())
    }
}

pub struct HttpSignaling {
    endpoint_url: String,
    poll_interval: Duration,
    context: DispatchContext,
    http: Arc<HttpClient>,
    poller: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    open: AtomicBool,
}

impl HttpSignaling {
    pub const TYPE_NAME: &'static str = "http";

    /// Builds the client only; no request is made until [`open`](SignalingTransport::open).
    pub fn new(params: TransportParams) -> Result<Self, SessionError> {
        if params.poll_interval.is_zero() {
            return Err(SessionError::InvalidParams(
                "poll interval must be non-zero".into(),
            ));
        }
        let client = reqwest::Client::builder().build().map_err(http_error)?;
        let base_url = params.endpoint_url.trim_end_matches('/').to_string();
        Ok(Self {
            endpoint_url: params.endpoint_url,
            poll_interval: params.poll_interval,
            context: params.context,
            http: Arc::new(HttpClient {
                base_url,
                client,
                session_id: Mutex::new(None),
            }),
            poller: Mutex::new(None),
            cancel: CancellationToken::new(),
            open: AtomicBool::new(false),
        })
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Server-assigned session id, once the first request succeeded.
    pub fn signaling_session(&self) -> Option<String> {
        self.http.session_id.lock().clone()
    }
}

async fn poll_loop(
    http: Arc<HttpClient>,
    interval: Duration,
    sink: MessageSink,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut from_time = 0_i64;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            () = cancel.cancelled() => break,
            result = http.poll(from_time) => result,
        };

        match result {
            Ok(batch) => {
                from_time = from_time.max(batch.datetime);
                for msg in batch.messages {
                    if sink.send(msg).await.is_err() {
                        debug!("signaling sink dropped, stopping poll");
                        return;
                    }
                }
            }
            Err(e) => warn!(error = %e, "signaling poll failed, retrying next tick"),
        }
    }
    debug!("signaling poll stopped");
}

#[async_trait]
impl SignalingTransport for HttpSignaling {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    fn open(&self, sink: MessageSink) -> Result<(), SessionError> {
        if self.cancel.is_cancelled() {
            return Err(SessionError::Transport("http transport already closed".into()));
        }
        let mut poller = self.poller.lock();
        if poller.is_some() {
            return Err(SessionError::Transport("http transport already open".into()));
        }

        let handle = self.context.spawn(poll_loop(
            Arc::clone(&self.http),
            self.poll_interval,
            sink,
            self.cancel.clone(),
        ));
        *poller = Some(handle);
        self.open.store(true, Ordering::SeqCst);
        debug!(
            endpoint = %self.endpoint_url,
            interval_ms = self.poll_interval.as_millis() as u64,
            "http transport opened"
        );
        Ok(())
    }

    async fn send(&self, message: SignalingMessage) -> Result<(), SessionError> {
        if self.cancel.is_cancelled() {
            return Err(SessionError::Transport("http transport closed".into()));
        }
        self.http.post(&message).await
    }

    fn close(&self) -> Result<(), SessionError> {
        if self.cancel.is_cancelled() {
            return Ok(());
        }
        self.cancel.cancel();
        if let Some(handle) = self.poller.lock().take() {
            handle.abort();
        }
        self.open.store(false, Ordering::SeqCst);
        debug!(endpoint = %self.endpoint_url, "http transport closed");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl Drop for HttpSignaling {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
