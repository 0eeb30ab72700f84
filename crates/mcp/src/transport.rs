//! Lazy, single-flight tool transport.
//!
//! The transport moves through `Uninitialized → Connecting → Ready | Failed`.
//! Only one connection attempt runs at a time; callers that arrive while an
//! attempt is in flight wait for it and share its outcome. A `Failed`
//! transport is retried from scratch by the next `initialize`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::{ConnectError, Connection, Connector, ToolDefinition, ToolError};

/// Default bound on connecting and completing the handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// A connected tool server together with its catalog.
#[derive(Debug)]
pub struct TransportSession<T> {
    connection: T,
    catalog: Vec<ToolDefinition>,
}

impl<T> TransportSession<T> {
    /// Tools advertised when the session was established.
    pub fn catalog(&self) -> &[ToolDefinition] {
        &self.catalog
    }

    pub fn connection(&self) -> &T {
        &self.connection
    }
}

enum State<T> {
    Uninitialized,
    Connecting,
    Ready(Arc<TransportSession<T>>),
    Failed(ConnectError),
}

/// Observable transport state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportStatus {
    Uninitialized,
    Connecting,
    Ready { tools: usize },
    Failed { reason: String },
}

/// Shared tool transport over a [`Connector`].
pub struct ToolTransport<C: Connector> {
    connector: C,
    state: RwLock<State<C::Connection>>,
    connect_lock: Mutex<()>,
    attempts: AtomicU64,
    connect_timeout: Duration,
    settle_delay: Duration,
}

impl<C: Connector> ToolTransport<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            state: RwLock::new(State::Uninitialized),
            connect_lock: Mutex::new(()),
            attempts: AtomicU64::new(0),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            settle_delay: Duration::ZERO,
        }
    }

    /// Bound the connect-and-handshake phase.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Wait this long after connecting before listing tools.
    ///
    /// Only needed for servers whose handshake returns before they accept
    /// requests. Adds the delay to every fresh connection.
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Connect if needed and return the ready session.
    ///
    /// Idempotent: a ready transport returns its cached session untouched.
    pub async fn initialize(&self) -> Result<Arc<TransportSession<C::Connection>>, ConnectError> {
        if let Some(session) = self.ready().await {
            debug!("tool transport already connected");
            return Ok(session);
        }

        let seen = self.attempts.load(Ordering::Acquire);
        let _guard = self.connect_lock.lock().await;

        // An attempt finished while we waited: share its outcome.
        if self.attempts.load(Ordering::Acquire) != seen {
            match &*self.state.read().await {
                State::Ready(session) => return Ok(Arc::clone(session)),
                State::Failed(err) => return Err(err.clone()),
                State::Uninitialized | State::Connecting => {}
            }
        } else if let Some(session) = self.ready().await {
            return Ok(session);
        }

        *self.state.write().await = State::Connecting;
        info!("connecting to tool server");

        let outcome = self.establish().await;
        self.attempts.fetch_add(1, Ordering::AcqRel);

        match outcome {
            Ok(session) => {
                let session = Arc::new(session);
                info!(tools = session.catalog.len(), "tool transport ready");
                *self.state.write().await = State::Ready(Arc::clone(&session));
                Ok(session)
            }
            Err(err) => {
                warn!(error = %err, "tool transport initialization failed");
                *self.state.write().await = State::Failed(err.clone());
                Err(err)
            }
        }
    }

    async fn establish(&self) -> Result<TransportSession<C::Connection>, ConnectError> {
        let connection = timeout(self.connect_timeout, self.connector.connect())
            .await
            .map_err(|_| ConnectError::Timeout(self.connect_timeout.as_millis() as u64))??;

        if !self.settle_delay.is_zero() {
            debug!(delay_ms = self.settle_delay.as_millis() as u64, "waiting for tool server to settle");
            sleep(self.settle_delay).await;
        }

        let catalog = connection.list_tools().await?;
        if catalog.is_empty() {
            return Err(ConnectError::EmptyCatalog);
        }

        Ok(TransportSession {
            connection,
            catalog,
        })
    }

    /// Tool catalog of the ready session; empty when not connected.
    pub async fn list_tools(&self) -> Vec<ToolDefinition> {
        self.ready()
            .await
            .map(|session| session.catalog.clone())
            .unwrap_or_default()
    }

    /// Invoke a tool on the ready session.
    ///
    /// Never connects implicitly: call [`initialize`](Self::initialize) first.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        let session = self.ready().await.ok_or(ToolError::NotConnected)?;

        let result = session.connection.call_tool(name, arguments).await;
        if let Err(ToolError::Disconnected(reason)) = &result {
            self.mark_disconnected(&session, reason).await;
        }
        result
    }

    pub async fn status(&self) -> TransportStatus {
        match &*self.state.read().await {
            State::Uninitialized => TransportStatus::Uninitialized,
            State::Connecting => TransportStatus::Connecting,
            State::Ready(session) => TransportStatus::Ready {
                tools: session.catalog.len(),
            },
            State::Failed(err) => TransportStatus::Failed {
                reason: err.to_string(),
            },
        }
    }

    async fn ready(&self) -> Option<Arc<TransportSession<C::Connection>>> {
        match &*self.state.read().await {
            State::Ready(session) => Some(Arc::clone(session)),
            _ => None,
        }
    }

    async fn mark_disconnected(&self, lost: &Arc<TransportSession<C::Connection>>, reason: &str) {
        let mut state = self.state.write().await;
        // Leave a newer session alone.
        let is_current = matches!(&*state, State::Ready(current) if Arc::ptr_eq(current, lost));
        if is_current {
            warn!(reason, "tool transport disconnected");
            *state = State::Failed(ConnectError::Unreachable(reason.to_string()));
        }
    }
}
