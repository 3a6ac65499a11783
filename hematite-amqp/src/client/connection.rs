//! The client entry point and the connection handle.

use std::sync::Arc;
use std::time::Instant;

use hematite_amqp_types::definitions::{self, ErrorCondition};
use hematite_amqp_types::registry::Registry;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, OnceCell};
use tracing::debug;

use crate::control::Control;
use crate::engine::{Engine, EngineConfig, SessionId};
use crate::transport::{self, ProtocolHeader};

use super::driver::{ConnShared, Driver};
use super::error::ClientError;
use super::options::{ClientOptions, ConnectionOptions, ReceiverOptions, SenderOptions};
use super::receiver::Receiver;
use super::sender::Sender;
use super::session::Session;
use super::streaming::{StreamReceiver, StreamSender};
use super::with_timeout;

/// Factory for connections.
#[derive(Debug, Default)]
pub struct Client {
    options: ClientOptions,
}

impl Client {
    /// Creates a client with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a client with the given options.
    pub fn with_options(options: ClientOptions) -> Self {
        Self { options }
    }

    /// Connects over TCP and opens an AMQP connection.
    ///
    /// The returned connection is fully open; the open handshake is the
    /// awaited part of this call.
    pub async fn connect(
        &self,
        host: &str,
        port: u16,
        options: ConnectionOptions,
    ) -> Result<Connection, ClientError> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        self.connect_over(stream, Some(host), options).await
    }

    /// Opens an AMQP connection over an established byte pipe.
    ///
    /// The pipe can be anything `AsyncRead + AsyncWrite`: a TCP stream,
    /// a TLS session, a WebSocket adapter, or an in-process duplex for
    /// tests.
    pub async fn connect_over<Io>(
        &self,
        mut io: Io,
        hostname: Option<&str>,
        options: ConnectionOptions,
    ) -> Result<Connection, ClientError>
    where
        Io: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let container_id = self
            .options
            .container_id
            .clone()
            .unwrap_or_else(|| format!("client-{}", uuid::Uuid::new_v4()));
        let open_hostname = options
            .virtual_host
            .clone()
            .or_else(|| hostname.map(str::to_string));

        let config = EngineConfig {
            container_id,
            hostname: open_hostname.clone(),
            max_frame_size: options
                .max_frame_size
                .max(definitions::MIN_MAX_FRAME_SIZE as u32),
            channel_max: options.channel_max,
            idle_time_out: options
                .idle_timeout
                .map(|timeout| timeout.as_millis() as u32),
            properties: options.properties.clone(),
        };
        let mut engine = Engine::new(config, Instant::now());

        if let Some(profile) = options.effective_sasl_profile() {
            debug!(mechanism = %profile.mechanism(), "negotiating sasl");
            transport::negotiate_sasl(
                &mut io,
                engine.registry(),
                &profile,
                open_hostname.as_deref(),
            )
            .await?;
        }

        transport::negotiate_header(&mut io, ProtocolHeader::amqp()).await?;
        engine.on_header_sent();
        engine.on_header_received();
        engine.open()?;

        let registry = engine.registry();
        let shared = Arc::new(ConnShared::default());
        let (control_tx, control_rx) = mpsc::channel(64);
        let (open_tx, open_rx) = oneshot::channel();

        let driver = Driver::new(io, engine, control_rx, shared.clone(), open_tx);
        tokio::spawn(driver.run());

        with_timeout("open connection", options.open_timeout, async {
            open_rx.await.map_err(|_| ClientError::dropped())?
        })
        .await?;

        Ok(Connection {
            control: control_tx,
            shared,
            registry,
            options,
            default_session: OnceCell::new(),
        })
    }
}

/// An open AMQP connection.
///
/// Senders and receivers opened directly on the connection share one
/// lazily-begun default session; [`Connection::open_session`] creates
/// further sessions.
#[derive(Debug)]
pub struct Connection {
    control: mpsc::Sender<Control>,
    shared: Arc<ConnShared>,
    registry: Arc<Registry>,
    options: ConnectionOptions,
    default_session: OnceCell<SessionId>,
}

impl Connection {
    /// Begins a new session.
    pub async fn open_session(&self) -> Result<Session, ClientError> {
        let session = self.begin_session().await?;
        Ok(Session::new(
            self.control.clone(),
            session,
            self.shared.clone(),
            self.registry.clone(),
            self.options.clone(),
        ))
    }

    /// Opens a sender to `address` on the default session.
    pub async fn open_sender(&self, address: &str) -> Result<Sender, ClientError> {
        self.open_sender_with_options(address, SenderOptions::default())
            .await
    }

    /// Opens a sender to `address` with explicit options.
    pub async fn open_sender_with_options(
        &self,
        address: &str,
        sender_options: SenderOptions,
    ) -> Result<Sender, ClientError> {
        let session = self.default_session().await?;
        Sender::attach(
            self.control.clone(),
            self.shared.clone(),
            session,
            address,
            sender_options,
            &self.options,
        )
        .await
    }

    /// Opens a receiver from `address` on the default session.
    pub async fn open_receiver(&self, address: &str) -> Result<Receiver, ClientError> {
        self.open_receiver_with_options(address, ReceiverOptions::default())
            .await
    }

    /// Opens a receiver from `address` with explicit options.
    pub async fn open_receiver_with_options(
        &self,
        address: &str,
        receiver_options: ReceiverOptions,
    ) -> Result<Receiver, ClientError> {
        let session = self.default_session().await?;
        Receiver::attach(
            self.control.clone(),
            self.shared.clone(),
            self.registry.clone(),
            session,
            address,
            receiver_options,
            &self.options,
        )
        .await
    }

    /// Opens a streaming sender to `address` on the default session.
    pub async fn open_stream_sender(&self, address: &str) -> Result<StreamSender, ClientError> {
        let session = self.default_session().await?;
        StreamSender::attach(
            self.control.clone(),
            self.shared.clone(),
            session,
            address,
            SenderOptions::default(),
            &self.options,
        )
        .await
    }

    /// Opens a streaming receiver from `address` on the default session.
    pub async fn open_stream_receiver(&self, address: &str) -> Result<StreamReceiver, ClientError> {
        self.open_stream_receiver_with_options(address, ReceiverOptions::default())
            .await
    }

    /// Opens a streaming receiver with explicit options.
    pub async fn open_stream_receiver_with_options(
        &self,
        address: &str,
        receiver_options: ReceiverOptions,
    ) -> Result<StreamReceiver, ClientError> {
        let session = self.default_session().await?;
        StreamReceiver::attach(
            self.control.clone(),
            self.shared.clone(),
            session,
            address,
            receiver_options,
            &self.options,
        )
        .await
    }

    /// Closes the connection and awaits the close handshake.
    ///
    /// Closing is idempotent; closing a failed connection succeeds and
    /// the failure stays available via [`Connection::failure_cause`].
    pub async fn close(&self) -> Result<(), ClientError> {
        self.close_inner(None).await
    }

    /// Closes the connection conveying an error to the peer.
    pub async fn close_with_error(
        &self,
        condition: impl Into<ErrorCondition>,
        description: impl Into<String>,
    ) -> Result<(), ClientError> {
        self.close_inner(Some(definitions::Error::new(
            condition.into(),
            Some(description.into()),
            None,
        )))
        .await
    }

    async fn close_inner(&self, error: Option<definitions::Error>) -> Result<(), ClientError> {
        let (tx, rx) = oneshot::channel();
        if self
            .control
            .send(Control::Close {
                error,
                responder: tx,
            })
            .await
            .is_err()
        {
            // The driver is already gone; the connection is closed
            return Ok(());
        }
        let result = with_timeout("close connection", self.options.close_timeout, async {
            rx.await.map_err(|_| ClientError::dropped())?
        })
        .await;
        match result {
            Ok(_remote_error) => Ok(()),
            Err(ClientError::OperationTimedOut(_)) => {
                Err(ClientError::ResourceClosed("close handshake timed out"))
            }
            Err(err) => Err(err),
        }
    }

    /// Whether the connection has reached its end state.
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// The failure that brought the connection down, if any.
    pub fn failure_cause(&self) -> Option<ClientError> {
        self.shared.failure_cause()
    }

    async fn begin_session(&self) -> Result<SessionId, ClientError> {
        let (tx, rx) = oneshot::channel();
        self.control
            .send(Control::BeginSession { responder: tx })
            .await
            .map_err(|_| ClientError::dropped())?;
        with_timeout("begin session", self.options.request_timeout, async {
            rx.await.map_err(|_| ClientError::dropped())?
        })
        .await
    }

    async fn default_session(&self) -> Result<SessionId, ClientError> {
        self.default_session
            .get_or_try_init(|| self.begin_session())
            .await
            .copied()
    }
}
