//! Option sets for the client API surface.

use std::time::Duration;

use hematite_amqp_types::definitions::Fields;
use hematite_amqp_types::messaging::{
    DistributionMode, TerminusDurability, TerminusExpiryPolicy,
};
use hematite_amqp_types::primitives::Symbol;

use crate::sasl_profile::SaslProfile;

/// Options applying to every connection a [`crate::client::Client`]
/// creates.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Container id announced in Open. Generated when unset.
    pub container_id: Option<String>,
}

impl ClientOptions {
    /// Sets the container id.
    pub fn container_id(mut self, container_id: impl Into<String>) -> Self {
        self.container_id = Some(container_id.into());
        self
    }
}

/// Per-connection options.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// SASL PLAIN username.
    pub username: Option<String>,

    /// SASL PLAIN password.
    pub password: Option<String>,

    /// Virtual host announced as the Open hostname.
    pub virtual_host: Option<String>,

    /// Explicit SASL profile, overriding username/password.
    pub sasl_profile: Option<SaslProfile>,

    /// Idle timeout advertised to the peer. The engine fails the
    /// connection when no traffic arrives for twice this long.
    pub idle_timeout: Option<Duration>,

    /// Largest frame this endpoint accepts.
    pub max_frame_size: u32,

    /// Highest channel number this endpoint will use.
    pub channel_max: u16,

    /// Timeout for the open handshake.
    pub open_timeout: Option<Duration>,

    /// Timeout for the close handshake; elapsing forces a local shutdown.
    pub close_timeout: Option<Duration>,

    /// Default timeout for sends awaiting credit.
    pub send_timeout: Option<Duration>,

    /// Default timeout for other blocking requests.
    pub request_timeout: Option<Duration>,

    /// Open properties.
    pub properties: Option<Fields>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            virtual_host: None,
            sasl_profile: None,
            idle_timeout: None,
            max_frame_size: 65536,
            channel_max: u16::MAX,
            open_timeout: Some(Duration::from_secs(60)),
            close_timeout: Some(Duration::from_secs(60)),
            send_timeout: None,
            request_timeout: None,
            properties: None,
        }
    }
}

impl ConnectionOptions {
    /// Sets the SASL PLAIN credentials.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the virtual host.
    pub fn virtual_host(mut self, virtual_host: impl Into<String>) -> Self {
        self.virtual_host = Some(virtual_host.into());
        self
    }

    /// Sets the advertised idle timeout.
    pub fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = Some(idle_timeout);
        self
    }

    /// Sets the maximum frame size.
    pub fn max_frame_size(mut self, max_frame_size: u32) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Sets the channel max.
    pub fn channel_max(mut self, channel_max: u16) -> Self {
        self.channel_max = channel_max;
        self
    }

    /// Sets the open handshake timeout.
    pub fn open_timeout(mut self, open_timeout: Duration) -> Self {
        self.open_timeout = Some(open_timeout);
        self
    }

    /// Sets the close handshake timeout.
    pub fn close_timeout(mut self, close_timeout: Duration) -> Self {
        self.close_timeout = Some(close_timeout);
        self
    }

    /// Sets the default send timeout.
    pub fn send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = Some(send_timeout);
        self
    }

    pub(crate) fn effective_sasl_profile(&self) -> Option<SaslProfile> {
        if let Some(profile) = &self.sasl_profile {
            return Some(profile.clone());
        }
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(SaslProfile::Plain {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }
}

/// Reliability mode of a link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Deliveries are sent settled; no acknowledgement is awaited.
    AtMostOnce,

    /// Deliveries are sent unsettled and acknowledged by the peer.
    #[default]
    AtLeastOnce,
}

/// Options for [`crate::client::Connection::open_sender`].
#[derive(Debug, Clone)]
pub struct SenderOptions {
    /// Link name; generated when unset.
    pub link_name: Option<String>,

    /// Reliability mode, mapped onto the sender settle mode.
    pub delivery_mode: DeliveryMode,

    /// Settle deliveries automatically once the peer reports a terminal
    /// outcome without settling.
    pub auto_settle: bool,

    /// Timeout for sends awaiting credit, overriding the connection's.
    pub send_timeout: Option<Duration>,

    /// Source terminus options.
    pub source: SourceOptions,

    /// Target terminus options.
    pub target: TargetOptions,
}

impl Default for SenderOptions {
    fn default() -> Self {
        Self {
            link_name: None,
            delivery_mode: DeliveryMode::AtLeastOnce,
            auto_settle: true,
            send_timeout: None,
            source: SourceOptions::default(),
            target: TargetOptions::default(),
        }
    }
}

impl SenderOptions {
    /// Sets the link name.
    pub fn link_name(mut self, link_name: impl Into<String>) -> Self {
        self.link_name = Some(link_name.into());
        self
    }

    /// Sets the delivery mode.
    pub fn delivery_mode(mut self, delivery_mode: DeliveryMode) -> Self {
        self.delivery_mode = delivery_mode;
        self
    }
}

/// Options for [`crate::client::Connection::open_receiver`].
#[derive(Debug, Clone)]
pub struct ReceiverOptions {
    /// Link name; generated when unset.
    pub link_name: Option<String>,

    /// Apply the accepted outcome to deliveries as they are received.
    pub auto_accept: bool,

    /// Replenished credit window; 0 selects manual credit.
    pub credit_window: u32,

    /// Reliability mode, mapped onto the receiver settle mode.
    pub delivery_mode: DeliveryMode,

    /// Timeout for drain cycles.
    pub drain_timeout: Option<Duration>,

    /// Source terminus options.
    pub source: SourceOptions,

    /// Target terminus options.
    pub target: TargetOptions,
}

impl Default for ReceiverOptions {
    fn default() -> Self {
        Self {
            link_name: None,
            auto_accept: true,
            credit_window: 10,
            delivery_mode: DeliveryMode::AtLeastOnce,
            drain_timeout: Some(Duration::from_secs(60)),
            source: SourceOptions::default(),
            target: TargetOptions::default(),
        }
    }
}

impl ReceiverOptions {
    /// Sets the link name.
    pub fn link_name(mut self, link_name: impl Into<String>) -> Self {
        self.link_name = Some(link_name.into());
        self
    }

    /// Sets the credit window. 0 selects manual credit.
    pub fn credit_window(mut self, credit_window: u32) -> Self {
        self.credit_window = credit_window;
        self
    }

    /// Sets auto-accept behavior.
    pub fn auto_accept(mut self, auto_accept: bool) -> Self {
        self.auto_accept = auto_accept;
        self
    }
}

/// Options for the source terminus of a link.
#[derive(Debug, Clone, Default)]
pub struct SourceOptions {
    /// Distribution mode requested from the source node.
    pub distribution_mode: Option<DistributionMode>,

    /// Filters applied at the source node.
    pub filters: Option<Fields>,

    /// Source capabilities.
    pub capabilities: Vec<Symbol>,

    /// Terminus durability.
    pub durability_mode: Option<TerminusDurability>,

    /// Terminus expiry policy.
    pub expiry_policy: Option<TerminusExpiryPolicy>,
}

/// Options for the target terminus of a link.
#[derive(Debug, Clone, Default)]
pub struct TargetOptions {
    /// Target capabilities.
    pub capabilities: Vec<Symbol>,

    /// Terminus durability.
    pub durability_mode: Option<TerminusDurability>,

    /// Terminus expiry policy.
    pub expiry_policy: Option<TerminusExpiryPolicy>,
}
