//! SASL profiles the client can negotiate with.

use bytes::{BufMut, BytesMut};
use hematite_amqp_types::primitives::{Binary, Symbol};
use hematite_amqp_types::sasl::SaslInit;

pub(crate) const ANONYMOUS: &str = "ANONYMOUS";
pub(crate) const PLAIN: &str = "PLAIN";

/// SASL profile.
///
/// Mechanisms that need more than one round (SCRAM families) are out of
/// scope here; the dialog for both supported profiles is a single
/// init/outcome exchange.
#[derive(Debug, Clone)]
pub enum SaslProfile {
    /// SASL profile for the ANONYMOUS mechanism.
    Anonymous,

    /// SASL profile for the PLAIN mechanism.
    Plain {
        /// Username
        username: String,
        /// Password
        password: String,
    },
}

impl<T1, T2> From<(T1, T2)> for SaslProfile
where
    T1: Into<String>,
    T2: Into<String>,
{
    fn from((username, password): (T1, T2)) -> Self {
        Self::Plain {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl SaslProfile {
    /// The mechanism name announced in sasl-init.
    pub fn mechanism(&self) -> Symbol {
        let value = match self {
            SaslProfile::Anonymous => ANONYMOUS,
            SaslProfile::Plain { .. } => PLAIN,
        };
        Symbol::from(value)
    }

    /// The initial-response bytes for the mechanism, if any.
    pub fn initial_response(&self) -> Option<Binary> {
        match self {
            SaslProfile::Anonymous => None,
            SaslProfile::Plain { username, password } => {
                let username = username.as_bytes();
                let password = password.as_bytes();
                let mut buf = BytesMut::with_capacity(username.len() + password.len() + 2);
                buf.put_u8(0);
                buf.put_slice(username);
                buf.put_u8(0);
                buf.put_slice(password);
                Some(buf.freeze())
            }
        }
    }

    /// Builds the sasl-init frame body for this profile.
    pub fn sasl_init(&self, hostname: Option<&str>) -> SaslInit {
        SaslInit {
            mechanism: self.mechanism(),
            initial_response: self.initial_response(),
            hostname: hostname.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_initial_response_is_nul_separated() {
        let profile = SaslProfile::from(("user", "pass"));
        let response = profile.initial_response().unwrap();
        assert_eq!(&response[..], b"\x00user\x00pass");
    }

    #[test]
    fn anonymous_has_no_initial_response() {
        assert!(SaslProfile::Anonymous.initial_response().is_none());
    }
}
