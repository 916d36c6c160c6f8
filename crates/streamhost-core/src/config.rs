use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};

use crate::errors::SessionError;

pub const DEFAULT_STUN_URL: &str = "stun:stun.l.google.com:19302";
pub const DEFAULT_TRANSPORT_TYPE: &str = "http";
pub const DEFAULT_ENDPOINT_URL: &str = "http://localhost";
pub const DEFAULT_POLL_INTERVAL_SECS: f64 = 5.0;

/// TURN credential with secrecy protection (zeroized on drop, redacted in Debug).
///
/// Serializes to the plain string so settings files round-trip.
#[derive(Clone, Deserialize)]
#[serde(from = "String")]
pub struct Credential(SecretString);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(SecretString::from(secret.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl From<String> for Credential {
    fn from(secret: String) -> Self {
        Self::new(secret)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

impl Serialize for Credential {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose())
    }
}

/// One STUN/TURN server entry.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<Credential>,
}

impl IceServer {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }

    pub fn turn(
        url: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            urls: vec![url.into()],
            username: Some(username.into()),
            credential: Some(Credential::new(credential)),
        }
    }
}

/// Ordered ICE server list handed to the engine. Never mutated after hand-off.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    pub ice_servers: Vec<IceServer>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServer::stun(DEFAULT_STUN_URL)],
        }
    }
}

/// Encoder backend selected once per session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderPreference {
    #[default]
    Hardware,
    Software,
}

impl EncoderPreference {
    pub fn from_hardware_flag(hardware: bool) -> Self {
        if hardware {
            Self::Hardware
        } else {
            Self::Software
        }
    }

    pub fn is_hardware(self) -> bool {
        self == Self::Hardware
    }
}

impl std::fmt::Display for EncoderPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hardware => f.write_str("hardware"),
            Self::Software => f.write_str("software"),
        }
    }
}

/// Parameters used to construct the signaling transport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalingParams {
    /// Registry key of the transport implementation (not a path or URL).
    pub transport_type: String,
    pub endpoint_url: String,
    pub poll_interval_secs: f64,
}

impl Default for SignalingParams {
    fn default() -> Self {
        Self {
            transport_type: DEFAULT_TRANSPORT_TYPE.into(),
            endpoint_url: DEFAULT_ENDPOINT_URL.into(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

impl SignalingParams {
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.transport_type.trim().is_empty() {
            return Err(SessionError::InvalidParams(
                "transport type must not be empty".into(),
            ));
        }
        if self.endpoint_url.trim().is_empty() {
            return Err(SessionError::InvalidParams(
                "endpoint url must not be empty".into(),
            ));
        }
        validate_poll_interval(self.poll_interval_secs)?;
        Ok(())
    }

    /// Poll interval as a `Duration`, or the default interval if the
    /// configured one does not validate.
    pub fn poll_interval(&self) -> Duration {
        validate_poll_interval(self.poll_interval_secs)
            .unwrap_or_else(|_| Duration::from_secs_f64(DEFAULT_POLL_INTERVAL_SECS))
    }
}

/// The poll interval must be a finite number of seconds that converts to a
/// non-zero `Duration`.
pub fn validate_poll_interval(secs: f64) -> Result<Duration, SessionError> {
    let invalid = || {
        SessionError::InvalidParams(format!(
            "poll interval must be a positive, representable number of seconds, got {secs}"
        ))
    };
    if !secs.is_finite() || secs <= 0.0 {
        return Err(invalid());
    }
    let interval = Duration::try_from_secs_f64(secs).map_err(|_| invalid())?;
    if interval.is_zero() {
        return Err(invalid());
    }
    Ok(interval)
}
