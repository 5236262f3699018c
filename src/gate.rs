//! Startup access checks.
//!
//! A gate is consulted once before any network or filesystem work. Three
//! implementations are provided:
//!
//! - [`OpenGate`] always grants access
//! - [`TrialGate`] grants access for a fixed number of days after first use
//! - [`SignedLicenseGate`] verifies an Ed25519-signed license token
//!
//! License tokens have the form `base64(payload) "." base64(signature)` where
//! the signature covers the raw payload bytes and the payload is JSON:
//!
//! ```json
//! {"id": 7, "user": "acme", "kind": "annual",
//!  "starts_at": "2024-01-01T00:00:00Z", "expires_at": "2025-01-01T00:00:00Z",
//!  "active": true}
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, NaiveDate, Utc};
use ring::signature::{ED25519, UnparsedPublicKey};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Trial length used when none is configured.
pub const DEFAULT_TRIAL_DAYS: u32 = 15;

/// Length of an Ed25519 public key in bytes.
pub const ED25519_PUBLIC_KEY_LEN: usize = 32;

/// Result of an access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Access granted.
    Granted {
        /// Remaining trial or license days, when the gate tracks them.
        days_left: Option<i64>,
    },
    /// Access refused.
    Denied(DenyReason),
}

impl GateDecision {
    /// Returns true for [`GateDecision::Granted`].
    #[must_use]
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }
}

/// Why access was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// The trial period is over.
    TrialExpired {
        /// Days since first use.
        days_used: i64,
    },
    /// The recorded first-use date is later than today.
    ClockSkew,
    /// The token is not `payload.signature` with valid base64 parts.
    MalformedToken,
    /// The signature does not match the payload.
    BadSignature,
    /// The signed payload is not a valid license document.
    InvalidPayload,
    /// The license is marked inactive.
    Inactive,
    /// The license validity has not started yet.
    NotYetValid,
    /// The license has expired.
    Expired,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TrialExpired { days_used } => {
                write!(f, "trial period expired ({days_used} days used)")
            }
            Self::ClockSkew => f.write_str("first-use date is in the future"),
            Self::MalformedToken => f.write_str("license token is malformed"),
            Self::BadSignature => f.write_str("license signature is invalid"),
            Self::InvalidPayload => f.write_str("license payload is invalid"),
            Self::Inactive => f.write_str("license is inactive"),
            Self::NotYetValid => f.write_str("license is not valid yet"),
            Self::Expired => f.write_str("license has expired"),
        }
    }
}

/// Errors that prevent a gate from reaching a decision.
#[derive(Debug, Error)]
pub enum GateError {
    /// The trial marker could not be read or written.
    #[error("trial marker {path}: {source}")]
    Marker {
        /// Marker file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The trial marker exists but does not hold an ISO date.
    #[error("trial marker {path} is corrupt: {content:?}")]
    CorruptMarker {
        /// Marker file.
        path: PathBuf,
        /// What was found.
        content: String,
    },

    /// The configured public key is not a base64 Ed25519 key.
    #[error("license public key is invalid: {reason}")]
    InvalidPublicKey {
        /// What is wrong with it.
        reason: String,
    },

    /// The license file could not be read.
    #[error("cannot read license file {path}: {source}")]
    LicenseFile {
        /// License file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Decides whether this installation may run.
pub trait AccessGate {
    /// Performs the check.
    ///
    /// # Errors
    ///
    /// Returns [`GateError`] when the check itself cannot be completed.
    fn check(&self) -> Result<GateDecision, GateError>;

    /// Convenience wrapper: true only for a granted decision. Errors count as
    /// denial.
    fn is_authorized(&self) -> bool {
        match self.check() {
            Ok(decision) => decision.is_granted(),
            Err(error) => {
                warn!(error = %error, "access check failed");
                false
            }
        }
    }
}

/// Gate that grants every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenGate;

impl AccessGate for OpenGate {
    fn check(&self) -> Result<GateDecision, GateError> {
        Ok(GateDecision::Granted { days_left: None })
    }
}

/// Time-limited trial keyed on a first-use marker file.
#[derive(Debug, Clone)]
pub struct TrialGate {
    marker_path: PathBuf,
    trial_days: u32,
    today: NaiveDate,
}

impl TrialGate {
    /// Creates a trial gate evaluated as of `today`.
    #[must_use]
    pub fn new(marker_path: impl Into<PathBuf>, trial_days: u32, today: NaiveDate) -> Self {
        Self {
            marker_path: marker_path.into(),
            trial_days,
            today,
        }
    }

    fn first_use(&self) -> Result<NaiveDate, GateError> {
        match std::fs::read_to_string(&self.marker_path) {
            Ok(content) => {
                let trimmed = content.trim();
                NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| {
                    GateError::CorruptMarker {
                        path: self.marker_path.clone(),
                        content: trimmed.to_string(),
                    }
                })
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                self.write_marker()?;
                info!(path = %self.marker_path.display(), "trial started");
                Ok(self.today)
            }
            Err(source) => Err(GateError::Marker {
                path: self.marker_path.clone(),
                source,
            }),
        }
    }

    fn write_marker(&self) -> Result<(), GateError> {
        let to_marker_error = |source| GateError::Marker {
            path: self.marker_path.clone(),
            source,
        };
        if let Some(parent) = self.marker_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(to_marker_error)?;
            }
        }
        std::fs::write(&self.marker_path, format!("{}\n", self.today.format("%Y-%m-%d")))
            .map_err(to_marker_error)
    }
}

impl AccessGate for TrialGate {
    fn check(&self) -> Result<GateDecision, GateError> {
        let first_use = self.first_use()?;
        let days_used = (self.today - first_use).num_days();
        debug!(%first_use, days_used, trial_days = self.trial_days, "trial check");
        if days_used < 0 {
            return Ok(GateDecision::Denied(DenyReason::ClockSkew));
        }
        let trial_days = i64::from(self.trial_days);
        if days_used >= trial_days {
            return Ok(GateDecision::Denied(DenyReason::TrialExpired { days_used }));
        }
        Ok(GateDecision::Granted {
            days_left: Some(trial_days - days_used),
        })
    }
}

/// Signed license contents.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LicensePayload {
    /// License identifier.
    pub id: u64,
    /// Licensee.
    pub user: String,
    /// License kind, e.g. `monthly` or `annual`.
    pub kind: String,
    /// Start of validity.
    pub starts_at: DateTime<Utc>,
    /// End of validity (inclusive).
    pub expires_at: DateTime<Utc>,
    /// Revocation switch.
    pub active: bool,
}

/// Verifies a signed license token against a trusted public key.
#[derive(Clone)]
pub struct SignedLicenseGate {
    token: String,
    public_key: Vec<u8>,
    now: DateTime<Utc>,
}

impl fmt::Debug for SignedLicenseGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedLicenseGate")
            .field("now", &self.now)
            .finish_non_exhaustive()
    }
}

impl SignedLicenseGate {
    /// Creates a gate from a raw 32-byte Ed25519 public key.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::InvalidPublicKey`] if the key has the wrong length.
    pub fn new(
        token: impl Into<String>,
        public_key: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Self, GateError> {
        if public_key.len() != ED25519_PUBLIC_KEY_LEN {
            return Err(GateError::InvalidPublicKey {
                reason: format!(
                    "expected {ED25519_PUBLIC_KEY_LEN} bytes, got {}",
                    public_key.len()
                ),
            });
        }
        Ok(Self {
            token: token.into().trim().to_string(),
            public_key: public_key.to_vec(),
            now,
        })
    }

    /// Creates a gate from a base64-encoded public key.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::InvalidPublicKey`] if the key is not valid base64
    /// or has the wrong length.
    pub fn from_base64_key(
        token: impl Into<String>,
        public_key_b64: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, GateError> {
        let key = STANDARD
            .decode(public_key_b64.trim())
            .map_err(|error| GateError::InvalidPublicKey {
                reason: error.to_string(),
            })?;
        Self::new(token, &key, now)
    }

    /// Reads the token from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::LicenseFile`] if the file cannot be read, or
    /// [`GateError::InvalidPublicKey`] for a bad key.
    pub fn from_file(
        path: &Path,
        public_key_b64: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, GateError> {
        let token = std::fs::read_to_string(path).map_err(|source| GateError::LicenseFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_base64_key(token, public_key_b64, now)
    }

    fn verified_payload(&self) -> Result<LicensePayload, DenyReason> {
        let (payload_b64, signature_b64) = self
            .token
            .split_once('.')
            .ok_or(DenyReason::MalformedToken)?;
        let payload = STANDARD
            .decode(payload_b64)
            .map_err(|_| DenyReason::MalformedToken)?;
        let signature = STANDARD
            .decode(signature_b64)
            .map_err(|_| DenyReason::MalformedToken)?;

        UnparsedPublicKey::new(&ED25519, &self.public_key)
            .verify(&payload, &signature)
            .map_err(|_| DenyReason::BadSignature)?;

        serde_json::from_slice(&payload).map_err(|_| DenyReason::InvalidPayload)
    }
}

impl AccessGate for SignedLicenseGate {
    fn check(&self) -> Result<GateDecision, GateError> {
        let payload = match self.verified_payload() {
            Ok(payload) => payload,
            Err(reason) => return Ok(GateDecision::Denied(reason)),
        };
        debug!(id = payload.id, kind = %payload.kind, expires_at = %payload.expires_at, "license verified");

        if !payload.active {
            return Ok(GateDecision::Denied(DenyReason::Inactive));
        }
        if self.now < payload.starts_at {
            return Ok(GateDecision::Denied(DenyReason::NotYetValid));
        }
        if self.now > payload.expires_at {
            return Ok(GateDecision::Denied(DenyReason::Expired));
        }
        Ok(GateDecision::Granted {
            days_left: Some((payload.expires_at - self.now).num_days()),
        })
    }
}
