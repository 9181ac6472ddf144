//! Multi-step sign-up: phone entry, OTP verification, then role-specific profile details.
//!
//! Sessions live in memory only; an abandoned wizard simply expires.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{LicenseType, UserRole, VehicleType};

pub const MAX_OTP_ATTEMPTS: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistrationId(pub String);

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStep {
    PhoneEntered,
    OtpVerified,
    Completed,
}

impl RegistrationStep {
    pub const fn label(self) -> &'static str {
        match self {
            RegistrationStep::PhoneEntered => "phone_entered",
            RegistrationStep::OtpVerified => "otp_verified",
            RegistrationStep::Completed => "completed",
        }
    }
}

impl fmt::Display for RegistrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationSession {
    pub id: RegistrationId,
    pub phone: String,
    pub role: UserRole,
    pub step: RegistrationStep,
    pub failed_attempts: u8,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Public view returned by every wizard step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationView {
    pub session_id: RegistrationId,
    pub phone: String,
    pub role: UserRole,
    pub step: RegistrationStep,
    pub attempts_left: u8,
    pub expires_at: DateTime<Utc>,
}

impl RegistrationSession {
    pub fn view(&self) -> RegistrationView {
        RegistrationView {
            session_id: self.id.clone(),
            phone: self.phone.clone(),
            role: self.role,
            step: self.step,
            attempts_left: MAX_OTP_ATTEMPTS.saturating_sub(self.failed_attempts),
            expires_at: self.expires_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StartRegistration {
    pub phone: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VerifyRegistration {
    pub session_id: RegistrationId,
    pub otp: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompleteRegistration {
    pub session_id: RegistrationId,
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub profile: RegistrationProfile,
}

/// Final wizard page; the variant must match the role chosen on the first page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RegistrationProfile {
    Driver(DriverDetails),
    FleetOwner(FleetOwnerDetails),
    Transporter(TransporterDetails),
}

impl RegistrationProfile {
    pub fn role(&self) -> UserRole {
        match self {
            RegistrationProfile::Driver(_) => UserRole::Driver,
            RegistrationProfile::FleetOwner(_) => UserRole::FleetOwner,
            RegistrationProfile::Transporter(_) => UserRole::Transporter,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DriverDetails {
    pub date_of_birth: Option<NaiveDate>,
    pub city: Option<String>,
    pub license_number: Option<String>,
    pub license_type: Option<LicenseType>,
    pub license_expiry: Option<NaiveDate>,
    pub experience_years: Option<u8>,
    pub vehicle_types: Vec<VehicleType>,
    pub preferred_locations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FleetOwnerDetails {
    pub company_name: String,
    #[serde(default)]
    pub gst_number: Option<String>,
    #[serde(default)]
    pub fleet_size: u32,
    #[serde(default)]
    pub city: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TransporterDetails {
    pub company_name: String,
    #[serde(default)]
    pub operating_regions: Vec<String>,
    #[serde(default)]
    pub fleet_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("registration session {0} not found")]
    UnknownSession(RegistrationId),
    #[error("registration session {0} has expired")]
    Expired(RegistrationId),
    #[error("too many incorrect OTP attempts; start registration again")]
    Locked,
    #[error("incorrect OTP ({attempts_left} attempts left)")]
    InvalidOtp { attempts_left: u8 },
    #[error("registration is at step {found}, expected {expected}")]
    WrongStep {
        expected: RegistrationStep,
        found: RegistrationStep,
    },
    #[error("profile details are for {found:?} but the session registers a {expected:?}")]
    RoleMismatch { expected: UserRole, found: UserRole },
    #[error("phone {0} is already registered")]
    AlreadyRegistered(String),
    #[error("otp delivery failed: {0}")]
    Delivery(String),
}

/// Delivery and checking of one-time passwords.
pub trait OtpVerifier: Send + Sync {
    fn send(&self, phone: &str) -> Result<(), RegistrationError>;
    fn verify(&self, phone: &str, code: &str) -> bool;
}

/// Accepts a single configured code for every phone; nothing is actually sent.
#[derive(Debug, Clone)]
pub struct FixedOtpVerifier {
    code: String,
}

impl FixedOtpVerifier {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

impl Default for FixedOtpVerifier {
    fn default() -> Self {
        Self::new("123456")
    }
}

impl OtpVerifier for FixedOtpVerifier {
    fn send(&self, phone: &str) -> Result<(), RegistrationError> {
        info!(phone = %mask_phone(phone), "otp issued");
        Ok(())
    }

    fn verify(&self, _phone: &str, code: &str) -> bool {
        code.trim() == self.code
    }
}

pub(crate) fn mask_phone(phone: &str) -> String {
    let visible = phone.len().saturating_sub(4);
    phone
        .char_indices()
        .map(|(index, c)| if index < visible { '*' } else { c })
        .collect()
}

/// In-memory registration sessions keyed by id.
pub struct RegistrationSessions {
    sessions: Mutex<HashMap<RegistrationId, RegistrationSession>>,
    sequence: AtomicU64,
    ttl: Duration,
}

impl RegistrationSessions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(1),
            ttl,
        }
    }

    fn next_id(&self) -> RegistrationId {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        RegistrationId(format!("reg-{id:06}"))
    }

    fn with_sessions<T>(
        &self,
        f: impl FnOnce(&mut HashMap<RegistrationId, RegistrationSession>) -> Result<T, RegistrationError>,
    ) -> Result<T, RegistrationError> {
        let mut guard = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    pub fn open(
        &self,
        phone: String,
        role: UserRole,
        now: DateTime<Utc>,
    ) -> Result<RegistrationSession, RegistrationError> {
        let session = RegistrationSession {
            id: self.next_id(),
            phone,
            role,
            step: RegistrationStep::PhoneEntered,
            failed_attempts: 0,
            created_at: now,
            expires_at: now + self.ttl,
        };
        self.with_sessions(|sessions| {
            sessions.retain(|_, existing| {
                existing.expires_at > now && existing.step != RegistrationStep::Completed
            });
            sessions.insert(session.id.clone(), session.clone());
            Ok(session)
        })
    }

    /// Looks up a live session, failing for unknown or expired ids.
    pub fn get(
        &self,
        id: &RegistrationId,
        now: DateTime<Utc>,
    ) -> Result<RegistrationSession, RegistrationError> {
        self.with_sessions(|sessions| live(sessions, id, now).map(|session| session.clone()))
    }

    pub fn verify(
        &self,
        id: &RegistrationId,
        code: &str,
        verifier: &dyn OtpVerifier,
        now: DateTime<Utc>,
    ) -> Result<RegistrationSession, RegistrationError> {
        self.with_sessions(|sessions| {
            let session = live(sessions, id, now)?;
            match session.step {
                RegistrationStep::OtpVerified => return Ok(session.clone()),
                RegistrationStep::Completed => {
                    return Err(RegistrationError::WrongStep {
                        expected: RegistrationStep::PhoneEntered,
                        found: session.step,
                    })
                }
                RegistrationStep::PhoneEntered => {}
            }
            if session.failed_attempts >= MAX_OTP_ATTEMPTS {
                return Err(RegistrationError::Locked);
            }

            if verifier.verify(&session.phone, code) {
                session.step = RegistrationStep::OtpVerified;
                Ok(session.clone())
            } else {
                session.failed_attempts += 1;
                let attempts_left = MAX_OTP_ATTEMPTS.saturating_sub(session.failed_attempts);
                if attempts_left == 0 {
                    Err(RegistrationError::Locked)
                } else {
                    Err(RegistrationError::InvalidOtp { attempts_left })
                }
            }
        })
    }

    /// Checks that the session may be completed with a profile for `role`.
    pub fn ready_to_complete(
        &self,
        id: &RegistrationId,
        role: UserRole,
        now: DateTime<Utc>,
    ) -> Result<RegistrationSession, RegistrationError> {
        let session = self.get(id, now)?;
        if session.step != RegistrationStep::OtpVerified {
            return Err(RegistrationError::WrongStep {
                expected: RegistrationStep::OtpVerified,
                found: session.step,
            });
        }
        if session.role != role {
            return Err(RegistrationError::RoleMismatch {
                expected: session.role,
                found: role,
            });
        }
        Ok(session)
    }

    pub fn mark_completed(
        &self,
        id: &RegistrationId,
        now: DateTime<Utc>,
    ) -> Result<RegistrationSession, RegistrationError> {
        self.with_sessions(|sessions| {
            let session = live(sessions, id, now)?;
            session.step = RegistrationStep::Completed;
            Ok(session.clone())
        })
    }
}

fn live<'a>(
    sessions: &'a mut HashMap<RegistrationId, RegistrationSession>,
    id: &RegistrationId,
    now: DateTime<Utc>,
) -> Result<&'a mut RegistrationSession, RegistrationError> {
    let session = sessions
        .get_mut(id)
        .ok_or_else(|| RegistrationError::UnknownSession(id.clone()))?;
    if session.expires_at <= now {
        return Err(RegistrationError::Expired(id.clone()));
    }
    Ok(session)
}
