//! Owner verification handshake
//!
//! The operator supplies the owner nick and a passphrase at startup. The bot
//! sends the nick a private challenge; a private reply carrying the passphrase
//! binds that sender's hostmask as the Owner.

use std::sync::{Arc, Mutex, MutexGuard};

use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;

use super::PermissionResolver;
use crate::application::errors::VerificationError;

/// Hash a passphrase with a fresh random salt.
pub fn hash_passphrase(passphrase: &str) -> Result<String, VerificationError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(passphrase.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| VerificationError::Hash(e.to_string()))
}

/// Check a passphrase against a stored PHC-format hash.
pub fn verify_passphrase(passphrase: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(passphrase.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored passphrase hash is malformed: {}", e);
            false
        }
    }
}

struct VerificationSession {
    nick: String,
    expected_hash: String,
}

pub const CHALLENGE_LINES: &[&str] = &[
    "SECURITY VERIFICATION",
    "Hello! I am your new bot. Security verification is required.",
    "Please confirm you are the owner by replying with the passphrase",
    "that was entered in the terminal during first run setup.",
    "After verification, your full hostmask will be used for authentication.",
];

pub const SUCCESS_LINES: &[&str] = &[
    "Verification successful!",
    "You are now confirmed as the bot owner with the hostmask:",
];

pub const SUCCESS_FOOTER: &[&str] = &[
    "This hostmask will be used for all future authentication.",
    "Use !setlevel <nick|hostmask> <level> to set permission levels for other users.",
    "Available levels: owner, admin, regular, badboy, ignored",
];

pub const MISMATCH_LINES: &[&str] = &[
    "Verification failed!",
    "The passphrase you provided did not match the one configured during setup.",
    "Please try again with the correct passphrase.",
    "If you've forgotten the passphrase, restart the bot and repeat the setup.",
];

pub const PERSIST_FAILED_LINE: &str =
    "Verification could not be saved due to an internal error. Please try again.";

/// Owner verification state machine
pub struct OwnerVerification {
    session: Mutex<Option<VerificationSession>>,
    permissions: Arc<PermissionResolver>,
}

impl OwnerVerification {
    pub fn new(permissions: Arc<PermissionResolver>) -> Self {
        Self {
            session: Mutex::new(None),
            permissions,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<VerificationSession>> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a session for `nick`. Only the hash of the passphrase is kept.
    pub fn begin(&self, nick: &str, passphrase: &str) -> Result<(), VerificationError> {
        let expected_hash = hash_passphrase(passphrase.trim())?;
        *self.lock() = Some(VerificationSession {
            nick: nick.to_string(),
            expected_hash,
        });
        tracing::info!(nick, "Owner verification pending");
        Ok(())
    }

    pub fn pending_nick(&self) -> Option<String> {
        self.lock().as_ref().map(|s| s.nick.clone())
    }

    pub fn is_pending_for(&self, nick: &str) -> bool {
        self.lock()
            .as_ref()
            .map(|s| s.nick.eq_ignore_ascii_case(nick))
            .unwrap_or(false)
    }

    /// Compare a private reply from the pending nick.
    ///
    /// On a match the sender's hostmask becomes the durable owner record and the
    /// session ends. A mismatch or a failed save leaves the session pending.
    pub fn verify(&self, hostmask: &str, reply: &str) -> Result<(), VerificationError> {
        let mut session = self.lock();
        let expected = session
            .as_ref()
            .map(|s| s.expected_hash.clone())
            .ok_or(VerificationError::NotPending)?;

        let passphrase = reply.trim();
        if !verify_passphrase(passphrase, &expected) {
            tracing::warn!(hostmask, "Owner verification attempt failed");
            return Err(VerificationError::Mismatch);
        }

        let stored_hash = hash_passphrase(passphrase)?;
        self.permissions.record_owner(hostmask, &stored_hash)?;
        *session = None;
        tracing::info!(hostmask, "Owner verified");
        Ok(())
    }
}
