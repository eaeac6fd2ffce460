//! User identifier model - the email or phone number a session authenticates.

use serde::{Deserialize, Serialize};

use crate::utils::contact;

/// Channel an identifier belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    Email,
    PhoneNumber,
}

impl IdentifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierKind::Email => "email",
            IdentifierKind::PhoneNumber => "phone_number",
        }
    }
}

/// A typed identifier submitted by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub kind: IdentifierKind,
    pub value: String,
}

impl Identifier {
    /// Build an email identifier, validating the address format.
    pub fn email(value: impl Into<String>) -> Result<Self, InvalidIdentifier> {
        let value = value.into();
        if !contact::is_valid_email(&value) {
            return Err(InvalidIdentifier::Email(value));
        }
        Ok(Self {
            kind: IdentifierKind::Email,
            value,
        })
    }

    /// Build a phone identifier, validating an E.164-style number.
    pub fn phone(value: impl Into<String>) -> Result<Self, InvalidIdentifier> {
        let value = value.into();
        if !contact::is_valid_phone(&value) {
            return Err(InvalidIdentifier::Phone(value));
        }
        Ok(Self {
            kind: IdentifierKind::PhoneNumber,
            value,
        })
    }

    /// Masked rendering safe for display and logs.
    pub fn scrubbed(&self) -> String {
        match self.kind {
            IdentifierKind::Email => contact::scrub_email(&self.value),
            IdentifierKind::PhoneNumber => contact::scrub_phone(&self.value),
        }
    }
}

/// Rejected identifier input.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InvalidIdentifier {
    #[error("invalid email address")]
    Email(String),
    #[error("invalid phone number")]
    Phone(String),
}
