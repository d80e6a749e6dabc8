// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persisted provider credentials and their flat connection-string codec.
//!
//! A connection string is a positional, `;`-terminated record whose first
//! field names the connection kind:
//!
//! ```text
//! oauth2;<token_type>;<expiry>;<access_token>;<refresh_token>;
//! ```
//!
//! The kind fixes how many fields follow and what they mean. Values are not
//! escaped, so a `;` inside a value is refused on encode and shows up as a
//! field-count mismatch on decode.

use std::collections::HashMap;

use chrono::{DateTime, Duration, FixedOffset, Utc};

use crate::error::{AppError, Result};
use crate::time_utils::{format_expiry, parse_expiry};

const DELIMITER: char = ';';

/// Tokens are treated as expired this long before their recorded expiry.
const EXPIRY_MARGIN_SECS: i64 = 10;

/// Kind tag stored in field 0 of every connection string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    OAuth2,
}

impl ConnectionKind {
    pub fn tag(self) -> &'static str {
        match self {
            ConnectionKind::OAuth2 => "oauth2",
        }
    }

    /// Names of the positional fields following the tag, in order.
    pub fn field_names(self) -> &'static [&'static str] {
        match self {
            ConnectionKind::OAuth2 => &["token_type", "expiry", "access_token", "refresh_token"],
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "oauth2" => Ok(ConnectionKind::OAuth2),
            other => Err(AppError::UnsupportedConnectionKind(other.to_string())),
        }
    }
}

/// A decoded connection string with its fields named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub kind: ConnectionKind,
    pub parameters: HashMap<&'static str, String>,
}

impl Connection {
    pub fn param(&self, name: &str) -> Result<&str> {
        self.parameters
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| {
                AppError::CorruptCredential(format!(
                    "'{}' connection has no '{}' field",
                    self.kind.tag(),
                    name
                ))
            })
    }
}

/// Join the kind tag and its fields into a connection string.
pub fn encode(kind: ConnectionKind, fields: &[&str]) -> Result<String> {
    let expected = kind.field_names().len();
    if fields.len() != expected {
        return Err(AppError::CorruptCredential(format!(
            "'{}' connection needs {} fields, got {}",
            kind.tag(),
            expected,
            fields.len()
        )));
    }

    let mut out = String::from(kind.tag());
    out.push(DELIMITER);
    for (name, value) in kind.field_names().iter().zip(fields) {
        if value.contains(DELIMITER) {
            return Err(AppError::CorruptCredential(format!(
                "field '{}' contains the delimiter",
                name
            )));
        }
        out.push_str(value);
        out.push(DELIMITER);
    }
    Ok(out)
}

/// Split a connection string and name its fields according to its kind.
pub fn decode(record: &str) -> Result<Connection> {
    let mut parts: Vec<&str> = record.split(DELIMITER).collect();

    // A well-formed record ends with the delimiter, leaving one empty tail.
    if parts.len() < 2 || parts.pop() != Some("") {
        return Err(AppError::CorruptCredential(
            "record is not terminated by ';'".to_string(),
        ));
    }

    let kind = ConnectionKind::from_tag(parts[0])?;
    let names = kind.field_names();
    let values = &parts[1..];

    if values.len() != names.len() {
        return Err(AppError::CorruptCredential(format!(
            "'{}' connection expects {} fields, found {}",
            kind.tag(),
            names.len(),
            values.len()
        )));
    }

    let parameters = names
        .iter()
        .zip(values)
        .map(|(name, value)| (*name, value.to_string()))
        .collect();

    Ok(Connection { kind, parameters })
}

// ─────────────────────────────────────────────────────────────────────────────
// OAuthCredential
// ─────────────────────────────────────────────────────────────────────────────

/// OAuth2 credential stored per (user, provider).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredential {
    pub token_type: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Absolute expiry in the offset the token was issued with.
    /// `None` for tokens that never expire (stored as an empty field).
    pub expiry: Option<DateTime<FixedOffset>>,
}

impl OAuthCredential {
    /// Whether the access token can still be used at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expiry {
            Some(expiry) => expiry - Duration::seconds(EXPIRY_MARGIN_SECS) > now,
            None => true,
        }
    }

    pub fn encode(&self) -> Result<String> {
        let expiry = self.expiry.as_ref().map(format_expiry).unwrap_or_default();
        encode(
            ConnectionKind::OAuth2,
            &[
                &self.token_type,
                &expiry,
                &self.access_token,
                &self.refresh_token,
            ],
        )
    }

    pub fn decode(record: &str) -> Result<Self> {
        Self::from_connection(&decode(record)?)
    }

    pub fn from_connection(connection: &Connection) -> Result<Self> {
        if connection.kind != ConnectionKind::OAuth2 {
            return Err(AppError::UnsupportedConnectionKind(
                connection.kind.tag().to_string(),
            ));
        }

        let expiry = match connection.param("expiry")? {
            "" => None,
            text => Some(parse_expiry(text).map_err(|e| {
                AppError::CorruptCredential(format!("bad expiry '{}': {}", text, e))
            })?),
        };

        Ok(Self {
            token_type: connection.param("token_type")?.to_string(),
            access_token: connection.param("access_token")?.to_string(),
            refresh_token: connection.param("refresh_token")?.to_string(),
            expiry,
        })
    }
}
