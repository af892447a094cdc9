//! Plain data records decoded from Mail.tm JSON.

use crate::{Error, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, TimeZone};
use serde::{Deserialize, Serialize};

/// Wire format of every `createdAt` / `updatedAt` field.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S+00:00";

/// Parse a service timestamp and place it in the local system zone.
pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|_| {
        Error::DateTimeParse {
            value: value.to_string(),
        }
    })?;

    in_zone(&Local, &naive).ok_or_else(|| Error::DateTimeParse {
        value: value.to_string(),
    })
}

/// Place a wall-clock time in `zone`.
///
/// An ambiguous time (clocks turned back) takes the earlier instant. A time
/// skipped by clocks moving forward is pushed past the gap.
fn in_zone<Tz: TimeZone>(zone: &Tz, naive: &NaiveDateTime) -> Option<DateTime<Tz>> {
    zone.from_local_datetime(naive)
        .earliest()
        .or_else(|| zone.from_local_datetime(&(*naive + TimeDelta::hours(1))).earliest())
}

/// A Mail.tm account.
///
/// [`Account::default`] is the zero value returned by best-effort reads; an
/// empty `id` means the read failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub address: String,
    /// Storage quota in bytes.
    pub quota: u64,
    /// Storage used in bytes.
    pub used: u64,
    pub is_disabled: bool,
    pub is_deleted: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Account {
    /// The account's email address.
    pub fn email(&self) -> &str {
        &self.address
    }

    pub fn created_at(&self) -> Result<DateTime<Local>> {
        parse_timestamp(&self.created_at)
    }

    pub fn updated_at(&self) -> Result<DateTime<Local>> {
        parse_timestamp(&self.updated_at)
    }
}

/// A mail domain that accounts can be created under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Domain {
    pub id: String,
    pub domain: String,
    pub is_active: bool,
    pub is_private: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Domain {
    /// Domain name, e.g. `example.com`.
    pub fn name(&self) -> &str {
        &self.domain
    }
}

/// Sender or recipient of a message.
///
/// On the wire recipients are either objects or bare address strings; both
/// decode into this shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RecipientRepr")]
pub struct Recipient {
    pub address: String,
    pub name: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecipientRepr {
    Address(String),
    Full {
        #[serde(default)]
        address: String,
        #[serde(default)]
        name: String,
    },
}

impl From<RecipientRepr> for Recipient {
    fn from(repr: RecipientRepr) -> Self {
        match repr {
            RecipientRepr::Address(address) => Self {
                address,
                name: String::new(),
            },
            RecipientRepr::Full { address, name } => Self { address, name },
        }
    }
}
