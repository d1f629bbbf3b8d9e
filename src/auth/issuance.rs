// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Risk-control policy for session issuance.
//!
//! A key binds to the province and city of its first successful issuance.
//! Afterwards:
//!
//! | observed location                      | outcome            |
//! |----------------------------------------|--------------------|
//! | different province                     | ban                |
//! | known city                             | allow, no write    |
//! | new city, fewer than two cities bound  | append city, allow |
//! | new city, two cities already bound     | ban                |
//!
//! [`evaluate`] is the pure decision; [`admit`] applies it with the
//! store's compare-and-set operations and re-evaluates when a concurrent
//! issuance got there first.

use tracing::{debug, info, warn};

use crate::geo::{GeoError, Location};
use crate::models::KeyRecord;
use crate::storage::{CasOutcome, CredentialStore, StoreError};
use crate::telemetry::redact;

/// Re-evaluations allowed before giving up on a contended key.
pub const MAX_CAS_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanReason {
    ProvinceMismatch,
    CityLimitExceeded,
}

/// What the policy says to do with a record at a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Already banned. Nothing to write.
    Reject,
    /// Unbound: bind province and first city.
    Bind,
    /// Known city in the bound province.
    Allow,
    /// New city in the bound province, room left.
    AddCity,
    Ban(BanReason),
}

#[derive(Debug, thiserror::Error)]
pub enum IssuanceError {
    #[error("unknown key")]
    UnknownKey,

    #[error("key is banned")]
    Banned,

    #[error("key banned: access from a different province")]
    ProvinceMismatch,

    #[error("key banned: access from more than two cities")]
    CityLimitExceeded,

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Geo(#[from] GeoError),

    #[error("key record kept changing after {MAX_CAS_ATTEMPTS} attempts")]
    Contention,
}

impl From<StoreError> for IssuanceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => IssuanceError::UnknownKey,
            other => IssuanceError::Store(other),
        }
    }
}

impl From<BanReason> for IssuanceError {
    fn from(reason: BanReason) -> Self {
        match reason {
            BanReason::ProvinceMismatch => IssuanceError::ProvinceMismatch,
            BanReason::CityLimitExceeded => IssuanceError::CityLimitExceeded,
        }
    }
}

/// Decide what to do with `record` for a caller at `location`.
pub fn evaluate(record: &KeyRecord, location: &Location) -> Decision {
    if record.is_banned() {
        return Decision::Reject;
    }
    match record.bound_province.as_deref() {
        None => Decision::Bind,
        Some(province) if province != location.province => Decision::Ban(BanReason::ProvinceMismatch),
        Some(_) if record.knows_city(&location.city) => Decision::Allow,
        Some(_) if record.has_room_for_city() => Decision::AddCity,
        Some(_) => Decision::Ban(BanReason::CityLimitExceeded),
    }
}

/// Pre-flight check done before the geo lookup.
///
/// Unknown and banned keys are turned away without touching the network.
pub fn check_key(store: &CredentialStore, key: &str) -> Result<KeyRecord, IssuanceError> {
    let record = store.get(key)?.ok_or(IssuanceError::UnknownKey)?;
    if record.is_banned() {
        return Err(IssuanceError::Banned);
    }
    Ok(record)
}

/// Apply the policy for `key` at `location`.
///
/// Returns the record as it stands after an allowed issuance.
pub fn admit(store: &CredentialStore, key: &str, location: &Location) -> Result<KeyRecord, IssuanceError> {
    for attempt in 1..=MAX_CAS_ATTEMPTS {
        let record = store.get(key)?.ok_or(IssuanceError::UnknownKey)?;

        let outcome = match evaluate(&record, location) {
            Decision::Reject => return Err(IssuanceError::Banned),
            Decision::Allow => return Ok(record),
            Decision::Bind => store.set_location(key, &location.province, &location.city)?,
            Decision::AddCity => store.append_city(key, &location.province, &location.city)?,
            Decision::Ban(reason) => {
                store.ban(key)?;
                warn!(
                    key = %redact(key),
                    ip = %location.ip,
                    province = %location.province,
                    city = %location.city,
                    ?reason,
                    "key banned by risk control"
                );
                return Err(reason.into());
            }
        };

        match outcome {
            CasOutcome::Applied(updated) => {
                info!(
                    key = %redact(key),
                    province = %location.province,
                    city = %location.city,
                    cities = updated.bound_cities.len(),
                    "key location binding updated"
                );
                return Ok(updated);
            }
            CasOutcome::Stale(_) => {
                debug!(key = %redact(key), attempt, "key record changed concurrently, re-evaluating");
            }
        }
    }

    Err(IssuanceError::Contention)
}
