//! Ad-hoc read queries for operators on the local network.
//!
//! Neither check here is a security boundary. The origin gate trusts the
//! peer address of the TCP connection, and the statement filter is a
//! case-insensitive substring match against a keyword denylist, not a SQL
//! parser: it rejects `SELECT 'drop'` and can be bypassed by anything SQLite
//! accepts that the denylist does not name. Both are coarse perimeter
//! controls for a trusted LAN and must not be relied on beyond that.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use meteo_common::req::{QueryRecord, QueryResponse};
use serde_json::Value;

use crate::db::MeasurementStore;
use crate::error::SandboxError;

/// Checked in this order; the first hit is reported.
pub const FORBIDDEN_KEYWORDS: [&str; 7] = [
    "DROP", "DELETE", "INSERT", "UPDATE", "ALTER", "CREATE", "TRUNCATE",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid subnet `{0}`, expected CIDR notation such as 192.168.1.0/24")]
pub struct ParseSubnetError(String);

/// An IP network in CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subnet {
    network: IpAddr,
    prefix: u8,
}

impl Subnet {
    pub fn contains(&self, addr: IpAddr) -> bool {
        match (self.network, addr.to_canonical()) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => {
                let mask = u32::MAX.checked_shl(32 - u32::from(self.prefix)).unwrap_or(0);
                u32::from(net) & mask == u32::from(addr) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(addr)) => {
                let mask = u128::MAX.checked_shl(128 - u32::from(self.prefix)).unwrap_or(0);
                u128::from(net) & mask == u128::from(addr) & mask
            }
            _ => false,
        }
    }
}

impl FromStr for Subnet {
    type Err = ParseSubnetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseSubnetError(s.to_string());
        let (network, prefix) = s.trim().split_once('/').ok_or_else(err)?;
        let network: IpAddr = network.parse().map_err(|_| err())?;
        let prefix: u8 = prefix.parse().map_err(|_| err())?;
        let max = if network.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            return Err(err());
        }

        Ok(Self { network, prefix })
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

/// Which callers may reach the sandbox: loopback plus one local subnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginPolicy {
    pub local_subnet: Subnet,
}

impl OriginPolicy {
    pub fn new(local_subnet: Subnet) -> Self {
        Self { local_subnet }
    }

    pub fn allows(&self, peer: Option<IpAddr>) -> bool {
        match peer {
            Some(addr) => addr.to_canonical().is_loopback() || self.local_subnet.contains(addr),
            None => false,
        }
    }
}

/// Returns the trimmed statement if it passes the read-only filter.
pub fn validate(query: &str) -> Result<&str, SandboxError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(SandboxError::EmptyQuery);
    }

    let normalized = query.to_uppercase();
    if !normalized.starts_with("SELECT") {
        return Err(SandboxError::NotSelect);
    }
    if let Some(keyword) = FORBIDDEN_KEYWORDS
        .iter()
        .copied()
        .find(|keyword| normalized.contains(keyword))
    {
        return Err(SandboxError::ForbiddenKeyword(keyword));
    }

    Ok(query)
}

pub struct QuerySandbox<S> {
    store: S,
    policy: OriginPolicy,
}

impl<S: MeasurementStore> QuerySandbox<S> {
    pub fn new(store: S, policy: OriginPolicy) -> Self {
        Self { store, policy }
    }

    /// Runs `query` for the caller at `peer` and materializes the whole
    /// result set.
    pub fn execute(
        &mut self,
        query: &str,
        peer: Option<IpAddr>,
    ) -> Result<QueryResponse, SandboxError> {
        if !self.policy.allows(peer) {
            log::warn!("ad-hoc query refused for {peer:?}");
            return Err(SandboxError::AccessDenied);
        }

        let query = validate(query).map_err(|err| {
            log::warn!("ad-hoc query rejected: {err}");
            err
        })?;

        log::info!("ad-hoc query from {peer:?}: {query}");
        let rows = self.store.fetch_raw(query).map_err(|err| {
            log::error!("query execution error: {err}");
            err
        })?;

        let results: Vec<QueryRecord> = rows
            .into_iter()
            .map(|row| row.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            .collect();

        Ok(QueryResponse {
            count: results.len(),
            results,
        })
    }
}
