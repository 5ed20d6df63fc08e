//! Client Directory Lookup
//!
//! Resolves a host to a registered SDC by trying an ordered table of
//! strategies: id, then ip, then name. A miss moves on to the next strategy;
//! only exhausting the table is "not found". Transport failures stop the
//! search immediately and stay distinguishable from a miss.

use powerflex_client::{ClientSelector, PowerFlexClientTrait, PowerFlexError, Sdc};
use thiserror::Error;
use tracing::debug;

/// Keys a host can be looked up by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupKeys<'a> {
    pub id: Option<&'a str>,
    pub ip: Option<&'a str>,
    pub name: Option<&'a str>,
}

#[derive(Debug, Error)]
pub enum LookupError {
    /// Every strategy missed
    #[error("no SDC matches {0}")]
    NotFound(String),

    /// The array could not be queried
    #[error("{0}")]
    Array(#[from] PowerFlexError),
}

impl LookupError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LookupError::NotFound(_))
    }
}

type Strategy = fn(&LookupKeys<'_>) -> Option<ClientSelector>;

/// Lookup strategies in precedence order
pub const STRATEGIES: [(&str, Strategy); 3] = [("id", by_id), ("ip", by_ip), ("name", by_name)];

fn by_id(keys: &LookupKeys<'_>) -> Option<ClientSelector> {
    keys.id.map(|id| ClientSelector::Id(id.to_string()))
}

fn by_ip(keys: &LookupKeys<'_>) -> Option<ClientSelector> {
    keys.ip.map(|ip| ClientSelector::Ip(ip.to_string()))
}

fn by_name(keys: &LookupKeys<'_>) -> Option<ClientSelector> {
    keys.name.map(|name| ClientSelector::Name(name.to_string()))
}

/// Selectors to try for `keys`, in precedence order
pub fn selectors(keys: &LookupKeys<'_>) -> Vec<ClientSelector> {
    STRATEGIES.iter().filter_map(|(_, strategy)| strategy(keys)).collect()
}

/// Find the SDC for `keys`; the first strategy that matches wins.
pub async fn find_client(array: &dyn PowerFlexClientTrait, keys: &LookupKeys<'_>) -> Result<Sdc, LookupError> {
    let candidates = selectors(keys);
    if candidates.is_empty() {
        return Err(LookupError::NotFound("an entry without id, ip or name".to_string()));
    }

    for selector in &candidates {
        match array.find_client(selector).await {
            Ok(sdc) => {
                debug!("Resolved {} to SDC {}", selector, sdc.id);
                return Ok(sdc);
            }
            Err(e) if e.is_not_found() => debug!("No SDC with {}", selector),
            Err(e) => return Err(LookupError::Array(e)),
        }
    }

    let tried: Vec<String> = candidates.iter().map(ToString::to_string).collect();
    Err(LookupError::NotFound(tried.join(", ")))
}
