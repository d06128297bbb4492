//! Change detection
//!
//! Compares freshly resolved addresses with the observed state and produces
//! the change set for the cycle together with the replacement state.

use std::net::IpAddr;

use crate::state::{IpChangeSet, ObservedState};

/// Compare resolved addresses against `observed`
///
/// `resolved_v6` is `None` when IPv6 is not tracked. When IPv6 resolution
/// failed the caller passes the previous observed value, which makes the
/// family compare as unchanged.
pub fn detect(
    resolved_v4: IpAddr,
    resolved_v6: Option<IpAddr>,
    observed: &ObservedState,
) -> (IpChangeSet, ObservedState) {
    let changes = IpChangeSet {
        ipv4: observed.ipv4 != Some(resolved_v4),
        ipv6: observed.ipv6 != resolved_v6,
    };

    (changes, ObservedState::new(Some(resolved_v4), resolved_v6))
}
