//! Record reconciliation
//!
//! Brings one (zone, record name, address family) tuple in line with the
//! desired address:
//!
//! 1. Look up at most one existing record with the exact name and type
//! 2. Existing record with the desired content → nothing to do
//! 3. Existing record with other content → overwrite content, keeping
//!    TTL, comment and proxied
//! 4. No record → create one with name, type and content only
//!
//! The content check does not consult the cycle's change set, so a record
//! that drifted away from the observed address is corrected whenever its
//! tuple is reconciled.

use std::net::IpAddr;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::traits::{AddressFamily, DnsProvider, RecordBody, RecordQuery, UpdateResult, Zone};

/// Reconcile one record tuple and log the outcome
///
/// Failures are terminal to this tuple only: they are logged here and
/// returned for reporting, never retried.
pub async fn reconcile_record(
    provider: &dyn DnsProvider,
    zone: &Zone,
    record_name: &str,
    family: AddressFamily,
    desired: IpAddr,
) -> Result<UpdateResult> {
    let record_type = family.record_type();

    match apply(provider, zone, record_name, family, desired).await {
        Ok(result) => {
            match &result {
                UpdateResult::Unchanged => info!(
                    "unchanged {} record: {} ({})",
                    record_type, record_name, desired
                ),
                UpdateResult::Updated { previous_content } => info!(
                    "updated {} record: {} ({} -> {})",
                    record_type, record_name, previous_content, desired
                ),
                UpdateResult::Created => info!(
                    "created {} record: {} ({})",
                    record_type, record_name, desired
                ),
            }
            Ok(result)
        }
        Err(e) => {
            warn!(
                "failed to reconcile {} record: {} in zone {}: {}",
                record_type, record_name, zone.name, e
            );
            Err(e)
        }
    }
}

async fn apply(
    provider: &dyn DnsProvider,
    zone: &Zone,
    record_name: &str,
    family: AddressFamily,
    desired: IpAddr,
) -> Result<UpdateResult> {
    let record_type = family.record_type();

    if !family.matches(desired) {
        return Err(Error::invalid_input(format!(
            "{} is not an {} address",
            desired, family
        )));
    }

    let existing = provider
        .list_records(&zone.id, &RecordQuery::exact(record_name, record_type))
        .await?;

    match existing.into_iter().next() {
        Some(record) if record.has_content(desired) => Ok(UpdateResult::Unchanged),
        Some(record) => {
            let body = RecordBody::replace_content(&record, desired);
            provider
                .update_record(&zone.id, &record.id, &body)
                .await?;

            Ok(UpdateResult::Updated {
                previous_content: record.content,
            })
        }
        None => {
            let body = RecordBody::create(family, record_name, desired);
            provider
                .create_record(&zone.id, &body)
                .await?;

            Ok(UpdateResult::Created)
        }
    }
}
