// Startup reconciliation of configured detectors against the store
use crate::application::store::{StoreError, TelemetryStore};
use crate::domain::detector::{ChannelAddress, Detector, InvalidIdentity};
use thiserror::Error;

/// One entry of the configured detector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfiguredDetector {
    pub address: ChannelAddress,
    pub name: String,
}

/// Reconciliation failure. Fatal at startup: collection must not begin with
/// an unreconciled detector set.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("configured detector list is invalid: {0}")]
    Identity(#[from] InvalidIdentity),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Align the persisted detector table with the configured list: insert new
/// detectors, update renamed ones, never delete. The store applies the whole
/// pass atomically, so repeated invocation is idempotent.
pub async fn reconcile(
    store: &dyn TelemetryStore,
    configured: &[ConfiguredDetector],
) -> Result<(), RegistrationError> {
    let mut detectors = Vec::with_capacity(configured.len());
    for entry in configured {
        detectors.push(Detector::from_address(entry.address, entry.name.clone())?);
    }

    let summary = store.register_detectors(&detectors).await?;
    tracing::info!(
        configured = detectors.len(),
        inserted = summary.inserted,
        renamed = summary.renamed,
        "detector registry reconciled"
    );
    Ok(())
}
