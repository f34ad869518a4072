use crate::state::ManifestStatus;

/// Error-count thresholds driving the manifest lifecycle
///
/// Both thresholds count consecutive failed crawls, i.e. the stored
/// crawl-error counter after the failure has been recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    /// Failures after which an active manifest starts expiring
    pub expire_after: u32,

    /// Failures after which an expiring or pending manifest is disabled
    pub disable_after: u32,
}

impl LifecyclePolicy {
    pub fn new(expire_after: u32, disable_after: u32) -> Self {
        Self {
            expire_after,
            disable_after,
        }
    }

    /// Status after a crawl that fetched and validated successfully
    ///
    /// Disabled manifests are only reactivated by re-submission.
    pub fn on_success(&self, current: ManifestStatus) -> ManifestStatus {
        match current {
            ManifestStatus::Disabled => ManifestStatus::Disabled,
            ManifestStatus::Pending | ManifestStatus::Active | ManifestStatus::Expiring => {
                ManifestStatus::Active
            }
        }
    }

    /// Status after a failed crawl
    ///
    /// # Arguments
    ///
    /// * `current` - The status before this crawl
    /// * `errors` - The consecutive error count including this failure
    pub fn on_failure(&self, current: ManifestStatus, errors: u32) -> ManifestStatus {
        match current {
            ManifestStatus::Active if errors >= self.expire_after => ManifestStatus::Expiring,
            ManifestStatus::Active => ManifestStatus::Active,
            ManifestStatus::Expiring if errors >= self.disable_after => ManifestStatus::Disabled,
            ManifestStatus::Expiring => ManifestStatus::Expiring,
            ManifestStatus::Pending if errors >= self.disable_after => ManifestStatus::Disabled,
            ManifestStatus::Pending => ManifestStatus::Pending,
            ManifestStatus::Disabled => ManifestStatus::Disabled,
        }
    }
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self::new(3, 10)
    }
}
