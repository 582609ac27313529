//! Regional compliance gate

use crate::runtime::traits::ComplianceGate;
use crate::services::ServiceError;
use crate::state_machine::CallMetadata;
use async_trait::async_trait;

/// Allows calls to regions on a fixed list.
///
/// Without region data for the callee, or with an empty list, every call is
/// allowed.
#[derive(Debug, Clone)]
pub struct RegionAllowList {
    regions: Vec<String>,
}

impl RegionAllowList {
    pub fn new(regions: impl IntoIterator<Item = String>) -> Self {
        Self {
            regions: regions.into_iter().collect(),
        }
    }
}

#[async_trait]
impl ComplianceGate for RegionAllowList {
    async fn is_region_allowed(&self, metadata: &CallMetadata) -> Result<bool, ServiceError> {
        let Some(region) = metadata.region.as_deref() else {
            return Ok(true);
        };
        if self.regions.is_empty() {
            return Ok(true);
        }
        let allowed = self.regions.iter().any(|r| r.eq_ignore_ascii_case(region));
        if !allowed {
            tracing::info!(region, "Region not on compliance allow-list");
        }
        Ok(allowed)
    }
}
