//! Dashboard counters derived from the queue cache.
//!
//! Never stored: [`DerivedStats::compute`] runs on every read.

use std::collections::HashSet;

use realty_core::QueueId;
use serde::Serialize;

use crate::queue::QueueSnapshot;

/// Payload flags that mark a featured listing.
const FEATURED_FLAGS: [&str; 2] = ["featured", "isFeatured"];

/// Dashboard counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedStats {
    pub total_properties: usize,
    pub pending_properties: usize,
    pub featured_properties: usize,
    pub total_agents: usize,
    /// Distinct pending agents across the individual and company queues.
    pub pending_agents: usize,
    pub total_companies: usize,
    pub pending_companies: usize,
    pub total_projects: usize,
    pub pending_projects: usize,
}

impl DerivedStats {
    #[must_use]
    pub fn compute(snapshot: &QueueSnapshot) -> Self {
        let queue = |id: QueueId| snapshot.get(&id).map_or(&[][..], Vec::as_slice);

        let properties = queue(QueueId::Properties);
        let pending_agent_ids: HashSet<_> = queue(QueueId::PendingAgents)
            .iter()
            .chain(queue(QueueId::PendingCompanyAgents))
            .filter(|agent| agent.verification_status.is_pending())
            .map(|agent| agent.id)
            .collect();

        Self {
            total_properties: properties.len(),
            pending_properties: properties
                .iter()
                .filter(|p| p.verification_status.is_pending())
                .count(),
            featured_properties: properties.iter().filter(|p| p.flag(&FEATURED_FLAGS)).count(),
            total_agents: queue(QueueId::AllAgents).len(),
            pending_agents: pending_agent_ids.len(),
            total_companies: queue(QueueId::Companies).len(),
            pending_companies: queue(QueueId::PendingCompanies).len(),
            total_projects: queue(QueueId::Projects).len(),
            pending_projects: queue(QueueId::PendingProjects).len(),
        }
    }
}
