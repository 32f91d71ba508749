use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle state shared by networks and storage pools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResourceState {
    Active,
    Inactive,
}

impl ResourceState {
    pub fn is_active(&self) -> bool {
        matches!(self, ResourceState::Active)
    }
}
