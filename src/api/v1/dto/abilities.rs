/*
 * Responsibility
 * - Request/response DTOs for gate queries
 */
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::services::gate::{Resource, ResourceKind};

#[derive(Debug, Default, Deserialize)]
pub struct AbilityQuery {
    pub owner_id: Option<Uuid>,
    pub resource: Option<String>,
}

impl AbilityQuery {
    /// Target resource for ownership checks. The kind defaults to
    /// vehicle deadlines, the only ownership-scoped resource today.
    pub fn resource(&self) -> Result<Option<Resource>, AppError> {
        let kind = match self.resource.as_deref() {
            Some(raw) => Some(
                raw.parse::<ResourceKind>()
                    .map_err(|_| AppError::bad_request("INVALID_RESOURCE", "unknown resource"))?,
            ),
            None => None,
        };

        if kind.is_none() && self.owner_id.is_none() {
            return Ok(None);
        }

        Ok(Some(Resource {
            kind: kind.unwrap_or(ResourceKind::VehicleDeadline),
            owner_id: self.owner_id,
        }))
    }
}

#[derive(Debug, Serialize)]
pub struct AbilityResponse {
    pub action: String,
    pub allowed: bool,
}

#[derive(Debug, Serialize)]
pub struct AbilitiesResponse {
    pub abilities: BTreeMap<String, bool>,
}
