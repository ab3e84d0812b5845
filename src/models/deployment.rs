use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::api::null_as_empty;

const ACTIVE_STATUS: &str = "active";
const PRODUCTION_TRIGGER: &str = "production";

/// A Pages deployment as returned by the deployments listing.
///
/// Only the fields the retention rules look at are modelled; everything else
/// in the payload is ignored. `id` and `created_on` are required so a record
/// that lacks them fails to decode instead of reaching the retention policy.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Deployment {
    pub id: String,
    pub created_on: DateTime<Utc>,
    #[serde(default)]
    pub latest_stage: Option<Stage>,
    #[serde(default)]
    pub deployment_trigger: Option<DeploymentTrigger>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Stage {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DeploymentTrigger {
    #[serde(rename = "type", default)]
    pub trigger_type: Option<String>,
}

impl Deployment {
    pub fn is_active(&self) -> bool {
        self.latest_stage
            .as_ref()
            .and_then(|stage| stage.status.as_deref())
            .is_some_and(|status| status.eq_ignore_ascii_case(ACTIVE_STATUS))
    }

    pub fn is_production_trigger(&self) -> bool {
        self.deployment_trigger
            .as_ref()
            .and_then(|trigger| trigger.trigger_type.as_deref())
            .is_some_and(|kind| kind == PRODUCTION_TRIGGER)
    }

    pub fn has_alias(&self) -> bool {
        !self.aliases.is_empty()
    }
}
