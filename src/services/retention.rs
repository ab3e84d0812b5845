//! Decides which deployments of a project may be deleted.
//!
//! A deployment is kept when it is among the `keep_count` newest, or when it
//! is live in any way: its latest stage is active, it came from the
//! production trigger, or it carries an alias. Everything else is deleted.

use std::collections::HashSet;

use crate::models::{Deployment, ProtectedDeployment, ProtectionReason};

/// Partition of a project's deployments, both lists newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionPlan {
    pub keep: Vec<String>,
    pub delete: Vec<String>,
    pub protected: Vec<ProtectedDeployment>,
}

impl RetentionPlan {
    pub fn is_noop(&self) -> bool {
        self.delete.is_empty()
    }
}

pub fn protection_reasons(deployment: &Deployment) -> Vec<ProtectionReason> {
    let mut reasons = Vec::new();
    if deployment.is_active() {
        reasons.push(ProtectionReason::Active);
    }
    if deployment.is_production_trigger() {
        reasons.push(ProtectionReason::ProductionTrigger);
    }
    if deployment.has_alias() {
        reasons.push(ProtectionReason::Aliased);
    }
    reasons
}

/// Classify `records` against a window of `keep_count` newest deployments.
///
/// Ordering is `created_on` descending with ties broken by id, so the result
/// does not depend on the order the records were fetched in. A repeated id is
/// classified once, by its first occurrence in that order.
pub fn classify(records: &[Deployment], keep_count: usize) -> RetentionPlan {
    let mut ordered: Vec<&Deployment> = records.iter().collect();
    ordered.sort_by(|a, b| {
        b.created_on
            .cmp(&a.created_on)
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut seen = HashSet::new();
    ordered.retain(|&deployment| seen.insert(deployment.id.as_str()));

    let mut plan = RetentionPlan::default();

    if ordered.len() <= keep_count {
        plan.keep = ordered.iter().map(|d| d.id.clone()).collect();
        return plan;
    }

    for (index, deployment) in ordered.iter().enumerate() {
        if index < keep_count {
            plan.keep.push(deployment.id.clone());
            continue;
        }

        let reasons = protection_reasons(deployment);
        if reasons.is_empty() {
            plan.delete.push(deployment.id.clone());
        } else {
            plan.keep.push(deployment.id.clone());
            plan.protected.push(ProtectedDeployment {
                id: deployment.id.clone(),
                reasons,
            });
        }
    }

    plan
}
