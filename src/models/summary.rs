use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum DeletionOutcome {
    Deleted,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionRecord {
    pub id: String,
    #[serde(flatten)]
    pub outcome: DeletionOutcome,
}

/// Why a deployment outside the retention window was kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionReason {
    Active,
    ProductionTrigger,
    Aliased,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtectedDeployment {
    pub id: String,
    pub reasons: Vec<ProtectionReason>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectReport {
    pub project: String,
    pub status: ProjectStatus,
    pub fetched: usize,
    pub kept: usize,
    pub deleted: usize,
    pub failed: usize,
    pub skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub protected: Vec<ProtectedDeployment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outcomes: Vec<DeletionRecord>,
}

impl ProjectReport {
    pub fn completed(
        project: &str,
        fetched: usize,
        kept: usize,
        protected: Vec<ProtectedDeployment>,
        outcomes: Vec<DeletionRecord>,
    ) -> Self {
        let mut report = Self {
            project: project.to_string(),
            status: ProjectStatus::Completed,
            fetched,
            kept,
            deleted: 0,
            failed: 0,
            skipped: 0,
            error: None,
            protected,
            outcomes: Vec::new(),
        };
        for record in &outcomes {
            match record.outcome {
                DeletionOutcome::Deleted => report.deleted += 1,
                DeletionOutcome::Skipped(_) => report.skipped += 1,
                DeletionOutcome::Failed(_) => report.failed += 1,
            }
        }
        report.outcomes = outcomes;
        report
    }

    pub fn failed(project: &str, error: String) -> Self {
        Self {
            project: project.to_string(),
            status: ProjectStatus::Failed,
            fetched: 0,
            kept: 0,
            deleted: 0,
            failed: 0,
            skipped: 0,
            error: Some(error),
            protected: Vec::new(),
            outcomes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    pub projects: usize,
    pub projects_failed: usize,
    pub kept: usize,
    pub deleted: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub projects: Vec<ProjectReport>,
    pub totals: RunTotals,
}

impl RunSummary {
    pub fn push(&mut self, report: ProjectReport) {
        self.totals.projects += 1;
        if report.status == ProjectStatus::Failed {
            self.totals.projects_failed += 1;
        }
        self.totals.kept += report.kept;
        self.totals.deleted += report.deleted;
        self.totals.failed += report.failed;
        self.totals.skipped += report.skipped;
        self.projects.push(report);
    }

    pub fn has_failed_projects(&self) -> bool {
        self.totals.projects_failed > 0
    }

    #[cfg(test)]
    pub fn project(&self, name: &str) -> Option<&ProjectReport> {
        self.projects.iter().find(|report| report.project == name)
    }
}

/// Answer to "does any project hold more deployments than the retention window".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupCheck {
    pub cleanup: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CleanupCheck {
    pub fn needed(project: &str) -> Self {
        Self {
            cleanup: true,
            project: Some(project.to_string()),
            reason: None,
        }
    }

    pub fn not_needed() -> Self {
        Self {
            cleanup: false,
            project: None,
            reason: None,
        }
    }

    pub fn unavailable(reason: String) -> Self {
        Self {
            cleanup: false,
            project: None,
            reason: Some(reason),
        }
    }
}
