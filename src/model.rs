use crate::labels;
use crate::range::{self, DateRange};
use chrono::NaiveDate;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

pub type ProjectId = String;
pub type MilestoneId = String;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub id: MilestoneId,
    pub title: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub project_id: ProjectId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

/// User input for creating or editing a milestone, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneDraft {
    pub title: String,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
    pub notes: Option<String>,
    pub project_id: ProjectId,
    pub labels: Vec<String>,
}

/// One entry of the project selector; `value` is `None` for "all projects".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectOption {
    pub value: Option<ProjectId>,
    pub label: String,
    pub color: Option<String>,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PlannerError {
    #[error("milestone title is required")]
    EmptyTitle,
    #[error("project name is required")]
    EmptyProjectName,
    #[error("project colour is required")]
    EmptyColor,
    #[error("project not found: {0}")]
    ProjectNotFound(String),
    #[error("milestone not found: {0}")]
    MilestoneNotFound(String),
    #[error("milestone would end past the last representable date when starting {0}")]
    DateOutOfRange(NaiveDate),
}

/// In-memory projects and milestones for one session.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Planner {
    pub projects: Vec<Project>,
    pub milestones: Vec<Milestone>,
}

impl Milestone {
    pub fn range(&self) -> DateRange {
        range::normalize(self.date, self.end_date)
    }

    pub fn effective_end(&self) -> NaiveDate {
        self.range().end
    }

    pub fn duration_days(&self) -> i64 {
        self.range().days
    }

    /// Same milestone moved to begin on `new_start`, duration unchanged.
    pub fn rescheduled(&self, new_start: NaiveDate) -> Option<Milestone> {
        let moved = self.range().shifted_to(new_start)?;
        Some(Milestone {
            date: moved.start,
            end_date: self.end_date.map(|_| moved.end),
            ..self.clone()
        })
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

impl MilestoneDraft {
    pub fn new(title: impl Into<String>, start: NaiveDate, project_id: impl Into<String>) -> Self {
        MilestoneDraft {
            title: title.into(),
            start,
            end: None,
            notes: None,
            project_id: project_id.into(),
            labels: Vec::new(),
        }
    }

    pub fn from_milestone(milestone: &Milestone) -> Self {
        MilestoneDraft {
            title: milestone.title.clone(),
            start: milestone.date,
            end: milestone.end_date,
            notes: milestone.notes.clone(),
            project_id: milestone.project_id.clone(),
            labels: milestone.labels.clone(),
        }
    }

    fn into_milestone(self, id: MilestoneId) -> Milestone {
        let title = self.title.trim().to_string();
        let end = self.end.map(|_| range::normalize(self.start, self.end).end);
        let notes = self
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        Milestone {
            id,
            title,
            date: self.start,
            end_date: end,
            notes,
            project_id: self.project_id,
            labels: labels::normalize(&self.labels),
        }
    }
}

impl Planner {
    pub fn new(projects: Vec<Project>, milestones: Vec<Milestone>) -> Self {
        Planner {
            projects,
            milestones,
        }
    }

    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    /// Looks a project up by id, then by case-insensitive name.
    pub fn find_project(&self, key: &str) -> Option<&Project> {
        self.project(key).or_else(|| {
            let key = key.trim().to_lowercase();
            self.projects.iter().find(|p| p.name.to_lowercase() == key)
        })
    }

    pub fn milestone(&self, id: &str) -> Option<&Milestone> {
        self.milestones.iter().find(|m| m.id == id)
    }

    pub fn add_project(
        &mut self,
        name: &str,
        color: &str,
    ) -> Result<ProjectId, PlannerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PlannerError::EmptyProjectName);
        }
        let color = color.trim().to_string();
        if color.is_empty() {
            return Err(PlannerError::EmptyColor);
        }
        let id = self.fresh_id();
        self.projects.push(Project {
            id: id.clone(),
            name: name.to_string(),
            color,
        });
        log::info!("created project {} ({})", id, name);
        Ok(id)
    }

    pub fn update_project(
        &mut self,
        id: &str,
        name: Option<&str>,
        color: Option<&str>,
    ) -> Result<(), PlannerError> {
        let name = match name.map(str::trim) {
            Some("") => return Err(PlannerError::EmptyProjectName),
            other => other,
        };
        let project = self
            .projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| PlannerError::ProjectNotFound(id.to_string()))?;
        if let Some(name) = name {
            project.name = name.to_string();
        }
        if let Some(color) = color.map(str::trim).filter(|c| !c.is_empty()) {
            project.color = color.to_string();
        }
        Ok(())
    }

    /// Removes a project and every milestone that belongs to it.
    /// Returns how many milestones went with it.
    pub fn delete_project(&mut self, id: &str) -> Result<usize, PlannerError> {
        let idx = self
            .projects
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| PlannerError::ProjectNotFound(id.to_string()))?;
        self.projects.remove(idx);
        let before = self.milestones.len();
        self.milestones.retain(|m| m.project_id != id);
        let removed = before - self.milestones.len();
        log::info!("deleted project {} and {} milestone(s)", id, removed);
        Ok(removed)
    }

    pub fn add_milestone(&mut self, draft: MilestoneDraft) -> Result<MilestoneId, PlannerError> {
        self.validate(&draft)?;
        let id = self.fresh_id();
        let milestone = draft.into_milestone(id.clone());
        log::debug!("adding milestone {} on {}", id, milestone.date);
        self.milestones.push(milestone);
        Ok(id)
    }

    pub fn update_milestone(&mut self, id: &str, draft: MilestoneDraft) -> Result<(), PlannerError> {
        self.validate(&draft)?;
        let slot = self
            .milestones
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| PlannerError::MilestoneNotFound(id.to_string()))?;
        *slot = draft.into_milestone(id.to_string());
        Ok(())
    }

    pub fn delete_milestone(&mut self, id: &str) -> Result<Milestone, PlannerError> {
        let idx = self
            .milestones
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| PlannerError::MilestoneNotFound(id.to_string()))?;
        Ok(self.milestones.remove(idx))
    }

    pub fn reschedule(&mut self, id: &str, new_start: NaiveDate) -> Result<(), PlannerError> {
        let slot = self
            .milestones
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| PlannerError::MilestoneNotFound(id.to_string()))?;
        *slot = slot
            .rescheduled(new_start)
            .ok_or(PlannerError::DateOutOfRange(new_start))?;
        log::debug!("rescheduled {} to {}", id, new_start);
        Ok(())
    }

    pub fn labels(&self) -> Vec<String> {
        labels::vocabulary(&self.milestones)
    }

    /// Selector entries: "all projects" followed by each project in order.
    pub fn project_options(&self) -> Vec<ProjectOption> {
        let mut options = vec![ProjectOption {
            value: None,
            label: "All projects".to_string(),
            color: None,
        }];
        options.extend(self.projects.iter().map(|p| ProjectOption {
            value: Some(p.id.clone()),
            label: p.name.clone(),
            color: Some(p.color.clone()),
        }));
        options
    }

    pub fn milestones_sorted(&self) -> Vec<&Milestone> {
        let mut list: Vec<&Milestone> = self.milestones.iter().collect();
        list.sort_by_key(|m| (m.date, m.effective_end(), m.title.to_lowercase()));
        list
    }

    fn validate(&self, draft: &MilestoneDraft) -> Result<(), PlannerError> {
        if draft.title.trim().is_empty() {
            return Err(PlannerError::EmptyTitle);
        }
        if self.project(&draft.project_id).is_none() {
            return Err(PlannerError::ProjectNotFound(draft.project_id.clone()));
        }
        Ok(())
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = generate_id();
            let taken = self.projects.iter().any(|p| p.id == id)
                || self.milestones.iter().any(|m| m.id == id);
            if !taken {
                return id;
            }
        }
    }
}

fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect()
}
