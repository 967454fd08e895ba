use crate::model::{Milestone, ProjectId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProjectFilter {
    #[default]
    All,
    Only(ProjectId),
}

/// Transient display filter. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub project: ProjectFilter,
    /// Required labels; a milestone must carry all of them.
    pub labels: Vec<String>,
}

impl ProjectFilter {
    pub fn from_option(id: Option<ProjectId>) -> Self {
        match id {
            Some(id) => ProjectFilter::Only(id),
            None => ProjectFilter::All,
        }
    }

    pub fn selected(&self) -> Option<&str> {
        match self {
            ProjectFilter::All => None,
            ProjectFilter::Only(id) => Some(id.as_str()),
        }
    }
}

impl Filter {
    pub fn matches(&self, milestone: &Milestone) -> bool {
        let project_ok = match &self.project {
            ProjectFilter::All => true,
            ProjectFilter::Only(id) => &milestone.project_id == id,
        };
        project_ok && self.labels.iter().all(|l| milestone.has_label(l))
    }

    pub fn is_active(&self) -> bool {
        self.project != ProjectFilter::All || !self.labels.is_empty()
    }

    /// Adds the label if absent, removes it otherwise.
    pub fn toggle_label(&mut self, label: &str) {
        if let Some(idx) = self.labels.iter().position(|l| l == label) {
            self.labels.remove(idx);
        } else {
            self.labels.push(label.to_string());
        }
    }

    /// Drops selections that no longer exist, e.g. after a cascade delete.
    pub fn retain_known(&mut self, project_exists: impl Fn(&str) -> bool, vocabulary: &[String]) {
        if let ProjectFilter::Only(id) = &self.project {
            if !project_exists(id) {
                self.project = ProjectFilter::All;
            }
        }
        self.labels.retain(|l| vocabulary.contains(l));
    }
}

pub fn apply<'a, I>(milestones: I, filter: &Filter) -> Vec<&'a Milestone>
where
    I: IntoIterator<Item = &'a Milestone>,
{
    milestones.into_iter().filter(|m| filter.matches(m)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn milestone(id: &str, project: &str, labels: &[&str]) -> Milestone {
        Milestone {
            id: id.into(),
            title: id.to_uppercase(),
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end_date: None,
            notes: None,
            project_id: project.into(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    fn sample() -> Vec<Milestone> {
        vec![
            milestone("a", "p1", &["risk", "ui"]),
            milestone("b", "p2", &["risk"]),
            milestone("c", "p1", &[]),
            milestone("d", "p1", &["ui"]),
        ]
    }

    fn ids(list: &[&Milestone]) -> Vec<String> {
        list.iter().map(|m| m.id.clone()).collect()
    }

    #[test]
    fn empty_filter_passes_everything_in_order() {
        let ms = sample();
        let out = apply(&ms, &Filter::default());
        assert_eq!(ids(&out), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn project_filter_is_exact() {
        let ms = sample();
        let filter = Filter {
            project: ProjectFilter::Only("p1".into()),
            labels: vec![],
        };
        assert_eq!(ids(&apply(&ms, &filter)), vec!["a", "c", "d"]);
    }

    #[test]
    fn labels_use_and_semantics() {
        let ms = sample();
        let filter = Filter {
            project: ProjectFilter::All,
            labels: vec!["risk".into(), "ui".into()],
        };
        assert_eq!(ids(&apply(&ms, &filter)), vec!["a"]);
    }

    #[test]
    fn result_is_exactly_the_matching_subset() {
        let ms = sample();
        let filter = Filter {
            project: ProjectFilter::Only("p1".into()),
            labels: vec!["ui".into()],
        };
        let out = apply(&ms, &filter);
        assert!(out.len() <= ms.len());
        assert!(out.iter().all(|m| filter.matches(m)));
        let expected = ms.iter().filter(|m| filter.matches(m)).count();
        assert_eq!(out.len(), expected);
    }

    #[test]
    fn toggle_and_retain() {
        let mut filter = Filter::default();
        filter.toggle_label("risk");
        filter.toggle_label("ui");
        filter.toggle_label("risk");
        assert_eq!(filter.labels, vec!["ui".to_string()]);
        assert!(filter.is_active());

        filter.project = ProjectFilter::Only("gone".into());
        filter.retain_known(|id| id == "p1", &["risk".to_string()]);
        assert_eq!(filter, Filter::default());
        assert!(!filter.is_active());
    }
}
