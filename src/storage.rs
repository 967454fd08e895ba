use crate::config::Config;
use crate::model::{Milestone, Planner, Project};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const STORE_DIR: &str = ".waypoint";
pub const PROJECTS_FILE: &str = "projects.json";
pub const MILESTONES_FILE: &str = "milestones.json";
pub const HOME_ENV: &str = "WAYPOINT_HOME";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreScope {
    Project,
    Global,
}

#[derive(Debug, Clone)]
pub struct StoreLocation {
    pub dir: PathBuf,
    pub scope: StoreScope,
}

impl StoreLocation {
    pub fn projects_path(&self) -> PathBuf {
        self.dir.join(PROJECTS_FILE)
    }

    pub fn milestones_path(&self) -> PathBuf {
        self.dir.join(MILESTONES_FILE)
    }

    pub fn scope_label(&self) -> &'static str {
        match self.scope {
            StoreScope::Project => "project",
            StoreScope::Global => "global",
        }
    }
}

pub fn init_project_store(cwd: &Path) -> Result<StoreLocation> {
    let dir = cwd.join(STORE_DIR);
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {:?}", dir))?;
    let location = StoreLocation {
        dir,
        scope: StoreScope::Project,
    };
    if !location.projects_path().exists() && !location.milestones_path().exists() {
        save_planner(&location, &Planner::default())?;
    }
    if !location.dir.join(crate::config::CONFIG_FILE).exists() {
        Config::default().save(&location.dir)?;
    }
    Ok(location)
}

pub fn locate_store(start: &Path) -> Result<StoreLocation> {
    if let Some(dir) = find_project_store(start) {
        return Ok(StoreLocation {
            dir,
            scope: StoreScope::Project,
        });
    }
    Ok(StoreLocation {
        dir: global_store_dir()?,
        scope: StoreScope::Global,
    })
}

/// Rehydrates both records. Each one falls back to empty on its own when
/// missing or unparseable.
pub fn load_planner(location: &StoreLocation) -> Planner {
    let projects: Vec<Project> = load_record(&location.projects_path());
    let milestones: Vec<Milestone> = load_record(&location.milestones_path());
    log::debug!(
        "loaded {} project(s) and {} milestone(s) from {:?}",
        projects.len(),
        milestones.len(),
        location.dir
    );
    Planner::new(projects, milestones)
}

/// Rewrites both records in full.
pub fn save_planner(location: &StoreLocation, planner: &Planner) -> Result<()> {
    fs::create_dir_all(&location.dir).with_context(|| format!("creating {:?}", location.dir))?;
    save_record(&location.projects_path(), &planner.projects)?;
    save_record(&location.milestones_path(), &planner.milestones)?;
    Ok(())
}

fn load_record<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    if !path.exists() {
        return Vec::new();
    }
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) => {
            log::warn!("could not read {:?}, starting empty: {}", path, err);
            return Vec::new();
        }
    };
    match serde_json::from_str(&data) {
        Ok(records) => records,
        Err(err) => {
            log::warn!("discarding unparseable {:?}: {}", path, err);
            Vec::new()
        }
    }
}

fn save_record<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let serialized = serde_json::to_string_pretty(records)
        .with_context(|| format!("serializing {:?}", path))?;
    fs::write(path, serialized).with_context(|| format!("writing {:?}", path))?;
    Ok(())
}

fn find_project_store(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(STORE_DIR);
        if candidate.is_dir() {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}

fn global_store_dir() -> Result<PathBuf> {
    if let Some(home) = env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    let dirs = ProjectDirs::from("", "", "waypoint").context("locating data directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MilestoneDraft;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn location(dir: &TempDir) -> StoreLocation {
        StoreLocation {
            dir: dir.path().join(STORE_DIR),
            scope: StoreScope::Project,
        }
    }

    #[test]
    fn missing_records_load_empty() {
        let dir = TempDir::new().unwrap();
        let planner = load_planner(&location(&dir));
        assert_eq!(planner, Planner::default());
    }

    #[test]
    fn malformed_record_is_discarded_alone() {
        let dir = TempDir::new().unwrap();
        let loc = location(&dir);
        let mut planner = Planner::default();
        let pid = planner.add_project("Launch", "#22c55e").unwrap();
        planner
            .add_milestone(MilestoneDraft::new(
                "Kickoff",
                NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                pid,
            ))
            .unwrap();
        save_planner(&loc, &planner).unwrap();

        // One good entry next to a broken one still loses the whole record.
        fs::write(
            loc.milestones_path(),
            r#"[{"id":"a","title":"ok","date":"2025-03-01","projectId":"x"},{"id":1}]"#,
        )
        .unwrap();
        let loaded = load_planner(&loc);
        assert_eq!(loaded.projects, planner.projects);
        assert!(loaded.milestones.is_empty());
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let loc = location(&dir);
        let mut planner = Planner::default();
        let pid = planner.add_project("Launch", "#0ea5e9").unwrap();
        let mut draft = MilestoneDraft::new(
            "Beta",
            NaiveDate::from_ymd_opt(2025, 3, 5).unwrap(),
            pid,
        );
        draft.end = NaiveDate::from_ymd_opt(2025, 3, 10);
        draft.labels = vec!["Risk Item".into()];
        planner.add_milestone(draft).unwrap();
        save_planner(&loc, &planner).unwrap();

        assert_eq!(load_planner(&loc), planner);
        let raw = fs::read_to_string(loc.milestones_path()).unwrap();
        assert!(raw.contains("\"endDate\": \"2025-03-10\""));
        assert!(raw.contains("\"projectId\""));
    }

    #[test]
    fn init_creates_store_and_is_found_from_subdirs() {
        let dir = TempDir::new().unwrap();
        let created = init_project_store(dir.path()).unwrap();
        assert!(created.projects_path().exists());
        assert!(created.milestones_path().exists());
        assert!(created.dir.join(crate::config::CONFIG_FILE).exists());

        let nested = dir.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();
        let found = locate_store(&nested).unwrap();
        assert_eq!(found.scope, StoreScope::Project);
        assert_eq!(found.dir, created.dir);
    }

    #[test]
    fn init_keeps_existing_records() {
        let dir = TempDir::new().unwrap();
        let loc = init_project_store(dir.path()).unwrap();
        let mut planner = Planner::default();
        planner.add_project("Keep", "#22c55e").unwrap();
        save_planner(&loc, &planner).unwrap();
        init_project_store(dir.path()).unwrap();
        assert_eq!(load_planner(&loc).projects.len(), 1);
    }
}
