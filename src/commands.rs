use crate::calendar::{self, Month};
use crate::cli::{FilterArgs, ViewArgs};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::filter::{self, Filter, ProjectFilter};
use crate::labels;
use crate::logging;
use crate::model::{Milestone, MilestoneDraft, Planner, Project};
use crate::storage::{init_project_store, load_planner, locate_store, save_planner, StoreLocation};
use crate::timeline;
use crate::ui;
use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, Weekday};
use std::env;

const TIMELINE_WIDTH: u16 = 62;

/// Everything a command needs: the store, its config and the loaded state.
pub struct Session {
    pub planner: Planner,
    pub location: StoreLocation,
    pub config: Config,
}

impl Session {
    pub(crate) fn persist(&self) -> Result<()> {
        save_planner(&self.location, &self.planner).map_err(|err| {
            log::warn!("persisting to {:?} failed: {:#}", self.location.dir, err);
            err
        })
    }

    fn resolve_project(&self, key: &str) -> Result<Project> {
        self.planner
            .find_project(key)
            .cloned()
            .ok_or_else(|| anyhow!("project not found: {}", key))
    }

    fn filter_from(&self, args: &FilterArgs) -> Result<Filter> {
        let project = match &args.project {
            Some(key) => ProjectFilter::Only(self.resolve_project(key)?.id),
            None => ProjectFilter::All,
        };
        Ok(Filter {
            project,
            labels: labels::normalize(&args.labels),
        })
    }
}

pub fn init() -> Result<()> {
    let cwd = env::current_dir()?;
    let location = init_project_store(&cwd)?;
    println!("Initialized milestone store at {}", location.dir.display());
    Ok(())
}

pub fn project_add(name: String, color: Option<String>) -> Result<()> {
    let mut session = load_session()?;
    let color = color
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| {
            session
                .config
                .color_for_new_project(session.planner.projects.len())
        });
    let id = session.planner.add_project(&name, &color)?;
    session.persist()?;
    println!("Added project {} ({})", id, name.trim());
    Ok(())
}

pub fn project_list() -> Result<()> {
    let session = load_session()?;
    println!(
        "Store: {} ({})",
        session.location.dir.display(),
        session.location.scope_label()
    );
    if session.planner.projects.is_empty() {
        println!("  (no projects)");
    }
    for project in &session.planner.projects {
        let count = session
            .planner
            .milestones
            .iter()
            .filter(|m| m.project_id == project.id)
            .count();
        println!(
            "  - {}: {} {} ({} milestone{})",
            project.id,
            project.name,
            project.color,
            count,
            if count == 1 { "" } else { "s" }
        );
    }
    Ok(())
}

pub fn project_edit(key: String, name: Option<String>, color: Option<String>) -> Result<()> {
    let mut session = load_session()?;
    let project = session.resolve_project(&key)?;
    session
        .planner
        .update_project(&project.id, name.as_deref(), color.as_deref())
        .with_context(|| format!("editing project {}", project.id))?;
    session.persist()?;
    println!("Updated project {}", project.id);
    Ok(())
}

pub fn project_delete(key: String) -> Result<()> {
    let mut session = load_session()?;
    let project = session.resolve_project(&key)?;
    let removed = session.planner.delete_project(&project.id)?;
    session.persist()?;
    println!(
        "Deleted project {} ({}) and {} milestone(s)",
        project.id, project.name, removed
    );
    Ok(())
}

pub fn add(
    title: String,
    project: String,
    start: String,
    end: Option<String>,
    notes: Option<String>,
    labels: Vec<String>,
) -> Result<()> {
    let mut session = load_session()?;
    let project = session.resolve_project(&project)?;
    let mut draft = MilestoneDraft::new(title, parse_date(&start)?, project.id.clone());
    draft.end = end.as_deref().map(parse_date).transpose()?;
    draft.notes = notes;
    draft.labels = labels;
    let id = session
        .planner
        .add_milestone(draft)
        .with_context(|| format!("adding milestone to {}", project.name))?;
    session.persist()?;
    if let Some(m) = session.planner.milestone(&id) {
        println!(
            "Added milestone {} to {} ({} day{})",
            id,
            project.name,
            m.duration_days(),
            if m.duration_days() == 1 { "" } else { "s" }
        );
    }
    Ok(())
}

pub fn edit(
    milestone_id: String,
    title: Option<String>,
    project: Option<String>,
    start: Option<String>,
    end: Option<String>,
    clear_end: bool,
    notes: Option<String>,
    clear_notes: bool,
    labels: Vec<String>,
    clear_labels: bool,
) -> Result<()> {
    let mut session = load_session()?;
    let current = session
        .planner
        .milestone(&milestone_id)
        .ok_or_else(|| anyhow!("milestone {} not found", milestone_id))?;
    let mut draft = MilestoneDraft::from_milestone(current);
    if let Some(t) = title {
        draft.title = t;
    }
    if let Some(key) = project {
        draft.project_id = session.resolve_project(&key)?.id;
    }
    if let Some(s) = start {
        draft.start = parse_date(&s)?;
    }
    if clear_end {
        draft.end = None;
    }
    if let Some(e) = end {
        draft.end = Some(parse_date(&e)?);
    }
    if clear_notes {
        draft.notes = None;
    }
    if let Some(n) = notes {
        draft.notes = Some(n);
    }
    if clear_labels {
        draft.labels.clear();
    }
    if !labels.is_empty() {
        draft.labels = labels;
    }
    session
        .planner
        .update_milestone(&milestone_id, draft)
        .with_context(|| format!("editing milestone {}", milestone_id))?;
    session.persist()?;
    println!("Updated milestone {}", milestone_id);
    Ok(())
}

pub fn delete(milestone_id: String) -> Result<()> {
    let mut session = load_session()?;
    let removed = session.planner.delete_milestone(&milestone_id)?;
    session.persist()?;
    println!("Deleted milestone {} ({})", removed.id, removed.title);
    Ok(())
}

pub fn move_milestone(milestone_id: String, start: String) -> Result<()> {
    let mut session = load_session()?;
    let new_start = parse_date(&start)?;
    session
        .planner
        .reschedule(&milestone_id, new_start)
        .with_context(|| format!("moving milestone {}", milestone_id))?;
    session.persist()?;
    if let Some(m) = session.planner.milestone(&milestone_id) {
        println!(
            "Moved milestone {} to {}..{}",
            milestone_id,
            m.date,
            m.effective_end()
        );
    }
    Ok(())
}

pub fn list(args: FilterArgs) -> Result<()> {
    let session = load_session()?;
    let filter = session.filter_from(&args)?;
    let sorted = session.planner.milestones_sorted();
    let shown = filter::apply(sorted, &filter);
    if shown.is_empty() {
        println!("(no milestones)");
    }
    for m in shown {
        print_milestone(&session.planner, m);
    }
    Ok(())
}

pub fn show_calendar(args: ViewArgs) -> Result<()> {
    let session = load_session()?;
    let filter = session.filter_from(&args.filter)?;
    let clock = SystemClock;
    let month = resolve_month(args.month.as_deref(), &clock)?;
    let week_start = resolve_week_start(args.week_start.as_deref(), &session.config)?;
    let shown = filter::apply(&session.planner.milestones, &filter);
    let grid = calendar::project(month, week_start, shown, &clock);

    println!("{}", month_title(grid.month));
    let headings = calendar::weekday_headings(grid.week_start)
        .iter()
        .map(|h| format!("{:^7}", h))
        .collect::<String>();
    println!("{}", headings.trim_end());
    for week in grid.weeks() {
        let row = week.iter().map(day_cell).collect::<String>();
        println!("{}", row.trim_end());
    }
    println!();
    for day in grid.days.iter().filter(|d| !d.milestones.is_empty()) {
        let titles = day
            .milestones
            .iter()
            .map(|m| m.title.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        println!("{}  {}", day.date.format("%Y-%m-%d"), titles);
    }
    Ok(())
}

pub fn show_timeline(args: ViewArgs) -> Result<()> {
    let session = load_session()?;
    let filter = session.filter_from(&args.filter)?;
    let month = resolve_month(args.month.as_deref(), &SystemClock)?;
    let shown = filter::apply(&session.planner.milestones, &filter);
    let projects: Vec<Project> = match filter.project.selected() {
        Some(id) => session
            .planner
            .projects
            .iter()
            .filter(|p| p.id == id)
            .cloned()
            .collect(),
        None => session.planner.projects.clone(),
    };
    let rows = timeline::project(month, &projects, shown);
    let min_width = session.config.timeline.min_bar_width;

    println!("{}", month_title(month));
    for row in rows {
        println!("{} [{}]", row.project.name, row.project.id);
        if row.bars.is_empty() {
            println!("  (nothing this month)");
        }
        for bar in row.bars {
            let (first, len) = bar
                .geometry(month.days(), min_width)
                .columns(TIMELINE_WIDTH);
            let mut track = vec!['.'; TIMELINE_WIDTH as usize];
            for cell in track.iter_mut().skip(first as usize).take(len as usize) {
                *cell = '#';
            }
            println!(
                "  |{}| {:>2}-{:<2} {}",
                track.into_iter().collect::<String>(),
                bar.start_index + 1,
                bar.end_index + 1,
                bar.milestone.title
            );
        }
    }
    Ok(())
}

pub fn list_labels() -> Result<()> {
    let session = load_session()?;
    let vocabulary = session.planner.labels();
    if vocabulary.is_empty() {
        println!("(no labels)");
    }
    for label in vocabulary {
        let count = session
            .planner
            .milestones
            .iter()
            .filter(|m| m.has_label(&label))
            .count();
        println!("{} ({})", label, count);
    }
    Ok(())
}

pub fn tui() -> Result<()> {
    let session = load_session()?;
    logging::init_file(&session.location.dir.join("waypoint.log"));
    log::info!("starting tui on {:?}", session.location.dir);
    ui::run(session)
}

fn load_session() -> Result<Session> {
    let cwd = env::current_dir()?;
    let location = locate_store(&cwd)?;
    let config = Config::load(&location.dir)?;
    let planner = load_planner(&location);
    Ok(Session {
        planner,
        location,
        config,
    })
}

pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let raw = input.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| anyhow!("invalid date format (use YYYY-MM-DD): {}", raw))
}

fn resolve_month(input: Option<&str>, clock: &dyn Clock) -> Result<Month> {
    match input {
        Some(raw) => raw.parse(),
        None => Ok(Month::containing(clock.today())),
    }
}

fn resolve_week_start(input: Option<&str>, config: &Config) -> Result<Weekday> {
    match input {
        Some(raw) => match raw.trim().parse::<Weekday>() {
            Ok(day) => Ok(day),
            Err(_) => bail!("invalid weekday: {}", raw),
        },
        None => Ok(config.week_start),
    }
}

fn month_title(month: Month) -> String {
    format!("{}", month.first_day().format("%B %Y"))
}

fn day_cell(day: &calendar::CalendarDay<'_>) -> String {
    let day_num = day.date.format("%d").to_string();
    let mut text = if day.in_month {
        day_num
    } else {
        format!("({})", day_num)
    };
    if day.is_today {
        text.push('*');
    }
    if !day.milestones.is_empty() {
        text.push_str(&format!(":{}", day.milestones.len()));
    }
    format!("{:<7}", text)
}

fn print_milestone(planner: &Planner, m: &Milestone) {
    let project = planner
        .project(&m.project_id)
        .map(|p| p.name.as_str())
        .unwrap_or("?");
    let span = if m.duration_days() > 1 {
        format!("{}..{}", m.date, m.effective_end())
    } else {
        m.date.to_string()
    };
    println!("  - {}: {} [{}] {}", m.id, m.title, project, span);
    if let Some(notes) = &m.notes {
        println!("    {}", notes);
    }
    if !m.labels.is_empty() {
        println!("    labels: {}", m.labels.join(", "));
    }
}
