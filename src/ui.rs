use crate::calendar::{self, CalendarDay, Month};
use crate::clock::{Clock, SystemClock};
use crate::commands::{parse_date, Session};
use crate::filter::{self, ProjectFilter};
use crate::labels;
use crate::model::{Milestone, MilestoneDraft, MilestoneId, Project, ProjectId};
use crate::timeline::{self, TimelineRow};
use anyhow::{anyhow, Result};
use chrono::{Duration as ChronoDuration, NaiveDate};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::ListState;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::time::{Duration, Instant};

const NAME_COLUMN: u16 = 20;

pub fn run(session: Session) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut app = App::new(session, Box::new(SystemClock));
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

struct App {
    session: Session,
    clock: Box<dyn Clock>,
    month: Month,
    cursor: NaiveDate,
    day_idx: usize,
    timeline_idx: usize,
    list_idx: usize,
    list_offset: usize,
    filter: filter::Filter,
    last_save: Instant,
    status: String,
    mode: Mode,
    view: ViewMode,
}

enum Mode {
    Normal,
    Creating(MilestoneForm),
    Editing {
        milestone_id: MilestoneId,
        form: MilestoneForm,
    },
    QuickAdd(FieldValue),
    ConfirmDelete {
        milestone_id: MilestoneId,
    },
    CreatingProject(ProjectForm),
    ConfirmDeleteProject {
        project_id: ProjectId,
    },
    Carrying {
        milestone_id: MilestoneId,
        origin: NaiveDate,
    },
    PickingLabels {
        idx: usize,
    },
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum ViewMode {
    Calendar,
    Timeline,
    List,
}

impl ViewMode {
    fn label(&self) -> &'static str {
        match self {
            ViewMode::Calendar => "Calendar",
            ViewMode::Timeline => "Timeline",
            ViewMode::List => "List",
        }
    }
}

#[derive(Clone)]
struct FieldValue {
    value: String,
    cursor: usize,
}

impl FieldValue {
    fn new(value: &str) -> Self {
        FieldValue {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    fn move_left(&mut self) {
        if let Some(ch) = self.value[..self.cursor].chars().next_back() {
            self.cursor -= ch.len_utf8();
        }
    }

    fn move_right(&mut self) {
        if let Some(ch) = self.value[self.cursor..].chars().next() {
            self.cursor += ch.len_utf8();
        }
    }

    fn backspace(&mut self) {
        if let Some(ch) = self.value[..self.cursor].chars().next_back() {
            self.cursor -= ch.len_utf8();
            self.value.remove(self.cursor);
        }
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn with_caret(&self) -> String {
        let mut shown = self.value.clone();
        shown.insert(self.cursor, '|');
        shown
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum FormField {
    Title,
    Start,
    End,
    Project,
    Labels,
    Notes,
}

const FORM_FIELDS: [FormField; 6] = [
    FormField::Title,
    FormField::Start,
    FormField::End,
    FormField::Project,
    FormField::Labels,
    FormField::Notes,
];

struct MilestoneForm {
    title: FieldValue,
    start: FieldValue,
    end: FieldValue,
    labels: FieldValue,
    notes: FieldValue,
    project_idx: usize,
    field: FormField,
}

impl MilestoneForm {
    /// Blank form starting and ending on `day`.
    fn on_day(day: NaiveDate, project_idx: usize) -> Self {
        let date = day.format("%Y-%m-%d").to_string();
        MilestoneForm {
            title: FieldValue::new(""),
            start: FieldValue::new(&date),
            end: FieldValue::new(&date),
            labels: FieldValue::new(""),
            notes: FieldValue::new(""),
            project_idx,
            field: FormField::Title,
        }
    }

    fn from_milestone(milestone: &Milestone, project_idx: usize) -> Self {
        MilestoneForm {
            title: FieldValue::new(&milestone.title),
            start: FieldValue::new(&milestone.date.format("%Y-%m-%d").to_string()),
            end: FieldValue::new(
                &milestone
                    .end_date
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
            ),
            labels: FieldValue::new(&milestone.labels.join(", ")),
            notes: FieldValue::new(milestone.notes.as_deref().unwrap_or_default()),
            project_idx,
            field: FormField::Title,
        }
    }

    fn step_field(&mut self, delta: isize) {
        let pos = FORM_FIELDS
            .iter()
            .position(|f| *f == self.field)
            .unwrap_or(0) as isize;
        let len = FORM_FIELDS.len() as isize;
        self.field = FORM_FIELDS[(pos + delta).rem_euclid(len) as usize];
    }

    fn active_field_mut(&mut self) -> Option<&mut FieldValue> {
        match self.field {
            FormField::Title => Some(&mut self.title),
            FormField::Start => Some(&mut self.start),
            FormField::End => Some(&mut self.end),
            FormField::Project => None,
            FormField::Labels => Some(&mut self.labels),
            FormField::Notes => Some(&mut self.notes),
        }
    }

    /// Turns the form into a draft. Unparseable dates keep the form open.
    fn to_draft(&self, projects: &[Project]) -> Result<MilestoneDraft> {
        let start = parse_date(&self.start.value)?;
        let end = if self.end.value.trim().is_empty() {
            None
        } else {
            Some(parse_date(&self.end.value)?)
        };
        let project_id = projects
            .get(self.project_idx)
            .map(|p| p.id.clone())
            .ok_or_else(|| anyhow!("create a project first (P)"))?;
        let notes = Some(self.notes.value.clone()).filter(|n| !n.trim().is_empty());
        Ok(MilestoneDraft {
            title: self.title.value.clone(),
            start,
            end,
            notes,
            project_id,
            labels: labels::parse_list(&self.labels.value),
        })
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum ProjectField {
    Name,
    Color,
}

struct ProjectForm {
    name: FieldValue,
    color: FieldValue,
    field: ProjectField,
}

impl ProjectForm {
    fn new(color: &str) -> Self {
        ProjectForm {
            name: FieldValue::new(""),
            color: FieldValue::new(color),
            field: ProjectField::Name,
        }
    }

    fn toggle_field(&mut self) {
        self.field = match self.field {
            ProjectField::Name => ProjectField::Color,
            ProjectField::Color => ProjectField::Name,
        };
    }

    fn active_field_mut(&mut self) -> &mut FieldValue {
        match self.field {
            ProjectField::Name => &mut self.name,
            ProjectField::Color => &mut self.color,
        }
    }
}

impl App {
    fn new(session: Session, clock: Box<dyn Clock>) -> Self {
        let today = clock.today();
        let status = format!(
            "Loaded {} project(s), {} milestone(s) from {}",
            session.planner.projects.len(),
            session.planner.milestones.len(),
            session.location.dir.display()
        );
        App {
            session,
            clock,
            month: Month::containing(today),
            cursor: today,
            day_idx: 0,
            timeline_idx: 0,
            list_idx: 0,
            list_offset: 0,
            filter: filter::Filter::default(),
            last_save: Instant::now(),
            status,
            mode: Mode::Normal,
            view: ViewMode::Calendar,
        }
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            terminal.draw(|f| self.draw(f))?;
            if event::poll(Duration::from_millis(200))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        let mode = std::mem::replace(&mut self.mode, Mode::Normal);
        match mode {
            Mode::Normal => return self.handle_normal_key(key),
            Mode::Creating(form) => {
                self.mode = self.handle_form_key(None, form, key);
            }
            Mode::Editing { milestone_id, form } => {
                self.mode = self.handle_form_key(Some(milestone_id), form, key);
            }
            Mode::QuickAdd(field) => self.mode = self.handle_quick_add_key(field, key),
            Mode::ConfirmDelete { milestone_id } => {
                self.mode = self.handle_confirm_delete(milestone_id, key)
            }
            Mode::CreatingProject(form) => self.mode = self.handle_project_form_key(form, key),
            Mode::ConfirmDeleteProject { project_id } => {
                self.mode = self.handle_confirm_delete_project(project_id, key)
            }
            Mode::Carrying {
                milestone_id,
                origin,
            } => self.mode = self.handle_carry_key(milestone_id, origin, key),
            Mode::PickingLabels { idx } => self.mode = self.handle_label_picker_key(idx, key),
        }
        false
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('1') => self.set_view(ViewMode::Calendar),
            KeyCode::Char('2') => self.set_view(ViewMode::Timeline),
            KeyCode::Char('3') => self.set_view(ViewMode::List),
            KeyCode::Char('[') => self.set_month(self.month.pred()),
            KeyCode::Char(']') => self.set_month(self.month.succ()),
            KeyCode::Char('t') => self.set_month(Month::containing(self.clock.today())),
            KeyCode::Char('n') => self.open_create_form(self.cursor),
            KeyCode::Char('a') => {
                self.mode = Mode::QuickAdd(FieldValue::new(""));
                self.status = format!("Quick add on {} (Enter save, Esc cancel)", self.cursor);
            }
            KeyCode::Char('e') => self.open_edit_form(),
            KeyCode::Char('d') => match self.selected_milestone() {
                Some(id) => {
                    self.status = "Delete milestone? (y to confirm, n/Esc to cancel)".into();
                    self.mode = Mode::ConfirmDelete { milestone_id: id };
                }
                None => self.status = "No milestone selected to delete".into(),
            },
            KeyCode::Char('m') => self.pick_up(),
            KeyCode::Char('p') => self.cycle_project_filter(),
            KeyCode::Char('f') => {
                if self.session.planner.labels().is_empty() {
                    self.status = "No labels in use yet".into();
                } else {
                    self.mode = Mode::PickingLabels { idx: 0 };
                    self.status = "Space toggles a label, Esc closes".into();
                }
            }
            KeyCode::Char('c') => {
                self.filter = filter::Filter::default();
                self.status = "Filters cleared".into();
            }
            KeyCode::Char('P') => {
                let color = self
                    .session
                    .config
                    .color_for_new_project(self.session.planner.projects.len());
                self.mode = Mode::CreatingProject(ProjectForm::new(&color));
                self.status = "New project (Tab switch field, Enter save, Esc cancel)".into();
            }
            KeyCode::Char('X') => match self.target_project() {
                Some(id) => {
                    self.status = "Delete project and all its milestones? (y/n)".into();
                    self.mode = Mode::ConfirmDeleteProject { project_id: id };
                }
                None => {
                    self.status = "Filter by a project (p) or select a milestone first".into()
                }
            },
            _ => match self.view {
                ViewMode::Calendar => self.handle_calendar_key(key),
                ViewMode::Timeline => self.handle_timeline_key(key),
                ViewMode::List => self.handle_list_key(key),
            },
        }
        self.ensure_bounds();
        false
    }

    fn handle_calendar_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Left | KeyCode::Char('h') => self.shift_cursor(-1),
            KeyCode::Right | KeyCode::Char('l') => self.shift_cursor(1),
            KeyCode::Up | KeyCode::Char('k') => self.shift_cursor(-7),
            KeyCode::Down | KeyCode::Char('j') => self.shift_cursor(7),
            KeyCode::Tab | KeyCode::Char('J') => self.day_idx += 1,
            KeyCode::BackTab | KeyCode::Char('K') => {
                self.day_idx = self.day_idx.saturating_sub(1)
            }
            KeyCode::Enter => {
                if self.cursor_milestones().is_empty() {
                    self.open_create_form(self.cursor);
                } else {
                    self.open_edit_form();
                }
            }
            _ => {}
        }
    }

    fn handle_timeline_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.timeline_idx = self.timeline_idx.saturating_sub(1)
            }
            KeyCode::Down | KeyCode::Char('j') => self.timeline_idx += 1,
            KeyCode::Left | KeyCode::Char('h') => self.set_month(self.month.pred()),
            KeyCode::Right | KeyCode::Char('l') => self.set_month(self.month.succ()),
            KeyCode::Enter => self.open_edit_form(),
            _ => {}
        }
    }

    fn handle_list_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.list_idx = self.list_idx.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => self.list_idx += 1,
            KeyCode::Enter => self.open_edit_form(),
            _ => {}
        }
    }

    fn handle_form_key(
        &mut self,
        editing: Option<MilestoneId>,
        mut form: MilestoneForm,
        key: KeyEvent,
    ) -> Mode {
        let control = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => {
                self.status = "Canceled".into();
                return Mode::Normal;
            }
            KeyCode::Tab | KeyCode::Down => form.step_field(1),
            KeyCode::BackTab | KeyCode::Up => form.step_field(-1),
            KeyCode::Left if form.field == FormField::Project => {
                form.project_idx = form.project_idx.saturating_sub(1);
            }
            KeyCode::Right if form.field == FormField::Project => {
                let last = self.session.planner.projects.len().saturating_sub(1);
                form.project_idx = (form.project_idx + 1).min(last);
            }
            KeyCode::Left => {
                if let Some(field) = form.active_field_mut() {
                    field.move_left();
                }
            }
            KeyCode::Right => {
                if let Some(field) = form.active_field_mut() {
                    field.move_right();
                }
            }
            KeyCode::Enter if form.field == FormField::Notes && !control => {
                if let Some(field) = form.active_field_mut() {
                    field.insert_char('\n');
                }
            }
            KeyCode::Char('d') if control => {
                if let Some(milestone_id) = editing {
                    self.status = "Delete milestone? (y to confirm, n/Esc to cancel)".into();
                    return Mode::ConfirmDelete { milestone_id };
                }
                self.status = "Nothing to delete until the milestone is saved".into();
                return Mode::Creating(form);
            }
            KeyCode::Enter | KeyCode::Char('s') if key.code == KeyCode::Enter || control => {
                if self.submit_milestone(editing.as_deref(), &form) {
                    return Mode::Normal;
                }
            }
            KeyCode::Backspace => {
                if let Some(field) = form.active_field_mut() {
                    field.backspace();
                }
            }
            KeyCode::Char(c) if !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
                if let Some(field) = form.active_field_mut() {
                    field.insert_char(c);
                }
            }
            _ => {}
        }
        match editing {
            Some(milestone_id) => Mode::Editing { milestone_id, form },
            None => Mode::Creating(form),
        }
    }

    fn submit_milestone(&mut self, editing: Option<&str>, form: &MilestoneForm) -> bool {
        let draft = match form.to_draft(&self.session.planner.projects) {
            Ok(draft) => draft,
            Err(err) => {
                self.status = format!("Not saved: {}", err);
                return false;
            }
        };
        let result = match editing {
            Some(id) => self
                .session
                .planner
                .update_milestone(id, draft)
                .map(|_| id.to_string()),
            None => self.session.planner.add_milestone(draft),
        };
        match result {
            Ok(id) => {
                let verb = if editing.is_some() { "Updated" } else { "Created" };
                self.persist(format!("{} milestone {}", verb, id));
                true
            }
            Err(err) => {
                self.status = format!("Not saved: {}", err);
                false
            }
        }
    }

    fn handle_quick_add_key(&mut self, mut field: FieldValue, key: KeyEvent) -> Mode {
        match key.code {
            KeyCode::Esc => {
                self.status = "Canceled".into();
                return Mode::Normal;
            }
            KeyCode::Enter => {
                let project_id = self
                    .filter
                    .project
                    .selected()
                    .map(str::to_string)
                    .or_else(|| self.session.planner.projects.first().map(|p| p.id.clone()));
                let Some(project_id) = project_id else {
                    self.status = "Create a project first (P)".into();
                    return Mode::QuickAdd(field);
                };
                let draft = MilestoneDraft::new(field.value.clone(), self.cursor, project_id);
                match self.session.planner.add_milestone(draft) {
                    Ok(id) => {
                        self.persist(format!("Created milestone {}", id));
                        return Mode::Normal;
                    }
                    Err(err) => self.status = format!("Not saved: {}", err),
                }
            }
            KeyCode::Left => field.move_left(),
            KeyCode::Right => field.move_right(),
            KeyCode::Backspace => field.backspace(),
            KeyCode::Char(c) if !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
                field.insert_char(c)
            }
            _ => {}
        }
        Mode::QuickAdd(field)
    }

    fn handle_project_form_key(&mut self, mut form: ProjectForm, key: KeyEvent) -> Mode {
        match key.code {
            KeyCode::Esc => {
                self.status = "Canceled".into();
                return Mode::Normal;
            }
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => form.toggle_field(),
            KeyCode::Enter => {
                let color = if form.color.value.trim().is_empty() {
                    self.session
                        .config
                        .color_for_new_project(self.session.planner.projects.len())
                } else {
                    form.color.value.clone()
                };
                match self.session.planner.add_project(&form.name.value, &color) {
                    Ok(id) => {
                        self.persist(format!("Created project {}", id));
                        return Mode::Normal;
                    }
                    Err(err) => self.status = format!("Not saved: {}", err),
                }
            }
            KeyCode::Left => form.active_field_mut().move_left(),
            KeyCode::Right => form.active_field_mut().move_right(),
            KeyCode::Backspace => form.active_field_mut().backspace(),
            KeyCode::Char(c) if !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
                form.active_field_mut().insert_char(c)
            }
            _ => {}
        }
        Mode::CreatingProject(form)
    }

    fn handle_confirm_delete(&mut self, milestone_id: MilestoneId, key: KeyEvent) -> Mode {
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                match self.session.planner.delete_milestone(&milestone_id) {
                    Ok(removed) => self.persist(format!("Deleted {}", removed.title)),
                    Err(err) => self.status = format!("Delete failed: {}", err),
                }
                Mode::Normal
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                self.status = "Delete canceled".into();
                Mode::Normal
            }
            _ => Mode::ConfirmDelete { milestone_id },
        }
    }

    fn handle_confirm_delete_project(&mut self, project_id: ProjectId, key: KeyEvent) -> Mode {
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                match self.session.planner.delete_project(&project_id) {
                    Ok(removed) => self.persist(format!(
                        "Deleted project and {} milestone(s)",
                        removed
                    )),
                    Err(err) => self.status = format!("Delete failed: {}", err),
                }
                Mode::Normal
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                self.status = "Delete canceled".into();
                Mode::Normal
            }
            _ => Mode::ConfirmDeleteProject { project_id },
        }
    }

    fn handle_carry_key(&mut self, milestone_id: MilestoneId, origin: NaiveDate, key: KeyEvent) -> Mode {
        match key.code {
            KeyCode::Esc => {
                self.move_cursor_to(origin);
                self.status = "Move canceled".into();
                return Mode::Normal;
            }
            KeyCode::Enter | KeyCode::Char('m') => {
                match self.session.planner.reschedule(&milestone_id, self.cursor) {
                    Ok(()) => self.persist(format!("Moved to {}", self.cursor)),
                    Err(err) => self.status = format!("Move failed: {}", err),
                }
                return Mode::Normal;
            }
            KeyCode::Left | KeyCode::Char('h') => self.shift_cursor(-1),
            KeyCode::Right | KeyCode::Char('l') => self.shift_cursor(1),
            KeyCode::Up | KeyCode::Char('k') => self.shift_cursor(-7),
            KeyCode::Down | KeyCode::Char('j') => self.shift_cursor(7),
            KeyCode::Char('[') => self.shift_cursor(-28),
            KeyCode::Char(']') => self.shift_cursor(28),
            _ => {}
        }
        Mode::Carrying {
            milestone_id,
            origin,
        }
    }

    fn handle_label_picker_key(&mut self, idx: usize, key: KeyEvent) -> Mode {
        let vocabulary = self.session.planner.labels();
        let last = vocabulary.len().saturating_sub(1);
        let mut idx = idx.min(last);
        match key.code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('f') => {
                self.status = format!("{} label filter(s) active", self.filter.labels.len());
                return Mode::Normal;
            }
            KeyCode::Up | KeyCode::Char('k') => idx = idx.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => idx = (idx + 1).min(last),
            KeyCode::Char(' ') => {
                if let Some(label) = vocabulary.get(idx) {
                    self.filter.toggle_label(label);
                }
            }
            _ => {}
        }
        self.ensure_bounds();
        Mode::PickingLabels { idx }
    }

    fn set_view(&mut self, view: ViewMode) {
        if self.view != view {
            self.view = view;
            self.status = format!("Switched to {} view", view.label());
        }
    }

    fn set_month(&mut self, month: Month) {
        let today = self.clock.today();
        self.month = month;
        self.cursor = if month.contains(today) {
            today
        } else {
            month.first_day()
        };
        self.day_idx = 0;
        self.timeline_idx = 0;
    }

    fn shift_cursor(&mut self, days: i64) {
        if let Some(date) = self
            .cursor
            .checked_add_signed(ChronoDuration::days(days))
        {
            self.move_cursor_to(date);
        }
    }

    fn move_cursor_to(&mut self, date: NaiveDate) {
        self.cursor = date;
        self.day_idx = 0;
        if !self.month.contains(date) {
            self.month = Month::containing(date);
        }
    }

    fn cycle_project_filter(&mut self) {
        let options = self.session.planner.project_options();
        let current = self.filter.project.selected();
        let pos = options
            .iter()
            .position(|o| o.value.as_deref() == current)
            .unwrap_or(0);
        let next = &options[(pos + 1) % options.len()];
        self.filter.project = ProjectFilter::from_option(next.value.clone());
        self.status = format!("Showing {}", next.label);
    }

    fn open_create_form(&mut self, day: NaiveDate) {
        if self.session.planner.projects.is_empty() {
            self.status = "Create a project first (P)".into();
            return;
        }
        let project_idx = self.filter_project_index().unwrap_or(0);
        self.mode = Mode::Creating(MilestoneForm::on_day(day, project_idx));
        self.status = "New milestone (Tab move, Enter save, Esc cancel)".into();
    }

    fn open_edit_form(&mut self) {
        let Some(id) = self.selected_milestone() else {
            self.status = "No milestone selected to edit".into();
            return;
        };
        let Some(milestone) = self.session.planner.milestone(&id) else {
            return;
        };
        let project_idx = self
            .session
            .planner
            .projects
            .iter()
            .position(|p| p.id == milestone.project_id)
            .unwrap_or(0);
        let form = MilestoneForm::from_milestone(milestone, project_idx);
        self.status = format!("Editing {}", milestone.title);
        self.mode = Mode::Editing {
            milestone_id: id,
            form,
        };
    }

    fn pick_up(&mut self) {
        let Some(id) = self.selected_milestone() else {
            self.status = "No milestone selected to move".into();
            return;
        };
        let Some(start) = self.session.planner.milestone(&id).map(|m| m.date) else {
            return;
        };
        let origin = self.cursor;
        self.view = ViewMode::Calendar;
        self.move_cursor_to(start);
        self.status = "Carrying: move to the new start day, Enter drops, Esc cancels".into();
        self.mode = Mode::Carrying {
            milestone_id: id,
            origin,
        };
    }

    fn filter_project_index(&self) -> Option<usize> {
        let id = self.filter.project.selected()?;
        self.session.planner.projects.iter().position(|p| p.id == id)
    }

    fn target_project(&self) -> Option<ProjectId> {
        if let Some(id) = self.filter.project.selected() {
            return Some(id.to_string());
        }
        let id = self.selected_milestone()?;
        self.session
            .planner
            .milestone(&id)
            .map(|m| m.project_id.clone())
    }

    fn persist(&mut self, message: String) {
        match self.session.persist() {
            Ok(()) => {
                self.last_save = Instant::now();
                self.status = message;
            }
            Err(err) => {
                self.status = format!("{} (not saved: {})", message, err);
            }
        }
        let vocabulary = self.session.planner.labels();
        let planner = &self.session.planner;
        self.filter
            .retain_known(|id| planner.project(id).is_some(), &vocabulary);
        self.ensure_bounds();
    }

    fn visible(&self) -> Vec<&Milestone> {
        filter::apply(&self.session.planner.milestones, &self.filter)
    }

    fn visible_sorted(&self) -> Vec<&Milestone> {
        filter::apply(self.session.planner.milestones_sorted(), &self.filter)
    }

    fn cursor_milestones(&self) -> Vec<&Milestone> {
        self.visible()
            .into_iter()
            .filter(|m| m.range().contains(self.cursor))
            .collect()
    }

    fn timeline_rows(&self) -> Vec<TimelineRow<'_>> {
        let rows = timeline::project(
            self.month,
            &self.session.planner.projects,
            self.visible(),
        );
        match self.filter.project.selected() {
            Some(id) => rows.into_iter().filter(|r| r.project.id == id).collect(),
            None => rows,
        }
    }

    fn selected_milestone(&self) -> Option<MilestoneId> {
        match self.view {
            ViewMode::Calendar => self
                .cursor_milestones()
                .get(self.day_idx)
                .map(|m| m.id.clone()),
            ViewMode::Timeline => self
                .timeline_rows()
                .iter()
                .flat_map(|r| r.bars.iter())
                .nth(self.timeline_idx)
                .map(|b| b.milestone.id.clone()),
            ViewMode::List => self
                .visible_sorted()
                .get(self.list_idx)
                .map(|m| m.id.clone()),
        }
    }

    fn ensure_bounds(&mut self) {
        let day_len = self.cursor_milestones().len();
        let bar_len: usize = self.timeline_rows().iter().map(|r| r.bars.len()).sum();
        let list_len = self.visible().len();
        self.day_idx = self.day_idx.min(day_len.saturating_sub(1));
        self.timeline_idx = self.timeline_idx.min(bar_len.saturating_sub(1));
        self.list_idx = self.list_idx.min(list_len.saturating_sub(1));
    }

    fn project_color(&self, project_id: &str) -> Color {
        let planner = &self.session.planner;
        match planner.projects.iter().position(|p| p.id == project_id) {
            Some(idx) => {
                parse_hex_color(&planner.projects[idx].color).unwrap_or(color_for_index(idx))
            }
            None => Color::Gray,
        }
    }

    fn carrying(&self) -> Option<&str> {
        match &self.mode {
            Mode::Carrying { milestone_id, .. } => Some(milestone_id.as_str()),
            _ => None,
        }
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(4),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        match self.view {
            ViewMode::Calendar => self.draw_calendar(f, layout[1]),
            ViewMode::Timeline => self.draw_timeline(f, layout[1]),
            ViewMode::List => self.draw_list(f, layout[1]),
        }
        self.draw_footer(f, layout[2]);

        match &self.mode {
            Mode::Creating(form) => self.draw_milestone_form(f, "New Milestone", form, false),
            Mode::Editing { form, .. } => {
                self.draw_milestone_form(f, "Edit Milestone", form, true)
            }
            Mode::QuickAdd(field) => self.draw_quick_add(f, field),
            Mode::ConfirmDelete { milestone_id } => {
                let title = self
                    .session
                    .planner
                    .milestone(milestone_id)
                    .map(|m| m.title.clone())
                    .unwrap_or_else(|| milestone_id.clone());
                self.draw_confirm(f, format!("Delete \"{}\"?", title));
            }
            Mode::CreatingProject(form) => self.draw_project_form(f, form),
            Mode::ConfirmDeleteProject { project_id } => {
                let name = self
                    .session
                    .planner
                    .project(project_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| project_id.clone());
                let count = self
                    .session
                    .planner
                    .milestones
                    .iter()
                    .filter(|m| &m.project_id == project_id)
                    .count();
                self.draw_confirm(
                    f,
                    format!("Delete project \"{}\" and its {} milestone(s)?", name, count),
                );
            }
            Mode::PickingLabels { idx } => self.draw_label_picker(f, *idx),
            Mode::Carrying { .. } | Mode::Normal => {}
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let title = Line::from(vec![
            Span::styled(
                "waypoint ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                self.session.location.scope_label(),
                Style::default().fg(Color::Green),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("{}", self.session.location.dir.display()),
                Style::default().fg(Color::DarkGray),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("saved {}", format_elapsed(self.last_save)),
                Style::default().fg(Color::Gray),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("view {}", self.view.label().to_lowercase()),
                Style::default().fg(Color::Magenta),
            ),
        ]);

        let selected = self
            .session
            .planner
            .project_options()
            .into_iter()
            .find(|o| o.value.as_deref() == self.filter.project.selected());
        let (project_label, project_color) = match selected {
            Some(option) => {
                let color = option
                    .color
                    .as_deref()
                    .and_then(parse_hex_color)
                    .unwrap_or(Color::LightCyan);
                (option.label, color)
            }
            None => ("All projects".to_string(), Color::LightCyan),
        };
        let mut filter_spans = vec![
            Span::styled("project ", Style::default().fg(Color::Gray)),
            Span::styled(
                project_label,
                Style::default()
                    .fg(project_color)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("   "),
            Span::styled("labels ", Style::default().fg(Color::Gray)),
        ];
        if !self.filter.is_active() {
            filter_spans.push(Span::styled(
                "any (no filters)",
                Style::default().fg(Color::DarkGray),
            ));
        } else if self.filter.labels.is_empty() {
            filter_spans.push(Span::styled("any", Style::default().fg(Color::DarkGray)));
        } else {
            filter_spans.push(Span::styled(
                format!("#{}", self.filter.labels.join(" #")),
                Style::default().fg(Color::LightMagenta),
            ));
        }

        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        let paragraph = Paragraph::new(vec![title, Line::from(filter_spans)])
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_calendar(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let sections = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(72), Constraint::Percentage(28)])
            .split(area);

        let week_start = self.session.config.week_start;
        let grid = calendar::project(
            self.month,
            week_start,
            self.visible(),
            self.clock.as_ref(),
        );
        let block = Block::default()
            .title(Span::styled(
                month_title(grid.month),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));
        let inner = block.inner(sections[0]);
        f.render_widget(block, sections[0]);

        let weeks: Vec<&[CalendarDay<'_>]> = grid.weeks().collect();
        let mut row_constraints = vec![Constraint::Length(1)];
        row_constraints.extend(weeks.iter().map(|_| Constraint::Ratio(1, weeks.len() as u32)));
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints(row_constraints)
            .split(inner);
        let seven = [Constraint::Ratio(1, 7); 7];

        let heading_cells = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(seven)
            .split(rows[0]);
        for (heading, cell) in calendar::weekday_headings(grid.week_start)
            .iter()
            .zip(heading_cells.iter())
        {
            f.render_widget(
                Paragraph::new(*heading)
                    .alignment(Alignment::Center)
                    .style(Style::default().fg(Color::Gray)),
                *cell,
            );
        }

        for (week, row) in weeks.iter().zip(rows.iter().skip(1)) {
            let cells = Layout::default()
                .direction(Direction::Horizontal)
                .constraints(seven)
                .split(*row);
            for (day, cell) in week.iter().zip(cells.iter()) {
                f.render_widget(Paragraph::new(self.day_cell_lines(day, *cell)), *cell);
            }
        }

        let on_cursor = grid
            .day(self.cursor)
            .map(|day| day.milestones.clone())
            .unwrap_or_default();
        self.draw_day_detail(f, sections[1], &on_cursor);
    }

    fn day_cell_lines(&self, day: &CalendarDay<'_>, cell: Rect) -> Vec<Line<'static>> {
        let width = cell.width.saturating_sub(1) as usize;
        let mut number_style = if day.in_month {
            Style::default().fg(Color::White)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        if day.is_today {
            number_style = number_style.fg(Color::Yellow).add_modifier(Modifier::BOLD);
        }
        if day.date == self.cursor {
            let bg = if self.carrying().is_some() {
                Color::LightRed
            } else {
                Color::Cyan
            };
            number_style = number_style.bg(bg).fg(Color::Black);
        }
        let mut lines = vec![Line::from(Span::styled(
            format!("{:>2}{}", day.date.format("%d"), if day.is_today { "•" } else { " " }),
            number_style,
        ))];

        let room = cell.height as usize;
        let total = day.milestones.len();
        for (idx, m) in day.milestones.iter().enumerate() {
            if lines.len() + 1 >= room && idx + 1 < total {
                lines.push(Line::from(Span::styled(
                    format!("+{} more", total - idx),
                    Style::default().fg(Color::Gray),
                )));
                break;
            }
            let mut title_style = Style::default().fg(Color::Gray);
            if self.carrying() == Some(m.id.as_str()) {
                title_style = title_style.add_modifier(Modifier::DIM | Modifier::ITALIC);
            } else if day.date == self.cursor && idx == self.day_idx {
                title_style = title_style.fg(Color::White).add_modifier(Modifier::BOLD);
            }
            lines.push(Line::from(vec![
                Span::styled("▌", Style::default().fg(self.project_color(&m.project_id))),
                Span::styled(truncate_text(&m.title, width.saturating_sub(1)), title_style),
            ]));
        }
        lines
    }

    fn draw_day_detail(&self, f: &mut ratatui::Frame<'_>, area: Rect, milestones: &[&Milestone]) {
        let items = if milestones.is_empty() {
            vec![ListItem::new("Nothing scheduled (Enter to add)")]
        } else {
            milestones
                .iter()
                .map(|m| self.milestone_item(m))
                .collect()
        };
        let mut state = ListState::default();
        if !milestones.is_empty() {
            state.select(Some(self.day_idx));
        }
        let block = Block::default()
            .title(Span::styled(
                format!(
                    "{} ({})",
                    self.cursor.format("%a %Y-%m-%d"),
                    milestones.len()
                ),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));
        let list = List::new(items).block(block).highlight_style(
            Style::default()
                .bg(Color::LightCyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        );
        f.render_stateful_widget(list, area, &mut state);
    }

    fn draw_timeline(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default()
            .title(Span::styled(
                format!("Timeline · {}", month_title(self.month)),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));
        let inner = block.inner(area);
        f.render_widget(block, area);

        let track_width = inner.width.saturating_sub(NAME_COLUMN + 1);
        let days = self.month.days();
        let min_width = self.session.config.timeline.min_bar_width;
        let today = self.clock.today();

        let today_col = if self.month.contains(today) {
            let offset = crate::range::day_diff(today, self.month.first_day()) as f64;
            Some((offset / days as f64 * track_width as f64).floor() as u16)
        } else {
            None
        };

        let mut lines = vec![ruler_line(days, track_width)];
        let mut selected_line = 0;
        let mut bar_counter = 0;
        let rows = self.timeline_rows();
        if rows.is_empty() {
            lines.push(Line::from("No projects yet (P to create one)"));
        }
        for row in &rows {
            let color = self.project_color(&row.project.id);
            lines.push(Line::from(Span::styled(
                truncate_text(&row.project.name, inner.width as usize),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )));
            if row.bars.is_empty() {
                lines.push(Line::from(Span::styled(
                    "  nothing this month",
                    Style::default().fg(Color::DarkGray),
                )));
            }
            for bar in &row.bars {
                let selected = bar_counter == self.timeline_idx;
                if selected {
                    selected_line = lines.len();
                }
                bar_counter += 1;
                let (first, len) = bar.geometry(days, min_width).columns(track_width);
                let title_style = if selected {
                    Style::default()
                        .bg(Color::LightCyan)
                        .fg(Color::Black)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Gray)
                };
                let mut spans = vec![
                    Span::styled(
                        format!(
                            "  {:<width$}",
                            truncate_text(&bar.milestone.title, NAME_COLUMN as usize - 3),
                            width = NAME_COLUMN as usize - 2
                        ),
                        title_style,
                    ),
                    Span::raw(" "),
                ];
                for col in 0..track_width {
                    let in_bar = col >= first && col < first + len;
                    let (symbol, style) = if in_bar {
                        let mut style = Style::default().fg(color);
                        if selected {
                            style = style.add_modifier(Modifier::BOLD);
                        }
                        ("█", style)
                    } else if Some(col) == today_col {
                        ("│", Style::default().fg(Color::Yellow))
                    } else {
                        ("·", Style::default().fg(Color::DarkGray))
                    };
                    spans.push(Span::styled(symbol, style));
                }
                lines.push(Line::from(spans));
            }
        }

        let viewport = inner.height as usize;
        let offset = adjust_offset(selected_line, 0, viewport, 1, lines.len());
        let paragraph = Paragraph::new(lines).scroll((offset as u16, 0));
        f.render_widget(paragraph, inner);
    }

    fn draw_list(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let viewport = area.height.saturating_sub(2) as usize;
        let (items, len) = {
            let visible = self.visible_sorted();
            let items: Vec<ListItem<'static>> = if visible.is_empty() {
                vec![ListItem::new("No milestones match")]
            } else {
                visible.iter().map(|m| self.milestone_item(m)).collect()
            };
            (items, visible.len())
        };
        let offset = adjust_offset(self.list_idx, self.list_offset, viewport, 1, len);
        self.list_offset = offset;
        let mut state = ListState::default();
        *state.offset_mut() = offset;
        if len > 0 {
            state.select(Some(self.list_idx));
        }
        let block = Block::default()
            .title(Span::styled(
                format!("Milestones ({})", len),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));
        let list = List::new(items).block(block).highlight_style(
            Style::default()
                .bg(Color::LightCyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        );
        f.render_stateful_widget(list, area, &mut state);
    }

    fn milestone_item(&self, m: &Milestone) -> ListItem<'static> {
        let project = self
            .session
            .planner
            .project(&m.project_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "?".into());
        let mut spans = vec![
            Span::styled("▌", Style::default().fg(self.project_color(&m.project_id))),
            Span::styled(
                truncate_text(&m.title, 36),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(span_text(m), Style::default().fg(Color::LightYellow)),
            Span::raw("  "),
            Span::styled(project, Style::default().fg(Color::Gray)),
        ];
        if !m.labels.is_empty() {
            spans.push(Span::raw("  "));
            spans.push(Span::styled(
                format!("#{}", m.labels.join(" #")),
                Style::default().fg(Color::LightMagenta),
            ));
        }
        ListItem::new(Line::from(spans)).style(Style::default().fg(Color::Gray))
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(2)])
            .split(area);

        let help_bar = Paragraph::new(self.footer_help_line())
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(help_bar, rows[0]);

        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(rows[1]);

        let status = Paragraph::new(self.status.clone())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(status, bottom[0]);

        let detail_line = self
            .selected_milestone()
            .and_then(|id| self.session.planner.milestone(&id))
            .map(selected_detail)
            .unwrap_or_else(|| Line::from("No milestone selected"));
        let detail = Paragraph::new(detail_line)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray))
                    .title("Selected"),
            );
        f.render_widget(detail, bottom[1]);
    }

    fn footer_help_line(&self) -> Line<'static> {
        let key = |k: &'static str, color: Color| Span::styled(k, Style::default().fg(color));
        if self.carrying().is_some() {
            return Line::from(vec![
                key("←↑↓→", Color::LightCyan),
                Span::raw(" choose day  "),
                key("[ ]", Color::LightCyan),
                Span::raw(" ±4 weeks  "),
                key("Enter", Color::LightGreen),
                Span::raw(" drop  "),
                key("Esc", Color::LightRed),
                Span::raw(" cancel"),
            ]);
        }
        let mut spans = vec![
            key("1", Color::LightCyan),
            Span::raw(" calendar  "),
            key("2", Color::LightCyan),
            Span::raw(" timeline  "),
            key("3", Color::LightCyan),
            Span::raw(" list  "),
            key("[ ] t", Color::LightCyan),
            Span::raw(" month  "),
        ];
        match self.view {
            ViewMode::Calendar => spans.extend([
                key("←↑↓→", Color::LightCyan),
                Span::raw(" day  "),
                key("Tab", Color::LightCyan),
                Span::raw(" pick  "),
                key("m", Color::LightGreen),
                Span::raw(" move  "),
            ]),
            ViewMode::Timeline | ViewMode::List => spans.extend([
                key("↑↓", Color::LightCyan),
                Span::raw(" browse  "),
                key("m", Color::LightGreen),
                Span::raw(" move  "),
            ]),
        }
        spans.extend([
            key("n/a", Color::LightMagenta),
            Span::raw(" new/quick  "),
            key("e", Color::LightYellow),
            Span::raw(" edit  "),
            key("d", Color::LightRed),
            Span::raw(" delete  "),
            key("p f c", Color::LightCyan),
            Span::raw(" filter  "),
            key("P X", Color::LightMagenta),
            Span::raw(" project  "),
            key("q", Color::LightRed),
            Span::raw(" quit"),
        ]);
        Line::from(spans)
    }

    fn draw_milestone_form(
        &self,
        f: &mut ratatui::Frame<'_>,
        title: &str,
        form: &MilestoneForm,
        editing: bool,
    ) {
        let area = centered_rect(70, 60, f.size());
        let project_text = self
            .session
            .planner
            .projects
            .get(form.project_idx)
            .map(|p| format!("‹ {} ›", p.name))
            .unwrap_or_else(|| "(no projects)".into());
        let mut lines = Vec::new();
        lines.extend(field_lines("Title", &form.title, form.field == FormField::Title));
        lines.extend(field_lines(
            "Start (YYYY-MM-DD)",
            &form.start,
            form.field == FormField::Start,
        ));
        lines.extend(field_lines(
            "End (optional)",
            &form.end,
            form.field == FormField::End,
        ));
        let project_style = if form.field == FormField::Project {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::White)
        };
        lines.push(Line::from(vec![
            Span::styled(
                "Project (←/→): ",
                Style::default()
                    .fg(Color::Gray)
                    .add_modifier(Modifier::BOLD | Modifier::DIM),
            ),
            Span::styled(project_text, project_style),
        ]));
        lines.extend(field_lines(
            "Labels (comma separated)",
            &form.labels,
            form.field == FormField::Labels,
        ));
        lines.extend(field_lines("Notes", &form.notes, form.field == FormField::Notes));
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Enter to save • Esc to cancel • Tab/Shift-Tab to move • Enter adds a newline in Notes (Ctrl+S saves)",
            Style::default().fg(Color::Gray),
        )));
        if editing {
            lines.push(Line::from(Span::styled(
                "Ctrl+D deletes this milestone",
                Style::default().fg(Color::LightRed),
            )));
        }
        let dialog = Paragraph::new(lines)
            .block(
                Block::default()
                    .title(Span::styled(
                        title.to_string(),
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .wrap(Wrap { trim: true });
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }

    fn draw_project_form(&self, f: &mut ratatui::Frame<'_>, form: &ProjectForm) {
        let area = centered_rect(50, 30, f.size());
        let mut lines = Vec::new();
        lines.extend(field_lines("Name", &form.name, form.field == ProjectField::Name));
        lines.extend(field_lines("Color", &form.color, form.field == ProjectField::Color));
        let swatch = parse_hex_color(&form.color.value).unwrap_or(Color::Gray);
        lines.push(Line::from(vec![
            Span::styled("Preview: ", Style::default().fg(Color::Gray)),
            Span::styled("██████", Style::default().fg(swatch)),
        ]));
        let dialog = Paragraph::new(lines).block(
            Block::default()
                .title(Span::styled(
                    "New Project",
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }

    fn draw_quick_add(&self, f: &mut ratatui::Frame<'_>, field: &FieldValue) {
        let area = centered_rect(60, 20, f.size());
        let project = self
            .filter
            .project
            .selected()
            .and_then(|id| self.session.planner.project(id))
            .or_else(|| self.session.planner.projects.first())
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "(no project)".into());
        let mut lines = vec![Line::from(Span::styled(
            format!("{} → {}", self.cursor.format("%Y-%m-%d"), project),
            Style::default().fg(Color::LightYellow),
        ))];
        lines.extend(field_lines("Title", field, true));
        let dialog = Paragraph::new(lines).block(
            Block::default()
                .title(Span::styled(
                    "Quick Add",
                    Style::default()
                        .fg(Color::LightMagenta)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::LightMagenta)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }

    fn draw_label_picker(&self, f: &mut ratatui::Frame<'_>, idx: usize) {
        let area = centered_rect(40, 50, f.size());
        let vocabulary = self.session.planner.labels();
        let items: Vec<ListItem<'static>> = vocabulary
            .iter()
            .map(|label| {
                let on = self.filter.labels.contains(label);
                ListItem::new(format!("[{}] {}", if on { "x" } else { " " }, label)).style(
                    Style::default().fg(if on { Color::LightMagenta } else { Color::Gray }),
                )
            })
            .collect();
        let mut state = ListState::default();
        state.select(Some(idx.min(vocabulary.len().saturating_sub(1))));
        let list = List::new(items)
            .block(
                Block::default()
                    .title(Span::styled(
                        "Labels (all must match)",
                        Style::default()
                            .fg(Color::LightMagenta)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::LightMagenta)),
            )
            .highlight_style(
                Style::default()
                    .bg(Color::LightCyan)
                    .fg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            );
        f.render_widget(Clear, area);
        f.render_stateful_widget(list, area, &mut state);
    }

    fn draw_confirm(&self, f: &mut ratatui::Frame<'_>, question: String) {
        let area = centered_rect(50, 30, f.size());
        let body = vec![
            Line::from(Span::styled(
                question,
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Press y to confirm, n or Esc to cancel"),
        ];
        let dialog = Paragraph::new(body)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .title(Span::styled(
                        "Confirm Delete",
                        Style::default()
                            .fg(Color::LightRed)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::LightRed)),
            );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn month_title(month: Month) -> String {
    month.first_day().format("%B %Y").to_string()
}

/// Day numbers placed over the timeline track.
fn ruler_line(days: u32, track_width: u16) -> Line<'static> {
    let mut ruler = vec![' '; track_width as usize];
    for day in (1..=days).filter(|d| *d == 1 || d % 5 == 0) {
        let col = ((day - 1) as f64 / days as f64 * track_width as f64).floor() as usize;
        for (i, ch) in day.to_string().chars().enumerate() {
            if let Some(slot) = ruler.get_mut(col + i) {
                *slot = ch;
            }
        }
    }
    Line::from(vec![
        Span::raw(" ".repeat(NAME_COLUMN as usize + 1)),
        Span::styled(
            ruler.into_iter().collect::<String>(),
            Style::default().fg(Color::Gray),
        ),
    ])
}

fn parse_hex_color(raw: &str) -> Option<Color> {
    let hex = raw.trim().strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Color::Rgb(r, g, b))
}

fn color_for_index(idx: usize) -> Color {
    let palette = [
        Color::Cyan,
        Color::LightGreen,
        Color::LightMagenta,
        Color::LightBlue,
        Color::LightYellow,
        Color::LightRed,
    ];
    palette[idx % palette.len()]
}

fn adjust_offset(
    selected: usize,
    current_offset: usize,
    viewport: usize,
    scrolloff: usize,
    len: usize,
) -> usize {
    if viewport == 0 || len == 0 {
        return 0;
    }
    let max_offset = len.saturating_sub(viewport);
    let margin = scrolloff.min(viewport.saturating_sub(1));
    let mut offset = current_offset.min(max_offset);
    if selected < offset + margin {
        offset = selected.saturating_sub(margin);
    } else if selected + margin + 1 > offset + viewport {
        offset = (selected + margin + 1).saturating_sub(viewport);
    }
    offset.min(max_offset)
}

fn span_text(m: &Milestone) -> String {
    let days = m.duration_days();
    if days > 1 {
        format!(
            "{} → {} ({}d)",
            m.date.format("%Y-%m-%d"),
            m.effective_end().format("%Y-%m-%d"),
            days
        )
    } else {
        m.date.format("%Y-%m-%d").to_string()
    }
}

fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max <= 1 {
        return text.chars().take(max).collect();
    }
    let mut out: String = text.chars().take(max - 1).collect();
    out.push('…');
    out
}

fn field_lines(label: &str, field: &FieldValue, active: bool) -> Vec<Line<'static>> {
    let label_style = Style::default()
        .fg(Color::Gray)
        .add_modifier(Modifier::BOLD | Modifier::DIM);
    let value_style = Style::default().fg(if active { Color::Cyan } else { Color::White });
    let prefix = format!("{}: ", label);
    let spacer = " ".repeat(prefix.chars().count());
    let text = if active {
        field.with_caret()
    } else {
        field.value.clone()
    };
    text.split('\n')
        .enumerate()
        .map(|(idx, line)| {
            Line::from(vec![
                Span::styled(
                    if idx == 0 {
                        prefix.clone()
                    } else {
                        spacer.clone()
                    },
                    label_style,
                ),
                Span::styled(line.to_string(), value_style),
            ])
        })
        .collect()
}

fn selected_detail(m: &Milestone) -> Line<'static> {
    let mut spans = vec![
        Span::styled(
            m.title.clone(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(span_text(m), Style::default().fg(Color::LightRed)),
    ];
    if !m.labels.is_empty() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("#{}", m.labels.join(" #")),
            Style::default().fg(Color::LightMagenta),
        ));
    }
    if let Some(notes) = &m.notes {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            notes.replace('\n', " "),
            Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),
        ));
    }
    Line::from(spans)
}

fn format_elapsed(last: Instant) -> String {
    let secs = last.elapsed().as_secs();
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::Config;
    use crate::model::Planner;
    use crate::storage::{StoreLocation, StoreScope};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            press(app, KeyCode::Char(ch));
        }
    }

    fn app_with_project(dir: &TempDir) -> App {
        let mut planner = Planner::default();
        planner.add_project("Launch", "#0ea5e9").unwrap();
        let session = Session {
            planner,
            location: StoreLocation {
                dir: dir.path().to_path_buf(),
                scope: StoreScope::Project,
            },
            config: Config::default(),
        };
        App::new(session, Box::new(FixedClock(d(2025, 3, 5))))
    }

    #[test]
    fn enter_on_empty_day_creates_single_day_milestone() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with_project(&dir);
        press(&mut app, KeyCode::Enter);
        assert!(matches!(app.mode, Mode::Creating(_)));
        type_text(&mut app, "Kickoff");
        press(&mut app, KeyCode::Enter);
        assert!(matches!(app.mode, Mode::Normal));

        let m = &app.session.planner.milestones[0];
        assert_eq!(m.title, "Kickoff");
        assert_eq!(m.date, d(2025, 3, 5));
        assert_eq!(m.duration_days(), 1);
        assert!(dir.path().join(crate::storage::MILESTONES_FILE).exists());
    }

    #[test]
    fn blank_title_keeps_form_open() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with_project(&dir);
        press(&mut app, KeyCode::Char('n'));
        press(&mut app, KeyCode::Enter);
        assert!(matches!(app.mode, Mode::Creating(_)));
        assert!(app.session.planner.milestones.is_empty());
    }

    #[test]
    fn carry_and_drop_reschedules() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with_project(&dir);
        let pid = app.session.planner.projects[0].id.clone();
        let mut draft = MilestoneDraft::new("Beta", d(2025, 3, 5), pid);
        draft.end = Some(d(2025, 3, 10));
        app.session.planner.add_milestone(draft).unwrap();

        press(&mut app, KeyCode::Char('m'));
        assert!(app.carrying().is_some());
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Enter);

        let m = &app.session.planner.milestones[0];
        assert_eq!(m.date, d(2025, 3, 13));
        assert_eq!(m.effective_end(), d(2025, 3, 18));
    }

    #[test]
    fn edit_form_can_delete() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with_project(&dir);
        let pid = app.session.planner.projects[0].id.clone();
        app.session
            .planner
            .add_milestone(MilestoneDraft::new("Beta", d(2025, 3, 5), pid))
            .unwrap();

        press(&mut app, KeyCode::Char('e'));
        assert!(matches!(app.mode, Mode::Editing { .. }));
        app.handle_key(KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL));
        assert!(matches!(app.mode, Mode::ConfirmDelete { .. }));
        press(&mut app, KeyCode::Char('y'));

        assert!(matches!(app.mode, Mode::Normal));
        assert!(app.session.planner.milestones.is_empty());
        let saved = crate::storage::load_planner(&app.session.location);
        assert!(saved.milestones.is_empty());
        assert_eq!(saved.projects.len(), 1);
    }

    #[test]
    fn ctrl_d_in_new_form_keeps_it_open() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with_project(&dir);
        press(&mut app, KeyCode::Char('n'));
        app.handle_key(KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL));
        assert!(matches!(app.mode, Mode::Creating(_)));
    }

    #[test]
    fn blank_project_colour_falls_back_to_config() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with_project(&dir);
        press(&mut app, KeyCode::Char('P'));
        app.session.config.default_color = Some("#123456".into());
        type_text(&mut app, "Docs");
        press(&mut app, KeyCode::Tab);
        for _ in 0..7 {
            press(&mut app, KeyCode::Backspace);
        }
        press(&mut app, KeyCode::Enter);
        assert!(matches!(app.mode, Mode::Normal));
        assert_eq!(app.session.planner.projects[1].color, "#123456");
    }

    #[test]
    fn project_filter_cycles_through_options() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with_project(&dir);
        let pid = app.session.planner.projects[0].id.clone();
        press(&mut app, KeyCode::Char('p'));
        assert_eq!(app.filter.project, ProjectFilter::Only(pid));
        press(&mut app, KeyCode::Char('p'));
        assert_eq!(app.filter.project, ProjectFilter::All);
    }

    #[test]
    fn deleting_filtered_project_clears_filter() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with_project(&dir);
        let pid = app.session.planner.projects[0].id.clone();
        app.session
            .planner
            .add_milestone(MilestoneDraft::new("Kickoff", d(2025, 3, 1), pid))
            .unwrap();
        press(&mut app, KeyCode::Char('p'));
        press(&mut app, KeyCode::Char('X'));
        press(&mut app, KeyCode::Char('y'));
        assert!(app.session.planner.projects.is_empty());
        assert!(app.session.planner.milestones.is_empty());
        assert_eq!(app.filter.project, ProjectFilter::All);
    }

    #[test]
    fn hex_colors_parse() {
        assert_eq!(parse_hex_color("#0ea5e9"), Some(Color::Rgb(14, 165, 233)));
        assert_eq!(parse_hex_color("teal"), None);
        assert_eq!(parse_hex_color("#12345"), None);
    }

    #[test]
    fn offset_keeps_selection_visible() {
        assert_eq!(adjust_offset(0, 0, 5, 1, 20), 0);
        assert_eq!(adjust_offset(10, 0, 5, 1, 20), 7);
        assert_eq!(adjust_offset(19, 7, 5, 1, 20), 15);
        assert_eq!(adjust_offset(3, 0, 0, 1, 20), 0);
    }
}
