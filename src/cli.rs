use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "waypoint", version, about = "Terminal project milestone planner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a milestone store in the current directory
    Init,
    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommand),
    /// Add a milestone
    Add {
        /// Title of the milestone
        title: String,
        /// Owning project (id or name)
        #[arg(long, short = 'p')]
        project: String,
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: String,
        /// End date (YYYY-MM-DD); earlier than start is clamped
        #[arg(long)]
        end: Option<String>,
        /// Free-text notes
        #[arg(long)]
        notes: Option<String>,
        /// Labels (repeatable)
        #[arg(long = "label", short = 'l')]
        labels: Vec<String>,
    },
    /// Edit an existing milestone
    Edit {
        /// Milestone id
        milestone_id: String,
        #[arg(long)]
        title: Option<String>,
        /// Move to another project (id or name)
        #[arg(long, short = 'p')]
        project: Option<String>,
        /// New start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,
        /// New end date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
        /// Remove the end date
        #[arg(long, conflicts_with = "end")]
        clear_end: bool,
        #[arg(long)]
        notes: Option<String>,
        /// Remove the notes
        #[arg(long, conflicts_with = "notes")]
        clear_notes: bool,
        /// Replace labels (repeatable)
        #[arg(long = "label", short = 'l')]
        labels: Vec<String>,
        /// Remove all labels
        #[arg(long, conflicts_with = "labels")]
        clear_labels: bool,
    },
    /// Delete a milestone
    Delete {
        milestone_id: String,
    },
    /// Reschedule a milestone to a new start date, keeping its duration
    Move {
        milestone_id: String,
        /// New start date (YYYY-MM-DD)
        start: String,
    },
    /// List milestones
    List {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Print the month grid with milestones per day
    Calendar {
        #[command(flatten)]
        view: ViewArgs,
    },
    /// Print one timeline row per project for a month
    Timeline {
        #[command(flatten)]
        view: ViewArgs,
    },
    /// List every label in use
    Labels,
    /// Launch the interactive TUI
    Tui,
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Create a project
    Add {
        name: String,
        /// Colour such as #0ea5e9 (defaults to the palette)
        #[arg(long)]
        color: Option<String>,
    },
    /// List projects
    List,
    /// Rename or recolour a project
    Edit {
        /// Project id or name
        project: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
    /// Delete a project and all of its milestones
    Delete {
        /// Project id or name
        project: String,
    },
}

#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    /// Only milestones of this project (id or name)
    #[arg(long, short = 'p')]
    pub project: Option<String>,
    /// Only milestones carrying every given label (repeatable)
    #[arg(long = "label", short = 'l')]
    pub labels: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ViewArgs {
    /// Month to show (YYYY-MM); defaults to the current month
    #[arg(long, short = 'm')]
    pub month: Option<String>,
    /// First day of the week (e.g. sun, mon); overrides config
    #[arg(long)]
    pub week_start: Option<String>,
    #[command(flatten)]
    pub filter: FilterArgs,
}
