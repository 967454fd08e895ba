mod calendar;
mod cli;
mod clock;
mod commands;
mod config;
mod filter;
mod labels;
mod logging;
mod model;
mod range;
mod storage;
mod timeline;
mod ui;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let command = args.command.unwrap_or(cli::Command::Tui);
    if !matches!(command, cli::Command::Tui) {
        logging::init_stderr();
    }
    match command {
        cli::Command::Init => commands::init(),
        cli::Command::Project(sub) => match sub {
            cli::ProjectCommand::Add { name, color } => commands::project_add(name, color),
            cli::ProjectCommand::List => commands::project_list(),
            cli::ProjectCommand::Edit {
                project,
                name,
                color,
            } => commands::project_edit(project, name, color),
            cli::ProjectCommand::Delete { project } => commands::project_delete(project),
        },
        cli::Command::Add {
            title,
            project,
            start,
            end,
            notes,
            labels,
        } => commands::add(title, project, start, end, notes, labels),
        cli::Command::Edit {
            milestone_id,
            title,
            project,
            start,
            end,
            clear_end,
            notes,
            clear_notes,
            labels,
            clear_labels,
        } => commands::edit(
            milestone_id,
            title,
            project,
            start,
            end,
            clear_end,
            notes,
            clear_notes,
            labels,
            clear_labels,
        ),
        cli::Command::Delete { milestone_id } => commands::delete(milestone_id),
        cli::Command::Move {
            milestone_id,
            start,
        } => commands::move_milestone(milestone_id, start),
        cli::Command::List { filter } => commands::list(filter),
        cli::Command::Calendar { view } => commands::show_calendar(view),
        cli::Command::Timeline { view } => commands::show_timeline(view),
        cli::Command::Labels => commands::list_labels(),
        cli::Command::Tui => commands::tui(),
    }
}
