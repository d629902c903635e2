use std::error::Error;

use clap::Subcommand;
use punchcard_core::OutputFormat;

use crate::context::Context;
use crate::output::print_json;

#[derive(Subcommand)]
pub enum ProjectAction {
    /// List projects
    List {
        /// Include inactive projects
        #[arg(long)]
        all: bool,
    },
    /// Find a project by exact name or numeric id
    Lookup {
        /// Project name or id
        name_or_id: String,
    },
}

pub fn run(action: ProjectAction, ctx: &Context) -> Result<(), Box<dyn Error>> {
    let session = ctx.session()?;
    match action {
        ProjectAction::List { all } => {
            let projects: Vec<_> = session
                .projects()?
                .into_iter()
                .filter(|p| all || p.is_active())
                .collect();
            match ctx.output {
                OutputFormat::Json => print_json(&projects)?,
                OutputFormat::Pretty => {
                    if projects.is_empty() {
                        println!("No projects found.");
                    }
                    for project in &projects {
                        let marker = if project.is_active() { "" } else { "  (inactive)" };
                        println!("{:>8}  {}{marker}", project.id, project.name());
                    }
                }
            }
        }
        ProjectAction::Lookup { name_or_id } => {
            let project = session.lookup_project(&name_or_id)?;
            match ctx.output {
                OutputFormat::Json => print_json(&project)?,
                OutputFormat::Pretty => println!("{}  {}", project.id, project.name()),
            }
        }
    }
    Ok(())
}
