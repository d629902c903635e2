use std::error::Error;

use punchcard_core::{CoreError, OutputFormat};

use crate::context::Context;
use crate::output::print_json;

pub fn login(ctx: &Context) -> Result<(), Box<dyn Error>> {
    let session = ctx.session()?;
    let identity = session.identity().ok_or(CoreError::NotLoggedIn)?;
    match ctx.output {
        OutputFormat::Json => print_json(identity)?,
        OutputFormat::Pretty => {
            let name = identity
                .full_name
                .as_deref()
                .or(identity.email.as_deref())
                .unwrap_or("unknown");
            println!("Logged in as {name} (employee {})", identity.employee_id);
        }
    }
    Ok(())
}

pub fn whoami(ctx: &Context) -> Result<(), Box<dyn Error>> {
    let session = ctx.session()?;
    let me = session.me()?;
    match ctx.output {
        OutputFormat::Json => print_json(&me)?,
        OutputFormat::Pretty => {
            println!("{} (employee {})", me.full_name(), me.id);
            for (label, value) in [
                ("Position", &me.position),
                ("Department", &me.department),
                ("Office", &me.office),
                ("Team", &me.team),
            ] {
                if let Some(value) = value {
                    println!("  {label}: {value}");
                }
            }
        }
    }
    Ok(())
}
