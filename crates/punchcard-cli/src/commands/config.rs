use std::error::Error;
use std::path::Path;

use clap::Subcommand;
use punchcard_core::{Config, OutputFormat};
use serde::Serialize;
use tracing::info;

use crate::context::Context;
use crate::output::print_json;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the config file location
    Path,
    /// Get a config value
    Get {
        /// Config key (e.g. "base_url", "auth.email", "log.level")
        key: String,
    },
    /// Set a config value and save the file
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// List all config values, secrets redacted
    List,
    /// Print the JSON Schema of the config file
    Schema {
        /// Spaces per indent level, 0 for a single line
        #[arg(short, long, default_value_t = 2)]
        indent: usize,
        /// Output file, `-` for stdout
        #[arg(short, long, default_value = "-")]
        file: String,
    },
}

pub fn run(action: ConfigAction, ctx: &Context) -> Result<(), Box<dyn Error>> {
    match action {
        ConfigAction::Path => println!("{}", ctx.config_path.display()),
        ConfigAction::Get { key } => match ctx.config.redacted().get(&key) {
            Some(value) => println!("{value}"),
            None => {
                eprintln!("unknown key: {key}");
                std::process::exit(1);
            }
        },
        ConfigAction::Set { key, value } => {
            // Environment overrides must not end up in the file.
            let mut config = Config::load_from(&ctx.config_path)?;
            config.set(&key, &value)?;
            config.save_to(&ctx.config_path)?;
            println!("ok");
        }
        ConfigAction::Schema { indent, file } => schema(indent, &file)?,
        ConfigAction::List => match ctx.output {
            OutputFormat::Json => print_json(&ctx.config.redacted())?,
            OutputFormat::Pretty => {
                for (key, value) in ctx.config.entries() {
                    println!("{key} = {value}");
                }
            }
        },
    }
    Ok(())
}

/// Writes the config schema; needs no loaded config.
pub fn schema(indent: usize, file: &str) -> Result<(), Box<dyn Error>> {
    let data = render_json(&Config::schema(), indent)?;
    if file == "-" {
        println!("{data}");
        return Ok(());
    }
    std::fs::write(Path::new(file), format!("{data}\n"))?;
    info!(file, "config schema written");
    Ok(())
}

fn render_json<T: Serialize>(value: &T, indent: usize) -> Result<String, serde_json::Error> {
    if indent == 0 {
        return serde_json::to_string(value);
    }
    let pad = " ".repeat(indent);
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(pad.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_with_requested_indent() {
        let value = serde_json::json!({ "a": [1] });
        assert_eq!(render_json(&value, 0).unwrap(), r#"{"a":[1]}"#);
        assert_eq!(render_json(&value, 4).unwrap(), "{\n    \"a\": [\n        1\n    ]\n}");
    }
}
