use std::error::Error;
use std::io::Read;

use clap::Args;
use punchcard_core::envelope::is_json_response;
use punchcard_core::{CoreError, RawResponse, Request, TransportError};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Method;

#[derive(Args)]
pub struct RawArgs {
    /// Path relative to the base address, query included
    path: String,
    /// HTTP method (default: POST with a body, otherwise GET)
    #[arg(short = 'X', long)]
    method: Option<String>,
    /// Send the body as JSON (validated before sending)
    #[arg(long)]
    json: bool,
    /// Request body; `@file` reads a file, `@-` reads stdin
    #[arg(short, long, conflicts_with = "form")]
    data: Option<String>,
    /// Form field, repeatable
    #[arg(short = 'F', long = "form", value_name = "KEY=VALUE")]
    form: Vec<String>,
    /// Extra header, repeatable
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE")]
    headers: Vec<String>,
}

pub fn run(args: RawArgs, ctx: &crate::context::Context) -> Result<(), Box<dyn Error>> {
    let request = build_request(&args)?;
    let session = ctx.session()?;
    match session.send(request) {
        Ok(response) => print_response(&response),
        Err(TransportError::Status(response)) => {
            print_response(&response)?;
            Err(CoreError::from(TransportError::Status(response)).into())
        }
        Err(e) => Err(CoreError::from(e).into()),
    }
}

fn build_request(args: &RawArgs) -> Result<Request, Box<dyn Error>> {
    let has_body = !args.form.is_empty() || args.data.is_some();
    let method = match &args.method {
        Some(method) => Method::from_bytes(method.to_ascii_uppercase().as_bytes())?,
        None if has_body => Method::POST,
        None => Method::GET,
    };
    let mut request = Request::new(method, args.path.clone());

    if !args.form.is_empty() {
        let pairs = args
            .form
            .iter()
            .map(|field| {
                field
                    .split_once('=')
                    .ok_or_else(|| format!("form field '{field}' is not KEY=VALUE"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        request = request.form(&pairs);
    } else if let Some(data) = &args.data {
        let body = read_body(data)?;
        request = if args.json {
            let value: serde_json::Value = serde_json::from_slice(&body)?;
            request.json(&value)?
        } else {
            request.raw_body(body)
        };
    } else if args.json {
        request = request.expect_json();
    }

    for header in &args.headers {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| format!("header '{header}' is not NAME: VALUE"))?;
        request = request.header(
            HeaderName::from_bytes(name.trim().as_bytes())?,
            HeaderValue::from_str(value.trim())?,
        );
    }
    Ok(request)
}

fn read_body(data: &str) -> Result<Vec<u8>, Box<dyn Error>> {
    match data.strip_prefix('@') {
        Some("-") => {
            let mut body = Vec::new();
            std::io::stdin().read_to_end(&mut body)?;
            Ok(body)
        }
        Some(path) => Ok(std::fs::read(path)?),
        None => Ok(data.as_bytes().to_vec()),
    }
}

fn print_response(response: &RawResponse) -> Result<(), Box<dyn Error>> {
    if is_json_response(response) {
        if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&response.body) {
            println!("{}", serde_json::to_string_pretty(&value)?);
            return Ok(());
        }
    }
    println!("{}", response.text());
    Ok(())
}
