//! formbind CLI - decode input files against a YAML shape

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use http::header::CONTENT_TYPE;
use http::Request;
use tracing::info;
use tracing_subscriber::EnvFilter;

use formbind::{DecodeError, FixSuggestion, ShapeError, ShapeFile};

#[derive(Parser)]
#[command(name = "formbind")]
#[command(about = "Bind form, query, JSON and XML input onto a typed record")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode input against a shape file and print the record as JSON
    Decode {
        /// Path to the YAML shape file
        #[arg(short, long)]
        shape: PathBuf,

        /// Input file (reads stdin when omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// How to interpret the input
        #[arg(short, long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },

    /// Validate a shape file and print its binding table
    Inspect {
        /// Path to the YAML shape file
        #[arg(short, long)]
        shape: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    /// POST with an application/json body
    Json,
    /// POST with an application/xml body
    Xml,
    /// POST with a URL-encoded form body
    Form,
    /// GET with the input as query string
    Query,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("FORMBIND_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Decode {
            shape,
            input,
            format,
        } => decode(&shape, input.as_deref(), format),
        Commands::Inspect { shape } => inspect(&shape),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        if let Some(suggestion) = fix_suggestion(&e) {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn fix_suggestion(err: &anyhow::Error) -> Option<&str> {
    if let Some(e) = err.downcast_ref::<DecodeError>() {
        return e.fix_suggestion();
    }
    err.downcast_ref::<ShapeError>()
        .and_then(FixSuggestion::fix_suggestion)
}

fn load_shape(path: &Path) -> Result<ShapeFile> {
    let yaml = fs::read_to_string(path)
        .with_context(|| format!("cannot read shape file '{}'", path.display()))?;
    Ok(ShapeFile::from_yaml(&yaml)?)
}

fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(p) => fs::read(p).with_context(|| format!("cannot read input '{}'", p.display())),
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("cannot read stdin")?;
            Ok(buf)
        }
    }
}

fn build_request(format: Format, body: Vec<u8>) -> Result<Request<Bytes>> {
    let request = match format {
        Format::Json => Request::post("/")
            .header(CONTENT_TYPE, "application/json")
            .body(Bytes::from(body)),
        Format::Xml => Request::post("/")
            .header(CONTENT_TYPE, "application/xml")
            .body(Bytes::from(body)),
        Format::Form => Request::post("/")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Bytes::from(body)),
        Format::Query => {
            let text = String::from_utf8(body).context("query input is not UTF-8")?;
            let query = text.trim().trim_start_matches('?');
            Request::get(format!("/?{query}")).body(Bytes::new())
        }
    };
    request.context("cannot build request from input")
}

fn decode(shape_path: &Path, input: Option<&Path>, format: Format) -> Result<()> {
    let shape = load_shape(shape_path)?;
    let decoder = shape.decoder()?;
    let request = build_request(format, read_input(input)?)?;

    let mut record = shape.new_record();
    decoder.decode(&mut record, &request)?;
    info!(fields = record.len(), ?format, "decoded record");

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn inspect(shape_path: &Path) -> Result<()> {
    let shape = load_shape(shape_path)?;
    let decoder = shape.decoder()?;

    println!(
        "{} Shape '{}' is valid",
        "✓".green(),
        shape_path.display()
    );
    println!("  Fields: {}", decoder.len());
    for binding in decoder.bindings() {
        let required = if binding.required {
            "required".yellow().to_string()
        } else {
            "optional".dimmed().to_string()
        };
        println!(
            "  {:<16} {:<8} {} ({})",
            binding.key.cyan(),
            binding.kind.to_string(),
            required,
            binding.name
        );
    }
    Ok(())
}
