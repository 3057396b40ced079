//! `avs-convert`: lower a binary or text preset into JSON.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};

use avs_engine::preset::{self, json};

struct Args {
    input: PathBuf,
    output: PathBuf,
}

fn print_usage(program: &str) {
    eprintln!(
        "Usage: {program} --input <preset-file> --output <json-file>\n\n\
         Convert AVS preset files to human-readable JSON.\n\n\
         Options:\n\
         \x20 --input  <file>   Input preset (.avs binary or micro-preset text)\n\
         \x20 --output <file>   Output JSON file\n\
         \x20 --help            Show this help message"
    );
}

fn parse_args() -> Result<Option<Args>, String> {
    let mut input = None;
    let mut output = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(None),
            "--input" => {
                input = Some(PathBuf::from(
                    args.next().ok_or("--input requires a value")?,
                ));
            }
            "--output" => {
                output = Some(PathBuf::from(
                    args.next().ok_or("--output requires a value")?,
                ));
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    match (input, output) {
        (Some(input), Some(output)) => Ok(Some(Args { input, output })),
        _ => Err("both --input and --output are required".to_string()),
    }
}

fn convert(args: &Args) -> Result<preset::ParsedPreset> {
    let data = std::fs::read(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let parsed = preset::parse_preset_bytes(&data);
    let serialized = json::preset_to_json_string(&parsed);
    std::fs::write(&args.output, serialized)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    Ok(parsed)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let program = std::env::args()
        .next()
        .unwrap_or_else(|| "avs-convert".to_string());
    let args = match parse_args() {
        Ok(Some(args)) => args,
        Ok(None) => {
            print_usage(&program);
            return ExitCode::SUCCESS;
        }
        Err(message) => {
            eprintln!("Error: {message}\n");
            print_usage(&program);
            return ExitCode::from(1);
        }
    };

    match convert(&args) {
        Ok(parsed) => {
            log::info!(
                "converted {} ({} effects, {} warnings)",
                args.input.display(),
                parsed.effects.len(),
                parsed.warnings.len()
            );
            if parsed.effects.is_empty() && !parsed.warnings.is_empty() {
                // Nothing usable came out of the file: treat as a parse
                // failure and surface the first warning.
                eprintln!("Error: {}", parsed.warnings[0]);
                return ExitCode::from(2);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}
