use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use printfit_core::{
    analyze_with_telemetry, resolve_report_config, v1, Orientation, ReportConfig, TelemetrySink,
};
use printfit_image::{is_supported_image, probe_path};
use printfit_telemetry::sink_from_env;
use regex::Regex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

const FORMAT_ENV: &str = "PRINTFIT_FORMAT";

#[derive(Parser, Debug)]
#[command(name = "printfit", version, about = "Standard print size recommendations for images")]
struct Cli {
    #[command(subcommand)]
    command: TopLevelCommand,
}

#[derive(Subcommand, Debug)]
enum TopLevelCommand {
    /// Analyze raw pixel dimensions.
    Size(SizeArgs),
    /// Analyze one or more image files.
    #[command(name = "exec")]
    Exec(ExecArgs),
    /// Print the standard size catalog.
    Catalog(CatalogArgs),
}

#[derive(Args, Debug)]
struct ReportArgs {
    /// Output format: json or table (falls back to PRINTFIT_FORMAT, then json).
    #[arg(long, short = 'f', default_value = "")]
    format: String,
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pretty: bool,
}

#[derive(Args, Debug)]
struct SizeArgs {
    #[arg(long, short = 'W', allow_hyphen_values = true)]
    width: i64,
    #[arg(long, short = 'H', allow_hyphen_values = true)]
    height: i64,
    #[command(flatten)]
    report: ReportArgs,
}

#[derive(Args, Debug)]
struct ExecArgs {
    #[arg(long, short = 'i')]
    input: String,
    /// Root directory for regex input matching (defaults to current directory).
    #[arg(long, short = 'r')]
    input_root: Option<PathBuf>,
    /// Recurse when scanning directories / regex matches.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    recursive: bool,
    /// If set, abort the whole run on the first input error.
    #[arg(long, default_value_t = false, action = clap::ArgAction::SetTrue)]
    strict: bool,
    #[command(flatten)]
    report: ReportArgs,
}

#[derive(Args, Debug)]
struct CatalogArgs {
    #[arg(long, short = 'o')]
    orientation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportFormat {
    Json,
    Table,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let telemetry = sink_from_env();
    let telemetry_ref = telemetry.as_ref().map(|sink| sink.as_ref());

    match cli.command {
        TopLevelCommand::Size(args) => {
            let cfg = report_config(&args.report);
            let format = parse_format(&cfg.format)?;
            let analysis = analyze_with_telemetry(args.width, args.height, telemetry_ref)?;
            let response = v1::AnalyzeResponse::from(&analysis);
            match format {
                ReportFormat::Json => println!("{}", to_json(&serde_json::to_value(&response)?, cfg.pretty)?),
                ReportFormat::Table => print!("{}", render_table(&response)),
            }
        }
        TopLevelCommand::Exec(args) => run_exec(&args, telemetry_ref)?,
        TopLevelCommand::Catalog(args) => {
            let orientations = match args.orientation.as_deref() {
                Some(raw) => vec![parse_orientation(raw)?],
                None => Orientation::all().to_vec(),
            };
            let listing: Vec<_> = orientations
                .into_iter()
                .map(|orientation| {
                    serde_json::json!({
                        "orientation": orientation,
                        "sizes": orientation.catalog().iter().map(|s| s.label()).collect::<Vec<_>>(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
    }

    Ok(())
}

fn run_exec(args: &ExecArgs, telemetry: Option<&dyn TelemetrySink>) -> Result<()> {
    let cfg = report_config(&args.report);
    let format = parse_format(&cfg.format)?;
    let inputs = resolve_exec_inputs(args)?;
    if inputs.is_empty() {
        return Err(anyhow!("no input images matched"));
    }
    let bulk_mode = inputs.len() > 1;
    info!(files = inputs.len(), "Analyzing images");

    let mut results = Vec::with_capacity(inputs.len());
    let mut tables = String::new();
    for input_path in inputs {
        let analysis = probe_path(&input_path)
            .map_err(|err| anyhow!("failed to read dimensions of {}: {}", input_path.display(), err))
            .and_then(|size| {
                analyze_with_telemetry(i64::from(size.width), i64::from(size.height), telemetry)
                    .map_err(|err| anyhow!("{}: {}", input_path.display(), err))
            });
        let analysis = match analysis {
            Ok(analysis) => analysis,
            Err(err) => {
                if bulk_mode && !args.strict {
                    warn!(input = %input_path.display(), "Skipping input: {}", err);
                    results.push(serde_json::json!({
                        "input": input_path,
                        "error": err.to_string(),
                    }));
                    tables.push_str(&format!("{}\n  error: {}\n\n", input_path.display(), err));
                    continue;
                }
                return Err(err);
            }
        };
        let response = v1::AnalyzeResponse::from(&analysis);
        tables.push_str(&format!("{}\n{}\n", input_path.display(), render_table(&response)));
        results.push(serde_json::json!({
            "input": input_path,
            "analysis": response,
        }));
    }

    match format {
        ReportFormat::Json => println!(
            "{}",
            to_json(&serde_json::json!({ "results": results }), cfg.pretty)?
        ),
        ReportFormat::Table => print!("{}", tables),
    }
    Ok(())
}

fn report_config(args: &ReportArgs) -> ReportConfig {
    let format = if args.format.trim().is_empty() {
        std::env::var(FORMAT_ENV).unwrap_or_default()
    } else {
        args.format.clone()
    };
    resolve_report_config(ReportConfig {
        format,
        pretty: args.pretty,
    })
}

fn to_json(value: &serde_json::Value, pretty: bool) -> Result<String> {
    if pretty {
        Ok(serde_json::to_string_pretty(value)?)
    } else {
        Ok(serde_json::to_string(value)?)
    }
}

fn render_table(response: &v1::AnalyzeResponse) -> String {
    let mut out = format!(
        "Dimensions: {} × {} px\nOrientation: {}\nAspect Ratio: {}\n\n",
        response.width, response.height, response.orientation, response.aspect_ratio
    );
    out.push_str(&format!("{:<12}{:<10}{}\n", "Quality", "DPI", "Recommended Sizes (inches)"));
    for tier in &response.tiers {
        let sizes = if tier.sizes.is_empty() {
            "No standard sizes match".to_string()
        } else {
            tier.sizes.join(", ")
        };
        out.push_str(&format!(
            "{:<12}{:<10}{}\n",
            tier.quality,
            format!("{} DPI", tier.dpi),
            sizes
        ));
    }
    out
}

fn resolve_exec_inputs(args: &ExecArgs) -> Result<Vec<PathBuf>> {
    let candidate = PathBuf::from(&args.input);
    if candidate.exists() {
        if candidate.is_dir() {
            return collect_images(&candidate, args.recursive, None);
        }
        return Ok(vec![candidate]);
    }
    // Treat as regex matching file name under input_root.
    let root = args
        .input_root
        .clone()
        .unwrap_or(std::env::current_dir().map_err(|e| anyhow!(e.to_string()))?);
    let re = Regex::new(&args.input).map_err(|e| anyhow!("invalid regex: {}", e))?;
    collect_images(&root, args.recursive, Some(&re))
}

fn collect_images(root: &Path, recursive: bool, name_filter: Option<&Regex>) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let walker = if recursive {
        WalkDir::new(root)
    } else {
        WalkDir::new(root).max_depth(1)
    };
    for entry in walker.into_iter().filter_map(std::result::Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let p = entry.into_path();
        if !is_supported_image(&p) {
            continue;
        }
        if let Some(re) = name_filter {
            let name = p.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if !re.is_match(name) {
                continue;
            }
        }
        out.push(p);
    }
    out.sort();
    Ok(out)
}

fn parse_format(value: &str) -> Result<ReportFormat> {
    match value.to_ascii_lowercase().as_str() {
        "json" => Ok(ReportFormat::Json),
        "table" | "text" => Ok(ReportFormat::Table),
        other => Err(anyhow!("unknown format '{}'; expected one of: json, table", other)),
    }
}

fn parse_orientation(value: &str) -> Result<Orientation> {
    match value.to_ascii_lowercase().as_str() {
        "landscape" => Ok(Orientation::Landscape),
        "portrait" => Ok(Orientation::Portrait),
        "square" => Ok(Orientation::Square),
        other => Err(anyhow!(
            "unknown orientation '{}'; expected one of: landscape, portrait, square",
            other
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_marks_empty_tiers() {
        let response = v1::analyze_v1(&v1::AnalyzeRequest { width: 800, height: 800 }).expect("analyze");
        let table = render_table(&response);
        assert!(table.contains("Orientation: square"));
        assert!(table.contains("Excellent   300 DPI   No standard sizes match"));
        assert!(table.contains("Acceptable  100 DPI   8×8"));
    }

    #[test]
    fn parses_format_aliases() {
        assert_eq!(parse_format("JSON").expect("json"), ReportFormat::Json);
        assert_eq!(parse_format("text").expect("table"), ReportFormat::Table);
        assert!(parse_format("xml").is_err());
    }

    #[test]
    fn rejects_unknown_orientation() {
        let err = parse_orientation("diagonal").expect_err("should fail");
        assert!(err.to_string().contains("unknown orientation"));
    }
}
