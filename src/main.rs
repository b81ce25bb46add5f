use clap::{ArgAction, Args, ColorChoice, CommandFactory, FromArgMatches, Parser, Subcommand};
use colored::Colorize;
use roomsense::aggregate::Aggregator;
use roomsense::config::CliConfig;
use roomsense::detectors::{
    DetectError, DetectRequest, Detector, SidecarDetector, model_detector,
};
use roomsense::engine::DetectionEngine;
use roomsense::labels::LabelTable;
use roomsense::schema::Report;
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Log filter override, e.g. `ROOMSENSE_LOG=roomsense=debug`.
const LOG_ENV: &str = "ROOMSENSE_LOG";

#[derive(Parser)]
#[command(
    name = "roomsense",
    about = "Detect furniture in a room photo and list what to shop for",
    version,
    arg_required_else_help = true
)]
struct Cli {
    /// Disable color
    #[arg(long = "no-color", global = true)]
    no_color: bool,

    /// Log more to stderr (repeat for more detail)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect furniture in an image and print a JSON summary
    Detect(DetectArgs),
    /// Show the label table in use
    Labels(LabelsArgs),
    /// Print the JSON Schema of the detect output
    Schema,
}

#[derive(Args, Clone)]
struct DetectArgs {
    /// Path to image file
    #[arg(long, value_name = "PATH")]
    image: PathBuf,

    /// Confidence threshold (default 0.30)
    #[arg(long, value_name = "CONF")]
    conf: Option<String>,

    /// Read detections from a JSON file instead of running a model
    #[arg(long, value_name = "FILE")]
    detections: Option<PathBuf>,

    /// ONNX model to run
    #[arg(long, value_name = "FILE", conflicts_with = "detections")]
    model: Option<PathBuf>,

    /// Maximum number of objects listed (default 8)
    #[arg(long, value_name = "N")]
    max_objects: Option<usize>,

    /// Include bounding boxes of relevant detections
    #[arg(long)]
    boxes: bool,

    /// Include layout suggestions
    #[arg(long)]
    layout: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Args, Clone)]
struct LabelsArgs {
    /// Output JSON
    #[arg(long)]
    json: bool,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

/// Lenient threshold parsing: anything that is not a finite number falls
/// back to `default`.
fn parse_threshold(raw: Option<&str>, default: f64) -> f64 {
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => {
            tracing::warn!(value = raw, default, "invalid confidence threshold, using default");
            default
        }
    }
}

fn build_detector(args: &DetectArgs, config: &CliConfig) -> Result<Box<dyn Detector>, DetectError> {
    if let Some(path) = &args.detections {
        return Ok(Box::new(SidecarDetector::new(path)));
    }
    let model = args
        .model
        .clone()
        .unwrap_or_else(|| config.detection.model.clone());
    model_detector(&model)
}

fn detect_report(args: &DetectArgs) -> (Report, bool) {
    let config = match CliConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return (Report::failure(e.to_string()), args.pretty),
    };
    let pretty = args.pretty || config.output.pretty;

    let threshold = parse_threshold(args.conf.as_deref(), config.detection.confidence_threshold);
    let request = DetectRequest::new(&args.image).with_confidence_threshold(threshold);

    if !request.image.exists() {
        let err = DetectError::ImageNotFound(request.image.clone());
        return (Report::failure(err.to_string()), pretty);
    }

    let detector = match build_detector(args, &config) {
        Ok(detector) => detector,
        Err(e) => {
            tracing::warn!(error = %e, "cannot build detector");
            return (Report::failure(e.to_string()), pretty);
        }
    };

    let aggregator = Aggregator::new(config.label_table())
        .with_max_objects(args.max_objects.unwrap_or(config.detection.max_objects));
    let engine = DetectionEngine::from_boxed(detector, aggregator)
        .with_boxes(args.boxes || config.detection.boxes)
        .with_layout(args.layout || config.detection.layout);

    (engine.run(&request), pretty)
}

/// Always prints one JSON record; failures are reported through `error`.
fn run_detect(args: DetectArgs) {
    let (report, pretty) = detect_report(&args);
    let rendered = if pretty {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    };
    match rendered {
        Ok(s) => println!("{}", s),
        Err(e) => println!(
            "{}",
            json!({"objects": [], "raw": [], "conf": {}, "error": e.to_string()})
        ),
    }
}

fn render_labels(table: &LabelTable, color: bool) -> String {
    let heading = |s: &str| {
        if color {
            s.bold().cyan().to_string()
        } else {
            s.to_string()
        }
    };

    let mut out = heading("Needs:");
    for (label, need) in table.needs() {
        out.push_str("\n  ");
        out.push_str(label);
        out.push_str(" -> ");
        if color {
            out.push_str(&need.green().to_string());
        } else {
            out.push_str(need);
        }
    }

    let unmapped: Vec<&str> = table
        .relevant_labels()
        .filter(|l| table.need_for(l).is_none())
        .collect();
    if !unmapped.is_empty() {
        out.push('\n');
        out.push_str(&heading("Relevant (no need):"));
        for label in unmapped {
            out.push_str("\n  ");
            out.push_str(label);
        }
    }
    out
}

fn run_labels(args: LabelsArgs, color: ColorChoice) -> anyhow::Result<()> {
    let config = CliConfig::load(args.config.as_deref())?;
    let table = config.label_table();

    if args.json {
        let needs: serde_json::Map<String, serde_json::Value> = table
            .needs()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect();
        let relevant: Vec<&str> = table.relevant_labels().collect();
        let v = json!({ "relevant": relevant, "needs": needs });
        println!("{}", serde_json::to_string_pretty(&v)?);
    } else {
        let want_color = !matches!(color, ColorChoice::Never)
            && supports_color::on(supports_color::Stream::Stdout).is_some();
        println!("{}", render_labels(&table, want_color));
    }
    Ok(())
}

fn run_schema() -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&Report::json_schema())?);
    Ok(())
}

fn detect_color_choice() -> ColorChoice {
    // Scan args before clap so help/errors honor `--no-color`.
    // Mirror clap's parsing by stopping at `--` which terminates flags.
    let mut args = std::env::args_os();
    args.next();
    let flag = args
        .take_while(|arg| arg != "--")
        .any(|arg| arg == "--no-color");
    if flag || std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty()) {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    // stdout carries the JSON payload, so logs go to stderr.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    let color = detect_color_choice();
    if matches!(color, ColorChoice::Never) {
        colored::control::set_override(false);
    }
    let matches = Cli::command().color(color).get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
    init_tracing(cli.verbose);

    let result = match cli.command {
        Some(Commands::Detect(args)) => {
            run_detect(args);
            Ok(())
        }
        Some(Commands::Labels(args)) => run_labels(args, color),
        Some(Commands::Schema) => run_schema(),
        None => Ok(()),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_parsing_is_lenient() {
        assert_eq!(parse_threshold(None, 0.3), 0.3);
        assert_eq!(parse_threshold(Some("0.5"), 0.3), 0.5);
        assert_eq!(parse_threshold(Some(" 0.45 "), 0.3), 0.45);
        assert_eq!(parse_threshold(Some("high"), 0.3), 0.3);
        assert_eq!(parse_threshold(Some("NaN"), 0.3), 0.3);
        assert_eq!(parse_threshold(Some("inf"), 0.3), 0.3);
    }

    #[test]
    fn labels_render_plain() {
        let table = LabelTable::new(["couch", "rug"], [("couch", "sofa")]);
        assert_eq!(
            render_labels(&table, false),
            "Needs:\n  couch -> sofa\nRelevant (no need):\n  rug"
        );
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
