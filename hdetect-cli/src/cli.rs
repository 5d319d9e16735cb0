//! Argument parsing and command dispatch for `hd`.

use std::fs;
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use hdetect::output::{write_detection, write_json, write_markdown};
use hdetect::{
    BatchConfig, BuildSpec, DetectConfig, DetectError, Detection, DetectorList, Registry, Report,
    RuleFormat, Severity, ValidatorCache, detect, detect_batch, detect_text, load_custom_rules,
    make_schema_guard,
};
use serde_json::Value;

/// Exit status when no text was supplied and stdin is a terminal.
pub const EXIT_NO_INPUT: i32 = 64;

#[derive(Debug, Parser)]
#[command(
    name = "hd",
    version,
    about = "Heuristic detector for unsupported claims in LLM output"
)]
pub struct Cli {
    /// Raise log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    pub log_level: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run detectors over one text and print the aggregate result
    Detect(DetectArgs),
    /// Print detector names, one per line
    List(ListArgs),
    /// Run the default checks over many files and print a summary
    Report(ReportArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Floor {
    Warn,
    Block,
}

impl From<Floor> for Severity {
    fn from(floor: Floor) -> Self {
        match floor {
            Floor::Warn => Severity::Warn,
            Floor::Block => Severity::Block,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Json,
    Markdown,
}

#[derive(Debug, Args)]
pub struct DetectArgs {
    /// Text to inspect (wins over --file)
    #[arg(long)]
    pub text: Option<String>,

    /// Read the text from a file; `-` reads stdin
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Validate against this JSON Schema instead of running the registry
    #[arg(long)]
    pub schema: Option<PathBuf>,

    /// Severity reported by the schema guard on failure
    #[arg(long, value_enum, default_value_t = Floor::Block)]
    pub schema_severity: Floor,

    /// Detectors to run, in order (comma-separated, repeatable)
    #[arg(long, value_delimiter = ',')]
    pub include: Vec<String>,

    /// Detectors to drop (comma-separated, repeatable)
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Raise a detector's failures, e.g. `fact_check=block`
    #[arg(long, value_name = "NAME=LEVEL", value_delimiter = ',')]
    pub severity: Vec<String>,

    /// JSON or YAML file of regex rules appended after the detector list
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Replace the confidence keywords (comma-separated, repeatable)
    #[arg(long, value_delimiter = ',')]
    pub keywords: Vec<String>,

    /// Leave out the JSON well-formedness check
    #[arg(long)]
    pub skip_json: bool,

    /// Indent the JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Write input length and issues to stderr
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only list user-registered detectors
    #[arg(long)]
    pub user_only: bool,

    /// Register the rules in this file before listing
    #[arg(long)]
    pub rules: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = ReportFormat::Json)]
    pub format: ReportFormat,

    /// Leave out the JSON well-formedness check
    #[arg(long)]
    pub skip_json: bool,

    /// Extra rules file applied to every input
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Worker threads (defaults to the number of CPUs)
    #[arg(long)]
    pub jobs: Option<usize>,

    /// Files to inspect
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

/// Dispatch a parsed command line and return the process exit code.
///
/// # Errors
///
/// Returns an error on I/O failures, unreadable rule files and registry
/// contract violations.
pub fn run(cli: &Cli, out: &mut dyn Write, err: &mut dyn Write) -> Result<i32> {
    match &cli.command {
        Command::Detect(args) => run_detect(args, out, err),
        Command::List(args) => run_list(args, out),
        Command::Report(args) => run_report(args, out),
    }
}

/// 0 when ok, 2 when the aggregate blocks, 1 otherwise.
#[must_use]
pub fn exit_code(detection: &Detection) -> i32 {
    if detection.ok() {
        0
    } else if detection.severity() == Severity::Block {
        2
    } else {
        1
    }
}

/// Parse `name=level` overrides. Only `warn` and `block` raise anything, so
/// `info`, unknown levels and entries without a name are logged and skipped.
#[must_use]
pub fn parse_severity_overrides<S: AsRef<str>>(entries: &[S]) -> Vec<(String, Severity)> {
    let mut overrides = Vec::new();
    for entry in entries {
        let entry = entry.as_ref();
        let parsed = entry.split_once('=').and_then(|(name, level)| {
            let name = name.trim();
            let severity = level.parse::<Severity>().ok()?;
            (!name.is_empty() && severity > Severity::Info).then(|| (name.to_owned(), severity))
        });
        if let Some(o) = parsed {
            overrides.push(o);
        } else {
            tracing::warn!(entry, "ignoring malformed severity override");
        }
    }
    overrides
}

/// Translate the registry flags of `hd detect` into a [`BuildSpec`].
#[must_use]
pub fn build_spec(args: &DetectArgs) -> BuildSpec {
    let mut spec = BuildSpec::new().exclude(clean_list(&args.exclude));
    let include = clean_list(&args.include);
    if !include.is_empty() {
        spec = spec.include(include);
    }
    for (name, severity) in parse_severity_overrides(&args.severity) {
        spec = spec.override_severity(name, severity);
    }
    spec
}

/// Load a rules file, picking the format from its extension.
///
/// # Errors
///
/// Returns an error if the extension is unknown, the file cannot be read or
/// the rules are malformed.
pub fn load_rules(path: &Path) -> Result<DetectorList> {
    let format = RuleFormat::from_path(path)?;
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read rules file {}", path.display()))?;
    let rules = load_custom_rules(&source, format)
        .with_context(|| format!("invalid rules file {}", path.display()))?;
    tracing::info!(path = %path.display(), count = rules.len(), "loaded custom rules");
    Ok(rules)
}

fn clean_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .collect()
}

fn read_stdin(stdin: &mut dyn Read) -> Result<String> {
    let mut buf = String::new();
    stdin
        .read_to_string(&mut buf)
        .context("failed to read stdin")?;
    Ok(buf)
}

/// `--text`, then `--file` (`-` is stdin), then stdin unless it is a terminal.
fn read_input(
    args: &DetectArgs,
    stdin: &mut dyn Read,
    stdin_is_terminal: bool,
) -> Result<Option<String>> {
    if let Some(text) = &args.text {
        return Ok(Some(text.clone()));
    }
    match &args.file {
        Some(path) if path.as_os_str() == "-" => read_stdin(stdin).map(Some),
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))
            .map(Some),
        None if !stdin_is_terminal => read_stdin(stdin).map(Some),
        None => Ok(None),
    }
}

fn load_schema(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read schema {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse schema {}", path.display()))
}

fn detect_with_schema(text: &str, path: &Path, severity: Severity) -> Detection {
    let schema = match load_schema(path) {
        Ok(schema) => schema,
        Err(e) => {
            tracing::warn!(error = %e, "cannot load schema");
            return Detection::fail(["invalid_schema"], Severity::Block);
        }
    };
    match make_schema_guard(&ValidatorCache::new(), &schema, severity) {
        Ok(guard) => detect_text(text, &[guard]),
        Err(DetectError::SchemaUnavailable) => {
            Detection::fail(["schema_validation_unavailable"], Severity::Warn)
        }
        Err(e) => {
            tracing::warn!(error = %e, "rejecting schema");
            Detection::fail(["invalid_schema"], Severity::Block)
        }
    }
}

fn detect_with_registry(text: &str, args: &DetectArgs) -> Result<Detection> {
    let registry = Registry::new();
    let keywords = clean_list(&args.keywords);
    if !keywords.is_empty() {
        registry.set_confidence_keywords(&keywords);
    }

    let mut config = DetectConfig::default();
    config.skip_json = args.skip_json;
    config.build = build_spec(args);
    if let Some(path) = &args.rules {
        config.extra = load_rules(path)?;
    }
    Ok(detect(&registry, text, &config))
}

fn write_summary(text: &str, detection: &Detection, err: &mut dyn Write) -> io::Result<()> {
    writeln!(err, "{} {} chars", "input:".bold(), text.chars().count())?;
    if detection.ok() {
        return writeln!(err, "{}", "no issues found".green());
    }
    let label = match detection.severity() {
        Severity::Block => "block".red().bold(),
        Severity::Warn => "warn".yellow().bold(),
        Severity::Info => "info".cyan(),
    };
    writeln!(
        err,
        "{} {} ({label})",
        "issues:".bold(),
        detection.reasons().len()
    )?;
    for reason in detection.reasons() {
        writeln!(err, "  - {reason}")?;
    }
    Ok(())
}

fn run_detect(args: &DetectArgs, out: &mut dyn Write, err: &mut dyn Write) -> Result<i32> {
    let stdin = io::stdin();
    let is_terminal = stdin.is_terminal();
    let input = read_input(args, &mut stdin.lock(), is_terminal)?;
    detect_input(args, input, out, err)
}

fn detect_input(
    args: &DetectArgs,
    input: Option<String>,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<i32> {
    let Some(text) = input else {
        writeln!(err, "no input: pass --text, --file or pipe text on stdin")?;
        return Ok(EXIT_NO_INPUT);
    };

    let detection = match &args.schema {
        Some(path) => detect_with_schema(&text, path, args.schema_severity.into()),
        None => detect_with_registry(&text, args)?,
    };

    write_detection(&detection, args.pretty, out)?;
    if args.verbose {
        write_summary(&text, &detection, err)?;
    }
    Ok(exit_code(&detection))
}

fn run_list(args: &ListArgs, out: &mut dyn Write) -> Result<i32> {
    let registry = Registry::new();
    if let Some(path) = &args.rules {
        for rule in load_rules(path)? {
            let name = rule.name().to_owned();
            registry.register(&name, rule)?;
        }
    }
    for name in registry.list(!args.user_only) {
        writeln!(out, "{name}")?;
    }
    Ok(0)
}

fn run_report(args: &ReportArgs, out: &mut dyn Write) -> Result<i32> {
    let texts = args
        .files
        .iter()
        .map(|path| {
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut config = DetectConfig::default();
    config.skip_json = args.skip_json;
    if let Some(path) = &args.rules {
        config.extra = load_rules(path)?;
    }
    let checks = config.checks(&Registry::new());

    let mut batch = BatchConfig::default();
    batch.workers = args.jobs;
    let results = detect_batch(texts.as_slice(), &checks, &batch)?;
    let report = Report::from_detections(&results);

    match args.format {
        ReportFormat::Json => write_json(&report, out)?,
        ReportFormat::Markdown => write_markdown(&report, out)?,
    }
    Ok(if report.block > 0 {
        2
    } else {
        i32::from(!report.all_ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(args: &[&str]) -> (i32, String, String) {
        let cli = Cli::try_parse_from(std::iter::once("hd").chain(args.iter().copied())).unwrap();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = run(&cli, &mut out, &mut err).unwrap();
        (
            code,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    fn parse_detect(args: &[&str]) -> DetectArgs {
        let cli =
            Cli::try_parse_from(["hd", "detect"].into_iter().chain(args.iter().copied())).unwrap();
        let Command::Detect(args) = cli.command else {
            panic!("expected the detect subcommand");
        };
        args
    }

    #[test]
    fn test_terminal_stdin_without_flags_is_no_input() {
        let args = parse_detect(&[]);
        assert_eq!(read_input(&args, &mut io::empty(), true).unwrap(), None);

        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = detect_input(&args, None, &mut out, &mut err).unwrap();
        assert_eq!(code, EXIT_NO_INPUT);
        assert!(out.is_empty());
        assert!(String::from_utf8(err).unwrap().starts_with("no input"));
    }

    #[test]
    fn test_input_precedence() {
        let piped = parse_detect(&[]);
        let read = read_input(&piped, &mut "from pipe".as_bytes(), false).unwrap();
        assert_eq!(read.as_deref(), Some("from pipe"));

        let dash = parse_detect(&["--file", "-"]);
        let read = read_input(&dash, &mut "dash".as_bytes(), true).unwrap();
        assert_eq!(read.as_deref(), Some("dash"));

        let text = parse_detect(&["--text", "inline", "--file", "-"]);
        let read = read_input(&text, &mut "ignored".as_bytes(), false).unwrap();
        assert_eq!(read.as_deref(), Some("inline"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&Detection::pass()), 0);
        assert_eq!(exit_code(&Detection::fail(["x"], Severity::Info)), 1);
        assert_eq!(exit_code(&Detection::fail(["x"], Severity::Warn)), 1);
        assert_eq!(exit_code(&Detection::fail(["x"], Severity::Block)), 2);
    }

    #[test]
    fn test_severity_overrides_skip_malformed() {
        let parsed = parse_severity_overrides(&[
            "fact_check=block",
            " json = WARN ",
            "numeric_claims=info",
            "overconfidence=fatal",
            "no_equals",
            "=block",
        ]);
        assert_eq!(
            parsed,
            vec![
                ("fact_check".to_owned(), Severity::Block),
                ("json".to_owned(), Severity::Warn),
            ]
        );
    }

    #[test]
    fn test_build_spec_from_flags() {
        let args = parse_detect(&[
            "--text",
            "x",
            "--include",
            "json, fact_check,,",
            "--include",
            "overconfidence",
            "--exclude",
            "fact_check",
            "--severity",
            "overconfidence=block,bogus",
        ]);
        let spec = build_spec(&args);
        assert_eq!(
            spec.include,
            Some(vec![
                "json".to_owned(),
                "fact_check".to_owned(),
                "overconfidence".to_owned()
            ])
        );
        assert_eq!(spec.exclude, vec!["fact_check".to_owned()]);
        assert_eq!(
            spec.severity_overrides.get("overconfidence"),
            Some(&Severity::Block)
        );
        assert_eq!(spec.severity_overrides.len(), 1);
    }

    #[test]
    fn test_build_spec_empty_without_flags() {
        assert!(build_spec(&parse_detect(&["--text", "x"])).is_empty());
    }

    #[test]
    fn test_detect_text_flag() {
        let (code, out, _) = run_args(&["detect", "--text", r#"{"msg":"This is definitely true."}"#]);
        assert_eq!(code, 1);
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["ok"], false);
        assert_eq!(value["reasons"][0], "overconfident_no_citations");
        assert_eq!(value["severity"], "warn");
    }

    #[test]
    fn test_detect_ok_and_block() {
        let (code, out, _) = run_args(&["detect", "--text", r#"{"a":1}"#]);
        assert_eq!(code, 0);
        assert_eq!(out, "{\"ok\":true,\"reasons\":[],\"severity\":\"info\"}\n");

        let (code, _, _) = run_args(&["detect", "--text", "not json definitely 95%"]);
        assert_eq!(code, 2);
    }

    #[test]
    fn test_detect_skip_json_and_keywords() {
        let (code, _, _) = run_args(&["detect", "--skip-json", "--text", "plain words"]);
        assert_eq!(code, 0);

        let (code, out, _) = run_args(&[
            "detect",
            "--skip-json",
            "--keywords",
            "surely",
            "--text",
            "this is surely fine",
        ]);
        assert_eq!(code, 1);
        assert!(out.contains("overconfident_no_citations"));
    }

    #[test]
    fn test_detect_override_escalates() {
        let (code, out, _) = run_args(&[
            "detect",
            "--skip-json",
            "--severity",
            "logical_fallacies=block",
            "--text",
            "Everyone knows that.",
        ]);
        assert_eq!(code, 2);
        assert!(out.contains("possible_logical_fallacy"));
    }

    #[test]
    fn test_verbose_summary_goes_to_stderr() {
        let (_, out, err) = run_args(&["detect", "--verbose", "--text", "not json"]);
        assert!(!out.contains("input:"));
        assert!(err.contains("input:"));
        assert!(err.contains("8 chars"));
        assert!(err.contains("invalid_json"));
    }

    #[test]
    fn test_list_builtins() {
        let (code, out, _) = run_args(&["list"]);
        assert_eq!(code, 0);
        let names: Vec<&str> = out.lines().collect();
        assert_eq!(names, hdetect::BUILTIN_ORDER);

        let (_, out, _) = run_args(&["list", "--user-only"]);
        assert!(out.is_empty());
    }
}
