//! CLI: check | match | infer | fmt
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::Value;

use fbp_types::{Fragment, GenericsMap, Inference, MatchContext, check, matches, parse, path_de};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// check JSON values against flow-based-programming type expressions, match types against each other, infer types from samples
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// check every input document against a type expression
    Check(CheckArgs),
    /// test whether a received type satisfies a receiving type
    Match(MatchArgs),
    /// infer one type expression covering all input documents
    Infer(InferOut),
    /// parse a type expression and print its canonical form
    Fmt(FmtArgs),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document.
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns or '-' for stdin
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct CheckArgs {
    #[command(flatten)]
    input_settings: InputSettings,

    /// type expression every document must conform to
    #[arg(long = "type", short = 't')]
    type_expr: String,

    /// JSON object of generic bindings, e.g. {"T": "int | string"}
    #[arg(long)]
    generics: Option<PathBuf>,

    /// only report failing documents
    #[arg(long, short)]
    quiet: bool,
}

#[derive(clap::Parser, Debug)]
struct MatchArgs {
    /// declared (receiving) type
    #[arg(long)]
    receiving: String,

    /// candidate (received) type
    #[arg(long)]
    received: String,

    /// bind receiving generics to what they receive and print the bindings
    #[arg(long)]
    resolve: bool,

    /// JSON object of initial generic bindings
    #[arg(long)]
    generics: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct InferOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// emit the fragment tree as JSON instead of a type expression
    #[arg(long)]
    json: bool,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct FmtArgs {
    /// type expression
    type_expr: String,

    /// emit the fragment tree as JSON instead of a type expression
    #[arg(long)]
    json: bool,
}

/// One value to check, labelled by where it came from.
struct Document {
    label: String,
    value: Value,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load(&self) -> Result<Vec<Document>> {
        let source_paths = resolve_file_path_patterns(&self.input)
            .context("failed to resolve input file paths")?;
        let mut out = Vec::new();
        for source_path in source_paths {
            let (label, source) = read_source(&source_path)?;
            if self.ndjson {
                for (line_no, line) in source.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let label = format!("{label}:{}", line_no + 1);
                    let value = serde_json::from_str::<Value>(line)
                        .with_context(|| format!("failed to parse NDJSON line ({label})"))?;
                    self.select(label, value, &mut out)?;
                }
            } else {
                let value = serde_json::from_str::<Value>(&source)
                    .with_context(|| format!("failed to parse JSON source file ({label})"))?;
                self.select(label, value, &mut out)?;
            }
        }
        Ok(out)
    }

    /// Apply `--json-pointer` then `--jq-expr` to one document.
    fn select(&self, label: String, value: Value, out: &mut Vec<Document>) -> Result<()> {
        let value = match self.json_pointer.as_deref() {
            None => value,
            Some(pointer) => match value.pointer(pointer) {
                Some(node) => node.clone(),
                None => bail!("JSON pointer {pointer} selects nothing in {label}"),
            },
        };
        match self.jq_expr.as_deref() {
            None => out.push(Document { label, value }),
            Some(jq_expr) => {
                let results = crate::jq_exec::run_jaq(jq_expr, &value).with_context(|| {
                    format!("failed to apply jq expression to source file ({label})")
                })?;
                let multiple = results.len() > 1;
                for (i, value) in results.into_iter().enumerate() {
                    let label = if multiple { format!("{label}#{i}") } else { label.clone() };
                    out.push(Document { label, value });
                }
            }
        }
        Ok(())
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<ExitCode> {
        match &self.cmd {
            Command::Check(target) => {
                let fragment = parse_type(&target.type_expr)?;
                let generics = target.generics.as_deref().map(load_generics).transpose()?;
                let documents = target.input_settings.load()?;

                // fragments and bindings are read-only here, so documents check independently
                let results: Vec<bool> = documents
                    .par_iter()
                    .map(|doc| check(&fragment, Some(&doc.value), generics.as_ref(), None))
                    .collect();

                let mut failed = 0usize;
                for (doc, ok) in documents.iter().zip(results) {
                    if ok {
                        if !target.quiet {
                            println!("{} {}", "pass".green(), doc.label);
                        }
                    } else {
                        failed += 1;
                        println!("{} {}", "fail".red().bold(), doc.label);
                    }
                }
                eprintln!("{} of {} documents conform to {fragment}", documents.len() - failed, documents.len());
                Ok(if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
            }
            Command::Match(target) => {
                let receiving = parse_type(&target.receiving)?;
                let received = parse_type(&target.received)?;
                let mut generics = match target.generics.as_deref() {
                    Some(path) => load_generics(path)?,
                    None => GenericsMap::new(),
                };
                let context = if target.resolve { MatchContext::resolving() } else { MatchContext::default() };

                let ok = matches(&receiving, &received, Some(&mut generics), context);
                let verdict = if ok { "true".green() } else { "false".red() };
                println!("{verdict}");
                if target.resolve {
                    for (name, binding) in &generics {
                        println!("{name} = {binding}");
                    }
                }
                Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
            }
            Command::Infer(target) => {
                let mut inference = Inference::new();
                for doc in target.input_settings.load()? {
                    inference.observe_value(&doc.value);
                }
                let Some(fragment) = inference.solve() else {
                    bail!("no input documents");
                };
                let rendered = render(&fragment, target.json)?;
                write_output(target.out.as_deref(), &rendered)?;
                Ok(ExitCode::SUCCESS)
            }
            Command::Fmt(target) => {
                let fragment = parse_type(&target.type_expr)?;
                println!("{}", render(&fragment, target.json)?);
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn parse_type(src: &str) -> Result<Fragment> {
    parse(src).with_context(|| format!("invalid type expression `{src}`"))
}

fn load_generics(path: &Path) -> Result<GenericsMap> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read generics file {}", path.display()))?;
    path_de::generics_from_str(&source)
        .with_context(|| format!("invalid generics file {}", path.display()))
}

fn render(fragment: &Fragment, json: bool) -> Result<String> {
    if json {
        Ok(serde_json::to_string_pretty(fragment)?)
    } else {
        Ok(fragment.to_string())
    }
}

fn write_output(out: Option<&Path>, text: &str) -> Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, text).with_context(|| format!("failed to write {}", out.display()))
        }
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

fn read_source(path: &Path) -> Result<(String, String)> {
    if path == Path::new("-") {
        let mut source = String::new();
        std::io::stdin().read_to_string(&mut source).context("failed to read stdin")?;
        return Ok(("<stdin>".to_string(), source));
    }
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read source file {}", path.display()))?;
    Ok((path.to_string_lossy().to_string(), source))
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{' ))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            // Literal path, or '-' for stdin
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
