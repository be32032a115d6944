//! Runs JSON fixture suites against `fbp_types`.
//!
//! ```text
//! dev-test-runner [--filter REGEX] [SUITE.json ...]
//! ```
//!
//! Without suite paths every `*.json` under the workspace `fixtures/` directory is run.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use fbp_types::{Fragment, GenericsMap, MatchContext, check, matches, parse, path_de};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Suite {
    #[serde(default)]
    check: Vec<CheckCase>,
    #[serde(default, rename = "match")]
    matching: Vec<MatchCase>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CheckCase {
    name: Option<String>,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    value: Value,
    /// check the absent value instead of `value`
    #[serde(default)]
    absent: bool,
    #[serde(default)]
    generics: BTreeMap<String, String>,
    expect: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MatchCase {
    name: Option<String>,
    receiving: String,
    received: String,
    #[serde(default)]
    resolve: bool,
    #[serde(default)]
    generics: BTreeMap<String, String>,
    /// expected bindings after the match
    bindings: Option<BTreeMap<String, String>>,
    expect: bool,
}

/// run JSON fixture suites against fbp-types
#[derive(Parser, Debug)]
struct Args {
    /// only run cases whose label matches this regular expression
    #[arg(long)]
    filter: Option<String>,

    /// fixture suites (every `fixtures/*.json` if omitted)
    suites: Vec<PathBuf>,
}

#[derive(Default)]
struct Tally {
    passed: usize,
    failed: usize,
    skipped: usize,
}

// ————————————————————————————————————————————————————————————————————————————
// ENTRY
// ————————————————————————————————————————————————————————————————————————————

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let filter = args.filter.as_deref().map(Regex::new).transpose().context("invalid --filter")?;
    let suites = if args.suites.is_empty() { default_suites()? } else { args.suites };
    let mut tally = Tally::default();

    for path in &suites {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read suite {}", path.display()))?;
        let suite: Suite = path_de::from_str_with_path(&source)
            .with_context(|| format!("invalid suite {}", path.display()))?;
        println!("# {}", path.display());
        suite.run(filter.as_ref(), &mut tally)?;
    }

    println!(
        "\n{} passed, {} failed, {} filtered out",
        tally.passed, tally.failed, tally.skipped
    );
    Ok(if tally.failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Suite {
    fn run(&self, filter: Option<&Regex>, tally: &mut Tally) -> Result<()> {
        for case in &self.check {
            let label = case.label();
            if !selected(filter, &label) {
                tally.skipped += 1;
                continue;
            }
            report(&label, case.run()?, tally);
        }
        for case in &self.matching {
            let label = case.label();
            if !selected(filter, &label) {
                tally.skipped += 1;
                continue;
            }
            report(&label, case.run()?, tally);
        }
        Ok(())
    }
}

impl CheckCase {
    fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None if self.absent => format!("check {} <- (absent)", self.ty),
            None => format!("check {} <- {}", self.ty, self.value),
        }
    }

    /// `Err` only for malformed fixtures; `Ok(Some(..))` describes a failed expectation.
    fn run(&self) -> Result<Option<String>> {
        let fragment = parse_fixture_type(&self.ty)?;
        let generics = parse_generics(&self.generics)?;
        let value = (!self.absent).then_some(&self.value);
        let got = check(&fragment, value, Some(&generics), None);
        Ok((got != self.expect).then(|| format!("expected {}, got {got}", self.expect)))
    }
}

impl MatchCase {
    fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("match {} <- {}", self.receiving, self.received),
        }
    }

    fn run(&self) -> Result<Option<String>> {
        let receiving = parse_fixture_type(&self.receiving)?;
        let received = parse_fixture_type(&self.received)?;
        let mut generics = parse_generics(&self.generics)?;
        let context = if self.resolve { MatchContext::resolving() } else { MatchContext::default() };

        let got = matches(&receiving, &received, Some(&mut generics), context);
        if got != self.expect {
            return Ok(Some(format!("expected {}, got {got}", self.expect)));
        }
        let Some(expected) = &self.bindings else {
            return Ok(None);
        };
        let expected = parse_generics(expected)?;
        if expected.len() != generics.len() {
            return Ok(Some(format!("expected {} bindings, got {}", expected.len(), generics.len())));
        }
        for (name, want) in &expected {
            match generics.get(name) {
                Some(have) if have == want => {}
                Some(have) => return Ok(Some(format!("{name} bound to {have}, expected {want}"))),
                None => return Ok(Some(format!("{name} left unbound"))),
            }
        }
        Ok(None)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn selected(filter: Option<&Regex>, label: &str) -> bool {
    filter.is_none_or(|re| re.is_match(label))
}

fn report(label: &str, failure: Option<String>, tally: &mut Tally) {
    match failure {
        None => {
            tally.passed += 1;
            println!("ok   {label}");
        }
        Some(reason) => {
            tally.failed += 1;
            println!("FAIL {label}: {reason}");
        }
    }
}

fn parse_fixture_type(src: &str) -> Result<Fragment> {
    parse(src).with_context(|| format!("fixture type `{src}` does not parse"))
}

fn parse_generics(raw: &BTreeMap<String, String>) -> Result<GenericsMap> {
    raw.iter()
        .map(|(name, src)| Ok((name.clone(), parse_fixture_type(src)?)))
        .collect()
}

fn default_suites() -> Result<Vec<PathBuf>> {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../fixtures");
    let mut suites = Vec::new();
    for entry in std::fs::read_dir(&dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            suites.push(path);
        }
    }
    suites.sort();
    Ok(suites)
}
