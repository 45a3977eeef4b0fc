use std::io::{self, Write};

use serde::Serialize;

use crate::ignore::IgnoreResult;
use crate::pipeline::{AcquireResult, LinkResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Combined report of one CLI invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquired: Option<AcquireResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked: Option<LinkResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignored: Option<IgnoreResult>,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &RunReport) -> io::Result<()> {
        Self::print_json(report)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct HumanOutput;

impl HumanOutput {
    pub fn print_report(report: &RunReport) -> io::Result<()> {
        let mut stdout = io::stdout();
        if let Some(acquired) = &report.acquired {
            writeln!(
                stdout,
                "fetched {} archive(s), copied {} package(s)",
                acquired.archives,
                acquired.packages.len()
            )?;
            for package in &acquired.packages {
                writeln!(stdout, "  {} <- {}", package.name, package.source)?;
            }
        }
        if let Some(linked) = &report.linked {
            writeln!(stdout, "linked {} package(s)", linked.packages.len())?;
            for package in &linked.packages {
                writeln!(stdout, "  {} -> {}", package.name, package.target)?;
            }
        }
        if let Some(ignored) = &report.ignored {
            if !ignored.added.is_empty() {
                writeln!(
                    stdout,
                    "added {} entr{} to {}",
                    ignored.added.len(),
                    if ignored.added.len() == 1 { "y" } else { "ies" },
                    ignored.path
                )?;
            }
        }
        Ok(())
    }
}
