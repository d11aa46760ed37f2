//! Output rendering
//!
//! Either a plain JSON array of resolved calls, or the wrapped report
//! format downstream triage tooling ingests: results carry 1-based
//! line positions and the call record minus its lifted `path`/`loc`
//! fields. NUL bytes are stripped from every string in report mode.

use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;

use crate::analysis::model::ResolvedCall;
use crate::error::Result;

const SPEC_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain JSON array of call records
    Json,
    /// Wrapped report with per-result positions
    Report,
}

#[derive(Serialize)]
struct Report {
    name: &'static str,
    version: &'static str,
    spec_version: &'static str,
    results: Vec<ReportResult>,
}

#[derive(Serialize)]
struct ReportResult {
    path: String,
    check_id: &'static str,
    start: ReportPosition,
    end: ReportPosition,
    extra: Value,
}

#[derive(Serialize)]
struct ReportPosition {
    line: u32,
    col: u32,
}

pub fn render(calls: &[ResolvedCall], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(calls)?),
        OutputFormat::Report => {
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                let mut extra = serde_json::to_value(call)?;
                if let Some(object) = extra.as_object_mut() {
                    object.remove("path");
                    object.remove("loc");
                }
                results.push(ReportResult {
                    path: call.path.clone(),
                    check_id: "call",
                    // computed lines are 0-based, the report counts from one
                    start: ReportPosition {
                        line: call.loc.start.line + 1,
                        col: call.loc.start.ch,
                    },
                    end: ReportPosition {
                        line: call.loc.end.line + 1,
                        col: call.loc.end.ch,
                    },
                    extra,
                });
            }
            let report = Report {
                name: env!("CARGO_PKG_NAME"),
                version: env!("CARGO_PKG_VERSION"),
                spec_version: SPEC_VERSION,
                results,
            };
            let mut value = serde_json::to_value(&report)?;
            strip_nul(&mut value);
            Ok(serde_json::to_string(&value)?)
        }
    }
}

fn strip_nul(value: &mut Value) {
    match value {
        Value::String(s) => {
            if s.contains('\u{0}') {
                *s = s.replace('\u{0}', "");
            }
        }
        Value::Array(items) => items.iter_mut().for_each(strip_nul),
        Value::Object(map) => map.values_mut().for_each(strip_nul),
        _ => {}
    }
}
