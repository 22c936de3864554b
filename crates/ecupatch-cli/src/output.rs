//! Output formatting for ecupatch (table, json, csv)

use clap::ValueEnum;
use colored::Colorize;
use ecupatch_core::{format_offset, ByteDiff, Modification, Region, StageProfile};
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Whether human-readable messages should be printed
    pub fn is_human(&self) -> bool {
        !self.quiet && self.format == OutputFormat::Table
    }

    /// Print a success message (tables only, unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if self.is_human() {
            println!("{}", msg.green());
        }
    }

    /// Print an info message (tables only, unless in quiet mode)
    pub fn info(&self, msg: &str) {
        if self.is_human() {
            println!("{}", msg);
        }
    }

    /// Print a section heading
    pub fn heading(&self, msg: &str) {
        if self.is_human() {
            println!("\n{}", msg.bold());
        }
    }

    /// Print a warning message
    pub fn warn(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{}", msg.yellow());
        }
    }

    /// Print an error message
    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg.red());
    }

    /// Print data in the configured format
    pub fn print<T: Tabled + Serialize>(&self, data: &[T]) {
        match self.format {
            OutputFormat::Table => {
                if data.is_empty() {
                    if !self.quiet {
                        println!("No data");
                    }
                } else {
                    let table = Table::new(data).to_string();
                    println!("{}", table);
                }
            }
            OutputFormat::Json => self.print_json(&data),
            OutputFormat::Csv => print_csv(data),
        }
    }

    /// Print key-value pairs
    pub fn print_kv(&self, pairs: &[(&str, String)]) {
        match self.format {
            OutputFormat::Table => {
                for (key, value) in pairs {
                    println!("{}: {}", key.bold(), value);
                }
            }
            OutputFormat::Json => {
                let map: std::collections::BTreeMap<&str, &str> =
                    pairs.iter().map(|(k, v)| (*k, v.as_str())).collect();
                self.print_json(&map);
            }
            OutputFormat::Csv => {
                // Header
                let keys: Vec<&str> = pairs.iter().map(|(k, _)| *k).collect();
                println!("{}", keys.join(","));
                // Values
                let values: Vec<String> = pairs.iter().map(|(_, v)| escape_csv(v)).collect();
                println!("{}", values.join(","));
            }
        }
    }

    /// Print any serializable value as pretty JSON
    pub fn print_json<T: Serialize + ?Sized>(&self, data: &T) {
        println!(
            "{}",
            serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
        );
    }
}

/// Print rows as CSV, one column per serialized field
fn print_csv<T: Serialize>(data: &[T]) {
    let rows: Vec<serde_json::Map<String, serde_json::Value>> = data
        .iter()
        .filter_map(|item| match serde_json::to_value(item) {
            Ok(serde_json::Value::Object(row)) => Some(row),
            _ => None,
        })
        .collect();
    let Some(first) = rows.first() else {
        return;
    };

    let headers: Vec<&String> = first.keys().collect();
    let header_line: Vec<String> = headers.iter().map(|h| escape_csv(h)).collect();
    println!("{}", header_line.join(","));

    for row in &rows {
        let line: Vec<String> = headers
            .iter()
            .map(|h| match row.get(h.as_str()) {
                Some(serde_json::Value::String(s)) => escape_csv(s),
                Some(other) => escape_csv(&other.to_string()),
                None => String::new(),
            })
            .collect();
        println!("{}", line.join(","));
    }
}

/// Escape a value for CSV output
fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// =============================================================================
// Display types for various commands
// =============================================================================

/// Modification display for patch command
#[derive(Debug, Tabled, Serialize)]
pub struct ModificationRow {
    #[tabled(rename = "Address")]
    pub address: String,
    #[tabled(rename = "Kind")]
    pub kind: String,
    #[tabled(rename = "Original")]
    pub original: String,
    #[tabled(rename = "New")]
    pub new: String,
    #[tabled(rename = "Change")]
    pub change: String,
    #[tabled(rename = "Description")]
    pub description: String,
}

impl From<&Modification> for ModificationRow {
    fn from(m: &Modification) -> Self {
        Self {
            address: format_offset(m.address),
            kind: m.kind.to_string(),
            original: m.original_value.to_string(),
            new: m.new_value.to_string(),
            change: m
                .change_percent
                .map(|p| format!("{:+.2}%", p))
                .unwrap_or_else(|| "-".to_string()),
            description: m.description.clone(),
        }
    }
}

/// Per-kind modification count for patch command
#[derive(Debug, Tabled, Serialize)]
pub struct KindCountRow {
    #[tabled(rename = "Kind")]
    pub kind: String,
    #[tabled(rename = "Count")]
    pub count: usize,
}

/// Plan step display for patch --dry-run
#[derive(Debug, Tabled, Serialize)]
pub struct StepRow {
    #[tabled(rename = "#")]
    pub index: usize,
    #[tabled(rename = "Step")]
    pub step: String,
}

/// Region display for regions command
#[derive(Debug, Tabled, Serialize)]
pub struct RegionRow {
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Start")]
    pub start: String,
    #[tabled(rename = "End")]
    pub end: String,
    #[tabled(rename = "Length")]
    pub length: usize,
    #[tabled(rename = "Description")]
    pub description: String,
}

impl From<&Region> for RegionRow {
    fn from(r: &Region) -> Self {
        Self {
            name: r.name.clone(),
            start: format_offset(r.start),
            end: format_offset(r.end()),
            length: r.length,
            description: r.description.clone(),
        }
    }
}

/// Stage display for stages command
#[derive(Debug, Tabled, Serialize)]
pub struct StageRow {
    #[tabled(rename = "Stage")]
    pub stage: String,
    #[tabled(rename = "Boost")]
    pub boost: f64,
    #[tabled(rename = "Fuel")]
    pub fuel: f64,
    #[tabled(rename = "Timing")]
    pub timing: f64,
    #[tabled(rename = "Torque")]
    pub torque_limit: f64,
    #[tabled(rename = "Risk")]
    pub risk: String,
    #[tabled(rename = "Description")]
    pub description: String,
}

impl From<&StageProfile> for StageRow {
    fn from(p: &StageProfile) -> Self {
        Self {
            stage: p.id.to_string(),
            boost: p.boost_multiplier,
            fuel: p.fuel_multiplier,
            timing: p.timing_multiplier,
            torque_limit: p.torque_limit_multiplier,
            risk: p.risk.to_string(),
            description: p.description.clone(),
        }
    }
}

/// Byte difference display for compare command
#[derive(Debug, Tabled, Serialize)]
pub struct DiffRow {
    #[tabled(rename = "Offset")]
    pub offset: String,
    #[tabled(rename = "Original")]
    pub original: String,
    #[tabled(rename = "Tuned")]
    pub tuned: String,
}

impl From<&ByteDiff> for DiffRow {
    fn from(d: &ByteDiff) -> Self {
        Self {
            offset: format_offset(d.offset),
            original: format!("{:02X}", d.original_byte),
            tuned: format!("{:02X}", d.tuned_byte),
        }
    }
}

/// Tuning option display for analyze command
#[derive(Debug, Tabled, Serialize)]
pub struct OptionRow {
    #[tabled(rename = "Option")]
    pub name: String,
    #[tabled(rename = "Gain")]
    pub gain: String,
    #[tabled(rename = "Risk")]
    pub risk: String,
    #[tabled(rename = "Description")]
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecupatch_core::ModificationKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_modification_row() {
        let m = Modification::numeric(
            0x20000,
            ModificationKind::BoostPressure,
            4096,
            4710,
            "Boost x1.15",
        );
        let row = ModificationRow::from(&m);
        assert_eq!(row.address, "0x20000");
        assert_eq!(row.kind, "boost_pressure");
        assert_eq!(row.original, "4096");
        assert_eq!(row.change, "+14.99%");

        let zeroed = Modification::bytes(
            0x60000,
            ModificationKind::DpfRemoval,
            vec![0x12, 0x34],
            vec![0, 0],
            "DPF marker disabled",
        );
        assert_eq!(ModificationRow::from(&zeroed).change, "-");
    }
}
