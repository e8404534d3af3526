use anyhow::Result;
use clap::ValueEnum;
use comfy_table::{Attribute, Cell, Color as TableColor, Table};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::theme::{GLYPHS, PALETTE, Rgb, paint};

/// Output format options for CLI commands
#[derive(Clone, Debug, ValueEnum, Default, PartialEq)]
pub enum OutputFormat {
    /// Formatted table output (default)
    #[default]
    Table,
    /// JSON output for scripting
    Json,
    /// Compact single-line output
    Compact,
}

/// Global CLI options that affect output and behavior
#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub output_format: OutputFormat,
    pub quiet: bool,
    pub no_color: bool,
}

/// Data that can be displayed as a table
pub trait TableDisplay {
    fn to_table(&self, options: &GlobalOptions) -> Table;
    fn to_compact(&self) -> String;
}

pub struct OutputManager {
    pub options: GlobalOptions,
}

impl OutputManager {
    pub fn new(options: GlobalOptions) -> Self {
        Self { options }
    }

    /// Display data according to the configured output format
    pub fn display<T>(&self, data: &T) -> Result<()>
    where
        T: Serialize + TableDisplay,
    {
        if self.options.quiet {
            return Ok(());
        }

        match self.options.output_format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                println!("{json}");
            }
            OutputFormat::Table => {
                let table = data.to_table(&self.options);
                println!("{table}");
            }
            OutputFormat::Compact => {
                println!("{}", data.to_compact());
            }
        }
        Ok(())
    }

    pub fn is_json(&self) -> bool {
        self.options.output_format == OutputFormat::Json
    }

    fn colored(&self) -> bool {
        !self.options.no_color
    }

    /// Glyph plus message in one tone.
    fn notice(&self, glyph: &str, tone: Rgb, message: &str) -> String {
        format!(
            "{} {}",
            paint(glyph, tone, false, self.colored()),
            paint(message, tone, false, self.colored())
        )
    }

    /// Progress lines stay out of the way of JSON consumers.
    fn chatty(&self) -> bool {
        !self.options.quiet && !self.is_json()
    }

    pub fn success(&self, message: &str) {
        if self.chatty() {
            println!("{}", self.notice(GLYPHS.ok, PALETTE.ok, message));
        }
    }

    pub fn error(&self, message: &str) {
        eprintln!("{}", self.notice(GLYPHS.failure, PALETTE.failure, message));
    }

    pub fn warning(&self, message: &str) {
        if !self.options.quiet {
            eprintln!("{}", self.notice(GLYPHS.caution, PALETTE.caution, message));
        }
    }

    pub fn info(&self, message: &str) {
        if self.chatty() {
            println!("{}", self.notice(GLYPHS.note, PALETTE.note, message));
        }
    }

    pub fn heading(&self, text: &str) {
        if !self.chatty() {
            return;
        }
        if self.colored() {
            println!("\n{}", paint(text, PALETTE.heading, true, true));
        } else {
            println!("\n{text}\n{}", "=".repeat(text.chars().count()));
        }
    }

    pub fn key_value(&self, key: &str, value: &str) {
        if self.chatty() {
            println!(
                "{}: {}",
                paint(key, PALETTE.label, true, self.colored()),
                paint(value, PALETTE.text, false, self.colored())
            );
        }
    }

    pub fn bullet(&self, text: &str) {
        if self.chatty() {
            println!("  {} {text}", paint(GLYPHS.bullet, PALETTE.dim, false, self.colored()));
        }
    }
}

/// Themed table with a bold header row.
pub fn themed_table(options: &GlobalOptions, headers: &[&str]) -> Table {
    let mut table = Table::new();
    if options.no_color {
        table.load_preset(comfy_table::presets::ASCII_FULL);
    } else {
        table.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
    }

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| {
            let cell = Cell::new(h).add_attribute(Attribute::Bold);
            let Rgb(r, g, b) = PALETTE.heading;
            if options.no_color { cell } else { cell.fg(TableColor::Rgb { r, g, b }) }
        })
        .collect();
    table.set_header(header_cells);
    table
}

/// Value at a dotted path inside a JSON document.
pub fn json_path<'v>(value: &'v JsonValue, path: &str) -> Option<&'v JsonValue> {
    path.split('.').try_fold(value, |current, segment| current.get(segment))
}

/// Short human rendering of a JSON scalar for table cells.
pub fn cell_text(value: Option<&JsonValue>) -> String {
    match value {
        None | Some(JsonValue::Null) => "-".to_string(),
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Number(n)) => match n.as_f64() {
            Some(f) if f.fract() != 0.0 => format!("{f:.2}"),
            _ => n.to_string(),
        },
        Some(JsonValue::Array(items)) => items.iter().map(|i| cell_text(Some(i))).collect::<Vec<_>>().join(", "),
        Some(other) => other.to_string(),
    }
}
