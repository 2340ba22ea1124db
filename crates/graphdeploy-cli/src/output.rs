use anyhow::Result;
use colored::Colorize;
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::cli::OutputFormat;

pub fn print_value(value: &Value, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Toml => print!("{}", to_toml(value)?),
        OutputFormat::Table => print_as_table(value),
    }
    Ok(())
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Renders an object as TOML; other values are wrapped in a `value` key.
pub fn to_toml(value: &Value) -> Result<String> {
    let text = match value {
        Value::Object(_) => toml::to_string_pretty(value)?,
        other => toml::to_string_pretty(&serde_json::json!({ "value": other }))?,
    };
    Ok(text)
}

fn print_as_table(value: &Value) {
    let Some(fields) = value.as_object() else {
        println!("{value}");
        return;
    };
    if fields.is_empty() {
        println!("Nothing deployed.");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, field) in fields {
        builder.push_record([key.clone(), cell(field)]);
    }
    let table = builder.build().with(Style::rounded()).to_string();
    println!("{table}");
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
