//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

fn table<T: TableDisplay>(items: &[T]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(T::headers());
    for item in items {
        table.add_row(item.row());
    }
    table
}

fn plain<T: TableDisplay>(item: &T) -> String {
    T::headers()
        .iter()
        .zip(item.row())
        .map(|(header, value)| format!("{}: {}", header, value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a single item
pub fn render_item<T: Serialize + TableDisplay>(
    item: &T,
    format: OutputFormat,
) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Table => table(std::slice::from_ref(item)).to_string(),
        OutputFormat::Json => serde_json::to_string_pretty(item)?,
        OutputFormat::Yaml => serde_yaml::to_string(item)?,
        OutputFormat::Plain => plain(item),
    })
}

/// Render a list of items
pub fn render_list<T: Serialize + TableDisplay>(
    items: &[T],
    format: OutputFormat,
) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Table if items.is_empty() => "No items found.".to_string(),
        OutputFormat::Table => table(items).to_string(),
        OutputFormat::Json => serde_json::to_string_pretty(items)?,
        OutputFormat::Yaml => serde_yaml::to_string(items)?,
        OutputFormat::Plain => items.iter().map(plain).collect::<Vec<_>>().join("\n---\n"),
    })
}

/// Print a single item
pub fn print_item<T: Serialize + TableDisplay>(item: &T, format: OutputFormat) -> anyhow::Result<()> {
    println!("{}", render_item(item, format)?);
    Ok(())
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) -> anyhow::Result<()> {
    println!("{}", render_list(items, format)?);
    Ok(())
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "!".yellow().bold(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        name: String,
        size: u64,
    }

    impl TableDisplay for Row {
        fn headers() -> Vec<&'static str> {
            vec!["Name", "Size"]
        }

        fn row(&self) -> Vec<String> {
            vec![self.name.clone(), self.size.to_string()]
        }
    }

    fn rows() -> Vec<Row> {
        vec![
            Row { name: "css/main.css".into(), size: 6 },
            Row { name: "js/machines.js".into(), size: 9 },
        ]
    }

    #[test]
    fn test_render_plain() {
        assert_eq!(
            render_list(&rows(), OutputFormat::Plain).unwrap(),
            "Name: css/main.css\nSize: 6\n---\nName: js/machines.js\nSize: 9"
        );
    }

    #[test]
    fn test_render_json_and_yaml() {
        let json = render_list(&rows(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[1]["name"], "js/machines.js");

        let yaml = render_item(&rows()[0], OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("name: css/main.css"));
        assert!(yaml.contains("size: 6"));
    }

    #[test]
    fn test_render_table() {
        let table = render_list(&rows(), OutputFormat::Table).unwrap();
        assert!(table.contains("Name"));
        assert!(table.contains("js/machines.js"));

        let empty: Vec<Row> = vec![];
        assert_eq!(
            render_list(&empty, OutputFormat::Table).unwrap(),
            "No items found."
        );
    }
}
