//! Query command handler

use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::time::Instant;

use super::{OutputFormat, QueryCommands};
use crate::config::Config;
use crate::db::{self, Statement};
use crate::table::Table;

/// Run one query against a database profile and print or save the result
pub async fn handle_query_command(config: &Config, args: QueryCommands) -> Result<()> {
    if args.no_color {
        colored::control::set_override(false);
    }

    // Read query from source
    let query_text = if let Some(query) = args.query {
        query
    } else if let Some(file_path) = args.file {
        let content = fs::read_to_string(&file_path)
            .with_context(|| format!("Failed to read query file: {}", file_path.display()))?;
        content.trim().to_string()
    } else {
        anyhow::bail!("Either provide a query string or use --file to specify a query file");
    };
    if query_text.is_empty() {
        anyhow::bail!("Query is empty");
    }

    let (db_name, profile) = config.database_profile(args.database.as_deref())?;
    log::debug!("Using database {} ({})", db_name, profile.display_target());

    let executor = db::connect(profile).await?;
    let start = Instant::now();
    let result = executor.fetch(&Statement::new(query_text)).await;
    executor.close().await;
    let table = result.context("Failed to execute query")?;
    log::info!(
        "{} rows in {:.2}ms",
        table.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    let formatted_output = format_output(&table, args.format)?;

    if let Some(output_path) = args.output {
        fs::write(&output_path, &formatted_output)
            .with_context(|| format!("Failed to write output to: {}", output_path.display()))?;
        eprintln!(
            "Results saved to: {}",
            output_path.display().to_string().bright_green()
        );
    } else {
        print!("{}", formatted_output);
    }

    Ok(())
}

/// Format query results according to the specified output format
fn format_output(table: &Table, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(&table.to_json_records())
            .map(|s| s + "\n")
            .context("Failed to format JSON output"),
        OutputFormat::JsonCompact => serde_json::to_string(&table.to_json_records())
            .map(|s| s + "\n")
            .context("Failed to format JSON output"),
        OutputFormat::Csv => table_to_csv(table),
    }
}

/// Header line plus one line per row; nulls are empty fields
fn table_to_csv(table: &Table) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    let bytes = writer.into_inner().context("Failed to flush CSV output")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;
    use pretty_assertions::assert_eq;

    fn sample() -> Table {
        Table::from_rows(
            ["id", "content"],
            vec![
                vec![Cell::Int(1), Cell::from("hello, world")],
                vec![Cell::Int(2), Cell::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_csv_output() {
        let out = format_output(&sample(), OutputFormat::Csv).unwrap();
        assert_eq!(out, "id,content\n1,\"hello, world\"\n2,\n");
    }

    #[test]
    fn test_json_output() {
        let out = format_output(&sample(), OutputFormat::JsonCompact).unwrap();
        assert_eq!(out.lines().count(), 1);
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(
            parsed,
            serde_json::json!([
                { "id": 1, "content": "hello, world" },
                { "id": 2, "content": null }
            ])
        );
    }

    #[test]
    fn test_csv_header_only_for_empty_result() {
        let out = format_output(&Table::new(["a", "b"]), OutputFormat::Csv).unwrap();
        assert_eq!(out, "a,b\n");
    }
}
