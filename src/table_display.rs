use anyhow::{Context, Result};
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use crossterm::style::Stylize;
use record_explorer::column_manager::Column;
use record_explorer::data::cell_format::{format_value, truncate_text};
use record_explorer::data::flattener::FlatRecord;
use record_explorer::data::path::resolve;
use record_explorer::data::value::Value;

fn cell_text(record: &Value, column: &Column) -> String {
    resolve(record, &column.data_index)
        .map(format_value)
        .unwrap_or_default()
}

/// Print one page of rows. `offset` is the position of the first row in
/// the full result, used for row numbers.
pub fn display_results(
    rows: &[&Value],
    columns: &[Column],
    offset: usize,
    truncate_at: usize,
    show_row_numbers: bool,
    selected_id: Option<&str>,
) {
    if rows.is_empty() {
        println!("{}", "No records match.".yellow());
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let mut headers: Vec<Cell> = Vec::with_capacity(columns.len() + 1);
    if show_row_numbers {
        headers.push(Cell::new("#").add_attribute(Attribute::Bold));
    }
    headers.extend(
        columns
            .iter()
            .map(|c| Cell::new(&c.title).add_attribute(Attribute::Bold)),
    );
    table.set_header(headers);

    for (i, record) in rows.iter().enumerate() {
        let selected = selected_id.is_some() && record.record_id() == selected_id;
        let mut row: Vec<Cell> = Vec::with_capacity(columns.len() + 1);
        if show_row_numbers {
            row.push(Cell::new(offset + i + 1));
        }
        for column in columns {
            let mut cell = Cell::new(truncate_text(&cell_text(record, column), truncate_at));
            if selected {
                cell = cell.add_attribute(Attribute::Reverse);
            }
            row.push(cell);
        }
        table.add_row(row);
    }

    println!("{table}");
}

/// Print the flattened entries of an inspected record, grouped by their
/// top-level section
pub fn display_inspection(flat: &FlatRecord<'_>, filter: Option<&str>) {
    if flat.is_degraded() {
        println!("{}", "Record could not be fully expanded.".yellow());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Field").add_attribute(Attribute::Bold),
        Cell::new("Value").add_attribute(Attribute::Bold),
    ]);

    match filter {
        Some(query) => {
            for (path, value) in flat.search(query) {
                table.add_row(vec![path.to_string(), format_value(value)]);
            }
        }
        None => {
            for (section, entries) in flat.group_by_section() {
                table.add_row(vec![
                    Cell::new(section).add_attribute(Attribute::Bold),
                    Cell::new(""),
                ]);
                for (path, value) in entries {
                    table.add_row(vec![
                        Cell::new(format!("  {}", path)),
                        Cell::new(format_value(value)),
                    ]);
                }
            }
        }
    }

    println!("{table}");
}

/// Write the given rows and columns to a CSV file. Cells are not
/// truncated. Returns the number of rows written.
pub fn export_to_csv(rows: &[&Value], columns: &[Column], filename: &str) -> Result<usize> {
    let mut wtr = csv::Writer::from_path(filename)
        .with_context(|| format!("Failed to create {}", filename))?;

    let headers: Vec<&str> = columns.iter().map(|c| c.key.as_str()).collect();
    wtr.write_record(&headers)?;

    for record in rows {
        let row: Vec<String> = columns.iter().map(|c| cell_text(record, c)).collect();
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(rows.len())
}
