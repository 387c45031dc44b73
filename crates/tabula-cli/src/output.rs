//! Terminal tables

use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use tabula_core::Value;
use tabula_interchange::value_to_json;
use tabula_services::{
    ColumnDescriptor, ConnectionReport, KeyMode, KeySet, TableData, TableDescriptor, TableKind,
};

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

/// Cell text for a value; NULL is spelled out so it differs from empty text
pub fn cell(value: &Value) -> String {
    match value {
        Value::Bytes(_) => value_to_json(value).as_str().unwrap_or_default().to_string(),
        other => other.to_string(),
    }
}

pub fn tables(tables: &[TableDescriptor]) -> Table {
    let mut out = new_table(vec!["Table", "Schema", "Kind", "Rows"]);
    for t in tables {
        let kind = match t.kind {
            TableKind::BaseTable => "table",
            TableKind::View => "view",
            TableKind::Other => "other",
        };
        out.add_row(vec![
            t.name.clone(),
            t.schema.clone().unwrap_or_default(),
            kind.to_string(),
            t.row_count.to_string(),
        ]);
    }
    out
}

pub fn columns(columns: &[ColumnDescriptor]) -> Table {
    let mut out = new_table(vec!["#", "Column", "Type", "Nullable", "Default"]);
    for c in columns {
        out.add_row(vec![
            c.ordinal.to_string(),
            c.name.clone(),
            c.data_type.clone(),
            if c.nullable { "yes" } else { "no" }.to_string(),
            c.default_value.clone().unwrap_or_default(),
        ]);
    }
    out
}

/// Rows with a leading `#` column holding the index `edit --row` expects
pub fn rows(data: &TableData) -> Table {
    let mut header = vec!["#"];
    header.extend(data.columns.iter().map(String::as_str));
    let mut out = new_table(header);
    for (index, row) in data.rows.iter().enumerate() {
        let mut cells = vec![index.to_string()];
        cells.extend(row.values.iter().map(cell));
        out.add_row(cells);
    }
    out
}

pub fn keys(table: &str, keys: &KeySet) -> String {
    match keys.mode() {
        KeyMode::PrimaryKey => format!("{}: primary key ({})", table, keys.columns().join(", ")),
        KeyMode::Unique => format!("{}: unique columns ({})", table, keys.columns().join(", ")),
        KeyMode::FullRow => format!(
            "{}: no primary key or unique columns; rows are matched on every value",
            table
        ),
    }
}

pub fn connection_report(report: &ConnectionReport) -> Table {
    let mut out = new_table(vec!["Property", "Value"]);
    out.add_row(vec!["connected".to_string(), report.connected.to_string()]);
    if let Some(info) = &report.info {
        let optional = |v: &Option<String>| v.clone().unwrap_or_default();
        out.add_row(vec!["driver".to_string(), info.driver.clone()]);
        out.add_row(vec!["host".to_string(), optional(&info.host)]);
        out.add_row(vec![
            "port".to_string(),
            info.port.map(|p| p.to_string()).unwrap_or_default(),
        ]);
        out.add_row(vec!["database".to_string(), optional(&info.database)]);
        out.add_row(vec!["user".to_string(), optional(&info.user)]);
        out.add_row(vec!["server version".to_string(), optional(&info.server_version)]);
    }
    if let Some(failure) = &report.failure {
        out.add_row(vec!["error".to_string(), failure.message.clone()]);
        out.add_row(vec!["code".to_string(), failure.code.clone().unwrap_or_default()]);
    }
    out
}
