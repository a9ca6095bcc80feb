use std::path::Path;

use anyhow::{Context, Result};
use dm_core::write_text_atomic;

use crate::metadata::{
    ColumnMetadata, JoiningCondition, JoiningType, TableMetadata, TermDefinition,
    COLUMNS_METADATA_HEADER, DEFINITIONS_HEADER, JOINING_CONDITIONS_HEADER, TABLE_METADATA_HEADER,
};
use crate::table_column::{
    SourceOrDerived, TableColumnRow, TABLES_COLUMNS_ENRICHED_HEADER, TABLES_COLUMNS_HEADER,
};

fn write_csv(path: &Path, header: &[&str], records: &[Vec<String>]) -> Result<()> {
    let mut buffer = Vec::new();
    {
        let mut writer = csv::WriterBuilder::new().from_writer(&mut buffer);
        writer.write_record(header)?;
        for record in records {
            writer.write_record(record)?;
        }
        writer.flush()?;
    }
    let content = String::from_utf8(buffer).context("csv output was not valid utf-8")?;
    write_text_atomic(path, &content)
}

pub fn write_tables_columns_csv(path: &Path, rows: &[TableColumnRow]) -> Result<()> {
    let records = rows.iter().map(|row| row.to_csv_record(false)).collect::<Vec<_>>();
    write_csv(path, &TABLES_COLUMNS_HEADER, &records)
}

pub fn write_tables_columns_enriched_csv(path: &Path, rows: &[TableColumnRow]) -> Result<()> {
    let records = rows.iter().map(|row| row.to_csv_record(true)).collect::<Vec<_>>();
    write_csv(path, &TABLES_COLUMNS_ENRICHED_HEADER, &records)
}

pub fn read_tables_columns_csv(path: &Path, enriched: bool) -> Result<Vec<TableColumnRow>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut reader = csv::ReaderBuilder::new().from_reader(content.as_bytes());
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let source_or_derived = if record.get(3) == Some("DERIVED") {
            SourceOrDerived::Derived
        } else {
            SourceOrDerived::Source
        };
        rows.push(TableColumnRow {
            table_name: record.get(0).unwrap_or_default().to_string(),
            column_name: record.get(1).unwrap_or_default().to_string(),
            alias: record.get(2).unwrap_or_default().to_string(),
            source_or_derived,
            derived_logic: record.get(4).filter(|v| !v.is_empty()).map(str::to_string),
            chart_id: record.get(5).unwrap_or("0").parse().unwrap_or(0),
            chart_label: record.get(6).unwrap_or_default().to_string(),
            datatype: if enriched {
                record.get(7).filter(|v| !v.is_empty()).map(str::to_string)
            } else {
                None
            },
        });
    }
    Ok(rows)
}

pub fn write_table_metadata_csv(path: &Path, rows: &[TableMetadata]) -> Result<()> {
    let records = rows
        .iter()
        .map(|row| {
            vec![
                row.table_name.clone(),
                row.table_description.clone(),
                row.refresh_frequency.clone(),
                row.vertical.clone(),
                row.partition_column.clone(),
                row.remarks.clone(),
                row.relationship_context.clone(),
            ]
        })
        .collect::<Vec<_>>();
    write_csv(path, &TABLE_METADATA_HEADER, &records)
}

pub fn read_table_metadata_csv(path: &Path) -> Result<Vec<TableMetadata>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut reader = csv::ReaderBuilder::new().from_reader(content.as_bytes());
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(TableMetadata {
            table_name: record.get(0).unwrap_or_default().to_string(),
            table_description: record.get(1).unwrap_or_default().to_string(),
            refresh_frequency: record.get(2).unwrap_or_default().to_string(),
            vertical: record.get(3).unwrap_or_default().to_string(),
            partition_column: record.get(4).unwrap_or_default().to_string(),
            remarks: record.get(5).unwrap_or_default().to_string(),
            relationship_context: record.get(6).unwrap_or_default().to_string(),
        });
    }
    Ok(rows)
}

pub fn write_columns_metadata_csv(path: &Path, rows: &[ColumnMetadata]) -> Result<()> {
    let records = rows
        .iter()
        .map(|row| {
            vec![
                row.table_name.clone(),
                row.column_name.clone(),
                row.variable_type.clone(),
                row.column_description.clone(),
                row.required_flag.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    write_csv(path, &COLUMNS_METADATA_HEADER, &records)
}

pub fn read_columns_metadata_csv(path: &Path) -> Result<Vec<ColumnMetadata>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut reader = csv::ReaderBuilder::new().from_reader(content.as_bytes());
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(ColumnMetadata {
            table_name: record.get(0).unwrap_or_default().to_string(),
            column_name: record.get(1).unwrap_or_default().to_string(),
            variable_type: record.get(2).unwrap_or_default().to_string(),
            column_description: record.get(3).unwrap_or_default().to_string(),
            required_flag: record.get(4).unwrap_or("false").parse().unwrap_or(false),
        });
    }
    Ok(rows)
}

pub fn write_joining_conditions_csv(path: &Path, rows: &[JoiningCondition]) -> Result<()> {
    let records = rows
        .iter()
        .map(|row| {
            vec![
                row.table1.clone(),
                row.table2.clone(),
                row.joining_condition.clone(),
                row.joining_type.as_str().to_string(),
                row.remarks.clone(),
            ]
        })
        .collect::<Vec<_>>();
    write_csv(path, &JOINING_CONDITIONS_HEADER, &records)
}

pub fn read_joining_conditions_csv(path: &Path) -> Result<Vec<JoiningCondition>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut reader = csv::ReaderBuilder::new().from_reader(content.as_bytes());
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let joining_type = match record.get(3) {
            Some("LEFT") => JoiningType::Left,
            Some("RIGHT") => JoiningType::Right,
            Some("FULL") => JoiningType::Full,
            _ => JoiningType::Inner,
        };
        rows.push(JoiningCondition {
            table1: record.get(0).unwrap_or_default().to_string(),
            table2: record.get(1).unwrap_or_default().to_string(),
            joining_condition: record.get(2).unwrap_or_default().to_string(),
            joining_type,
            remarks: record.get(4).unwrap_or_default().to_string(),
        });
    }
    Ok(rows)
}

pub fn write_definitions_csv(path: &Path, rows: &[TermDefinition]) -> Result<()> {
    let records = rows
        .iter()
        .map(|row| {
            vec![
                row.term.clone(),
                row.term_type.clone(),
                row.definition.clone(),
                row.business_alias.clone(),
            ]
        })
        .collect::<Vec<_>>();
    write_csv(path, &DEFINITIONS_HEADER, &records)
}

pub fn read_definitions_csv(path: &Path) -> Result<Vec<TermDefinition>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut reader = csv::ReaderBuilder::new().from_reader(content.as_bytes());
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(TermDefinition {
            term: record.get(0).unwrap_or_default().to_string(),
            term_type: record.get(1).unwrap_or_default().to_string(),
            definition: record.get(2).unwrap_or_default().to_string(),
            business_alias: record.get(3).unwrap_or_default().to_string(),
        });
    }
    Ok(rows)
}
