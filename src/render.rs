//! Output formatting for cards, column mappings and dataset previews.

use crate::column_resolver::FieldMapping;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::fields::Field;
use crate::record_filter::ADMISSION_INPUT_FORMAT;
use crate::session::{CardBody, LookupOutcome, TrainingCard};
use clap::ValueEnum;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Csv,
    Json,
}

/// `name — role — department — unit`, skipping parts that are absent or blank.
pub fn summary_line(card: &TrainingCard) -> String {
    let mut parts = vec![card.name.as_str()];
    for part in [&card.role, &card.department, &card.unit] {
        if let Some(value) = part.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            parts.push(value);
        }
    }
    parts.join(" — ")
}

pub fn echo_line(card: &TrainingCard) -> String {
    format!(
        "RE: {} | Admission: {}",
        card.identifier,
        card.admission_date.format(ADMISSION_INPUT_FORMAT)
    )
}

pub fn not_found_message(identifier: &str, admission_date: chrono::NaiveDate) -> String {
    format!(
        "No record found for RE {} and admission {}.",
        identifier,
        admission_date.format(ADMISSION_INPUT_FORMAT)
    )
}

/// Header and rows of the card's table.
fn card_table(card: &TrainingCard) -> (Vec<String>, Vec<Vec<String>>) {
    match &card.body {
        CardBody::Trainings { has_due_dates, entries } => {
            if *has_due_dates {
                (
                    vec!["Due date".to_string(), "Training".to_string()],
                    entries
                        .iter()
                        .map(|e| vec![e.due_date.clone().unwrap_or_default(), e.training.clone()])
                        .collect(),
                )
            } else {
                (
                    vec!["Training".to_string()],
                    entries.iter().map(|e| vec![e.training.clone()]).collect(),
                )
            }
        }
        CardBody::Records { columns, rows } => (columns.clone(), rows.clone()),
    }
}

/// Left-aligned plain-text table.
pub fn format_table(header: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let format_row = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&format_row(header));
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&rule.join("  "));
    out.push('\n');
    for row in rows {
        out.push_str(&format_row(row));
        out.push('\n');
    }
    out
}

pub fn render_card(card: &TrainingCard) -> String {
    let (header, rows) = card_table(card);
    let title = match card.body {
        CardBody::Trainings { .. } => "Trainings:",
        CardBody::Records { .. } => "Records found:",
    };
    format!(
        "{}\n{}\n\n{}\n{}",
        summary_line(card),
        echo_line(card),
        title,
        format_table(&header, &rows)
    )
}

pub fn render_outcome(outcome: &LookupOutcome) -> String {
    match outcome {
        LookupOutcome::Found(card) => render_card(card),
        LookupOutcome::NotFound { identifier, admission_date } => {
            format!("{}\n", not_found_message(identifier, *admission_date))
        }
    }
}

/// Write the card's table as CSV.
pub fn write_csv<W: Write>(card: &TrainingCard, writer: W) -> Result<()> {
    let (header, rows) = card_table(card);
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(&header)?;
    for row in &rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write `outcome` in `format`.
///
/// A CSV outcome without a match writes nothing; the caller reports the
/// not-found message on its own channel so the CSV stream stays clean.
pub fn write_outcome<W: Write>(outcome: &LookupOutcome, format: OutputFormat, mut writer: W) -> Result<()> {
    match format {
        OutputFormat::Text => writer.write_all(render_outcome(outcome).as_bytes())?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, outcome)?;
            writeln!(writer)?;
        }
        OutputFormat::Csv => {
            if let LookupOutcome::Found(card) = outcome {
                write_csv(card, writer)?;
            }
        }
    }
    Ok(())
}

pub fn render_mapping(mapping: &FieldMapping) -> String {
    let rows: Vec<Vec<String>> = Field::ALL
        .iter()
        .map(|field| {
            vec![
                field.to_string(),
                mapping.get(*field).unwrap_or("(absent)").to_string(),
                if field.is_mandatory() { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    format_table(&["Field".to_string(), "Column".to_string(), "Mandatory".to_string()], &rows)
}

pub fn render_preview(dataset: &Dataset, rows: usize) -> String {
    let head = dataset.head(rows);
    let body: Vec<Vec<String>> = head
        .rows()
        .iter()
        .map(|r| r.cells().iter().map(|v| v.display()).collect())
        .collect();
    format_table(dataset.columns(), &body)
}
