// SPDX-FileCopyrightText: © 2024 Christopher Woods <Christopher.Woods@bristol.ac.uk>
// SPDX-License-Identifier: MIT

use comfy_table::{presets, Table};
use std::path::Path;

use crate::error::Error;

///
/// A view that can be rendered as a table. Every row must have
/// the same number of fields as the headers.
///
pub trait Report {
    fn headers(&self) -> Vec<String>;
    fn rows(&self) -> Vec<Vec<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Space-aligned columns
    #[default]
    Aligned,

    /// Tab-delimited fields, one row per line
    Plain,
}

///
/// Render the report as text, including the header row. An empty
/// report gives a header-only table.
///
pub fn to_text(report: &dyn Report, format: Format) -> String {
    match format {
        Format::Aligned => {
            let mut table = Table::new();
            table.load_preset(presets::NOTHING);
            table.set_header(report.headers());

            for row in report.rows() {
                table.add_row(row);
            }

            table
                .lines()
                .map(|line| line.trim_end().to_string())
                .collect::<Vec<String>>()
                .join("\n")
        }
        Format::Plain => std::iter::once(report.headers())
            .chain(report.rows())
            .map(|row| row.join("\t"))
            .collect::<Vec<String>>()
            .join("\n"),
    }
}

///
/// Write the report as CSV, with a header row and every field quoted
///
pub fn write_csv<W: std::io::Write>(report: &dyn Report, writer: W) -> Result<(), Error> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(writer);

    writer.write_record(report.headers())?;

    for row in report.rows() {
        writer.write_record(&row)?;
    }

    writer.flush()?;

    Ok(())
}

pub fn save_csv(report: &dyn Report, path: &Path) -> Result<(), Error> {
    let file = std::fs::File::create(path)?;
    write_csv(report, file)?;

    tracing::debug!("Written CSV report to {}", path.display());

    Ok(())
}
