// 📤 CSV Export - Period history as two spreadsheet tables
//
// Table 1: one summary row per period
// Table 2: one row per partner per period
//
// Both tables go into the same text, separated by two blank lines and a
// title row, so the whole thing pastes straight into a spreadsheet.

use crate::entities::Period;
use crate::error::{LedgerError, Result};
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use std::path::Path;

pub const SUMMARY_HEADER: [&str; 8] = [
    "Period",
    "Date",
    "Total Account Value",
    "Total Contributions",
    "Management Fee",
    "Net Value",
    "Profit/Loss",
    "Notes",
];

pub const ALLOCATIONS_TITLE: &str = "Partner Allocations by Period";

pub const ALLOCATIONS_HEADER: [&str; 7] = [
    "Period",
    "Date",
    "Partner",
    "Contribution",
    "Ownership %",
    "P&L Allocation",
    "Account Balance",
];

/// Two decimals, half away from zero
pub fn format_amount(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.2}", rounded)
}

/// `+$1,234.50` style display, sign first; zero counts as a gain
pub fn format_signed(value: Decimal) -> String {
    let sign = if value < Decimal::ZERO { "-" } else { "+" };
    format!("{}${}", sign, format_amount(value.abs()))
}

/// `covered-bridge-capital-YYYY-MM-DD.csv`
pub fn export_file_name(today: NaiveDate) -> String {
    format!("covered-bridge-capital-{}.csv", today.format("%Y-%m-%d"))
}

fn writer(buf: Vec<u8>) -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .flexible(true)
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(buf)
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    wtr.into_inner()
        .map_err(|e| LedgerError::Csv(e.error().to_string()))
}

/// Render the period list (in the order given) as CSV text.
///
/// Fields are quoted per RFC 4180, so notes containing commas, quotes or
/// line breaks survive a spreadsheet import intact.
pub fn generate_csv(periods: &[Period]) -> Result<String> {
    let mut wtr = writer(Vec::new());
    wtr.write_record(SUMMARY_HEADER)?;

    for (idx, period) in periods.iter().enumerate() {
        wtr.write_record([
            (idx + 1).to_string(),
            period.date.format("%Y-%m-%d").to_string(),
            format_amount(period.total_value),
            format_amount(period.total_contributions),
            format_amount(period.management_fee),
            format_amount(period.net_value),
            format_amount(period.profit_loss),
            period.notes.clone(),
        ])?;
    }

    let mut buf = finish(wtr)?;
    buf.extend_from_slice(b"\n\n");

    let mut wtr = writer(buf);
    wtr.write_record([ALLOCATIONS_TITLE])?;
    wtr.write_record(ALLOCATIONS_HEADER)?;

    for (idx, period) in periods.iter().enumerate() {
        let date = period.date.format("%Y-%m-%d").to_string();
        for p in &period.partners {
            wtr.write_record([
                (idx + 1).to_string(),
                date.clone(),
                p.name.clone(),
                format_amount(p.contribution),
                format!("{}%", format_amount(p.ownership)),
                format_amount(p.allocation),
                format_amount(p.balance),
            ])?;
        }
    }

    let buf = finish(wtr)?;
    String::from_utf8(buf).map_err(|e| LedgerError::Csv(e.to_string()))
}

/// Write the CSV to `path`, returning the number of bytes written
pub fn write_csv_file(path: &Path, periods: &[Period]) -> Result<usize> {
    let text = generate_csv(periods)?;
    std::fs::write(path, &text)?;
    Ok(text.len())
}
