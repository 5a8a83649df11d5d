//! Presentation side: the text table of matches and per-ticker chart documents.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    errors::ScreenError,
    moving_average::MovingAverageSpec,
    screener::{BounceResult, ScreenedInstrument, ScreeningBatch},
};

pub const NO_MATCHES: &str = "No stocks found bouncing off key moving averages today.";

const HEADERS: [&str; 4] = ["Ticker", "Bounced Off", "Last Close", "Implied Volatility"];

fn row(result: &BounceResult) -> [String; 4] {
    [
        result.ticker.clone(),
        result.bounced_off.label(),
        format!("{:.2}", result.close),
        result
            .implied_volatility
            .map_or_else(|| "-".to_string(), |iv| iv.to_string()),
    ]
}

/// Renders the matches of `batch` as a left-aligned text table, or [`NO_MATCHES`].
pub fn render_table(batch: &ScreeningBatch) -> String {
    let rows: Vec<[String; 4]> = batch.results().map(row).collect();
    if rows.is_empty() {
        return format!("{NO_MATCHES}\n");
    }

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    push_line(&mut out, &HEADERS.map(str::to_string), &widths);
    push_line(&mut out, &widths.map(|w| "-".repeat(w)), &widths);
    for row in &rows {
        push_line(&mut out, row, &widths);
    }
    out
}

fn push_line(out: &mut String, cells: &[String; 4], widths: &[usize; 4]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    out.push_str(line.trim_end());
    out.push('\n');
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candle {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// One average, aligned point for point with [`ChartPayload::candles`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AverageLine {
    pub name: MovingAverageSpec,
    pub values: Vec<f64>,
}

/// Candlestick chart with every configured average overlaid, ready for a renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPayload {
    pub title: String,
    pub ticker: String,
    pub bounced_off: MovingAverageSpec,
    pub x_axis_title: &'static str,
    pub y_axis_title: &'static str,
    pub legend_title: &'static str,
    /// Index into `candles` of the triggering bar.
    pub trigger_index: usize,
    pub candles: Vec<Candle>,
    pub lines: Vec<AverageLine>,
}

impl ChartPayload {
    pub fn from_instrument(instrument: &ScreenedInstrument) -> Self {
        let result = &instrument.result;
        let pruned = &instrument.pruned;
        Self {
            title: format!("{} - Bounced off {}", result.ticker, result.bounced_off),
            ticker: result.ticker.clone(),
            bounced_off: result.bounced_off,
            x_axis_title: "Date",
            y_axis_title: "Price",
            legend_title: "Moving Averages",
            trigger_index: instrument.detection.bar_index,
            candles: pruned
                .bars()
                .iter()
                .map(|bar| Candle {
                    date: bar.session_date(),
                    open: bar.open,
                    high: bar.high,
                    low: bar.low,
                    close: bar.close,
                })
                .collect(),
            lines: pruned
                .averages()
                .iter()
                .map(|average| AverageLine {
                    name: average.spec,
                    values: average.values.clone(),
                })
                .collect(),
        }
    }
}

/// Writes one `<TICKER>.json` chart document per match into `dir`, creating it if
/// needed. Returns the written paths in batch order.
pub fn write_chart_payloads(
    dir: impl AsRef<Path>,
    batch: &ScreeningBatch,
) -> Result<Vec<PathBuf>, ScreenError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(batch.instruments.len());
    for instrument in &batch.instruments {
        let path = dir.join(format!("{}.json", instrument.result.ticker));
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, &ChartPayload::from_instrument(instrument))?;
        writer.flush()?;
        tracing::debug!(path = %path.display(), "chart payload written");
        written.push(path);
    }
    Ok(written)
}
