//! Static SVG charts of stored spreads.
//!
//! Rendering is a pure function of a [`Chart`]; [`write_charts`] builds one
//! chart per variant from the stored tables and writes
//! `visualizations/<ROOT>_<variant>.<ext>`. Roll markers come from the stored
//! curve: a marker sits on each date the front-month contract changed.

use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use futures_ingestor::io::atomic::write_bytes_atomic;
use tracing::{debug, info};

use crate::{
    calendar::day_id,
    error::StoreError,
    models::Commodity,
    store::{CurveTable, SpreadTables, Variant},
};

/// Directory under the data root holding rendered charts.
pub const VISUALIZATIONS_DIR: &str = "visualizations";

const WIDTH: f64 = 960.0;
const HEIGHT: f64 = 480.0;
const MARGIN_LEFT: f64 = 72.0;
const MARGIN_RIGHT: f64 = 150.0;
const MARGIN_TOP: f64 = 44.0;
const MARGIN_BOTTOM: f64 = 48.0;
const Y_TICKS: usize = 5;
const X_TICKS: usize = 6;
const PALETTE: [&str; 8] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#17becf",
];

/// One line of a chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    /// Legend text.
    pub label: String,
    /// Points in date order.
    pub points: Vec<(NaiveDate, f64)>,
}

/// Everything a renderer needs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Chart {
    /// Title line.
    pub title: String,
    /// Y axis caption.
    pub y_label: String,
    /// Format the y axis as percentages.
    pub percent: bool,
    /// Lines to draw.
    pub series: Vec<ChartSeries>,
    /// Dates drawn as thin vertical markers (roll dates).
    pub markers: Vec<NaiveDate>,
}

impl Chart {
    /// Earliest and latest date over all series.
    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let mut dates = self.series.iter().flat_map(|s| s.points.iter().map(|p| p.0));
        let first = dates.next()?;
        Some(dates.fold((first, first), |(a, b), d| (a.min(d), b.max(d))))
    }

    fn value_span(&self) -> Option<(f64, f64)> {
        let mut values = self
            .series
            .iter()
            .flat_map(|s| s.points.iter().map(|p| p.1))
            .filter(|v| v.is_finite());
        let first = values.next()?;
        Some(values.fold((first, first), |(a, b), v| (a.min(v), b.max(v))))
    }
}

/// Turns a [`Chart`] into a document.
pub trait ChartRenderer {
    /// File extension of the output, without the dot.
    fn extension(&self) -> &'static str;

    /// Render one chart.
    fn render(&self, chart: &Chart) -> String;
}

impl<T: ChartRenderer + ?Sized> ChartRenderer for Box<T> {
    fn extension(&self) -> &'static str {
        (**self).extension()
    }

    fn render(&self, chart: &Chart) -> String {
        (**self).render(chart)
    }
}

/// Hand-written SVG line charts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgRenderer;

struct Frame {
    x0: f64,
    x1: f64,
    y0: f64,
    y1: f64,
}

impl Frame {
    fn x(&self, date: NaiveDate) -> f64 {
        let id = f64::from(day_id(date).unwrap_or(0));
        let span = (self.x1 - self.x0).max(1.0);
        MARGIN_LEFT + (id - self.x0) / span * (WIDTH - MARGIN_LEFT - MARGIN_RIGHT)
    }

    fn y(&self, v: f64) -> f64 {
        let plot = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
        MARGIN_TOP + plot - (v - self.y0) / (self.y1 - self.y0) * plot
    }
}

impl ChartRenderer for SvgRenderer {
    fn extension(&self) -> &'static str {
        "svg"
    }

    fn render(&self, chart: &Chart) -> String {
        let mut out = String::new();
        // writing to a String cannot fail
        let _ = self.write_svg(&mut out, chart);
        out
    }
}

impl SvgRenderer {
    fn write_svg(&self, out: &mut String, chart: &Chart) -> std::fmt::Result {
        writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="sans-serif" font-size="11">"#
        )?;
        writeln!(out, r#"<rect width="100%" height="100%" fill="white"/>"#)?;
        writeln!(
            out,
            r#"<text x="{}" y="24" font-size="15" text-anchor="middle">{}</text>"#,
            WIDTH / 2.0,
            escape(&chart.title)
        )?;

        let (Some((first, last)), Some((lo, hi))) = (chart.date_span(), chart.value_span()) else {
            writeln!(
                out,
                r##"<text x="{}" y="{}" text-anchor="middle" fill="#888">No data</text>"##,
                WIDTH / 2.0,
                HEIGHT / 2.0
            )?;
            return writeln!(out, "</svg>");
        };

        let pad = if hi > lo { (hi - lo) * 0.05 } else { lo.abs().max(1e-3) * 0.1 };
        let frame = Frame {
            x0: f64::from(day_id(first).unwrap_or(0)),
            x1: f64::from(day_id(last).unwrap_or(0)),
            y0: lo - pad,
            y1: hi + pad,
        };
        let left = MARGIN_LEFT;
        let right = WIDTH - MARGIN_RIGHT;
        let top = MARGIN_TOP;
        let bottom = HEIGHT - MARGIN_BOTTOM;

        // y grid and labels
        for i in 0..=Y_TICKS {
            let v = frame.y0 + (frame.y1 - frame.y0) * i as f64 / Y_TICKS as f64;
            let y = frame.y(v);
            writeln!(
                out,
                r##"<line x1="{left}" y1="{y:.1}" x2="{right}" y2="{y:.1}" stroke="#e5e5e5"/>"##
            )?;
            writeln!(
                out,
                r#"<text x="{:.1}" y="{:.1}" text-anchor="end">{}</text>"#,
                left - 6.0,
                y + 4.0,
                format_value(v, chart.percent)
            )?;
        }
        if frame.y0 < 0.0 && frame.y1 > 0.0 {
            let y = frame.y(0.0);
            writeln!(
                out,
                r##"<line x1="{left}" y1="{y:.1}" x2="{right}" y2="{y:.1}" stroke="#999"/>"##
            )?;
        }

        // x labels
        let days = (last - first).num_days();
        let ticks = if days == 0 { 0 } else { X_TICKS };
        for i in 0..=ticks {
            let offset = if ticks == 0 { 0 } else { days * i as i64 / ticks as i64 };
            let date = first + chrono::Duration::days(offset);
            writeln!(
                out,
                r#"<text x="{:.1}" y="{:.1}" text-anchor="middle">{}</text>"#,
                frame.x(date),
                bottom + 18.0,
                date.format("%Y-%m-%d")
            )?;
        }

        // roll markers
        for m in chart.markers.iter().filter(|m| **m >= first && **m <= last) {
            let x = frame.x(*m);
            writeln!(
                out,
                r##"<line x1="{x:.1}" y1="{top}" x2="{x:.1}" y2="{bottom}" stroke="#bbbbbb" stroke-width="0.5" stroke-dasharray="3,3" class="roll"/>"##
            )?;
        }

        writeln!(
            out,
            r##"<rect x="{left}" y="{top}" width="{}" height="{}" fill="none" stroke="#333"/>"##,
            right - left,
            bottom - top
        )?;
        writeln!(
            out,
            r#"<text transform="translate(16,{:.1}) rotate(-90)" text-anchor="middle">{}</text>"#,
            (top + bottom) / 2.0,
            escape(&chart.y_label)
        )?;

        for (i, s) in chart.series.iter().enumerate() {
            let color = PALETTE[i % PALETTE.len()];
            let mut points = String::new();
            for (d, v) in s.points.iter().filter(|p| p.1.is_finite()) {
                write!(points, "{:.1},{:.1} ", frame.x(*d), frame.y(*v))?;
            }
            writeln!(
                out,
                r#"<polyline fill="none" stroke="{color}" stroke-width="1.2" points="{}"/>"#,
                points.trim_end()
            )?;

            let ly = top + 14.0 * i as f64 + 6.0;
            writeln!(
                out,
                r#"<line x1="{:.1}" y1="{ly:.1}" x2="{:.1}" y2="{ly:.1}" stroke="{color}" stroke-width="2"/>"#,
                right + 10.0,
                right + 28.0
            )?;
            writeln!(
                out,
                r#"<text x="{:.1}" y="{:.1}">{}</text>"#,
                right + 32.0,
                ly + 4.0,
                escape(&s.label)
            )?;
        }

        writeln!(out, "</svg>")
    }
}

fn format_value(v: f64, percent: bool) -> String {
    if percent {
        format!("{:.1}%", v * 100.0)
    } else {
        format!("{v:.2}")
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Chart of one variant, spreads in configured order followed by any other
/// stored labels.
pub fn chart_for(
    commodity: &Commodity,
    tables: &SpreadTables,
    curve: &CurveTable,
    variant: Variant,
) -> Chart {
    let mut labels: Vec<String> = commodity.spreads.iter().map(|s| s.label()).collect();
    for extra in tables.labels() {
        if !labels.contains(&extra) {
            labels.push(extra);
        }
    }

    let series: Vec<ChartSeries> = labels
        .into_iter()
        .filter_map(|label| {
            let column = tables.table(variant)?.get(&label)?;
            if column.is_empty() {
                return None;
            }
            Some(ChartSeries {
                points: column.iter().map(|(d, v)| (*d, *v)).collect(),
                label,
            })
        })
        .collect();

    let mut chart = Chart {
        title: format!("{} ({}) {}", commodity.name, commodity.root, variant.title()),
        y_label: if variant.is_percent() {
            "Spread (%)".to_string()
        } else {
            "Spread ($)".to_string()
        },
        percent: variant.is_percent(),
        series,
        markers: Vec::new(),
    };
    if let Some((first, last)) = chart.date_span() {
        chart.markers = curve
            .front_changes()
            .into_iter()
            .filter(|d| *d >= first && *d <= last)
            .collect();
    }
    chart
}

/// `visualizations/<ROOT>_<variant>.<ext>` under `data_root`.
pub fn chart_path(data_root: &Path, root: &str, variant: Variant, extension: &str) -> PathBuf {
    data_root
        .join(VISUALIZATIONS_DIR)
        .join(format!("{root}_{}.{extension}", variant.name()))
}

/// Renders and writes one file per variant that has data.
pub fn write_charts<R: ChartRenderer + ?Sized>(
    renderer: &R,
    data_root: &Path,
    commodity: &Commodity,
    tables: &SpreadTables,
    curve: &CurveTable,
) -> Result<Vec<PathBuf>, StoreError> {
    let mut written = Vec::new();
    for variant in Variant::ALL {
        let chart = chart_for(commodity, tables, curve, variant);
        if chart.series.is_empty() {
            debug!(commodity = %commodity.root, variant = %variant, "nothing to plot");
            continue;
        }
        let path = chart_path(data_root, &commodity.root, variant, renderer.extension());
        let doc = renderer.render(&chart);
        write_bytes_atomic(&path, doc.as_bytes())
            .map_err(|source| StoreError::Io { path: path.clone(), source })?;
        written.push(path);
    }
    info!(commodity = %commodity.root, charts = written.len(), "charts written");
    Ok(written)
}
