// chart.rs

//! PNG rendering of grouped series with `plotters`.

use std::fs;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::aggregate::{global_range, Series};
use crate::error::{Error, Result};
use crate::record::ExperimentRecord;

/// One chart: a title, axis names and the series drawn on it.
#[derive(Debug, Clone)]
pub struct Panel<'a> {
    pub title: String,
    pub x_desc: &'a str,
    pub y_desc: &'a str,
    pub series: &'a [Series],
    /// fixed y axis, otherwise fitted to the data
    pub y_range: Option<(f64, f64)>,
    /// draw mean +/- std bars and point markers
    pub error_bars: bool,
}

impl<'a> Panel<'a> {
    fn records(&self) -> impl Iterator<Item = &'a ExperimentRecord> + 'a {
        self.series.iter().flat_map(|s| s.records.iter())
    }

    fn x_range(&self) -> (f64, f64) {
        let (min, max) = self
            .records()
            .map(|r| r.x())
            .fold(None, |acc: Option<(f64, f64)>, x| match acc {
                None => Some((x, x)),
                Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
            })
            .unwrap_or((0.0, 1.0));
        padded(min, max)
    }

    fn y_range(&self) -> (f64, f64) {
        let (min, max) = self
            .y_range
            .or_else(|| global_range(self.records()))
            .unwrap_or((0.0, 1.0));
        padded(min, max)
    }
}

// 5% headroom on both sides, and a unit-wide window around a single value
fn padded(min: f64, max: f64) -> (f64, f64) {
    let span = max - min;
    if span.abs() < f64::EPSILON {
        let pad = if min.abs() > 1.0 { min.abs() * 0.05 } else { 0.05 };
        return (min - pad, max + pad);
    }
    (min - span * 0.05, max + span * 0.05)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn render_error(path: &Path, e: Box<dyn std::error::Error>) -> Error {
    Error::Render {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

/// Render a single chart to `path`, creating parent directories as needed.
pub fn render_chart(path: &Path, panel: &Panel, size: (u32, u32)) -> Result<()> {
    ensure_parent(path)?;
    draw_single(path, panel, size).map_err(|e| render_error(path, e))
}

/// Render panels as a `columns`-wide grid of `cell` sized subplots. Unused cells stay blank.
pub fn render_grid(path: &Path, panels: &[Panel], columns: usize, cell: (u32, u32)) -> Result<()> {
    ensure_parent(path)?;
    draw_grid(path, panels, columns, cell).map_err(|e| render_error(path, e))
}

fn draw_single(
    path: &Path,
    panel: &Panel,
    size: (u32, u32),
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    draw_panel(&root, panel)?;
    root.present()?;
    Ok(())
}

fn draw_grid(
    path: &Path,
    panels: &[Panel],
    columns: usize,
    cell: (u32, u32),
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let columns = columns.max(1);
    let rows = panels.len().div_ceil(columns).max(1);
    let size = (cell.0 * columns as u32, cell.1 * rows as u32);

    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let areas = root.split_evenly((rows, columns));
    for (area, panel) in areas.iter().zip(panels) {
        draw_panel(area, panel)?;
    }
    root.present()?;
    Ok(())
}

fn draw_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    panel: &Panel,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let (x_min, x_max) = panel.x_range();
    let (y_min, y_max) = panel.y_range();

    let mut chart = ChartBuilder::on(area)
        .caption(&panel.title, ("sans-serif", 22))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc(panel.x_desc)
        .y_desc(panel.y_desc)
        .draw()?;

    for (i, series) in panel.series.iter().enumerate() {
        let color = Palette99::pick(i).mix(0.9);
        let points: Vec<(f64, f64)> = series.records.iter().map(|r| (r.x(), r.metric)).collect();

        chart
            .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))?
            .label(series.label())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));

        if !panel.error_bars {
            continue;
        }

        chart.draw_series(series.records.iter().filter_map(|r| {
            r.std_dev
                .map(|_| ErrorBar::new_vertical(r.x(), r.lower(), r.metric, r.upper(), color.filled(), 8))
        }))?;

        // alternate marker shapes so overlapping series stay distinguishable
        if i % 2 == 0 {
            chart.draw_series(points.iter().map(|p| Circle::new(*p, 4, color.filled())))?;
        } else {
            chart.draw_series(points.iter().map(|p| TriangleMarker::new(*p, 5, color.filled())))?;
        }
    }

    if !panel.series.is_empty() {
        chart
            .configure_series_labels()
            .border_style(&BLACK)
            .background_style(WHITE.mix(0.8))
            .position(SeriesLabelPosition::UpperRight)
            .draw()?;
    }

    Ok(())
}
