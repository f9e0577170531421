//! ColorChecker localization.
//!
//! The chart is found as a lattice of uniformly colored cells: flat regions are
//! segmented, filtered down to square-ish, well-filled cells of similar size, and
//! searched for 4 evenly spaced rows of 6 evenly spaced, column-aligned cells
//! (or the portrait 6x4 equivalent).

use crate::calibration::delta_e;
use crate::calibration::reference::{CHART_COLS, CHART_ROWS, COLOR_CHECKER, PATCH_COUNT, reference_color};
use crate::config::ChartDetectionConfig;
use crate::detection::{contours, preprocessing};
use crate::error::{ProcessingError, Result};
use crate::models::{BoundingBox, ColorPatch, Component};
use image::{DynamicImage, RgbImage};
use imageproc::region_labelling::Connectivity;
use palette::Srgb;
use tracing::{debug, instrument};

/// Candidate chart cell
#[derive(Debug, Clone, Copy)]
struct Cell {
    bbox: BoundingBox,
    cx: f32,
    cy: f32,
}

impl Cell {
    fn from_component(component: &Component) -> Self {
        let (cx, cy) = component.centroid();
        Self {
            bbox: component.bbox(),
            cx,
            cy,
        }
    }
}

pub struct ColorChartDetector {
    config: ChartDetectionConfig,
}

impl ColorChartDetector {
    pub fn new(config: ChartDetectionConfig) -> Self {
        Self { config }
    }

    /// Locate the chart and return its patches in reference (row-major) order
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<ColorPatch>> {
        let rgb = image.to_rgb8();
        let blurred = preprocessing::apply_blur(&rgb, self.config.blur_sigma);
        let mask = preprocessing::flat_mask(&blurred, self.config.flat_tolerance);
        let components = contours::find_components(&mask, Connectivity::Four, self.config.min_patch_area);

        let image_area = rgb.width() as u64 * rgb.height() as u64;
        let cells = self.candidate_cells(&components, image_area);
        debug!(
            components = components.len(),
            cells = cells.len(),
            "chart cell candidates"
        );

        let grid = find_grid(&cells, self.config.size_tolerance).ok_or_else(|| {
            ProcessingError::ColorCheckerNotFound(format!(
                "no {CHART_ROWS}x{CHART_COLS} patch grid among {} candidate cells",
                cells.len()
            ))
        })?;

        let patches = self.read_patches(&rgb, &grid);
        if patches.len() != PATCH_COUNT {
            return Err(ProcessingError::ColorCheckerNotFound(format!(
                "expected {PATCH_COUNT} patches, found {}",
                patches.len()
            )));
        }

        debug!(bounds = ?chart_bounds(&patches), "chart located");
        Ok(patches)
    }

    fn candidate_cells(&self, components: &[Component], image_area: u64) -> Vec<Cell> {
        let max_area = (image_area as f64 * self.config.max_patch_area_ratio as f64) as u64;

        components
            .iter()
            .filter(|c| {
                let aspect = c.aspect_ratio();
                c.area() as u64 <= max_area
                    && c.fill_ratio() >= self.config.min_fill_ratio
                    && aspect >= self.config.min_aspect
                    && aspect <= self.config.max_aspect
            })
            .map(Cell::from_component)
            .collect()
    }

    /// Sample every reading of the grid and keep the one closest to the references
    fn read_patches(&self, rgb: &RgbImage, grid: &[Vec<Cell>]) -> Vec<ColorPatch> {
        let mut best: Option<(f32, Vec<ColorPatch>)> = None;

        for reading in readings(grid) {
            let patches: Vec<ColorPatch> = reading
                .iter()
                .enumerate()
                .map(|(index, cell)| ColorPatch {
                    index,
                    name: COLOR_CHECKER[index].0,
                    centroid: (cell.cx, cell.cy),
                    bbox: cell.bbox,
                    measured: mean_color(rgb, &cell.bbox, self.config.sample_margin),
                    reference: reference_color(index),
                })
                .collect();

            let score = patches
                .iter()
                .map(|p| delta_e(p.measured, p.reference))
                .sum::<f32>()
                / patches.len().max(1) as f32;

            if best.as_ref().is_none_or(|(best_score, _)| score < *best_score) {
                best = Some((score, patches));
            }
        }

        best.map(|(_, patches)| patches).unwrap_or_default()
    }
}

impl Default for ColorChartDetector {
    fn default() -> Self {
        Self::new(ChartDetectionConfig::default())
    }
}

/// Union of all patch boxes
pub fn chart_bounds(patches: &[ColorPatch]) -> Option<BoundingBox> {
    patches
        .iter()
        .map(|p| p.bbox)
        .reduce(|acc, b| acc.union(&b))
}

/// Mean color of `bbox` shrunk by `margin` (fraction of its size) on every side
fn mean_color(rgb: &RgbImage, bbox: &BoundingBox, margin: f32) -> Srgb {
    let dx = (bbox.width as f32 * margin) as u32;
    let dy = (bbox.height as f32 * margin) as u32;
    let x0 = bbox.x + dx.min(bbox.width.saturating_sub(1) / 2);
    let y0 = bbox.y + dy.min(bbox.height.saturating_sub(1) / 2);
    let x1 = (bbox.right() - dx).max(x0 + 1).min(rgb.width());
    let y1 = (bbox.bottom() - dy).max(y0 + 1).min(rgb.height());

    let mut sum = [0u64; 3];
    let mut count = 0u64;
    for y in y0..y1 {
        for x in x0..x1 {
            let p = rgb.get_pixel(x, y);
            sum[0] += p[0] as u64;
            sum[1] += p[1] as u64;
            sum[2] += p[2] as u64;
            count += 1;
        }
    }

    if count == 0 {
        return Srgb::new(0.0, 0.0, 0.0);
    }
    let scale = 255.0 * count as f32;
    Srgb::new(
        sum[0] as f32 / scale,
        sum[1] as f32 / scale,
        sum[2] as f32 / scale,
    )
}

/// Search the candidate cells for a chart-shaped lattice.
///
/// Returns the cells in image order, `rows x cols` with either 4x6 or 6x4 layout.
fn find_grid(cells: &[Cell], tolerance: f32) -> Option<Vec<Vec<Cell>>> {
    let mut order: Vec<usize> = (0..cells.len()).collect();
    order.sort_by(|&a, &b| cells[b].bbox.area().cmp(&cells[a].bbox.area()).then(a.cmp(&b)));

    let mut tried: Vec<Vec<usize>> = Vec::new();

    for anchor in order {
        let reference = cells[anchor].bbox;
        let members: Vec<usize> = (0..cells.len())
            .filter(|&i| similar_size(&reference, &cells[i].bbox, tolerance))
            .collect();
        if members.len() < PATCH_COUNT || tried.contains(&members) {
            continue;
        }

        let group: Vec<Cell> = members.iter().map(|&i| cells[i]).collect();
        for (rows, cols) in [(CHART_ROWS, CHART_COLS), (CHART_COLS, CHART_ROWS)] {
            if let Some(grid) = arrange(&group, rows, cols, tolerance) {
                return Some(grid);
            }
        }
        tried.push(members);
    }

    None
}

fn similar_size(a: &BoundingBox, b: &BoundingBox, tolerance: f32) -> bool {
    let close = |p: u32, q: u32| (p as f32 - q as f32).abs() <= tolerance * p as f32;
    close(a.width, b.width) && close(a.height, b.height)
}

/// Arrange same-sized cells into `rows` aligned runs of `cols` cells
fn arrange(group: &[Cell], rows: usize, cols: usize, tolerance: f32) -> Option<Vec<Vec<Cell>>> {
    let cell_w = median(group.iter().map(|c| c.bbox.width as f32).collect());
    let cell_h = median(group.iter().map(|c| c.bbox.height as f32).collect());

    // Band cells by vertical position
    let mut sorted = group.to_vec();
    sorted.sort_by(|a, b| a.cy.total_cmp(&b.cy));
    let mut bands: Vec<Vec<Cell>> = Vec::new();
    for cell in sorted {
        let joins_last = bands
            .last()
            .is_some_and(|band| (cell.cy - mean(band.iter().map(|c| c.cy))).abs() <= 0.5 * cell_h);
        match bands.last_mut() {
            Some(band) if joins_last => band.push(cell),
            _ => bands.push(vec![cell]),
        }
    }

    // Evenly spaced horizontal runs within each band
    let runs: Vec<Vec<Vec<Cell>>> = bands
        .iter_mut()
        .map(|band| {
            band.sort_by(|a, b| a.cx.total_cmp(&b.cx));
            band.windows(cols)
                .filter(|w| evenly_spaced(&w.iter().map(|c| c.cx).collect::<Vec<_>>(), cell_w, tolerance))
                .map(|w| w.to_vec())
                .collect()
        })
        .collect();

    for start in 0..bands.len() {
        if start + rows > bands.len() {
            break;
        }
        for first in &runs[start] {
            let mut grid = vec![first.clone()];
            for band_runs in &runs[start + 1..start + rows] {
                let aligned = band_runs.iter().find(|run| {
                    run.iter()
                        .zip(first.iter())
                        .all(|(a, b)| (a.cx - b.cx).abs() <= 0.5 * cell_w)
                });
                match aligned {
                    Some(run) => grid.push(run.clone()),
                    None => break,
                }
            }
            if grid.len() != rows {
                continue;
            }

            let row_centers: Vec<f32> = grid.iter().map(|run| mean(run.iter().map(|c| c.cy))).collect();
            if evenly_spaced(&row_centers, cell_h, tolerance) {
                return Some(grid);
            }
        }
    }

    None
}

/// Each grid admits two readings; return both in chart row-major order
fn readings(grid: &[Vec<Cell>]) -> Vec<Vec<Cell>> {
    let n_rows = grid.len();
    let n_cols = grid.first().map_or(0, |r| r.len());

    if n_rows == CHART_ROWS {
        let upright: Vec<Cell> = grid.iter().flatten().copied().collect();
        let mut flipped = upright.clone();
        flipped.reverse();
        return vec![upright, flipped];
    }

    let positions = || (0..CHART_ROWS).flat_map(|r| (0..CHART_COLS).map(move |c| (r, c)));
    // Chart turned clockwise: chart row r sits in image column (n_cols - 1 - r)
    let clockwise: Vec<Cell> = positions().map(|(r, c)| grid[c][n_cols - 1 - r]).collect();
    let counter_clockwise: Vec<Cell> = positions().map(|(r, c)| grid[n_rows - 1 - c][r]).collect();
    vec![clockwise, counter_clockwise]
}

/// Consecutive gaps are at least `min_step * (1 - tolerance)` and within `tolerance` of their mean
fn evenly_spaced(values: &[f32], min_step: f32, tolerance: f32) -> bool {
    if values.len() < 2 {
        return true;
    }
    let steps: Vec<f32> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let mean_step = mean(steps.iter().copied());
    steps
        .iter()
        .all(|&s| s >= min_step * (1.0 - tolerance) && (s - mean_step).abs() <= tolerance * mean_step)
}

fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 { 0.0 } else { sum / count as f32 }
}

fn median(mut values: Vec<f32>) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    values[values.len() / 2]
}
