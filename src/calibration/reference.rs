//! Reference values of the 24-patch Macbeth ColorChecker Classic.

use crate::models::BoundingBox;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use palette::Srgb;

pub const CHART_ROWS: usize = 4;
pub const CHART_COLS: usize = 6;
pub const PATCH_COUNT: usize = CHART_ROWS * CHART_COLS;

/// Patch names and 8-bit sRGB (D65) values, row-major from the brown patch
pub const COLOR_CHECKER: [(&str, [u8; 3]); PATCH_COUNT] = [
    ("dark skin", [115, 82, 68]),
    ("light skin", [194, 150, 130]),
    ("blue sky", [98, 122, 157]),
    ("foliage", [87, 108, 67]),
    ("blue flower", [133, 128, 177]),
    ("bluish green", [103, 189, 170]),
    ("orange", [214, 126, 44]),
    ("purplish blue", [80, 91, 166]),
    ("moderate red", [193, 90, 99]),
    ("purple", [94, 60, 108]),
    ("yellow green", [157, 188, 64]),
    ("orange yellow", [224, 163, 46]),
    ("blue", [56, 61, 150]),
    ("green", [70, 148, 73]),
    ("red", [175, 54, 60]),
    ("yellow", [231, 199, 31]),
    ("magenta", [187, 86, 149]),
    ("cyan", [8, 133, 161]),
    ("white", [243, 243, 242]),
    ("neutral 8", [200, 200, 200]),
    ("neutral 6.5", [160, 160, 160]),
    ("neutral 5", [122, 122, 121]),
    ("neutral 3.5", [85, 85, 85]),
    ("black", [52, 52, 52]),
];

/// Reference color of patch `index` with channels in [0, 1]
pub fn reference_color(index: usize) -> Srgb {
    let [r, g, b] = COLOR_CHECKER[index].1;
    Srgb::new(r, g, b).into_format()
}

/// Layout of a synthetic chart rendered by [`render_chart`]
#[derive(Debug, Clone, Copy)]
pub struct ChartLayout {
    pub cell_size: u32,
    pub gap: u32,
    /// Frame color around and between the patches
    pub frame: [u8; 3],
}

impl Default for ChartLayout {
    fn default() -> Self {
        Self {
            cell_size: 40,
            gap: 10,
            frame: [16, 16, 16],
        }
    }
}

impl ChartLayout {
    pub fn width(&self) -> u32 {
        CHART_COLS as u32 * (self.cell_size + self.gap) + self.gap
    }

    pub fn height(&self) -> u32 {
        CHART_ROWS as u32 * (self.cell_size + self.gap) + self.gap
    }

    /// Box of the patch at `row`, `col`, relative to the chart origin
    pub fn cell(&self, row: usize, col: usize) -> BoundingBox {
        let pitch = self.cell_size + self.gap;
        BoundingBox::new(
            self.gap + col as u32 * pitch,
            self.gap + row as u32 * pitch,
            self.cell_size,
            self.cell_size,
        )
    }
}

/// Render an upright chart with its reference colors
pub fn render_chart(layout: &ChartLayout) -> RgbImage {
    let mut img = RgbImage::from_pixel(layout.width(), layout.height(), Rgb(layout.frame));

    for (index, (_, color)) in COLOR_CHECKER.iter().enumerate() {
        let cell = layout.cell(index / CHART_COLS, index % CHART_COLS);
        draw_filled_rect_mut(
            &mut img,
            Rect::at(cell.x as i32, cell.y as i32).of_size(cell.width, cell.height),
            Rgb(*color),
        );
    }

    img
}
