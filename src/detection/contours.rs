use crate::models::Component;
use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use std::collections::BTreeMap;

/// Find connected foreground regions (non-zero pixels) of a binary mask.
///
/// Components smaller than `min_area` pixels are dropped; the rest are returned
/// in label order, which follows raster order of each component's first pixel.
pub fn find_components(mask: &GrayImage, connectivity: Connectivity, min_area: u32) -> Vec<Component> {
    find_weighted_components(mask, connectivity, min_area, |_, _| 0.0)
}

/// Like [`find_components`], also summing `weight(x, y)` over each component's pixels
pub fn find_weighted_components<F>(
    mask: &GrayImage,
    connectivity: Connectivity,
    min_area: u32,
    weight: F,
) -> Vec<Component>
where
    F: Fn(u32, u32) -> f32,
{
    let labeled = connected_components(mask, connectivity, Luma([0u8]));

    let mut regions: BTreeMap<u32, Component> = BTreeMap::new();

    for (x, y, label) in labeled.enumerate_pixels() {
        let label_val = label[0];
        if label_val == 0 {
            continue; // Skip background
        }
        let w = weight(x, y) as f64;

        regions
            .entry(label_val)
            .and_modify(|c| {
                c.min_x = c.min_x.min(x);
                c.min_y = c.min_y.min(y);
                c.max_x = c.max_x.max(x);
                c.max_y = c.max_y.max(y);
                c.pixel_count += 1;
                c.sum_x += x as u64;
                c.sum_y += y as u64;
                c.weight_sum += w;
            })
            .or_insert(Component {
                label: label_val,
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
                pixel_count: 1,
                sum_x: x as u64,
                sum_y: y as u64,
                weight_sum: w,
            });
    }

    regions
        .into_values()
        .filter(|c| c.pixel_count >= min_area)
        .collect()
}
