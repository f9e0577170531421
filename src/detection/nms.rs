use crate::models::DetectionRegion;
use std::cmp::Ordering;

/// Order by descending confidence, then top-to-bottom, left-to-right
pub fn by_confidence(a: &DetectionRegion, b: &DetectionRegion) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then(a.bbox.y.cmp(&b.bbox.y))
        .then(a.bbox.x.cmp(&b.bbox.x))
}

/// Greedy non-maximum suppression.
///
/// Walks regions from most to least confident and drops any region whose IoU with
/// an already kept region exceeds `iou_threshold`. The result is sorted by
/// [`by_confidence`].
pub fn non_max_suppression(mut regions: Vec<DetectionRegion>, iou_threshold: f32) -> Vec<DetectionRegion> {
    regions.sort_by(by_confidence);

    let mut kept: Vec<DetectionRegion> = Vec::with_capacity(regions.len());
    for region in regions {
        let duplicate = kept
            .iter()
            .any(|k| k.bbox.iou(&region.bbox) > iou_threshold);
        if !duplicate {
            kept.push(region);
        }
    }
    kept
}
