use palette::Srgb;

/// Axis-aligned bounding box in image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Exclusive right edge
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= x || bottom <= y {
            return None;
        }
        Some(BoundingBox::new(x, y, right - x, bottom - y))
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        BoundingBox::new(x, y, right - x, bottom - y)
    }

    /// Intersection over union, 0 for disjoint or empty boxes
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter = self.intersection(other).map_or(0, |b| b.area());
        let union = self.area() + other.area() - inter;
        if union == 0 {
            return 0.0;
        }
        inter as f32 / union as f32
    }

    /// Grow by `padding` on every side, clamped to a `width` x `height` frame
    pub fn padded(&self, padding: u32, width: u32, height: u32) -> BoundingBox {
        let x = self.x.saturating_sub(padding);
        let y = self.y.saturating_sub(padding);
        let right = self.right().saturating_add(padding).min(width);
        let bottom = self.bottom().saturating_add(padding).min(height);
        BoundingBox::new(x, y, right.saturating_sub(x), bottom.saturating_sub(y))
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

/// Connected component statistics gathered from a labelled mask
#[derive(Debug, Clone)]
pub struct Component {
    pub label: u32,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
    pub pixel_count: u32,
    pub sum_x: u64,
    pub sum_y: u64,
    /// Sum of a caller-supplied per-pixel weight
    pub weight_sum: f64,
}

impl Component {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    pub fn area(&self) -> u32 {
        self.pixel_count
    }

    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(self.min_x, self.min_y, self.width(), self.height())
    }

    /// Share of the bounding box covered by component pixels
    pub fn fill_ratio(&self) -> f32 {
        self.pixel_count as f32 / (self.width() as f32 * self.height() as f32)
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width() as f32 / self.height() as f32
    }

    /// Average of the per-pixel weight
    pub fn mean_weight(&self) -> f32 {
        (self.weight_sum / self.pixel_count as f64) as f32
    }

    pub fn centroid(&self) -> (f32, f32) {
        (
            self.sum_x as f32 / self.pixel_count as f32,
            self.sum_y as f32 / self.pixel_count as f32,
        )
    }
}

/// One calibration chart cell paired with its reference color
#[derive(Debug, Clone, PartialEq)]
pub struct ColorPatch {
    /// Row-major position on the chart
    pub index: usize,
    pub name: &'static str,
    pub centroid: (f32, f32),
    pub bbox: BoundingBox,
    /// Mean sRGB color sampled from the image, channels in [0, 1]
    pub measured: Srgb,
    /// Expected sRGB color from the chart specification
    pub reference: Srgb,
}

/// One located object instance
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRegion {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub label: String,
}

/// Mean CIEDE2000 distance to the chart references before and after correction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorMetrics {
    pub delta_e_before: f32,
    pub delta_e_after: f32,
}
