use crate::config::ProcessingConfig;
use crate::detection::preprocessing;
use crate::error::{ErrorKind, ProcessingError, Result};
use crate::models::{ColorPatch, DetectionRegion};
use crate::steps::{CalibrationStep, ChartDetectionStep, ExtractionStep, ObjectDetectionStep};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn};

pub const COLOR_CORRECTION_VERSION: &str = "0.1.0";
pub const BANANA_EXTRACTION_VERSION: &str = "0.1.0";

/// Metadata keys written by the pipeline steps
pub mod keys {
    pub const DELTA_E_ORIG: &str = "delta_e_orig";
    pub const DELTA_E_CORRECTED: &str = "delta_e_corrected";
    pub const COLOR_CORRECTION_VERSION: &str = "color_correction_version";
    pub const NUMBER_OF_BANANAS: &str = "number_of_bananas";
    pub const BANANA_EXTRACTION_VERSION: &str = "banana_extraction_version";
}

/// Which processing the caller asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    ColorCorrection,
    ObjectExtraction,
    Combined,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::ColorCorrection => "color_correction",
            Mode::ObjectExtraction => "object_extraction",
            Mode::Combined => "combined",
        })
    }
}

/// Metadata value types
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Float(f32),
    Int(i64),
    String(String),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Float(v) => write!(f, "{v:.2}"),
            MetadataValue::Int(v) => write!(f, "{v}"),
            MetadataValue::String(v) => f.write_str(v),
        }
    }
}

pub type Metadata = BTreeMap<String, MetadataValue>;

/// Working record handed from step to step
#[derive(Clone)]
pub struct PipelineData {
    /// Normalized input image, never modified; detectors read this one
    pub source: Arc<DynamicImage>,

    /// Image being transformed by the steps
    pub image: DynamicImage,

    /// Chart patches, empty until chart detection ran
    pub patches: Vec<ColorPatch>,

    /// Detected objects, empty until object detection ran
    pub regions: Vec<DetectionRegion>,

    pub metadata: Metadata,
}

impl PipelineData {
    pub fn from_image(image: DynamicImage) -> Self {
        let source = Arc::new(image.clone());
        Self {
            source,
            image,
            patches: Vec::new(),
            regions: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Context available to all pipeline steps
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Mode the pipeline was built for
    pub mode: Mode,
}

/// Trait that all pipeline steps must implement
pub trait PipelineStep: Send + Sync {
    /// Consume the working record and return the updated one, or the step's failure
    fn process(&self, data: PipelineData, context: &PipelineContext) -> Result<PipelineData>;

    /// Human-readable name for this step (used in logs)
    fn name(&self) -> &str;
}

/// Outcome of one pipeline run
#[derive(Debug, Clone)]
pub enum ProcessingResult {
    Success {
        image: DynamicImage,
        metadata: Metadata,
    },
    Failure {
        kind: ErrorKind,
        message: String,
    },
}

impl ProcessingResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessingResult::Success { .. })
    }

    pub fn image(&self) -> Option<&DynamicImage> {
        match self {
            ProcessingResult::Success { image, .. } => Some(image),
            ProcessingResult::Failure { .. } => None,
        }
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        match self {
            ProcessingResult::Success { metadata, .. } => Some(metadata),
            ProcessingResult::Failure { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ProcessingResult::Success { .. } => None,
            ProcessingResult::Failure { kind, .. } => Some(*kind),
        }
    }
}

impl From<ProcessingError> for ProcessingResult {
    fn from(err: ProcessingError) -> Self {
        ProcessingResult::Failure {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<Result<PipelineData>> for ProcessingResult {
    fn from(result: Result<PipelineData>) -> Self {
        match result {
            Ok(data) => ProcessingResult::Success {
                image: data.image,
                metadata: data.metadata,
            },
            Err(err) => err.into(),
        }
    }
}

/// Ordered list of steps run against one image
pub struct Pipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
    context: PipelineContext,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new(mode: Mode) -> Self {
        Self {
            steps: Vec::new(),
            context: PipelineContext { mode },
        }
    }

    /// Standard step list for `mode`.
    ///
    /// Detection steps always precede the steps that modify pixels, so a detection
    /// failure leaves nothing half-applied.
    pub fn for_mode(mode: Mode, config: &ProcessingConfig) -> Self {
        let chart = || Arc::new(ChartDetectionStep::new(config.chart.clone()));
        let objects = || Arc::new(ObjectDetectionStep::new(config.objects.clone(), config.chart.clone()));
        let calibration = || Arc::new(CalibrationStep::new());
        let extraction = || Arc::new(ExtractionStep::new(config.extraction.clone()));

        let pipeline = Pipeline::new(mode);
        match mode {
            Mode::ColorCorrection => pipeline.add_step(chart()).add_step(calibration()),
            Mode::ObjectExtraction => pipeline.add_step(objects()).add_step(extraction()),
            Mode::Combined => pipeline
                .add_step(chart())
                .add_step(objects())
                .add_step(calibration())
                .add_step(extraction()),
        }
    }

    /// Add a processing step to the pipeline
    pub fn add_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Helper method to add a step from a Box (for convenience)
    pub fn add_step_boxed(mut self, step: Box<dyn PipelineStep>) -> Self {
        self.steps.push(Arc::from(step));
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step, converting the outcome into a [`ProcessingResult`]
    pub fn run(&self, input: &DynamicImage) -> ProcessingResult {
        self.try_run(input).into()
    }

    /// Run every step, stopping at the first failure
    pub fn try_run(&self, input: &DynamicImage) -> Result<PipelineData> {
        let span = info_span!("pipeline", mode = %self.context.mode);
        let _guard = span.enter();

        let mut data = PipelineData::from_image(preprocessing::normalize(input)?);

        for step in &self.steps {
            let started = Instant::now();
            data = match step.process(data, &self.context) {
                Ok(data) => data,
                Err(err) => {
                    warn!(step = step.name(), error = %err, "step failed");
                    return Err(err);
                }
            };
            debug!(step = step.name(), elapsed_ms = started.elapsed().as_millis() as u64, "step finished");
        }

        info!(
            width = data.image.width(),
            height = data.image.height(),
            metadata = data.metadata.len(),
            "pipeline finished"
        );
        Ok(data)
    }
}
