//! Sequential operation pipeline with per-step failure isolation.
//!
//! A request moves through `Idle → Decoding → Stepping(i) → Encoding →
//! Done`. Every step is resolved, validated, built and applied in turn; if
//! any of that fails the step is recorded as skipped and the previous
//! raster carries forward. Only decode and final encode failures fail the
//! whole request.
//!
//! # Example
//!
//! ```ignore
//! use pixelflow_core::pipeline::{OperationStep, Pipeline, PipelineConfig};
//!
//! let pipeline = Pipeline::new(PipelineConfig::default());
//! let steps = vec![OperationStep::new("threshold", Some("otsu"))];
//! let result = pipeline.run(&base64_png, &steps);
//! assert!(result.success);
//! ```

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::codec::{self, CodecLimits, OutputFormat};
use crate::error::{ErrorKind, PipelineError, Result};
use crate::kernels::{ImageKernels, NativeKernels};
use crate::operation::{GeometricOp, Operation};
use crate::params::{ParamMap, ParamValue};
use crate::raster::RasterImage;
use crate::registry;
use crate::validate::validate;

/// Where a request currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Decoding,
    Stepping(usize),
    Encoding,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Decoding => f.write_str("decoding"),
            Self::Stepping(i) => write!(f, "stepping({i})"),
            Self::Encoding => f.write_str("encoding"),
            Self::Done => f.write_str("done"),
        }
    }
}

/// One requested operation, possibly with partial parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationStep {
    pub family: String,
    pub method: Option<String>,
    pub params: ParamMap,
    /// Set when the step could not be read at all; the pipeline skips it.
    pub rejected: Option<String>,
}

impl OperationStep {
    pub fn new(family: impl Into<String>, method: Option<&str>) -> Self {
        Self {
            family: family.into(),
            method: method.map(str::to_string),
            ..Self::default()
        }
    }

    /// A step that is recorded as skipped with `reason`.
    pub fn rejected(family: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            rejected: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn with_param(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }
}

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepReport {
    Applied {
        index: usize,
        family: String,
        method: String,
    },
    Skipped {
        index: usize,
        family: String,
        reason: String,
        kind: ErrorKind,
    },
}

impl StepReport {
    pub fn index(&self) -> usize {
        match self {
            Self::Applied { index, .. } | Self::Skipped { index, .. } => *index,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Executor settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Format of the final encode, independent of the input format.
    pub output_format: OutputFormat,
    /// Wall-clock budget checked before each step.
    pub deadline: Option<Duration>,
    /// Steps beyond this count are skipped.
    pub max_steps: usize,
    pub codec: CodecLimits,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Png,
            deadline: Some(Duration::from_secs(30)),
            max_steps: 64,
            codec: CodecLimits::default(),
        }
    }
}

/// Result of a whole pipeline request.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    pub success: bool,
    /// Encoded output when `success` is true.
    pub image: Option<Vec<u8>>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub message: Option<String>,
    pub error_kind: Option<ErrorKind>,
    /// Stage the request ended in: `Done` on success.
    pub stage: Stage,
    pub steps: Vec<StepReport>,
}

impl PipelineResult {
    fn failure(stage: Stage, format: OutputFormat, err: &PipelineError, steps: Vec<StepReport>) -> Self {
        Self {
            success: false,
            image: None,
            format,
            width: 0,
            height: 0,
            message: Some(err.to_string()),
            error_kind: Some(err.kind()),
            stage,
            steps,
        }
    }

    /// Steps that were skipped, in order.
    pub fn skipped(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| !s.is_applied())
    }

    /// Encoded output as a data URI.
    pub fn data_uri(&self) -> Option<String> {
        self.image
            .as_deref()
            .map(|bytes| codec::to_data_uri(bytes, self.format))
    }
}

/// Runs operation lists against images.
#[derive(Debug, Clone, Default)]
pub struct Pipeline<K = NativeKernels> {
    kernels: K,
    config: PipelineConfig,
}

impl Pipeline<NativeKernels> {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            kernels: NativeKernels,
            config,
        }
    }
}

impl<K: ImageKernels> Pipeline<K> {
    pub fn with_kernels(kernels: K, config: PipelineConfig) -> Self {
        Self { kernels, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Decode base64 (or a data URI), run `steps`, encode the result.
    pub fn run(&self, encoded: &str, steps: &[OperationStep]) -> PipelineResult {
        enter(Stage::Idle);
        enter(Stage::Decoding);
        match codec::decode_base64_with(encoded, &self.config.codec) {
            Ok(image) => self.finish(image, steps),
            Err(err) => {
                let err = PipelineError::from(err);
                warn!(error = %err, "decode failed");
                PipelineResult::failure(Stage::Decoding, self.config.output_format, &err, Vec::new())
            }
        }
    }

    /// Same as [`Pipeline::run`] for raw encoded bytes.
    pub fn run_bytes(&self, bytes: &[u8], steps: &[OperationStep]) -> PipelineResult {
        enter(Stage::Idle);
        enter(Stage::Decoding);
        match codec::decode_with(bytes, &self.config.codec) {
            Ok(image) => self.finish(image, steps),
            Err(err) => {
                let err = PipelineError::from(err);
                warn!(error = %err, "decode failed");
                PipelineResult::failure(Stage::Decoding, self.config.output_format, &err, Vec::new())
            }
        }
    }

    fn finish(&self, image: RasterImage, steps: &[OperationStep]) -> PipelineResult {
        let (image, reports) = self.run_raster(image, steps);
        let format = self.config.output_format;

        enter(Stage::Encoding);
        match codec::encode(&image, format) {
            Ok(bytes) => {
                enter(Stage::Done);
                let applied = reports.iter().filter(|r| r.is_applied()).count();
                info!(
                    steps = reports.len(),
                    applied,
                    width = image.width(),
                    height = image.height(),
                    bytes = bytes.len(),
                    "pipeline complete"
                );
                PipelineResult {
                    success: true,
                    image: Some(bytes),
                    format,
                    width: image.width(),
                    height: image.height(),
                    message: None,
                    error_kind: None,
                    stage: Stage::Done,
                    steps: reports,
                }
            }
            Err(err) => {
                let err = PipelineError::from(err);
                warn!(error = %err, "encode failed");
                PipelineResult::failure(Stage::Encoding, format, &err, reports)
            }
        }
    }

    /// Apply `steps` in order to a decoded raster.
    ///
    /// Never fails: each failing step is skipped and reported.
    pub fn run_raster(&self, image: RasterImage, steps: &[OperationStep]) -> (RasterImage, Vec<StepReport>) {
        let started = Instant::now();
        let mut current = image;
        let mut reports = Vec::with_capacity(steps.len());

        for (index, step) in steps.iter().enumerate() {
            enter(Stage::Stepping(index));

            let outcome = if index >= self.config.max_steps {
                Err(PipelineError::StepLimit {
                    limit: self.config.max_steps,
                })
            } else if self.config.deadline.is_some_and(|d| started.elapsed() > d) {
                Err(PipelineError::DeadlineExceeded {
                    elapsed_ms: started.elapsed().as_millis(),
                })
            } else {
                self.apply_step(&current, step)
            };

            match outcome {
                Ok((next, op)) => {
                    let method = op.method();
                    debug!(
                        index,
                        %method,
                        width = next.width(),
                        height = next.height(),
                        "step applied"
                    );
                    current = next;
                    reports.push(StepReport::Applied {
                        index,
                        family: method.family().to_string(),
                        method: method.name().to_string(),
                    });
                }
                Err(err) => {
                    warn!(index, family = %step.family, error = %err, "skipping step");
                    reports.push(StepReport::Skipped {
                        index,
                        family: step.family.clone(),
                        reason: err.to_string(),
                        kind: err.kind(),
                    });
                }
            }
        }

        (current, reports)
    }

    /// Resolve, validate, build and apply one step.
    fn apply_step(&self, image: &RasterImage, step: &OperationStep) -> Result<(RasterImage, Operation)> {
        if let Some(reason) = &step.rejected {
            return Err(PipelineError::invalid("step", reason.clone()));
        }
        if step.family.is_empty() {
            return Err(PipelineError::invalid("type", "missing operation type"));
        }
        let method = registry::resolve(&step.family, step.method.as_deref())?;
        let params = validate(method, &step.params)?;
        let op = Operation::build(method, &params)?;

        let (out_w, out_h) = op.output_dimensions(image.width(), image.height());
        if !self.config.codec.allows(out_w, out_h) {
            let name = match op {
                Operation::Geometric(GeometricOp::Rotate { .. }) => "angle",
                _ => "width",
            };
            return Err(PipelineError::invalid(
                name,
                format!(
                    "output {out_w}x{out_h} exceeds the {} pixel limit",
                    self.config.codec.max_pixels
                ),
            ));
        }

        let failure = |reason: String| PipelineError::StepFailure {
            family: method.family().to_string(),
            method: method.name().to_string(),
            reason,
        };

        let output = panic::catch_unwind(AssertUnwindSafe(|| self.kernels.apply(image, &op)))
            .map_err(|payload| failure(format!("kernel panicked: {}", panic_message(&payload))))?
            .map_err(|e| failure(e.to_string()))?;

        if output.is_empty() {
            return Err(failure("kernel produced an empty image".into()));
        }
        Ok((output, op))
    }
}

fn enter(stage: Stage) {
    debug!(%stage, "pipeline stage");
}

fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
