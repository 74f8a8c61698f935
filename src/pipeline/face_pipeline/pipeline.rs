use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use image::RgbImage;
use tracing::{debug, warn};
use crate::error::AnalysisError;
use crate::inference::{FaceBoxSource, ModelRegistry};
use crate::pipeline::face_pipeline::config::{AnalysisConfig, NoFacePolicy};
use crate::pipeline::module::acne_detection::AcneDetector;
use crate::pipeline::module::attribute_detector::{panic_message, Attribute, AttributeDetector, DetectionResult};
use crate::pipeline::module::face_locator::{FaceLocator, FaceRegion};
use crate::pipeline::module::face_shape::FaceShapeDetector;
use crate::pipeline::module::lighting_analysis::{LightingAnalyzer, LightingVerdict};
use crate::pipeline::module::result_aggregator::{AggregatedReport, ReportEntry, ResultAggregator};
use crate::pipeline::module::skin_type::SkinTypeDetector;
use crate::pipeline::module::wrinkle_detection::WrinkleDetector;
use crate::utils::utils::load_image;

pub const LIGHTING_KEY: &str = "Lighting";
pub const FACE_BOX_KEY: &str = "FaceBox";
const FACE_LOCATOR: &str = "face_locator";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Start,
    Located,
    LightingChecked,
    Detected,
    Aggregated,
    Emitted,
    Failed,
}

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct FaceAnalysis {
    pub report: AggregatedReport,
    /// The expanded face crop, when a face was found.
    pub face_region: Option<FaceRegion>,
    pub lighting: Option<LightingVerdict>,
    pub stages: Vec<PipelineStage>,
}

impl FaceAnalysis {
    /// Serializes the report for output.
    pub fn emit(&mut self, pretty: bool) -> Result<String, serde_json::Error> {
        let json = self.report.to_json(pretty)?;
        advance(&mut self.stages, PipelineStage::Emitted);
        Ok(json)
    }

    /// Writes the face crop to `path`. Returns `false` when no face was found.
    pub fn save_face_region(&self, path: &Path) -> Result<bool, image::ImageError> {
        match &self.face_region {
            Some(region) => {
                region.image().save(path)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Drives one image through locate -> lighting -> detectors -> aggregate.
pub struct FacePipeline {
    face_locator: Arc<FaceLocator>,
    lighting_analyzer: Option<LightingAnalyzer>,
    gate_on_uneven_lighting: bool,
    detectors: Vec<Arc<dyn AttributeDetector>>,
    aggregator: ResultAggregator,
    no_face_policy: NoFacePolicy,
    timeout: Duration,
    concurrent: bool,
}

impl FacePipeline {
    /// Wires the four attribute detectors to the preloaded models.
    pub fn new(config: &AnalysisConfig, models: &ModelRegistry) -> Result<Self, AnalysisError> {
        let detectors: Vec<Arc<dyn AttributeDetector>> = vec![
            Arc::new(FaceShapeDetector::new(models.face_shape.clone(), &config.face_shape)),
            Arc::new(SkinTypeDetector::new(models.skin_type.clone(), &config.skin_type)),
            Arc::new(AcneDetector::new(models.acne.clone(), &config.acne)),
            Arc::new(WrinkleDetector::new(models.wrinkle.clone(), &config.wrinkle)),
        ];
        Self::with_detectors(config, models.face_detector.clone(), detectors)
    }

    /// Builds a pipeline around an arbitrary detector set. Results are merged
    /// in the order given here.
    pub fn with_detectors(
        config: &AnalysisConfig,
        face_detector: Arc<dyn FaceBoxSource>,
        detectors: Vec<Arc<dyn AttributeDetector>>,
    ) -> Result<Self, AnalysisError> {
        config.validate()?;

        let mut seen: Vec<Attribute> = Vec::new();
        for detector in &detectors {
            let attribute = detector.attribute();
            if seen.contains(&attribute) {
                warn!("two detectors write {}; the later one wins", attribute);
            }
            seen.push(attribute);
        }

        Ok(FacePipeline {
            face_locator: Arc::new(FaceLocator::new(face_detector, &config.face_locator)),
            lighting_analyzer: config.lighting.enabled.then(|| LightingAnalyzer::new(&config.lighting)),
            gate_on_uneven_lighting: config.lighting.gate_detectors,
            detectors,
            aggregator: ResultAggregator::new(),
            no_face_policy: config.pipeline.no_face_policy,
            timeout: config.pipeline.timeout(),
            concurrent: config.pipeline.concurrent_detectors,
        })
    }

    /// Decodes the photo at `path` and analyzes it. Only a decode failure is
    /// returned as an error.
    pub async fn analyze_path(&self, path: &Path) -> Result<FaceAnalysis, AnalysisError> {
        let img = match load_image(path) {
            Ok(img) => img,
            Err(e) => {
                debug!("pipeline stage {:?} -> {:?}", PipelineStage::Start, PipelineStage::Failed);
                return Err(e);
            }
        };
        Ok(self.analyze(&img).await)
    }

    pub async fn analyze(&self, img: &RgbImage) -> FaceAnalysis {
        let mut stages = vec![PipelineStage::Start];
        let mut report = AggregatedReport::new();

        let shared = Arc::new(img.clone());
        let face_region = match self.locate_face(&shared).await {
            Ok(region) => {
                report.insert(FACE_BOX_KEY, ReportEntry::FaceBox(region.bounds()));
                Some(region)
            }
            Err(e) => {
                warn!("face not located: {}", e);
                report.insert(FACE_BOX_KEY, ReportEntry::error(e.to_string()));
                None
            }
        };
        advance(&mut stages, PipelineStage::Located);

        let lighting = self.check_lighting(&shared).await;
        let mut precondition_failure = None;
        if let (Some(analyzer), Some(verdict)) = (&self.lighting_analyzer, &lighting) {
            report.insert(LIGHTING_KEY, ReportEntry::Lighting(*verdict));
            if verdict.is_uneven() && self.gate_on_uneven_lighting {
                precondition_failure = Some(format!(
                    "uneven lighting (brightness difference {:.1} exceeds {})",
                    verdict.brightness_diff,
                    analyzer.threshold()
                ));
            }
            advance(&mut stages, PipelineStage::LightingChecked);
        }

        let target = match (&face_region, self.no_face_policy) {
            (Some(region), _) => Ok(region.clone()),
            (None, NoFacePolicy::FullFrame) => FaceRegion::full_frame(img),
            (None, NoFacePolicy::Skip) => Err(AnalysisError::NoFaceDetected),
        };
        let results = match (precondition_failure, target) {
            (Some(reason), _) => self.fail_all(&reason),
            (None, Err(e)) => self.fail_all(&e.to_string()),
            (None, Ok(region)) => self.run_detectors(region).await,
        };
        advance(&mut stages, PipelineStage::Detected);

        self.aggregator.merge_into(&mut report, results.into_iter().map(|(attribute, result)| (attribute.key(), result)));
        advance(&mut stages, PipelineStage::Aggregated);

        FaceAnalysis {
            report,
            face_region,
            lighting,
            stages,
        }
    }

    /// Runs the face detector off the executor, bounded by the detector timeout.
    async fn locate_face(&self, img: &Arc<RgbImage>) -> Result<FaceRegion, AnalysisError> {
        let face_locator = self.face_locator.clone();
        let img = img.clone();
        let task = tokio::task::spawn_blocking(move || face_locator.extract(&img));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                let message = if e.is_panic() {
                    format!("panicked: {}", panic_message(&*e.into_panic()))
                } else {
                    e.to_string()
                };
                Err(AnalysisError::DetectorInvocation {
                    detector: FACE_LOCATOR.to_string(),
                    message,
                })
            }
            Err(_) => Err(AnalysisError::DetectorTimeout {
                detector: FACE_LOCATOR.to_string(),
                timeout: self.timeout,
            }),
        }
    }

    async fn check_lighting(&self, img: &Arc<RgbImage>) -> Option<LightingVerdict> {
        let analyzer = self.lighting_analyzer.clone()?;
        let img = img.clone();
        match tokio::task::spawn_blocking(move || analyzer.analyze(&img)).await {
            Ok(verdict) => Some(verdict),
            Err(e) => {
                warn!("lighting analysis failed: {}", e);
                None
            }
        }
    }

    fn fail_all(&self, reason: &str) -> Vec<(Attribute, DetectionResult)> {
        self.detectors
            .iter()
            .map(|detector| (detector.attribute(), DetectionResult::failure(reason)))
            .collect()
    }

    async fn run_detectors(&self, region: FaceRegion) -> Vec<(Attribute, DetectionResult)> {
        let mut results = Vec::with_capacity(self.detectors.len());

        if self.concurrent {
            let handles: Vec<_> = self
                .detectors
                .iter()
                .map(|detector| {
                    let attribute = detector.attribute();
                    (attribute, tokio::spawn(run_detector(detector.clone(), region.clone(), self.timeout)))
                })
                .collect();
            // awaited in registration order so completion order never leaks
            // into the report
            for (attribute, handle) in handles {
                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => DetectionResult::failure(format!("{} task failed: {}", attribute, e)),
                };
                results.push((attribute, result));
            }
        } else {
            for detector in &self.detectors {
                let result = run_detector(detector.clone(), region.clone(), self.timeout).await;
                results.push((detector.attribute(), result));
            }
        }
        results
    }
}

fn advance(stages: &mut Vec<PipelineStage>, next: PipelineStage) {
    if let Some(current) = stages.last() {
        debug!("pipeline stage {:?} -> {:?}", current, next);
    }
    stages.push(next);
}

async fn run_detector(detector: Arc<dyn AttributeDetector>, region: FaceRegion, timeout: Duration) -> DetectionResult {
    let attribute = detector.attribute();
    let started = Instant::now();
    let task = tokio::task::spawn_blocking(move || detector.infer(&region));

    let result = match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) if e.is_panic() => {
            DetectionResult::failure(format!("{} panicked: {}", attribute, panic_message(&*e.into_panic())))
        }
        Ok(Err(e)) => DetectionResult::failure(format!("{} task failed: {}", attribute, e)),
        Err(_) => DetectionResult::failure(AnalysisError::DetectorTimeout {
            detector: attribute.key().to_string(),
            timeout,
        }),
    };

    match &result {
        DetectionResult::Success(_) => debug!("{} finished in {:?}", attribute, started.elapsed()),
        DetectionResult::Failure(reason) => warn!("{} failed after {:?}: {}", attribute, started.elapsed(), reason),
    }
    result
}

/// Single-key document emitted when no report can be produced.
pub fn error_document(err: &AnalysisError) -> String {
    serde_json::json!({ "error": err.to_string() }).to_string()
}
