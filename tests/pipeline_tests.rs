use std::sync::Arc;
use std::thread;
use std::time::Duration;
use anyhow::{anyhow, Error};
use image::{GrayImage, Rgb, RgbImage};
use parking_lot::Mutex;
use face_attribute_pipeline::{
    error_document, AnalysisConfig, AnalysisError, Attribute, AttributeDetector, AttributeValue, CascadeParams,
    FaceBox, FaceBoxSource, FacePipeline, FaceRegion, FaceShapeLabel, LightingStatus, PipelineStage, RawFaceBox,
    ReportEntry, SkinTypeLabel, WrinkleRegion,
};

struct FixedFaces(Vec<RawFaceBox>);

struct StalledFaces(Duration);

impl FaceBoxSource for StalledFaces {
    fn detect(&self, _gray: &GrayImage, _params: &CascadeParams) -> Result<Vec<RawFaceBox>, Error> {
        thread::sleep(self.0);
        Ok(vec![RawFaceBox { x: 100, y: 100, w: 50, h: 50 }])
    }
}

struct BrokenFaces;

impl FaceBoxSource for BrokenFaces {
    fn detect(&self, _gray: &GrayImage, _params: &CascadeParams) -> Result<Vec<RawFaceBox>, Error> {
        panic!("cascade state corrupted")
    }
}

impl FaceBoxSource for FixedFaces {
    fn detect(&self, _gray: &GrayImage, _params: &CascadeParams) -> Result<Vec<RawFaceBox>, Error> {
        Ok(self.0.clone())
    }
}

enum Behavior {
    Return(AttributeValue),
    Fail(&'static str),
    Panic,
    Sleep(Duration),
}

/// Records the size of every region it is handed.
struct FakeDetector {
    attribute: Attribute,
    behavior: Behavior,
    seen: Mutex<Vec<(u32, u32)>>,
}

impl FakeDetector {
    fn new(attribute: Attribute, behavior: Behavior) -> Arc<Self> {
        Arc::new(FakeDetector {
            attribute,
            behavior,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(u32, u32)> {
        self.seen.lock().clone()
    }
}

impl AttributeDetector for FakeDetector {
    fn attribute(&self) -> Attribute {
        self.attribute
    }

    fn detect(&self, region: &FaceRegion) -> Result<AttributeValue, Error> {
        self.seen.lock().push(region.image().dimensions());
        match &self.behavior {
            Behavior::Return(value) => Ok(value.clone()),
            Behavior::Fail(message) => Err(anyhow!(*message)),
            Behavior::Panic => panic!("model segfaulted"),
            Behavior::Sleep(duration) => {
                thread::sleep(*duration);
                Ok(AttributeValue::AcneCount(0))
            }
        }
    }
}

fn wrinkles() -> AttributeValue {
    AttributeValue::Wrinkles(vec![WrinkleRegion {
        label: "wrinkle".to_string(),
        confidence: 0.66,
        bbox: [4.0, 6.0, 40.0, 12.0],
    }])
}

struct Harness {
    face_shape: Arc<FakeDetector>,
    skin_type: Arc<FakeDetector>,
    acne: Arc<FakeDetector>,
    wrinkle: Arc<FakeDetector>,
}

impl Harness {
    fn new(acne: Behavior) -> Self {
        Harness {
            face_shape: FakeDetector::new(Attribute::FaceShape, Behavior::Return(AttributeValue::FaceShape(FaceShapeLabel::Square))),
            skin_type: FakeDetector::new(Attribute::SkinType, Behavior::Return(AttributeValue::SkinType(SkinTypeLabel::Oily))),
            acne: FakeDetector::new(Attribute::AcnePrediction, acne),
            wrinkle: FakeDetector::new(Attribute::Wrinkles, Behavior::Return(wrinkles())),
        }
    }

    fn pipeline(&self, config: &AnalysisConfig, faces: Vec<RawFaceBox>) -> FacePipeline {
        self.pipeline_with_source(config, Arc::new(FixedFaces(faces))).unwrap()
    }

    fn pipeline_with_source(
        &self,
        config: &AnalysisConfig,
        face_source: Arc<dyn FaceBoxSource>,
    ) -> Result<FacePipeline, AnalysisError> {
        let detectors: Vec<Arc<dyn AttributeDetector>> = vec![
            self.face_shape.clone(),
            self.skin_type.clone(),
            self.acne.clone(),
            self.wrinkle.clone(),
        ];
        FacePipeline::with_detectors(config, face_source, detectors)
    }
}

fn portrait() -> RgbImage {
    RgbImage::from_fn(500, 500, |x, y| Rgb([120 + (x % 8) as u8, 110 + (y % 8) as u8, 100]))
}

fn one_face() -> Vec<RawFaceBox> {
    vec![RawFaceBox { x: 100, y: 100, w: 50, h: 50 }]
}

fn error_of(entry: Option<&ReportEntry>) -> String {
    match entry {
        Some(ReportEntry::Error(marker)) => marker.error.clone(),
        other => panic!("expected an error marker, got {:?}", other),
    }
}

#[tokio::test]
async fn test_full_report() {
    let harness = Harness::new(Behavior::Return(AttributeValue::AcneCount(5)));
    let pipeline = harness.pipeline(&AnalysisConfig::new(), one_face());

    let mut analysis = pipeline.analyze(&portrait()).await;
    let report = &analysis.report;

    assert_eq!(report.get("AcnePrediction"), Some(&ReportEntry::Attribute(AttributeValue::AcneCount(5))));
    assert_eq!(report.get("FaceShape"), Some(&ReportEntry::Attribute(AttributeValue::FaceShape(FaceShapeLabel::Square))));
    assert_eq!(report.get("SkinType"), Some(&ReportEntry::Attribute(AttributeValue::SkinType(SkinTypeLabel::Oily))));
    assert_eq!(report.get("Wrinkles"), Some(&ReportEntry::Attribute(wrinkles())));
    assert_eq!(report.get("FaceBox"), Some(&ReportEntry::FaceBox(FaceBox { x: 85, y: 77, w: 80, h: 88 })));
    assert!(matches!(report.get("Lighting"), Some(ReportEntry::Lighting(v)) if v.status == LightingStatus::Even));
    assert_eq!(report.len(), 6);

    // every detector got the expanded crop, not the whole photo
    assert_eq!(harness.acne.calls(), vec![(80, 88)]);
    assert_eq!(harness.wrinkle.calls(), vec![(80, 88)]);

    let json = analysis.emit(false).unwrap();
    assert_eq!(
        analysis.stages,
        vec![
            PipelineStage::Start,
            PipelineStage::Located,
            PipelineStage::LightingChecked,
            PipelineStage::Detected,
            PipelineStage::Aggregated,
            PipelineStage::Emitted,
        ]
    );

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["AcnePrediction"], 5);
    assert_eq!(value["FaceShape"], "Square");
    assert_eq!(value["SkinType"], "oily");
    assert_eq!(value["Wrinkles"][0]["bbox"][2], 40.0);
}

#[tokio::test]
async fn test_acne_failure_is_isolated() {
    let harness = Harness::new(Behavior::Fail("acne weights corrupted"));
    let analysis = harness.pipeline(&AnalysisConfig::new(), one_face()).analyze(&portrait()).await;
    let report = &analysis.report;

    assert_eq!(error_of(report.get("AcnePrediction")), "acne weights corrupted");
    assert!(!report.get("FaceShape").unwrap().is_error());
    assert!(!report.get("SkinType").unwrap().is_error());
    assert!(!report.get("Wrinkles").unwrap().is_error());
}

#[tokio::test]
async fn test_acne_panic_is_isolated() {
    let harness = Harness::new(Behavior::Panic);
    let analysis = harness.pipeline(&AnalysisConfig::new(), one_face()).analyze(&portrait()).await;
    let report = &analysis.report;

    assert_eq!(error_of(report.get("AcnePrediction")), "AcnePrediction panicked: model segfaulted");
    assert_eq!(report.get("SkinType"), Some(&ReportEntry::Attribute(AttributeValue::SkinType(SkinTypeLabel::Oily))));
}

#[tokio::test]
async fn test_slow_detector_times_out() {
    let mut config = AnalysisConfig::new();
    config.pipeline.timeout_ms = 50;
    let harness = Harness::new(Behavior::Sleep(Duration::from_millis(400)));

    let analysis = harness.pipeline(&config, one_face()).analyze(&portrait()).await;

    assert_eq!(error_of(analysis.report.get("AcnePrediction")), "AcnePrediction timed out after 50ms");
    assert!(!analysis.report.get("FaceShape").unwrap().is_error());
}

#[tokio::test]
async fn test_sequential_matches_concurrent() {
    let concurrent = Harness::new(Behavior::Fail("boom"));
    let sequential = Harness::new(Behavior::Fail("boom"));
    let mut config = AnalysisConfig::new();

    let first = concurrent.pipeline(&config, one_face()).analyze(&portrait()).await;
    config.pipeline.concurrent_detectors = false;
    let second = sequential.pipeline(&config, one_face()).analyze(&portrait()).await;

    assert_eq!(first.report, second.report);
}

#[tokio::test]
async fn test_no_face_runs_on_full_frame() {
    let harness = Harness::new(Behavior::Return(AttributeValue::AcneCount(2)));
    let analysis = harness.pipeline(&AnalysisConfig::new(), vec![]).analyze(&portrait()).await;

    assert_eq!(error_of(analysis.report.get("FaceBox")), "no face detected");
    assert!(analysis.face_region.is_none());
    assert_eq!(harness.acne.calls(), vec![(500, 500)]);
    assert_eq!(analysis.report.get("AcnePrediction"), Some(&ReportEntry::Attribute(AttributeValue::AcneCount(2))));
}

#[tokio::test]
async fn test_no_face_skip_policy() {
    let mut config = AnalysisConfig::from_toml("[pipeline]\nno_face_policy = \"skip\"\n").unwrap();
    config.lighting.enabled = false;
    let harness = Harness::new(Behavior::Return(AttributeValue::AcneCount(2)));

    let analysis = harness.pipeline(&config, vec![]).analyze(&portrait()).await;

    for attribute in Attribute::ALL {
        assert_eq!(error_of(analysis.report.get(attribute.key())), "no face detected");
    }
    assert!(harness.acne.calls().is_empty());
    assert!(analysis.report.get("Lighting").is_none());
    assert!(!analysis.stages.contains(&PipelineStage::LightingChecked));
}

#[tokio::test]
async fn test_first_face_is_primary() {
    let harness = Harness::new(Behavior::Return(AttributeValue::AcneCount(0)));
    let faces = vec![
        RawFaceBox { x: 300, y: 300, w: 100, h: 100 },
        RawFaceBox { x: 100, y: 100, w: 50, h: 50 },
    ];
    let analysis = harness.pipeline(&AnalysisConfig::new(), faces).analyze(&portrait()).await;

    assert_eq!(analysis.report.get("FaceBox"), Some(&ReportEntry::FaceBox(FaceBox { x: 270, y: 255, w: 160, h: 175 })));
}

fn split_lighting() -> RgbImage {
    RgbImage::from_fn(500, 500, |x, _| if x < 250 { Rgb([10, 10, 10]) } else { Rgb([240, 240, 240]) })
}

#[tokio::test]
async fn test_uneven_lighting_is_advisory_by_default() {
    let harness = Harness::new(Behavior::Return(AttributeValue::AcneCount(1)));
    let analysis = harness.pipeline(&AnalysisConfig::new(), one_face()).analyze(&split_lighting()).await;

    assert!(matches!(analysis.report.get("Lighting"), Some(ReportEntry::Lighting(v)) if v.status == LightingStatus::Uneven));
    assert_eq!(analysis.report.get("AcnePrediction"), Some(&ReportEntry::Attribute(AttributeValue::AcneCount(1))));
}

#[tokio::test]
async fn test_uneven_lighting_gate() {
    let mut config = AnalysisConfig::new();
    config.lighting.gate_detectors = true;
    let harness = Harness::new(Behavior::Return(AttributeValue::AcneCount(1)));

    let analysis = harness.pipeline(&config, one_face()).analyze(&split_lighting()).await;

    for attribute in Attribute::ALL {
        assert!(error_of(analysis.report.get(attribute.key())).starts_with("uneven lighting"));
    }
    assert!(harness.acne.calls().is_empty());
    assert!(!analysis.report.get("FaceBox").unwrap().is_error());
}

#[tokio::test]
async fn test_analyze_path() {
    let dir = tempfile::tempdir().unwrap();
    let photo = dir.path().join("face.png");
    portrait().save(&photo).unwrap();

    let harness = Harness::new(Behavior::Return(AttributeValue::AcneCount(3)));
    let pipeline = harness.pipeline(&AnalysisConfig::new(), one_face());

    let analysis = pipeline.analyze_path(&photo).await.unwrap();
    assert_eq!(analysis.report.get("AcnePrediction"), Some(&ReportEntry::Attribute(AttributeValue::AcneCount(3))));
}

#[tokio::test]
async fn test_undecodable_image_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let photo = dir.path().join("broken.jpg");
    std::fs::write(&photo, b"\xff\xd8\xff\xe0 truncated").unwrap();

    let harness = Harness::new(Behavior::Return(AttributeValue::AcneCount(3)));
    let err = harness.pipeline(&AnalysisConfig::new(), one_face()).analyze_path(&photo).await.unwrap_err();

    assert!(matches!(err, AnalysisError::ImageDecode(_)));
    assert!(harness.acne.calls().is_empty());

    let document: serde_json::Value = serde_json::from_str(&error_document(&err)).unwrap();
    let object = document.as_object().unwrap();
    assert_eq!(object.len(), 1);
    assert!(object["error"].as_str().unwrap().starts_with("failed to decode image"));
}

#[tokio::test]
async fn test_oversized_expand_ratio_is_rejected() {
    let harness = Harness::new(Behavior::Return(AttributeValue::AcneCount(0)));
    let mut config = AnalysisConfig::new();
    config.face_locator.expand_ratio = 1e9;

    let result = harness.pipeline_with_source(&config, Arc::new(FixedFaces(one_face())));
    assert!(matches!(result, Err(AnalysisError::Config(_))));
}

#[tokio::test]
async fn test_largest_expand_ratio_stays_in_bounds() {
    let harness = Harness::new(Behavior::Return(AttributeValue::AcneCount(0)));
    let mut config = AnalysisConfig::new();
    config.face_locator.expand_ratio = 5.0;

    let analysis = harness.pipeline(&config, one_face()).analyze(&portrait()).await;

    assert_eq!(analysis.report.get("FaceBox"), Some(&ReportEntry::FaceBox(FaceBox { x: 0, y: 0, w: 400, h: 400 })));
    assert_eq!(harness.acne.calls(), vec![(400, 400)]);
}

#[tokio::test]
async fn test_stalled_face_detector_times_out() {
    let mut config = AnalysisConfig::new();
    config.pipeline.timeout_ms = 50;
    let harness = Harness::new(Behavior::Return(AttributeValue::AcneCount(2)));
    let pipeline = harness
        .pipeline_with_source(&config, Arc::new(StalledFaces(Duration::from_millis(400))))
        .unwrap();

    let analysis = pipeline.analyze(&portrait()).await;

    assert_eq!(error_of(analysis.report.get("FaceBox")), "face_locator timed out after 50ms");
    assert_eq!(harness.acne.calls(), vec![(500, 500)]);
    assert!(analysis.report.get("Lighting").is_some());
}

#[tokio::test]
async fn test_panicking_face_detector_is_reported() {
    let harness = Harness::new(Behavior::Return(AttributeValue::AcneCount(2)));
    let pipeline = harness.pipeline_with_source(&AnalysisConfig::new(), Arc::new(BrokenFaces)).unwrap();

    let analysis = pipeline.analyze(&portrait()).await;

    assert_eq!(
        error_of(analysis.report.get("FaceBox")),
        "face_locator failed: panicked: cascade state corrupted"
    );
    assert_eq!(analysis.report.get("AcnePrediction"), Some(&ReportEntry::Attribute(AttributeValue::AcneCount(2))));
}

#[tokio::test]
async fn test_save_face_region() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(Behavior::Return(AttributeValue::AcneCount(0)));

    let found = harness.pipeline(&AnalysisConfig::new(), one_face()).analyze(&portrait()).await;
    let face_path = dir.path().join("face.png");
    assert!(found.save_face_region(&face_path).unwrap());
    assert_eq!(image::open(&face_path).unwrap().to_rgb8().dimensions(), (80, 88));

    let missing = harness.pipeline(&AnalysisConfig::new(), vec![]).analyze(&portrait()).await;
    let other_path = dir.path().join("none.png");
    assert!(!missing.save_face_region(&other_path).unwrap());
    assert!(!other_path.exists());
}
