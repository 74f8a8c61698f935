use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use tracing::warn;
use crate::pipeline::module::attribute_detector::{AttributeValue, DetectionResult};
use crate::pipeline::module::lighting_analysis::LightingVerdict;
use crate::processing::bbox::FaceBox;

/// Error marker recorded in place of a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMarker {
    pub error: String,
}

/// One value in the report. Serialized without a tag so the JSON carries the
/// bare payload, or `{"error": ...}` on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportEntry {
    Error(ErrorMarker),
    Attribute(AttributeValue),
    Lighting(LightingVerdict),
    FaceBox(FaceBox),
}

impl ReportEntry {
    pub fn error(reason: impl Into<String>) -> Self {
        ReportEntry::Error(ErrorMarker { error: reason.into() })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ReportEntry::Error(_))
    }
}

impl From<DetectionResult> for ReportEntry {
    fn from(result: DetectionResult) -> Self {
        match result {
            DetectionResult::Success(value) => ReportEntry::Attribute(value),
            DetectionResult::Failure(reason) => ReportEntry::error(reason),
        }
    }
}

/// The merged per-image result, keyed by attribute name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregatedReport {
    entries: BTreeMap<String, ReportEntry>,
}

impl AggregatedReport {
    pub fn new() -> Self {
        AggregatedReport::default()
    }

    /// Adds `entry` under `key`. An existing key is overwritten; each
    /// detector owns its key, so a collision means two detectors were
    /// configured for the same attribute.
    pub fn insert(&mut self, key: &str, entry: ReportEntry) {
        if self.entries.insert(key.to_string(), entry).is_some() {
            warn!("report key {} written twice, keeping the later value", key);
        }
    }

    pub fn get(&self, key: &str) -> Option<&ReportEntry> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self, pretty: bool) -> Result<String, serde_json::Error> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResultAggregator;

impl ResultAggregator {
    pub fn new() -> Self {
        ResultAggregator
    }

    /// Merges detector results by name. Every input name ends up in the
    /// report: successes as their payload, failures as error markers.
    pub fn aggregate<K, I>(&self, results: I) -> AggregatedReport
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, DetectionResult)>,
    {
        let mut report = AggregatedReport::new();
        self.merge_into(&mut report, results);
        report
    }

    pub fn merge_into<K, I>(&self, report: &mut AggregatedReport, results: I)
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, DetectionResult)>,
    {
        for (name, result) in results {
            report.insert(name.as_ref(), ReportEntry::from(result));
        }
    }
}
