use std::fmt::{Display, Formatter};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Deviation from 1.0 under which an image counts as square.
pub const SQUARE_TOLERANCE: f64 = 0.05;

/// Relative deviation allowed between a catalog size's ratio and the image ratio.
pub const ASPECT_TOLERANCE: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    Landscape,
    Portrait,
    Square,
}

impl Orientation {
    pub fn all() -> [Orientation; 3] {
        [Orientation::Landscape, Orientation::Portrait, Orientation::Square]
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
            Self::Square => "square",
        }
    }

    /// Catalog partition holding the standard sizes for this orientation.
    pub fn catalog(self) -> &'static [StandardSize] {
        match self {
            Self::Landscape => &LANDSCAPE_SIZES,
            Self::Portrait => &PORTRAIT_SIZES,
            Self::Square => &SQUARE_SIZES,
        }
    }
}

impl Display for Orientation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A conventional print size in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardSize {
    pub width_in: f64,
    pub height_in: f64,
}

impl StandardSize {
    pub const fn new(width_in: f64, height_in: f64) -> Self {
        Self { width_in, height_in }
    }

    pub fn area(&self) -> f64 {
        self.width_in * self.height_in
    }

    pub fn ratio(&self) -> f64 {
        self.width_in / self.height_in
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl Display for StandardSize {
    // f64's Display keeps the declared precision: 8.5 -> "8.5", 7.0 -> "7".
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}×{}", self.width_in, self.height_in)
    }
}

static LANDSCAPE_SIZES: [StandardSize; 12] = [
    StandardSize::new(7.0, 5.0),
    StandardSize::new(10.0, 8.0),
    StandardSize::new(11.0, 8.5),
    StandardSize::new(14.0, 11.0),
    StandardSize::new(18.0, 12.0),
    StandardSize::new(20.0, 16.0),
    StandardSize::new(24.0, 16.0),
    StandardSize::new(24.0, 18.0),
    StandardSize::new(24.0, 20.0),
    StandardSize::new(30.0, 20.0),
    StandardSize::new(36.0, 24.0),
    StandardSize::new(40.0, 30.0),
];

static PORTRAIT_SIZES: [StandardSize; 12] = [
    StandardSize::new(5.0, 7.0),
    StandardSize::new(8.0, 10.0),
    StandardSize::new(8.5, 11.0),
    StandardSize::new(11.0, 14.0),
    StandardSize::new(12.0, 18.0),
    StandardSize::new(16.0, 20.0),
    StandardSize::new(16.0, 24.0),
    StandardSize::new(18.0, 24.0),
    StandardSize::new(20.0, 24.0),
    StandardSize::new(20.0, 30.0),
    StandardSize::new(24.0, 36.0),
    StandardSize::new(30.0, 40.0),
];

static SQUARE_SIZES: [StandardSize; 5] = [
    StandardSize::new(8.0, 8.0),
    StandardSize::new(10.0, 10.0),
    StandardSize::new(12.0, 12.0),
    StandardSize::new(16.0, 16.0),
    StandardSize::new(20.0, 20.0),
];

/// Print quality tiers, highest density first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DpiLevel {
    Dpi300,
    Dpi150,
    Dpi100,
}

impl DpiLevel {
    pub const ALL: [DpiLevel; 3] = [DpiLevel::Dpi300, DpiLevel::Dpi150, DpiLevel::Dpi100];

    pub fn dots_per_inch(self) -> u32 {
        match self {
            Self::Dpi300 => 300,
            Self::Dpi150 => 150,
            Self::Dpi100 => 100,
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Dpi300 => 0,
            Self::Dpi150 => 1,
            Self::Dpi100 => 2,
        }
    }

    pub fn quality(self) -> &'static str {
        match self {
            Self::Dpi300 => "Excellent",
            Self::Dpi150 => "Good",
            Self::Dpi100 => "Acceptable",
        }
    }

    pub fn guidance(self) -> &'static str {
        match self {
            Self::Dpi300 => "Professional quality, suitable for close viewing",
            Self::Dpi150 => "Good quality, suitable for wall art viewed from a few feet away",
            Self::Dpi100 => "Acceptable for large formats viewed from a distance",
        }
    }
}

impl Display for DpiLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} DPI", self.dots_per_inch())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    InvalidDimensions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl CoreError {
    pub fn as_error_info(&self) -> ErrorInfo {
        match self {
            Self::InvalidDimensions(_) => ErrorInfo {
                code: ErrorCode::InvalidDimensions,
                message: self.to_string(),
            },
        }
    }
}

/// Pixel dimensions of a decoded image. Both sides are always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetrics {
    width_px: u32,
    height_px: u32,
}

impl ImageMetrics {
    pub fn new(width_px: i64, height_px: i64) -> Result<Self, CoreError> {
        Ok(Self {
            width_px: checked_side("width", width_px)?,
            height_px: checked_side("height", height_px)?,
        })
    }

    pub fn width_px(&self) -> u32 {
        self.width_px
    }

    pub fn height_px(&self) -> u32 {
        self.height_px
    }

    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.width_px) / f64::from(self.height_px)
    }
}

fn checked_side(name: &str, value: i64) -> Result<u32, CoreError> {
    if value <= 0 {
        return Err(CoreError::InvalidDimensions(format!(
            "{} must be a positive pixel count (received {})",
            name, value
        )));
    }
    u32::try_from(value).map_err(|_| {
        CoreError::InvalidDimensions(format!("{} of {} pixels is out of range", name, value))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub aspect_ratio: f64,
    pub orientation: Orientation,
}

impl Classification {
    /// Aspect ratio rounded to two decimals. Never used for matching.
    pub fn display_ratio(&self) -> f64 {
        round_to_hundredths(self.aspect_ratio)
    }
}

pub fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn classify(width_px: i64, height_px: i64) -> Result<Classification, CoreError> {
    let metrics = ImageMetrics::new(width_px, height_px)?;
    Ok(classify_metrics(&metrics))
}

pub fn classify_metrics(metrics: &ImageMetrics) -> Classification {
    let aspect_ratio = metrics.aspect_ratio();
    let orientation = if (aspect_ratio - 1.0).abs() < SQUARE_TOLERANCE {
        Orientation::Square
    } else if metrics.width_px > metrics.height_px {
        Orientation::Landscape
    } else {
        Orientation::Portrait
    };
    Classification {
        aspect_ratio,
        orientation,
    }
}

/// Sizes that survived filtering at one DPI level, largest area first.
#[derive(Debug, Clone, PartialEq)]
pub struct TierRecommendation {
    pub dpi: DpiLevel,
    pub max_width_in: f64,
    pub max_height_in: f64,
    pub sizes: Vec<StandardSize>,
}

impl TierRecommendation {
    pub fn labels(&self) -> Vec<String> {
        self.sizes.iter().map(StandardSize::label).collect()
    }
}

/// One entry per [`DpiLevel`], always in `DpiLevel::ALL` order.
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    tiers: Vec<TierRecommendation>,
}

impl Recommendation {
    pub fn tiers(&self) -> &[TierRecommendation] {
        &self.tiers
    }

    pub fn tier(&self, dpi: DpiLevel) -> &TierRecommendation {
        &self.tiers[dpi.index()]
    }

    pub fn sizes(&self, dpi: DpiLevel) -> &[StandardSize] {
        &self.tier(dpi).sizes
    }

    pub fn labels(&self, dpi: DpiLevel) -> Vec<String> {
        self.tier(dpi).labels()
    }
}

pub fn recommend(
    width_px: i64,
    height_px: i64,
    aspect_ratio: f64,
    orientation: Orientation,
) -> Result<Recommendation, CoreError> {
    let metrics = ImageMetrics::new(width_px, height_px)?;
    if !aspect_ratio.is_finite() || aspect_ratio <= 0.0 {
        return Err(CoreError::InvalidDimensions(format!(
            "aspect ratio must be a positive number (received {})",
            aspect_ratio
        )));
    }
    Ok(recommend_metrics(&metrics, aspect_ratio, orientation))
}

pub fn recommend_metrics(metrics: &ImageMetrics, aspect_ratio: f64, orientation: Orientation) -> Recommendation {
    Recommendation {
        tiers: DpiLevel::ALL
            .iter()
            .map(|dpi| recommend_tier(metrics, aspect_ratio, orientation, *dpi))
            .collect(),
    }
}

fn recommend_tier(
    metrics: &ImageMetrics,
    aspect_ratio: f64,
    orientation: Orientation,
    dpi: DpiLevel,
) -> TierRecommendation {
    let dots = f64::from(dpi.dots_per_inch());
    let max_width_in = f64::from(metrics.width_px) / dots;
    let max_height_in = f64::from(metrics.height_px) / dots;

    let mut sizes: Vec<StandardSize> = orientation
        .catalog()
        .iter()
        .filter(|size| size.width_in <= max_width_in && size.height_in <= max_height_in)
        .filter(|size| matches_aspect(size, aspect_ratio, orientation))
        .copied()
        .collect();
    sort_by_area_desc(&mut sizes);

    debug!(
        dpi = dpi.dots_per_inch(),
        max_width_in,
        max_height_in,
        matched = sizes.len(),
        "Filtered standard sizes for tier"
    );

    TierRecommendation {
        dpi,
        max_width_in,
        max_height_in,
        sizes,
    }
}

// sort_by is stable, so equal areas keep catalog order.
fn sort_by_area_desc(sizes: &mut [StandardSize]) {
    sizes.sort_by(|a, b| b.area().total_cmp(&a.area()));
}

fn matches_aspect(size: &StandardSize, aspect_ratio: f64, orientation: Orientation) -> bool {
    match orientation {
        Orientation::Square => true,
        Orientation::Landscape | Orientation::Portrait => {
            (size.ratio() - aspect_ratio).abs() / aspect_ratio <= ASPECT_TOLERANCE
        }
    }
}

/// Everything derived from one image's dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub metrics: ImageMetrics,
    pub classification: Classification,
    pub recommendation: Recommendation,
}

pub fn analyze(width_px: i64, height_px: i64) -> Result<Analysis, CoreError> {
    analyze_with_telemetry(width_px, height_px, None)
}

pub fn analyze_with_telemetry(
    width_px: i64,
    height_px: i64,
    telemetry: Option<&dyn TelemetrySink>,
) -> Result<Analysis, CoreError> {
    let start = Instant::now();
    if let Some(sink) = telemetry {
        sink.emit(TelemetryEvent {
            event_type: TelemetryEventType::AnalyzeStart,
            width_px,
            height_px,
            orientation: None,
            duration_us: None,
            detail: None,
        });
    }
    let metrics = match ImageMetrics::new(width_px, height_px) {
        Ok(metrics) => metrics,
        Err(err) => {
            if let Some(sink) = telemetry {
                sink.emit(TelemetryEvent {
                    event_type: TelemetryEventType::AnalyzeError,
                    width_px,
                    height_px,
                    orientation: None,
                    duration_us: Some(start.elapsed().as_micros() as u64),
                    detail: Some(err.to_string()),
                });
            }
            return Err(err);
        }
    };
    let classification = classify_metrics(&metrics);
    let recommendation = recommend_metrics(&metrics, classification.aspect_ratio, classification.orientation);
    if let Some(sink) = telemetry {
        let matched: usize = recommendation.tiers().iter().map(|tier| tier.sizes.len()).sum();
        sink.emit(TelemetryEvent {
            event_type: TelemetryEventType::AnalyzeSuccess,
            width_px,
            height_px,
            orientation: Some(classification.orientation),
            duration_us: Some(start.elapsed().as_micros() as u64),
            detail: Some(format!("ratio={:.2},matched={}", classification.aspect_ratio, matched)),
        });
    }
    Ok(Analysis {
        metrics,
        classification,
        recommendation,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TelemetryEventType {
    AnalyzeStart,
    AnalyzeSuccess,
    AnalyzeError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub event_type: TelemetryEventType,
    pub width_px: i64,
    pub height_px: i64,
    pub orientation: Option<Orientation>,
    pub duration_us: Option<u64>,
    pub detail: Option<String>,
}

pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: TelemetryEvent);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportConfig {
    pub format: String,
    pub pretty: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
            pretty: true,
        }
    }
}

pub fn resolve_report_config(overrides: ReportConfig) -> ReportConfig {
    let mut cfg = ReportConfig::default();
    if !overrides.format.trim().is_empty() {
        cfg.format = overrides.format.trim().to_ascii_lowercase();
    }
    cfg.pretty = overrides.pretty;
    cfg
}

pub mod v1 {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct AnalyzeRequest {
        pub width: i64,
        pub height: i64,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TierResponse {
        pub dpi: u32,
        pub quality: String,
        pub guidance: String,
        pub max_width_in: f64,
        pub max_height_in: f64,
        pub sizes: Vec<String>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct AnalyzeResponse {
        pub width: u32,
        pub height: u32,
        pub aspect_ratio: f64,
        pub orientation: Orientation,
        pub tiers: Vec<TierResponse>,
    }

    impl From<&Analysis> for AnalyzeResponse {
        fn from(analysis: &Analysis) -> Self {
            Self {
                width: analysis.metrics.width_px(),
                height: analysis.metrics.height_px(),
                aspect_ratio: analysis.classification.display_ratio(),
                orientation: analysis.classification.orientation,
                tiers: analysis
                    .recommendation
                    .tiers()
                    .iter()
                    .map(|tier| TierResponse {
                        dpi: tier.dpi.dots_per_inch(),
                        quality: tier.dpi.quality().to_string(),
                        guidance: tier.dpi.guidance().to_string(),
                        max_width_in: round_to_hundredths(tier.max_width_in),
                        max_height_in: round_to_hundredths(tier.max_height_in),
                        sizes: tier.labels(),
                    })
                    .collect(),
            }
        }
    }

    pub fn analyze_v1(request: &AnalyzeRequest) -> Result<AnalyzeResponse, CoreError> {
        let analysis = analyze(request.width, request.height)?;
        Ok(AnalyzeResponse::from(&analysis))
    }
}
