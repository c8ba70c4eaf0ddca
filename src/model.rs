//! Wire types of the rig server and the view models built from them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// MIME type of camera frames and captured shots.
pub const IMAGE_MIME: &str = "image/webp";

/// Wrap a base64 image payload as a data URI.
#[must_use]
pub fn data_uri(base64_payload: &str) -> String {
    format!("data:{IMAGE_MIME};base64,{base64_payload}")
}

/// Images returned by one shot request, one sequence per camera.
///
/// Index `i` of both sequences was taken at the same trigger instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureBatch {
    /// Base64 images from camera 1
    #[serde(default)]
    pub cam1: Vec<String>,
    /// Base64 images from camera 2
    #[serde(default)]
    pub cam2: Vec<String>,
}

impl CaptureBatch {
    /// Index-aligned slide pairs, in capture order.
    ///
    /// Unpaired trailing images (mismatched lengths) are skipped.
    #[must_use]
    pub fn slide_pairs(&self) -> Vec<SlidePair> {
        if self.cam1.len() != self.cam2.len() {
            tracing::warn!(
                cam1 = self.cam1.len(),
                cam2 = self.cam2.len(),
                "Capture batch is not index-aligned; extra images dropped"
            );
        }
        self.cam1
            .iter()
            .zip(&self.cam2)
            .enumerate()
            .map(|(index, (cam1, cam2))| SlidePair {
                index,
                cam1: cam1.clone(),
                cam2: cam2.clone(),
            })
            .collect()
    }
}

/// One slide position showing both cameras.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlidePair {
    /// Position in the capture order
    pub index: usize,
    /// Base64 image from camera 1
    pub cam1: String,
    /// Base64 image from camera 2
    pub cam2: String,
}

impl SlidePair {
    /// Data URIs for camera 1 and camera 2.
    #[must_use]
    pub fn data_uris(&self) -> (String, String) {
        (data_uri(&self.cam1), data_uri(&self.cam2))
    }
}

/// One classification candidate as returned by `/result/upload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationItem {
    /// Part type key, e.g. `torque_converter`
    pub part: String,
    /// Part family, shown as the card title
    #[serde(default)]
    pub family: String,
    /// Classifier score
    pub probability: f64,
    /// Vehicle make
    #[serde(default)]
    pub make: String,
    /// Catalog directory of the reference images
    pub directory: String,
}

/// Response of `/result/upload`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResponse {
    /// Ranked candidates
    #[serde(default)]
    pub result: Vec<ClassificationItem>,
    /// Where the server archived this run
    #[serde(rename = "savePlace", default)]
    pub save_place: String,
}

/// One entry of a `/photo/{part}/{directory}` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// File name relative to the listing path
    pub url: String,
}

/// Known part types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartType {
    /// `torque_converter`
    TorqueConverter,
    /// `transmission_case`
    TransmissionCase,
    /// Any other key, kept verbatim
    Other(String),
}

impl PartType {
    /// Map a wire key.
    #[must_use]
    pub fn from_key(key: &str) -> Self {
        match key {
            "torque_converter" => Self::TorqueConverter,
            "transmission_case" => Self::TransmissionCase,
            other => Self::Other(other.to_string()),
        }
    }

    /// Display label.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::TorqueConverter => "Converter",
            Self::TransmissionCase => "Transmission",
            Self::Other(key) => key,
        }
    }
}

/// Bucketed classifier confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProbabilityTier {
    /// probability <= 0.08
    Low,
    /// 0.08 < probability <= 0.12
    Medium,
    /// probability > 0.12
    High,
}

impl ProbabilityTier {
    /// Bucket a classifier score.
    #[must_use]
    pub fn from_probability(probability: f64) -> Self {
        if probability > 0.12 {
            Self::High
        } else if probability > 0.08 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for ProbabilityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "High"),
            Self::Medium => write!(f, "Medium"),
            Self::Low => write!(f, "Low"),
        }
    }
}

/// View model of one classification result.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultCard {
    /// Card heading (part family)
    pub title: String,
    /// Raw classifier score
    pub probability: f64,
    /// Bucketed score
    pub tier: ProbabilityTier,
    /// Part type
    pub part_type: PartType,
    /// Vehicle make
    pub make: String,
    /// Catalog subcategory (directory)
    pub subcategory: String,
    /// Reference image URLs for the card's carousel
    pub image_urls: Vec<String>,
}

impl ResultCard {
    /// Build a card from a result item and its resolved image URLs.
    #[must_use]
    pub fn from_item(item: &ClassificationItem, image_urls: Vec<String>) -> Self {
        Self {
            title: item.family.clone(),
            probability: item.probability,
            tier: ProbabilityTier::from_probability(item.probability),
            part_type: PartType::from_key(&item.part),
            make: item.make.clone(),
            subcategory: item.directory.clone(),
            image_urls,
        }
    }
}

impl fmt::Display for ResultCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] type={} make={} subcategory={} images={}",
            self.title,
            self.tier,
            self.part_type.label(),
            self.make,
            self.subcategory,
            self.image_urls.len()
        )
    }
}
