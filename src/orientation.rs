//! Standing / lying inference from mask geometry

use crate::types::{BoundingBox, OrientationLabel};
use image::GrayImage;
use serde::{Deserialize, Serialize};

const EPSILON: f32 = 1e-6;

/// Outcome of orientation inference for one mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrientationResult {
    /// Final label, after any override
    pub label: OrientationLabel,
    /// Label computed from geometry alone
    pub detected: OrientationLabel,
    /// Whether a caller override replaced the detected label
    pub overridden: bool,
    /// The mask had no foreground pixel at all
    pub no_foreground: bool,
    /// Object width over height
    pub aspect: f32,
    /// Foreground fraction of the bottom strip of the object
    pub contact_ratio: f32,
}

impl OrientationResult {
    /// Result for a mask with no foreground
    #[must_use]
    pub fn no_foreground() -> Self {
        Self {
            label: OrientationLabel::Standing,
            detected: OrientationLabel::Standing,
            overridden: false,
            no_foreground: true,
            aspect: 0.0,
            contact_ratio: 0.0,
        }
    }

    /// Replace the label with `override_label` when one is given
    #[must_use]
    pub fn with_override(mut self, override_label: Option<OrientationLabel>) -> Self {
        if let Some(label) = override_label {
            self.label = label;
            self.overridden = true;
        }
        self
    }
}

/// Classifies a refined mask as standing or lying
///
/// Flat objects that touch the ground along a wide strip read as lying. The
/// thresholds are empirical and can be tuned per deployment.
#[derive(Debug, Clone)]
pub struct OrientationClassifier {
    /// Aspect ratio that must be exceeded to read as lying
    pub min_lying_aspect: f32,
    /// Contact ratio that must be exceeded to read as lying
    pub min_contact_ratio: f32,
    /// Maximum height of the bottom strip used for contact
    pub contact_strip_height: u32,
}

impl Default for OrientationClassifier {
    fn default() -> Self {
        Self {
            min_lying_aspect: 1.2,
            min_contact_ratio: 0.15,
            contact_strip_height: 10,
        }
    }
}

impl OrientationClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `mask`, letting `override_label` win when given
    #[must_use]
    pub fn classify(
        &self,
        mask: &GrayImage,
        override_label: Option<OrientationLabel>,
    ) -> OrientationResult {
        let Some(bbox) = BoundingBox::of_nonzero(mask) else {
            return OrientationResult::no_foreground().with_override(override_label);
        };

        let width = bbox.width();
        let height = bbox.height();
        let aspect = width as f32 / (height as f32 + EPSILON);

        let strip = self.contact_strip_height.min(height);
        let mut contact_pixels = 0u64;
        for y in (bbox.bottom - strip)..bbox.bottom {
            for x in bbox.left..bbox.right {
                if mask.get_pixel(x, y)[0] > 0 {
                    contact_pixels += 1;
                }
            }
        }
        let strip_area = f64::from(width) * f64::from(strip);
        let contact_ratio = (contact_pixels as f64 / (strip_area + f64::from(EPSILON))) as f32;

        let detected = if aspect > self.min_lying_aspect && contact_ratio > self.min_contact_ratio
        {
            OrientationLabel::Lying
        } else {
            OrientationLabel::Standing
        };

        let label = override_label.unwrap_or(detected);

        tracing::debug!(
            aspect = aspect,
            contact_ratio = contact_ratio,
            detected = %detected,
            label = %label,
            "Orientation classified"
        );

        OrientationResult {
            label,
            detected,
            overridden: override_label.is_some(),
            no_foreground: false,
            aspect,
            contact_ratio,
        }
    }
}
