//! Verdict computation

use inference_engine::Detection;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Policy;

/// Outcome of one decision cycle
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Verdict {
    pub should_deter: bool,
    /// Label of the winning detection
    pub target_label: Option<String>,
    pub triggering_confidence: Option<f32>,
    /// Ignore-listed label that disarmed this cycle
    pub suppressed_by: Option<String>,
}

impl Verdict {
    fn no_deter() -> Self {
        Self::default()
    }
}

/// Decide whether the detections warrant deterrence.
///
/// A confident ignore-listed detection disarms the cycle. Otherwise the
/// highest-confidence deter-listed detection at or above the threshold wins,
/// ties going to the earliest. NaN confidences never qualify.
pub fn decide(detections: &[Detection], policy: &Policy) -> Verdict {
    let threshold = policy.confidence_threshold;

    if let Some(ignored) = detections
        .iter()
        .find(|d| d.confidence >= threshold && policy.ignore_species.contains(&d.label))
    {
        debug!(
            "Deterrent disarmed by ignore-listed '{}' ({:.2})",
            ignored.label, ignored.confidence
        );
        return Verdict {
            suppressed_by: Some(ignored.label.clone()),
            ..Verdict::no_deter()
        };
    }

    let mut best: Option<&Detection> = None;
    for d in detections
        .iter()
        .filter(|d| d.confidence >= threshold && policy.deter_species.contains(&d.label))
    {
        if best.map(|b| d.confidence > b.confidence).unwrap_or(true) {
            best = Some(d);
        }
    }

    match best {
        Some(target) => Verdict {
            should_deter: true,
            target_label: Some(target.label.clone()),
            triggering_confidence: Some(target.confidence),
            suppressed_by: None,
        },
        None => Verdict::no_deter(),
    }
}
