use super::result::Detection;

/// Keep detections of `target_class_id` scoring at least `min_score`, in input order.
pub fn filter_detections(
    detections: &[Detection],
    target_class_id: u32,
    min_score: f32,
) -> Vec<Detection> {
    detections
        .iter()
        .filter(|det| det.class_id == target_class_id && det.score >= min_score)
        .copied()
        .collect()
}

/// Target class and confidence floor applied to every frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetFilter {
    pub class_id: u32,
    pub min_score: f32,
}

impl TargetFilter {
    pub fn new(class_id: u32, min_score: f32) -> Self {
        Self {
            class_id,
            min_score,
        }
    }

    pub fn matches(&self, detection: &Detection) -> bool {
        detection.class_id == self.class_id && detection.score >= self.min_score
    }

    pub fn apply(&self, detections: &[Detection]) -> Vec<Detection> {
        filter_detections(detections, self.class_id, self.min_score)
    }
}
