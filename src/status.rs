use crate::domain::HarvestStatus;
use crate::xml::XmlDocument;

pub const ERROR_PATTERN: &str = "Harvesting error";
pub const COMPLETED_PATTERN: &str = "Harvesting completed";

/// Classifies a status fragment from `giconf/status`.
///
/// The error pattern wins over the completed pattern when both appear.
pub fn classify(raw_status: &str) -> HarvestStatus {
    if raw_status.contains(ERROR_PATTERN) {
        HarvestStatus::Error
    } else if raw_status.contains(COMPLETED_PATTERN) {
        HarvestStatus::Completed
    } else {
        HarvestStatus::Pending
    }
}

/// Text of every `status` element, concatenated. Empty when there is none.
pub fn extract_status(document: &XmlDocument) -> String {
    document
        .descendants("status")
        .iter()
        .map(|element| element.text())
        .collect()
}
