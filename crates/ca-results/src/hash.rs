//! Content-based hashing for case IDs.

use ca_case::CaseConfig;
use sha2::{Digest, Sha256};

/// Stable id of a case: SHA-256 of its JSON form plus the tool version.
pub fn compute_case_id(case: &CaseConfig, tool_version: &str) -> String {
    let mut hasher = Sha256::new();

    let case_json = serde_json::to_string(case).unwrap_or_default();
    hasher.update(case_json.as_bytes());

    hasher.update(tool_version.as_bytes());

    let result = hasher.finalize();
    format!("{:x}", result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ca_case::{AnalysisKind, ShotSelection};

    #[test]
    fn hash_stability() {
        let case = CaseConfig::new(AnalysisKind::ControlQuality);
        assert_eq!(compute_case_id(&case, "v1"), compute_case_id(&case, "v1"));
        assert_eq!(compute_case_id(&case, "v1").len(), 64);
    }

    #[test]
    fn hash_differs_for_different_inputs() {
        let a = CaseConfig::new(AnalysisKind::ControlQuality);
        let mut b = a.clone();
        b.shot = ShotSelection::One(180520);
        assert_ne!(compute_case_id(&a, "v1"), compute_case_id(&b, "v1"));
        assert_ne!(compute_case_id(&a, "v1"), compute_case_id(&a, "v2"));
    }
}
