use serde::{Deserialize, Serialize};

/// Normalized vulnerability severity.
///
/// Variant order is the teacher's `domain::scanresult::Severity` order
/// exactly (`Critical` highest, derived `Ord`), which is load-bearing: the
/// teacher's `Package::suggested_fix_version` iterates this list to pick the
/// best candidate fix, and this engine reuses the same "iterate the ordered
/// list, compare counts" idiom in `app::matcher` for severity aggregation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Negligible,
    Unknown,
}

impl Severity {
    pub const ORDERED: [Severity; 6] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Negligible,
        Severity::Unknown,
    ];

    /// Maps an upstream severity string to a normalized level. Total and
    /// monotone (I6, P6): every input produces exactly one of the six
    /// levels, defaulting to `Unknown`.
    pub fn normalize(upstream: &str) -> Severity {
        match upstream.trim().to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" | "important" => Severity::High,
            "medium" | "moderate" => Severity::Medium,
            "low" => Severity::Low,
            "negligible" | "none" | "informational" => Severity::Negligible,
            _ => Severity::Unknown,
        }
    }
}
