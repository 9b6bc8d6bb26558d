//! Core entity structures

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Backend-agnostic record identity. Generators assign it client-side so the
/// id is known before the write reaches the database.
pub type RecordId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Upper bound (exclusive) of the randomized suffix used by update workloads.
pub const PATCH_SUFFIX_RANGE: u32 = 1000;

/// A generic timestamped entity record, the unit of write/read/update
/// benchmarking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: RecordId,
    pub name: String,
    pub description: String,
    pub create_time: Timestamp,
    /// Only meaningful for chain-sum workloads.
    #[serde(default = "default_item")]
    pub item: i64,
}

fn default_item() -> i64 {
    1
}

impl Artifact {
    /// Create an artifact with a fresh id and `item = 1`.
    pub fn new(name: impl Into<String>, description: impl Into<String>, create_time: Timestamp) -> Self {
        Self {
            id: crate::new_record_id(),
            name: name.into(),
            description: description.into(),
            create_time,
            item: default_item(),
        }
    }

    pub fn with_item(mut self, item: i64) -> Self {
        self.item = item;
        self
    }

    /// Apply a name/description patch in place.
    pub fn apply(&mut self, patch: &ArtifactPatch) {
        self.name = patch.name.clone();
        self.description = patch.description.clone();
    }
}

/// Directed link between two artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: RecordId,
    pub from: RecordId,
    pub to: RecordId,
    pub body: String,
}

impl Edge {
    pub fn new(from: RecordId, to: RecordId, body: impl Into<String>) -> Self {
        Self {
            id: crate::new_record_id(),
            from,
            to,
            body: body.into(),
        }
    }
}

/// Name/description mutation applied by update workloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPatch {
    pub name: String,
    pub description: String,
}

impl ArtifactPatch {
    /// Patch with a suffix drawn from `0..PATCH_SUFFIX_RANGE`.
    pub fn randomized<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::with_suffix(rng.random_range(0..PATCH_SUFFIX_RANGE))
    }

    pub fn with_suffix(suffix: u32) -> Self {
        Self {
            name: format!("new-artifact-{}", suffix),
            description: format!("new-description-{}", suffix),
        }
    }
}

/// Artifacts and edges produced together by a graph generator.
///
/// `roots` holds the id of each generated shape's starting artifact: one per
/// pair source, one per chain head, or the single star parent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphBatch {
    pub artifacts: Vec<Artifact>,
    pub edges: Vec<Edge>,
    pub roots: Vec<RecordId>,
}

impl GraphBatch {
    pub fn artifact_ids(&self) -> Vec<RecordId> {
        self.artifacts.iter().map(|a| a.id).collect()
    }

    pub fn edge_ids(&self) -> Vec<RecordId> {
        self.edges.iter().map(|e| e.id).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty() && self.edges.is_empty()
    }
}

/// Outcome of a plain artifact creation: new ids plus the post-operation
/// total count reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    pub ids: Vec<RecordId>,
    pub total: u64,
}

/// Outcome of a graph creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphCreated {
    pub artifact_ids: Vec<RecordId>,
    pub edge_ids: Vec<RecordId>,
    pub roots: Vec<RecordId>,
    pub artifact_total: u64,
    pub edge_total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_artifact_defaults_item_to_one() {
        let a = Artifact::new("artifact-0", "description-0", Utc::now());
        assert_eq!(a.item, 1);
        assert_eq!(a.with_item(7).item, 7);
    }

    #[test]
    fn test_artifact_deserializes_without_item() {
        let json = serde_json::json!({
            "id": Uuid::nil(),
            "name": "artifact-3",
            "description": "description-3",
            "create_time": "2000-01-04T00:00:00Z",
        });
        let a: Artifact = serde_json::from_value(json).unwrap();
        assert_eq!(a.item, 1);
        assert_eq!(a.name, "artifact-3");
    }

    #[test]
    fn test_patch_suffix_in_range() {
        let re = regex::Regex::new(r"^new-artifact-(\d+)$").unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let patch = ArtifactPatch::randomized(&mut rng);
            let caps = re.captures(&patch.name).expect("name pattern");
            let n: u32 = caps[1].parse().unwrap();
            assert!(n < PATCH_SUFFIX_RANGE);
            assert_eq!(patch.description, format!("new-description-{}", n));
        }
    }

    #[test]
    fn test_apply_patch_keeps_identity() {
        let mut a = Artifact::new("artifact-1", "description-1", Utc::now());
        let id = a.id;
        a.apply(&ArtifactPatch::with_suffix(42));
        assert_eq!(a.id, id);
        assert_eq!(a.name, "new-artifact-42");
        assert_eq!(a.description, "new-description-42");
    }
}
