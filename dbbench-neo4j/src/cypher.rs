//! Cypher statements used by the Neo4j adapter.
//!
//! Artifacts are `:Artifact` nodes keyed by a string `id` property; edges are
//! `:RELATED` relationships carrying their own `id` and `body`. Batches are
//! passed as a list parameter and expanded with `UNWIND`.

pub const INDEXES: [&str; 3] = [
    "CREATE INDEX artifact_id IF NOT EXISTS FOR (a:Artifact) ON (a.id)",
    "CREATE INDEX artifact_name IF NOT EXISTS FOR (a:Artifact) ON (a.name)",
    "CREATE INDEX related_id IF NOT EXISTS FOR ()-[r:RELATED]-() ON (r.id)",
];

pub const COUNT_ARTIFACTS: &str = "MATCH (a:Artifact) RETURN count(a) AS n";

pub const COUNT_EDGES: &str = "MATCH (:Artifact)-[r:RELATED]->(:Artifact) RETURN count(r) AS n";

pub const CREATE_ARTIFACT: &str = "CREATE (:Artifact {id: $id, name: $name, description: $description, \
     create_time: $create_time, item: $item})";

pub const CREATE_ARTIFACTS: &str = "UNWIND $batch AS props CREATE (a:Artifact) SET a = props";

pub const CREATE_EDGES: &str = "UNWIND $batch AS e \
     MATCH (f:Artifact {id: e.from}), (t:Artifact {id: e.to}) \
     CREATE (f)-[:RELATED {id: e.id, body: e.body}]->(t) \
     RETURN count(*) AS n";

const ARTIFACT_FIELDS: &str =
    "a.id AS id, a.name AS name, a.description AS description, a.create_time AS create_time, a.item AS item";

pub fn read_artifact() -> String {
    format!("MATCH (a:Artifact {{id: $id}}) RETURN {}", ARTIFACT_FIELDS)
}

pub fn read_artifacts() -> String {
    format!(
        "UNWIND $ids AS id MATCH (a:Artifact {{id: id}}) RETURN {}",
        ARTIFACT_FIELDS
    )
}

pub const UPDATE_ARTIFACT: &str = "MATCH (a:Artifact {id: $id}) \
     SET a.name = $name, a.description = $description \
     RETURN count(a) AS n";

pub const UPDATE_ARTIFACTS: &str = "UNWIND $batch AS p \
     MATCH (a:Artifact {id: p.id}) \
     SET a.name = p.name, a.description = p.description \
     RETURN count(a) AS n";

pub const DELETE_ARTIFACTS: &str = "UNWIND $ids AS id MATCH (a:Artifact {id: id}) DETACH DELETE a";

pub const DELETE_EDGES: &str = "UNWIND $ids AS id MATCH ()-[r:RELATED {id: id}]->() DELETE r";

pub const SELECT_ALL: &str = "MATCH (a:Artifact) RETURN a.name AS name";

pub const SELECT_PAIRS: &str = "MATCH (:Artifact)-[:RELATED]->(t:Artifact) RETURN t.name AS name";

pub const SELECT_PAIRS_IN_YEAR: &str = "MATCH (:Artifact)-[:RELATED]->(t:Artifact) \
     WHERE datetime(t.create_time).year = $year \
     RETURN t.name AS name";

/// Variable-length bounds cannot be parameters, so the hop count is inlined.
pub fn neighbour_at(hop: usize) -> String {
    format!(
        "MATCH (r:Artifact {{id: $id}})-[:RELATED*{hop}..{hop}]->(a:Artifact) RETURN {fields} LIMIT 1",
        hop = hop,
        fields = ARTIFACT_FIELDS
    )
}

pub fn sum_items(max_hop: usize) -> String {
    format!(
        "MATCH (r:Artifact {{id: $id}})-[:RELATED*0..{}]->(a:Artifact) \
         RETURN count(a) AS visited, sum(a.item) AS total",
        max_hop
    )
}

pub const SORTED_NEIGHBOURS: &str = "MATCH (r:Artifact {id: $id})-[:RELATED]->(a:Artifact) \
     RETURN a.name AS name ORDER BY name";
