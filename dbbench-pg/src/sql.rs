//! SQL statements used by the PostgreSQL adapter.
//!
//! Bulk writes ship whole columns as arrays and `UNNEST` them server side, so
//! every batch is one statement with a fixed parameter count regardless of
//! its size.

pub const CREATE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS artifacts
(
    id           UUID PRIMARY KEY,
    name         TEXT NOT NULL,
    description  TEXT,
    item         BIGINT NOT NULL DEFAULT 1,
    create_time  TIMESTAMPTZ NOT NULL DEFAULT CLOCK_TIMESTAMP()
);

CREATE TABLE IF NOT EXISTS edges
(
    id       UUID PRIMARY KEY,
    from_id  UUID NOT NULL REFERENCES artifacts,
    to_id    UUID NOT NULL REFERENCES artifacts,
    body     TEXT
);

CREATE INDEX IF NOT EXISTS edges_from_id_idx ON edges (from_id);
CREATE INDEX IF NOT EXISTS edges_to_id_idx ON edges (to_id);
"#;

pub const COUNT_ARTIFACTS: &str = "SELECT count(*) FROM artifacts";

pub const COUNT_EDGES: &str = "SELECT count(*) FROM edges";

pub const INSERT_ARTIFACT: &str = "INSERT INTO artifacts (id, name, description, create_time, item) \
     VALUES ($1, $2, $3, $4, $5)";

pub const INSERT_ARTIFACTS: &str = "INSERT INTO artifacts (id, name, description, create_time, item) \
     SELECT * FROM UNNEST($1::uuid[], $2::text[], $3::text[], $4::timestamptz[], $5::bigint[])";

pub const INSERT_EDGES: &str = "INSERT INTO edges (id, from_id, to_id, body) \
     SELECT * FROM UNNEST($1::uuid[], $2::uuid[], $3::uuid[], $4::text[])";

pub const SELECT_ARTIFACT: &str =
    "SELECT id, name, description, create_time, item FROM artifacts WHERE id = $1";

pub const SELECT_ARTIFACTS: &str =
    "SELECT id, name, description, create_time, item FROM artifacts WHERE id = ANY($1)";

pub const UPDATE_ARTIFACT: &str =
    "UPDATE artifacts SET name = $2, description = $3 WHERE id = $1";

pub const UPDATE_ARTIFACTS: &str = "UPDATE artifacts AS a \
     SET name = u.name, description = u.description \
     FROM UNNEST($1::uuid[], $2::text[], $3::text[]) AS u(id, name, description) \
     WHERE a.id = u.id";

pub const SELECT_ALL: &str = "SELECT name FROM artifacts";

pub const SELECT_PAIRS: &str = "SELECT t.name FROM artifacts f \
     INNER JOIN edges e ON e.from_id = f.id \
     INNER JOIN artifacts t ON t.id = e.to_id";

pub const SELECT_PAIRS_IN_YEAR: &str = "SELECT t.name FROM artifacts f \
     INNER JOIN edges e ON e.from_id = f.id \
     INNER JOIN artifacts t ON t.id = e.to_id \
     WHERE EXTRACT(YEAR FROM t.create_time AT TIME ZONE 'UTC')::int = $1";

/// Walk outbound edges from `$1`, stopping at depth `$2`; the root is depth 0.
pub const SELECT_NEIGHBOUR_AT: &str = r#"
WITH RECURSIVE walk(id, depth) AS (
    SELECT a.id, 0 FROM artifacts a WHERE a.id = $1
UNION ALL
    SELECT e.to_id, w.depth + 1 FROM walk w INNER JOIN edges e ON e.from_id = w.id WHERE w.depth < $2
)
SELECT a.id, a.name, a.description, a.create_time, a.item
FROM walk w INNER JOIN artifacts a ON a.id = w.id
WHERE w.depth = $2
LIMIT 1
"#;

/// Row count and item sum over depths `0..=$2`; a zero count means the root
/// does not exist.
pub const SUM_CHAIN_ITEMS: &str = r#"
WITH RECURSIVE walk(id, depth) AS (
    SELECT a.id, 0 FROM artifacts a WHERE a.id = $1
UNION ALL
    SELECT e.to_id, w.depth + 1 FROM walk w INNER JOIN edges e ON e.from_id = w.id WHERE w.depth < $2
)
SELECT count(*) AS visited, COALESCE(sum(a.item), 0)::bigint AS total
FROM walk w INNER JOIN artifacts a ON a.id = w.id
"#;

pub const SELECT_SORTED_NEIGHBOURS: &str = r#"SELECT t.name FROM edges e
INNER JOIN artifacts t ON t.id = e.to_id
WHERE e.from_id = $1
ORDER BY t.name COLLATE "C""#;

pub const DELETE_ARTIFACTS: &str = "DELETE FROM artifacts WHERE id = ANY($1)";

pub const DELETE_EDGES: &str = "DELETE FROM edges WHERE id = ANY($1)";

#[cfg(test)]
mod tests {
    use super::*;

    fn max_placeholder(sql: &str) -> usize {
        (1..=9)
            .filter(|n| sql.contains(&format!("${}", n)))
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn test_bulk_statements_use_fixed_arity() {
        assert_eq!(max_placeholder(INSERT_ARTIFACTS), 5);
        assert_eq!(max_placeholder(INSERT_EDGES), 4);
        assert_eq!(max_placeholder(UPDATE_ARTIFACTS), 3);
        assert_eq!(max_placeholder(DELETE_EDGES), 1);
    }

    #[test]
    fn test_traversals_bind_root_and_depth() {
        for sql in [SELECT_NEIGHBOUR_AT, SUM_CHAIN_ITEMS] {
            assert_eq!(max_placeholder(sql), 2);
            assert!(sql.contains("WITH RECURSIVE"));
            assert!(sql.contains("w.depth < $2"));
        }
    }

    #[test]
    fn test_schema_is_idempotent() {
        let creates = CREATE_SCHEMA.matches("CREATE").count();
        let guarded = CREATE_SCHEMA.matches("IF NOT EXISTS").count();
        assert_eq!(creates, guarded);
    }
}
