use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, ToSql};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::store::{
    AliasRecord, LinkRecord, SkillRecord, SkillStore, SkillSummaryRecord, StoreError, TagRecord,
    TagRefRecord, TagStore,
};

const TAG_SEGMENTS: &str = "skill_tag_segments";
const ALIAS_SEGMENTS: &str = "skill_alias_segments";
const LINK_SEGMENTS: &str = "skill_link_segments";
const SKILL_TAGS: &str = "skill_tags";
const SKILL_ALIASES: &str = "skill_aliases";
const SKILL_LINKS: &str = "skill_links";

/// SQLite-backed implementation of [`SkillStore`] and [`TagStore`].
///
/// Every mutation runs in its own transaction; a transaction dropped on an
/// error path rolls back, so losers of a segment race leave the child
/// collection untouched.
pub struct SqliteCatalogStore {
    conn: Mutex<Connection>,
}

/// Per-skill version counter guarding one child-collection type. The version
/// read here is the CAS token for the whole replace operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    skill_id: i64,
    version: i64,
}

impl SqliteCatalogStore {
    /// Open (or create) a database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn =
            Connection::open(path).map_err(|e| StoreError::Storage(format!("open: {e}")))?;
        Self::init_with_connection(conn)
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Storage(format!("open_in_memory: {e}")))?;
        Self::init_with_connection(conn)
    }

    fn init_with_connection(conn: Connection) -> Result<Self, StoreError> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS skills (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guid TEXT NOT NULL UNIQUE,
                version INTEGER NOT NULL DEFAULT 0,
                name TEXT NOT NULL UNIQUE,
                description TEXT
            );

            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                version INTEGER NOT NULL DEFAULT 0,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS skill_tags (
                skill_id INTEGER NOT NULL REFERENCES skills(id) ON DELETE CASCADE,
                tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                PRIMARY KEY (skill_id, tag_id)
            );

            CREATE TABLE IF NOT EXISTS skill_tag_segments (
                skill_id INTEGER PRIMARY KEY REFERENCES skills(id) ON DELETE CASCADE,
                version INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS skill_aliases (
                skill_id INTEGER NOT NULL REFERENCES skills(id) ON DELETE CASCADE,
                alias_skill_id INTEGER NOT NULL REFERENCES skills(id) ON DELETE CASCADE,
                PRIMARY KEY (skill_id, alias_skill_id)
            );

            CREATE TABLE IF NOT EXISTS skill_alias_segments (
                skill_id INTEGER PRIMARY KEY REFERENCES skills(id) ON DELETE CASCADE,
                version INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS skill_links (
                skill_id INTEGER NOT NULL REFERENCES skills(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                url TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS skill_link_segments (
                skill_id INTEGER PRIMARY KEY REFERENCES skills(id) ON DELETE CASCADE,
                version INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_skill_links_skill ON skill_links(skill_id);

            ANALYZE;
            ",
        )
        .map_err(|e| StoreError::Storage(format!("init_schema: {e}")))?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Storage(e.to_string()))
    }
}

/// Raw skill columns as read from a row; required fields are validated by
/// [`finish_skill`] so a partially populated record never escapes.
type RawSkillRow = (i64, String, i64, Option<String>, Option<String>);

fn finish_skill(raw: RawSkillRow) -> Result<SkillRecord, StoreError> {
    let (id, guid, version, name, description) = raw;
    let guid = Uuid::parse_str(&guid)
        .map_err(|_| StoreError::DataIntegrity(format!("skill row {id} has a malformed guid")))?;
    let name = match name {
        Some(n) if !n.is_empty() => n,
        _ => {
            return Err(StoreError::DataIntegrity(format!(
                "skill row {id} has no name"
            )))
        }
    };
    Ok(SkillRecord {
        id,
        guid,
        version,
        name,
        description,
    })
}

/// Estimated row count for a table from `sqlite_stat1` (populated by
/// `ANALYZE`). Lags the true count; 0 when no statistics exist.
fn table_estimate(conn: &Connection, table: &str) -> Result<i64, StoreError> {
    let stat: Option<String> = conn
        .query_row(
            "SELECT stat FROM sqlite_stat1 WHERE tbl = ?1 LIMIT 1",
            params![table],
            |row| row.get(0),
        )
        .optional()?;
    let count = stat
        .as_deref()
        .and_then(|s| s.split_whitespace().next())
        .and_then(|n| n.parse::<i64>().ok())
        .unwrap_or(0);
    Ok(count)
}

/// Atomic upsert of a segment row: exactly one logical row results no matter
/// how first-writers interleave. The no-op DO UPDATE makes RETURNING yield
/// the current version on conflict as well.
fn get_or_create_segment(
    conn: &Connection,
    table: &str,
    skill_id: i64,
) -> Result<Segment, StoreError> {
    let sql = format!(
        "INSERT INTO {table} (skill_id) VALUES (?1)
         ON CONFLICT (skill_id) DO UPDATE SET skill_id = excluded.skill_id
         RETURNING version"
    );
    let version: i64 = conn.query_row(&sql, params![skill_id], |row| row.get(0))?;
    Ok(Segment { skill_id, version })
}

/// Plain segment read, used by delete paths that must not create a segment
/// for a skill that has never had children of this type.
fn get_segment(
    conn: &Connection,
    table: &str,
    skill_id: i64,
) -> Result<Option<Segment>, StoreError> {
    let sql = format!("SELECT version FROM {table} WHERE skill_id = ?1");
    let version: Option<i64> = conn
        .query_row(&sql, params![skill_id], |row| row.get(0))
        .optional()?;
    Ok(version.map(|version| Segment { skill_id, version }))
}

/// CAS advance of the segment version. Zero affected rows means another
/// writer advanced it first.
fn advance_segment(conn: &Connection, table: &str, segment: &Segment) -> Result<usize, StoreError> {
    let sql = format!(
        "UPDATE {table} SET version = version + 1
         WHERE skill_id = ?1 AND version = ?2"
    );
    Ok(conn.execute(&sql, params![segment.skill_id, segment.version])?)
}

/// Unconditional delete of one skill's child rows. Not version-checked: its
/// effect is nullified by rollback whenever the subsequent CAS fails.
fn clear_children(conn: &Connection, table: &str, skill_id: i64) -> Result<usize, StoreError> {
    let sql = format!("DELETE FROM {table} WHERE skill_id = ?1");
    Ok(conn.execute(&sql, params![skill_id])?)
}

/// Guarded bulk insert of tag assignments: the VALUES rows are joined against
/// the segment table so nothing is inserted once another writer has advanced
/// the segment past `expected_version`.
fn insert_tag_rows(
    conn: &Connection,
    skill_id: i64,
    tag_ids: &[i64],
    expected_version: i64,
) -> Result<usize, StoreError> {
    let values = vec!["(?, ?)"; tag_ids.len()].join(", ");
    let sql = format!(
        "INSERT INTO skill_tags (skill_id, tag_id)
         SELECT v.column1, v.column2
         FROM (VALUES {values}) AS v
         JOIN skill_tag_segments AS seg ON seg.skill_id = v.column1
         WHERE seg.version = ?"
    );
    let mut bound: Vec<&dyn ToSql> = Vec::with_capacity(tag_ids.len() * 2 + 1);
    for tag_id in tag_ids {
        bound.push(&skill_id);
        bound.push(tag_id);
    }
    bound.push(&expected_version);
    Ok(conn.execute(&sql, bound.as_slice())?)
}

fn insert_alias_rows(
    conn: &Connection,
    skill_id: i64,
    alias_skill_ids: &[i64],
    expected_version: i64,
) -> Result<usize, StoreError> {
    let values = vec!["(?, ?)"; alias_skill_ids.len()].join(", ");
    let sql = format!(
        "INSERT INTO skill_aliases (skill_id, alias_skill_id)
         SELECT v.column1, v.column2
         FROM (VALUES {values}) AS v
         JOIN skill_alias_segments AS seg ON seg.skill_id = v.column1
         WHERE seg.version = ?"
    );
    let mut bound: Vec<&dyn ToSql> = Vec::with_capacity(alias_skill_ids.len() * 2 + 1);
    for alias_id in alias_skill_ids {
        bound.push(&skill_id);
        bound.push(alias_id);
    }
    bound.push(&expected_version);
    Ok(conn.execute(&sql, bound.as_slice())?)
}

fn insert_link_rows(
    conn: &Connection,
    skill_id: i64,
    links: &[LinkRecord],
    expected_version: i64,
) -> Result<usize, StoreError> {
    let values = vec!["(?, ?, ?)"; links.len()].join(", ");
    let sql = format!(
        "INSERT INTO skill_links (skill_id, title, url)
         SELECT v.column1, v.column2, v.column3
         FROM (VALUES {values}) AS v
         JOIN skill_link_segments AS seg ON seg.skill_id = v.column1
         WHERE seg.version = ?"
    );
    let mut bound: Vec<&dyn ToSql> = Vec::with_capacity(links.len() * 3 + 1);
    for link in links {
        bound.push(&skill_id);
        bound.push(&link.title);
        bound.push(&link.url);
    }
    bound.push(&expected_version);
    Ok(conn.execute(&sql, bound.as_slice())?)
}

impl SkillStore for SqliteCatalogStore {
    fn create(&self, name: &str) -> Result<Uuid, StoreError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let guid = Uuid::new_v4();
        let inserted: Option<i64> = tx
            .query_row(
                "INSERT INTO skills (guid, name) VALUES (?1, ?2)
                 ON CONFLICT DO NOTHING
                 RETURNING id",
                params![guid.to_string(), name],
                |row| row.get(0),
            )
            .optional()?;
        tx.commit()?;
        match inserted {
            Some(id) => {
                debug!(skill_id = id, "created skill");
                Ok(guid)
            }
            None => Err(StoreError::Conflict),
        }
    }

    fn get(&self, guid: Uuid) -> Result<Option<SkillRecord>, StoreError> {
        let conn = self.lock()?;
        let raw: Option<RawSkillRow> = conn
            .query_row(
                "SELECT id, guid, version, name, description FROM skills WHERE guid = ?1",
                params![guid.to_string()],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )
            .optional()?;
        raw.map(finish_skill).transpose()
    }

    fn get_many(&self, guids: &[Uuid]) -> Result<Vec<SkillRecord>, StoreError> {
        if guids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;
        let placeholders = (1..=guids.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT id, guid, version, name, description FROM skills
             WHERE guid IN ({placeholders})
             ORDER BY id ASC"
        );
        let guid_strings: Vec<String> = guids.iter().map(Uuid::to_string).collect();
        let bound: Vec<&dyn ToSql> = guid_strings.iter().map(|g| g as &dyn ToSql).collect();
        let mut stmt = conn.prepare(&sql)?;
        let raws = stmt
            .query_map(bound.as_slice(), |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })?
            .collect::<Result<Vec<RawSkillRow>, _>>()?;
        raws.into_iter().map(finish_skill).collect()
    }

    fn update(&self, record: &SkillRecord) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let rows = tx.execute(
            "UPDATE skills
             SET name = ?1, description = ?2, version = version + 1
             WHERE guid = ?3 AND version = ?4",
            params![
                record.name,
                record.description,
                record.guid.to_string(),
                record.version
            ],
        )?;
        tx.commit()?;
        if rows < 1 {
            warn!(guid = %record.guid, expected = record.version, "stale skill update");
            return Err(StoreError::Conflict);
        }
        Ok(rows)
    }

    fn delete(&self, guid: Uuid) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let rows = tx.execute(
            "DELETE FROM skills WHERE guid = ?1",
            params![guid.to_string()],
        )?;
        tx.commit()?;
        debug!(guid = %guid, rows, "deleted skill");
        Ok(rows)
    }

    fn list(
        &self,
        cursor: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<SkillSummaryRecord>, StoreError> {
        let limit = limit.clamp(1, 128);
        let conn = self.lock()?;
        // An unresolvable cursor makes the subquery NULL, which matches no
        // rows: exhausted and invalid cursors both yield an empty page.
        let (sql, bound): (&str, Vec<Box<dyn ToSql>>) = match cursor {
            Some(guid) => (
                "SELECT id, guid, name FROM skills
                 WHERE id >= (SELECT id FROM skills WHERE guid = ?1)
                 ORDER BY id ASC LIMIT ?2",
                vec![Box::new(guid.to_string()), Box::new(limit)],
            ),
            None => (
                "SELECT id, guid, name FROM skills ORDER BY id ASC LIMIT ?1",
                vec![Box::new(limit)],
            ),
        };
        let bound: Vec<&dyn ToSql> = bound.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(sql)?;
        let raws = stmt
            .query_map(bound.as_slice(), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter()
            .map(|(id, guid, name)| {
                let guid = Uuid::parse_str(&guid).map_err(|_| {
                    StoreError::DataIntegrity(format!("skill row {id} has a malformed guid"))
                })?;
                let name = match name {
                    Some(n) if !n.is_empty() => n,
                    _ => {
                        return Err(StoreError::DataIntegrity(format!(
                            "skill row {id} has no name"
                        )))
                    }
                };
                Ok(SkillSummaryRecord { id, guid, name })
            })
            .collect()
    }

    fn approximate_count(&self) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        table_estimate(&conn, "skills")
    }

    fn tag_list(&self, skill_id: i64) -> Result<Vec<TagRefRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT t.id, t.name FROM skill_tags st
             JOIN tags t ON t.id = st.tag_id
             WHERE st.skill_id = ?1
             ORDER BY t.id ASC",
        )?;
        let tags = stmt
            .query_map(params![skill_id], |row| {
                Ok(TagRefRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    fn set_tag_list(&self, skill_id: i64, tag_ids: &[i64]) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let segment = get_or_create_segment(&tx, TAG_SEGMENTS, skill_id)?;
        clear_children(&tx, SKILL_TAGS, skill_id)?;
        let rows = if tag_ids.is_empty() {
            0
        } else {
            let inserted = insert_tag_rows(&tx, skill_id, tag_ids, segment.version)?;
            if inserted < 1 {
                warn!(skill_id, "tag replace lost the segment race");
                return Err(StoreError::Conflict);
            }
            inserted
        };
        if advance_segment(&tx, TAG_SEGMENTS, &segment)? < 1 {
            warn!(skill_id, "tag segment advanced by another writer");
            return Err(StoreError::Conflict);
        }
        tx.commit()?;
        debug!(skill_id, rows, "replaced tag list");
        Ok(rows)
    }

    fn delete_tag_list(&self, skill_id: i64) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let Some(segment) = get_segment(&tx, TAG_SEGMENTS, skill_id)? else {
            return Ok(0);
        };
        let rows = clear_children(&tx, SKILL_TAGS, skill_id)?;
        if rows < 1 {
            return Err(StoreError::Conflict);
        }
        if advance_segment(&tx, TAG_SEGMENTS, &segment)? < 1 {
            return Err(StoreError::Conflict);
        }
        tx.commit()?;
        debug!(skill_id, rows, "cleared tag list");
        Ok(rows)
    }

    fn alias_list(&self, skill_id: i64) -> Result<Vec<AliasRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT s.guid, s.name FROM skill_aliases a
             JOIN skills s ON s.id = a.alias_skill_id
             WHERE a.skill_id = ?1
             ORDER BY a.alias_skill_id ASC",
        )?;
        let raws = stmt
            .query_map(params![skill_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter()
            .map(|(guid, name)| {
                let guid = Uuid::parse_str(&guid).map_err(|_| {
                    StoreError::DataIntegrity("alias target has a malformed guid".into())
                })?;
                Ok(AliasRecord { guid, name })
            })
            .collect()
    }

    fn set_alias_list(&self, skill_id: i64, alias_skill_ids: &[i64]) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let segment = get_or_create_segment(&tx, ALIAS_SEGMENTS, skill_id)?;
        clear_children(&tx, SKILL_ALIASES, skill_id)?;
        let rows = if alias_skill_ids.is_empty() {
            0
        } else {
            let inserted = insert_alias_rows(&tx, skill_id, alias_skill_ids, segment.version)?;
            if inserted < 1 {
                warn!(skill_id, "alias replace lost the segment race");
                return Err(StoreError::Conflict);
            }
            inserted
        };
        if advance_segment(&tx, ALIAS_SEGMENTS, &segment)? < 1 {
            warn!(skill_id, "alias segment advanced by another writer");
            return Err(StoreError::Conflict);
        }
        tx.commit()?;
        debug!(skill_id, rows, "replaced alias list");
        Ok(rows)
    }

    fn delete_alias_list(&self, skill_id: i64) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let Some(segment) = get_segment(&tx, ALIAS_SEGMENTS, skill_id)? else {
            return Ok(0);
        };
        let rows = clear_children(&tx, SKILL_ALIASES, skill_id)?;
        if rows < 1 {
            return Err(StoreError::Conflict);
        }
        if advance_segment(&tx, ALIAS_SEGMENTS, &segment)? < 1 {
            return Err(StoreError::Conflict);
        }
        tx.commit()?;
        debug!(skill_id, rows, "cleared alias list");
        Ok(rows)
    }

    fn link_list(&self, skill_id: i64) -> Result<Vec<LinkRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT title, url FROM skill_links WHERE skill_id = ?1 ORDER BY rowid ASC",
        )?;
        let links = stmt
            .query_map(params![skill_id], |row| {
                Ok(LinkRecord {
                    title: row.get(0)?,
                    url: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(links)
    }

    fn set_link_list(&self, skill_id: i64, links: &[LinkRecord]) -> Result<usize, StoreError> {
        // Structural validation happens before any database work.
        for link in links {
            if link.title.is_empty() || link.url.is_empty() {
                return Err(StoreError::InvalidParameter(
                    "link title and url must be non-empty".into(),
                ));
            }
        }
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let segment = get_or_create_segment(&tx, LINK_SEGMENTS, skill_id)?;
        clear_children(&tx, SKILL_LINKS, skill_id)?;
        let rows = if links.is_empty() {
            0
        } else {
            let inserted = insert_link_rows(&tx, skill_id, links, segment.version)?;
            if inserted < 1 {
                warn!(skill_id, "link replace lost the segment race");
                return Err(StoreError::Conflict);
            }
            inserted
        };
        if advance_segment(&tx, LINK_SEGMENTS, &segment)? < 1 {
            warn!(skill_id, "link segment advanced by another writer");
            return Err(StoreError::Conflict);
        }
        tx.commit()?;
        debug!(skill_id, rows, "replaced link list");
        Ok(rows)
    }

    fn delete_link_list(&self, skill_id: i64) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let Some(segment) = get_segment(&tx, LINK_SEGMENTS, skill_id)? else {
            return Ok(0);
        };
        let rows = clear_children(&tx, SKILL_LINKS, skill_id)?;
        if rows < 1 {
            return Err(StoreError::Conflict);
        }
        if advance_segment(&tx, LINK_SEGMENTS, &segment)? < 1 {
            return Err(StoreError::Conflict);
        }
        tx.commit()?;
        debug!(skill_id, rows, "cleared link list");
        Ok(rows)
    }
}

impl TagStore for SqliteCatalogStore {
    fn create(&self, name: &str) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let inserted: Option<i64> = tx
            .query_row(
                "INSERT INTO tags (name) VALUES (?1)
                 ON CONFLICT DO NOTHING
                 RETURNING id",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        tx.commit()?;
        match inserted {
            Some(id) => {
                debug!(tag_id = id, "created tag");
                Ok(id)
            }
            None => Err(StoreError::Conflict),
        }
    }

    fn get(&self, id: i64) -> Result<Option<TagRecord>, StoreError> {
        let conn = self.lock()?;
        let raw: Option<(i64, i64, Option<String>)> = conn
            .query_row(
                "SELECT id, version, name FROM tags WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        raw.map(|(id, version, name)| {
            let name = match name {
                Some(n) if !n.is_empty() => n,
                _ => {
                    return Err(StoreError::DataIntegrity(format!(
                        "tag row {id} has no name"
                    )))
                }
            };
            Ok(TagRecord { id, version, name })
        })
        .transpose()
    }

    fn update(&self, record: &TagRecord) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let rows = tx.execute(
            "UPDATE tags SET name = ?1, version = version + 1
             WHERE id = ?2 AND version = ?3",
            params![record.name, record.id, record.version],
        )?;
        tx.commit()?;
        if rows < 1 {
            warn!(tag_id = record.id, expected = record.version, "stale tag update");
            return Err(StoreError::Conflict);
        }
        Ok(rows)
    }

    fn delete(&self, id: i64) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let rows = tx.execute("DELETE FROM tags WHERE id = ?1", params![id])?;
        tx.commit()?;
        debug!(tag_id = id, rows, "deleted tag");
        Ok(rows)
    }

    fn list(&self, cursor: Option<i64>, limit: i64) -> Result<Vec<TagRefRecord>, StoreError> {
        let limit = limit.clamp(1, 128);
        let conn = self.lock()?;
        // The cursor id is resolved through a lookup so that a vanished
        // cursor row yields an empty page rather than resuming past it.
        let (sql, bound): (&str, Vec<Box<dyn ToSql>>) = match cursor {
            Some(id) => (
                "SELECT id, name FROM tags
                 WHERE id >= (SELECT id FROM tags WHERE id = ?1)
                 ORDER BY id ASC LIMIT ?2",
                vec![Box::new(id), Box::new(limit)],
            ),
            None => (
                "SELECT id, name FROM tags ORDER BY id ASC LIMIT ?1",
                vec![Box::new(limit)],
            ),
        };
        let bound: Vec<&dyn ToSql> = bound.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(sql)?;
        let tags = stmt
            .query_map(bound.as_slice(), |row| {
                Ok(TagRefRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    fn approximate_count(&self) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        table_estimate(&conn, "tags")
    }
}
