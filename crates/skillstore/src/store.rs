use uuid::Uuid;

/// Internal skill row. `id` is the storage-assigned key, `guid` the external
/// identifier; `version` increments by one on every successful update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillRecord {
    pub id: i64,
    pub guid: Uuid,
    pub version: i64,
    pub name: String,
    pub description: Option<String>,
}

/// Listing row for the skill pager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillSummaryRecord {
    pub id: i64,
    pub guid: Uuid,
    pub name: String,
}

/// Internal tag row. The external identifier is `id` itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    pub id: i64,
    pub version: i64,
    pub name: String,
}

/// A tag as assigned to a skill (no version — membership is guarded by the
/// skill's tag segment, not by the tag row).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRefRecord {
    pub id: i64,
    pub name: String,
}

/// An alias entry: the target skill's external identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasRecord {
    pub guid: Uuid,
    pub name: String,
}

/// A link row attached to a skill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub title: String,
    pub url: String,
}

/// Storage operations for skills and their child collections.
///
/// Every mutation opens its own transaction and commits or rolls back before
/// returning; there is no cross-call state beyond the database itself.
pub trait SkillStore: Send + Sync {
    /// Insert a new skill unless one with the same name exists.
    /// Returns the generated external identifier; a duplicate name is a
    /// [`StoreError::Conflict`].
    fn create(&self, name: &str) -> Result<Uuid, StoreError>;

    /// Fetch a skill by external identifier.
    fn get(&self, guid: Uuid) -> Result<Option<SkillRecord>, StoreError>;

    /// Batch fetch by external identifiers. Unknown identifiers are simply
    /// absent from the result.
    fn get_many(&self, guids: &[Uuid]) -> Result<Vec<SkillRecord>, StoreError>;

    /// Compare-and-swap update: succeeds only if the stored version still
    /// equals `record.version`, bumping it by one. Zero affected rows (row
    /// missing or version stale) is a [`StoreError::Conflict`].
    fn update(&self, record: &SkillRecord) -> Result<usize, StoreError>;

    /// Unconditional delete. Returns the affected-row count (0 or 1); the
    /// caller maps 0 to "not found".
    fn delete(&self, guid: Uuid) -> Result<usize, StoreError>;

    /// Keyset pagination: rows whose id is >= the id the cursor resolves to,
    /// ascending, `limit` clamped to `[1, 128]`. A cursor that resolves to
    /// no row yields an empty page.
    fn list(&self, cursor: Option<Uuid>, limit: i64)
        -> Result<Vec<SkillSummaryRecord>, StoreError>;

    /// Approximate total row count from storage statistics. May lag the true
    /// count; never use for correctness-sensitive logic.
    fn approximate_count(&self) -> Result<i64, StoreError>;

    /// Tags assigned to a skill, ordered by tag id.
    fn tag_list(&self, skill_id: i64) -> Result<Vec<TagRefRecord>, StoreError>;

    /// Replace the skill's tag assignments atomically (segment-guarded).
    /// Returns the number of rows inserted (0 for an empty list).
    fn set_tag_list(&self, skill_id: i64, tag_ids: &[i64]) -> Result<usize, StoreError>;

    /// Clear the skill's tag assignments. Returns 0 without error when the
    /// skill has never had tags.
    fn delete_tag_list(&self, skill_id: i64) -> Result<usize, StoreError>;

    /// Alias targets of a skill.
    fn alias_list(&self, skill_id: i64) -> Result<Vec<AliasRecord>, StoreError>;

    /// Replace the skill's aliases atomically. Targets must be existing
    /// skill ids.
    fn set_alias_list(&self, skill_id: i64, alias_skill_ids: &[i64]) -> Result<usize, StoreError>;

    /// Clear the skill's aliases.
    fn delete_alias_list(&self, skill_id: i64) -> Result<usize, StoreError>;

    /// Links attached to a skill.
    fn link_list(&self, skill_id: i64) -> Result<Vec<LinkRecord>, StoreError>;

    /// Replace the skill's links atomically. Every link must carry a
    /// non-empty title and url, checked before any database work.
    fn set_link_list(&self, skill_id: i64, links: &[LinkRecord]) -> Result<usize, StoreError>;

    /// Clear the skill's links.
    fn delete_link_list(&self, skill_id: i64) -> Result<usize, StoreError>;
}

/// Storage operations for tags.
pub trait TagStore: Send + Sync {
    /// Insert a new tag unless one with the same name exists; duplicate
    /// names are a [`StoreError::Conflict`].
    fn create(&self, name: &str) -> Result<i64, StoreError>;

    fn get(&self, id: i64) -> Result<Option<TagRecord>, StoreError>;

    /// Compare-and-swap update, same contract as [`SkillStore::update`].
    fn update(&self, record: &TagRecord) -> Result<usize, StoreError>;

    /// Unconditional delete; returns the affected-row count.
    fn delete(&self, id: i64) -> Result<usize, StoreError>;

    /// Keyset pagination over tags, same cursor contract as
    /// [`SkillStore::list`].
    fn list(&self, cursor: Option<i64>, limit: i64) -> Result<Vec<TagRefRecord>, StoreError>;

    fn approximate_count(&self) -> Result<i64, StoreError>;
}

/// Errors from the catalog store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Malformed input detected before any write reached storage.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Lost an optimistic-concurrency race: uniqueness violation on create,
    /// stale version on update, or a segment advanced by another writer.
    /// Always surfaced after a full rollback; safe to retry with fresh reads.
    #[error("conflicting write")]
    Conflict,

    /// A stored row violates the entity's required-field invariant.
    #[error("data integrity violation: {0}")]
    DataIntegrity(String),

    /// Any other underlying storage failure, wrapped after rollback.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display() {
        let err = StoreError::InvalidParameter("malformed skill id".into());
        assert!(err.to_string().contains("malformed skill id"));

        let err = StoreError::Conflict;
        assert!(err.to_string().contains("conflict"));

        let err = StoreError::DataIntegrity("skill row missing name".into());
        assert!(err.to_string().contains("missing name"));
    }

    #[test]
    fn rusqlite_errors_wrap_as_storage() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StoreError::Storage(_)));
    }
}
