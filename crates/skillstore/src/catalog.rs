use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::skill::{Skill, SkillLink, SkillSummary, SkillTag};
use crate::store::{LinkRecord, SkillStore, StoreError, TagStore};
use crate::tag::Tag;

/// Boundary adapter for skills: speaks string identifiers, validates input
/// before touching storage, and assembles full [`Skill`] values.
///
/// The store is shared behind an `Arc` so the skill and tag catalogs can sit
/// on one database handle.
pub struct SkillCatalog<S: SkillStore> {
    store: Arc<S>,
}

fn parse_skill_id(id: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(id).map_err(|_| StoreError::InvalidParameter(format!("malformed skill id: {id}")))
}

fn parse_tag_id(id: &str) -> Result<i64, StoreError> {
    id.parse::<i64>()
        .map_err(|_| StoreError::InvalidParameter(format!("malformed tag id: {id}")))
}

impl<S: SkillStore> SkillCatalog<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Create a skill, returning its external identifier. A duplicate name
    /// surfaces as [`StoreError::Conflict`].
    pub fn create(&self, name: &str) -> Result<String, StoreError> {
        if name.trim().is_empty() {
            return Err(StoreError::InvalidParameter(
                "skill name must be non-empty".into(),
            ));
        }
        let guid = self.store.create(name)?;
        Ok(guid.to_string())
    }

    /// Fetch a skill with its tag, alias, and link collections assembled.
    pub fn get(&self, id: &str) -> Result<Option<Skill>, StoreError> {
        let guid = parse_skill_id(id)?;
        let Some(record) = self.store.get(guid)? else {
            return Ok(None);
        };
        let tags = self
            .store
            .tag_list(record.id)?
            .into_iter()
            .map(|t| SkillTag {
                id: t.id.to_string(),
                name: t.name,
            })
            .collect();
        let aliases = self
            .store
            .alias_list(record.id)?
            .into_iter()
            .map(|a| a.guid.to_string())
            .collect();
        let links = self
            .store
            .link_list(record.id)?
            .into_iter()
            .map(|l| SkillLink {
                title: l.title,
                url: l.url,
            })
            .collect();
        Ok(Some(Skill {
            id: record.guid.to_string(),
            name: record.name,
            description: record.description,
            tags,
            aliases,
            links,
        }))
    }

    /// Read-modify-write update carrying the freshly read version; a write
    /// that loses to a concurrent update surfaces [`StoreError::Conflict`].
    /// Returns `false` when the skill does not exist.
    pub fn update(
        &self,
        id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<bool, StoreError> {
        if name.trim().is_empty() {
            return Err(StoreError::InvalidParameter(
                "skill name must be non-empty".into(),
            ));
        }
        let guid = parse_skill_id(id)?;
        let Some(mut record) = self.store.get(guid)? else {
            return Ok(false);
        };
        record.name = name.to_string();
        record.description = description.map(str::to_string);
        let rows = self.store.update(&record)?;
        Ok(rows > 0)
    }

    /// Delete a skill. Returns `false` when no row existed; never an error.
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let guid = parse_skill_id(id)?;
        let rows = self.store.delete(guid)?;
        Ok(rows > 0)
    }

    /// Page of skill summaries starting at the cursor's ordering key.
    pub fn list(&self, cursor: Option<&str>, limit: i64) -> Result<Vec<SkillSummary>, StoreError> {
        let cursor = cursor.map(parse_skill_id).transpose()?;
        let records = self.store.list(cursor, limit)?;
        Ok(records
            .into_iter()
            .map(|r| SkillSummary {
                id: r.guid.to_string(),
                name: r.name,
            })
            .collect())
    }

    /// Approximate total skill count, for display only.
    pub fn total_count(&self) -> Result<i64, StoreError> {
        self.store.approximate_count()
    }

    /// Tags assigned to a skill; empty when the skill is unknown or has
    /// never been tagged.
    pub fn tag_list(&self, id: &str) -> Result<Vec<SkillTag>, StoreError> {
        let guid = parse_skill_id(id)?;
        let Some(record) = self.store.get(guid)? else {
            return Ok(Vec::new());
        };
        Ok(self
            .store
            .tag_list(record.id)?
            .into_iter()
            .map(|t| SkillTag {
                id: t.id.to_string(),
                name: t.name,
            })
            .collect())
    }

    /// Replace a skill's tag assignments. Tag ids must parse as numeric
    /// identifiers; that is checked before any write.
    pub fn set_tag_list(&self, id: &str, tag_ids: &[String]) -> Result<bool, StoreError> {
        let guid = parse_skill_id(id)?;
        let parsed = tag_ids
            .iter()
            .map(|t| parse_tag_id(t))
            .collect::<Result<Vec<i64>, _>>()?;
        let Some(record) = self.store.get(guid)? else {
            return Ok(false);
        };
        let rows = self.store.set_tag_list(record.id, &parsed)?;
        debug!(skill = id, rows, "tag list replaced");
        Ok(rows > 0)
    }

    pub fn delete_tag_list(&self, id: &str) -> Result<bool, StoreError> {
        let guid = parse_skill_id(id)?;
        let Some(record) = self.store.get(guid)? else {
            return Ok(false);
        };
        let rows = self.store.delete_tag_list(record.id)?;
        Ok(rows > 0)
    }

    /// Alias identifiers of a skill.
    pub fn alias_list(&self, id: &str) -> Result<Vec<String>, StoreError> {
        let guid = parse_skill_id(id)?;
        let Some(record) = self.store.get(guid)? else {
            return Ok(Vec::new());
        };
        Ok(self
            .store
            .alias_list(record.id)?
            .into_iter()
            .map(|a| a.guid.to_string())
            .collect())
    }

    /// Replace a skill's aliases. Every target must parse as an identifier
    /// and resolve to an existing skill; unresolved targets are rejected
    /// before any write reaches storage.
    pub fn set_alias_list(&self, id: &str, aliases: &[String]) -> Result<bool, StoreError> {
        let guid = parse_skill_id(id)?;
        let targets = aliases
            .iter()
            .map(|a| {
                Uuid::parse_str(a)
                    .map_err(|_| StoreError::InvalidParameter(format!("malformed alias id: {a}")))
            })
            .collect::<Result<Vec<Uuid>, _>>()?;
        let Some(record) = self.store.get(guid)? else {
            return Ok(false);
        };
        let resolved = self.store.get_many(&targets)?;
        if resolved.len() != targets.len() {
            return Err(StoreError::InvalidParameter(
                "alias list contains unknown or duplicate skill ids".into(),
            ));
        }
        let target_ids: Vec<i64> = resolved.into_iter().map(|r| r.id).collect();
        let rows = self.store.set_alias_list(record.id, &target_ids)?;
        debug!(skill = id, rows, "alias list replaced");
        Ok(rows > 0)
    }

    pub fn delete_alias_list(&self, id: &str) -> Result<bool, StoreError> {
        let guid = parse_skill_id(id)?;
        let Some(record) = self.store.get(guid)? else {
            return Ok(false);
        };
        let rows = self.store.delete_alias_list(record.id)?;
        Ok(rows > 0)
    }

    /// Links attached to a skill.
    pub fn link_list(&self, id: &str) -> Result<Vec<SkillLink>, StoreError> {
        let guid = parse_skill_id(id)?;
        let Some(record) = self.store.get(guid)? else {
            return Ok(Vec::new());
        };
        Ok(self
            .store
            .link_list(record.id)?
            .into_iter()
            .map(|l| SkillLink {
                title: l.title,
                url: l.url,
            })
            .collect())
    }

    /// Replace a skill's links. Structural validation of each link happens
    /// in the store before any database work.
    pub fn set_link_list(&self, id: &str, links: &[SkillLink]) -> Result<bool, StoreError> {
        let guid = parse_skill_id(id)?;
        let Some(record) = self.store.get(guid)? else {
            return Ok(false);
        };
        let records: Vec<LinkRecord> = links
            .iter()
            .map(|l| LinkRecord {
                title: l.title.clone(),
                url: l.url.clone(),
            })
            .collect();
        let rows = self.store.set_link_list(record.id, &records)?;
        debug!(skill = id, rows, "link list replaced");
        Ok(rows > 0)
    }

    pub fn delete_link_list(&self, id: &str) -> Result<bool, StoreError> {
        let guid = parse_skill_id(id)?;
        let Some(record) = self.store.get(guid)? else {
            return Ok(false);
        };
        let rows = self.store.delete_link_list(record.id)?;
        Ok(rows > 0)
    }
}

/// Boundary adapter for tags. The external identifier is the numeric row id
/// rendered as a decimal string.
pub struct TagCatalog<S: TagStore> {
    store: Arc<S>,
}

impl<S: TagStore> TagCatalog<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn create(&self, name: &str) -> Result<String, StoreError> {
        if name.trim().is_empty() {
            return Err(StoreError::InvalidParameter(
                "tag name must be non-empty".into(),
            ));
        }
        let id = self.store.create(name)?;
        Ok(id.to_string())
    }

    pub fn get(&self, id: &str) -> Result<Option<Tag>, StoreError> {
        let id = parse_tag_id(id)?;
        Ok(self.store.get(id)?.map(|t| Tag {
            id: t.id.to_string(),
            name: t.name,
        }))
    }

    /// Read-modify-write rename carrying the freshly read version.
    pub fn update(&self, id: &str, name: &str) -> Result<bool, StoreError> {
        if name.trim().is_empty() {
            return Err(StoreError::InvalidParameter(
                "tag name must be non-empty".into(),
            ));
        }
        let id = parse_tag_id(id)?;
        let Some(mut record) = self.store.get(id)? else {
            return Ok(false);
        };
        record.name = name.to_string();
        let rows = self.store.update(&record)?;
        Ok(rows > 0)
    }

    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let id = parse_tag_id(id)?;
        let rows = self.store.delete(id)?;
        Ok(rows > 0)
    }

    pub fn list(&self, cursor: Option<&str>, limit: i64) -> Result<Vec<Tag>, StoreError> {
        let cursor = cursor.map(parse_tag_id).transpose()?;
        let records = self.store.list(cursor, limit)?;
        Ok(records
            .into_iter()
            .map(|t| Tag {
                id: t.id.to_string(),
                name: t.name,
            })
            .collect())
    }

    pub fn total_count(&self) -> Result<i64, StoreError> {
        self.store.approximate_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite_store::SqliteCatalogStore;

    fn catalogs() -> (
        SkillCatalog<SqliteCatalogStore>,
        TagCatalog<SqliteCatalogStore>,
    ) {
        let store = Arc::new(SqliteCatalogStore::open_in_memory().unwrap());
        (SkillCatalog::new(store.clone()), TagCatalog::new(store))
    }

    #[test]
    fn create_then_get_round_trip() {
        let (skills, _) = catalogs();
        let id = skills.create("Woodworking").unwrap();
        let skill = skills.get(&id).unwrap().unwrap();
        assert_eq!(skill.id, id);
        assert_eq!(skill.name, "Woodworking");
        assert!(skill.tags.is_empty());
        assert!(skill.aliases.is_empty());
        assert!(skill.links.is_empty());
    }

    #[test]
    fn conflicting_create_returns_no_identifier() {
        let (skills, _) = catalogs();
        skills.create("Woodworking").unwrap();
        let err = skills.create("Woodworking").unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
    }

    #[test]
    fn malformed_skill_id_is_invalid_parameter() {
        let (skills, _) = catalogs();
        for result in [
            skills.get("not-a-guid").map(|_| ()),
            skills.delete("not-a-guid").map(|_| ()),
            skills.tag_list("not-a-guid").map(|_| ()),
            skills.set_tag_list("not-a-guid", &[]).map(|_| ()),
            skills.alias_list("not-a-guid").map(|_| ()),
            skills.link_list("not-a-guid").map(|_| ()),
            skills.list(Some("not-a-guid"), 10).map(|_| ()),
        ] {
            assert!(matches!(result.unwrap_err(), StoreError::InvalidParameter(_)));
        }
    }

    #[test]
    fn empty_name_is_invalid_parameter() {
        let (skills, tags) = catalogs();
        assert!(matches!(
            skills.create("  ").unwrap_err(),
            StoreError::InvalidParameter(_)
        ));
        assert!(matches!(
            tags.create("").unwrap_err(),
            StoreError::InvalidParameter(_)
        ));
    }

    #[test]
    fn update_renames_and_missing_returns_false() {
        let (skills, _) = catalogs();
        let id = skills.create("Woodworking").unwrap();
        assert!(skills.update(&id, "Joinery", Some("Hand tools")).unwrap());
        let skill = skills.get(&id).unwrap().unwrap();
        assert_eq!(skill.name, "Joinery");
        assert_eq!(skill.description.as_deref(), Some("Hand tools"));

        let missing = Uuid::new_v4().to_string();
        assert!(!skills.update(&missing, "Anything", None).unwrap());
    }

    #[test]
    fn delete_maps_affected_count_to_bool() {
        let (skills, _) = catalogs();
        let id = skills.create("Woodworking").unwrap();
        assert!(skills.delete(&id).unwrap());
        assert!(!skills.delete(&id).unwrap());
    }

    #[test]
    fn tag_replace_then_delete_scenario() {
        let (skills, tags) = catalogs();
        let g1 = skills.create("Woodworking").unwrap();
        let t1 = tags.create("craft").unwrap();

        assert!(skills.set_tag_list(&g1, &[t1.clone()]).unwrap());
        let assigned = skills.tag_list(&g1).unwrap();
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].id, t1);
        assert_eq!(assigned[0].name, "craft");

        assert!(skills.delete_tag_list(&g1).unwrap());
        assert!(skills.tag_list(&g1).unwrap().is_empty());
    }

    #[test]
    fn non_numeric_tag_id_rejected_before_write() {
        let (skills, _) = catalogs();
        let g1 = skills.create("Woodworking").unwrap();
        let err = skills
            .set_tag_list(&g1, &["craft".to_string()])
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidParameter(_)));
        assert!(skills.tag_list(&g1).unwrap().is_empty());
    }

    #[test]
    fn list_operations_on_missing_skill_are_empty_or_false() {
        let (skills, _) = catalogs();
        let missing = Uuid::new_v4().to_string();
        assert!(skills.tag_list(&missing).unwrap().is_empty());
        assert!(skills.alias_list(&missing).unwrap().is_empty());
        assert!(skills.link_list(&missing).unwrap().is_empty());
        assert!(!skills.set_tag_list(&missing, &[]).unwrap());
        assert!(!skills.delete_tag_list(&missing).unwrap());
        assert!(!skills.delete_alias_list(&missing).unwrap());
        assert!(!skills.delete_link_list(&missing).unwrap());
    }

    #[test]
    fn alias_round_trip_resolves_targets() {
        let (skills, _) = catalogs();
        let g1 = skills.create("Woodworking").unwrap();
        let g2 = skills.create("Carpentry").unwrap();
        let g3 = skills.create("Joinery").unwrap();

        assert!(skills
            .set_alias_list(&g1, &[g2.clone(), g3.clone()])
            .unwrap());
        let mut aliases = skills.alias_list(&g1).unwrap();
        aliases.sort();
        let mut expected = vec![g2, g3];
        expected.sort();
        assert_eq!(aliases, expected);
    }

    #[test]
    fn alias_to_unknown_skill_rejected_before_write() {
        let (skills, _) = catalogs();
        let g1 = skills.create("Woodworking").unwrap();
        let unknown = Uuid::new_v4().to_string();
        let err = skills.set_alias_list(&g1, &[unknown]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidParameter(_)));
        assert!(skills.alias_list(&g1).unwrap().is_empty());
    }

    #[test]
    fn link_round_trip_and_validation() {
        let (skills, _) = catalogs();
        let g1 = skills.create("Woodworking").unwrap();
        let links = vec![SkillLink {
            title: "Guide".into(),
            url: "https://example.com/guide".into(),
        }];
        assert!(skills.set_link_list(&g1, &links).unwrap());
        assert_eq!(skills.link_list(&g1).unwrap(), links);

        let bad = vec![SkillLink {
            title: "Guide".into(),
            url: String::new(),
        }];
        let err = skills.set_link_list(&g1, &bad).unwrap_err();
        assert!(matches!(err, StoreError::InvalidParameter(_)));
        // The failed replace left the previous list in place.
        assert_eq!(skills.link_list(&g1).unwrap(), links);
    }

    #[test]
    fn skill_listing_pages_by_cursor() {
        let (skills, _) = catalogs();
        let mut ids = Vec::new();
        for name in ["a", "b", "c", "d"] {
            ids.push(skills.create(name).unwrap());
        }
        let page = skills.list(Some(ids[1].as_str()), 2).unwrap();
        let names: Vec<&str> = page.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["b", "c"]);
    }

    #[test]
    fn tag_catalog_crud_round_trip() {
        let (_, tags) = catalogs();
        let id = tags.create("craft").unwrap();
        let tag = tags.get(&id).unwrap().unwrap();
        assert_eq!(tag.name, "craft");

        assert!(tags.update(&id, "crafts").unwrap());
        assert_eq!(tags.get(&id).unwrap().unwrap().name, "crafts");

        assert!(matches!(
            tags.get("forty-two").unwrap_err(),
            StoreError::InvalidParameter(_)
        ));

        assert!(tags.delete(&id).unwrap());
        assert!(tags.get(&id).unwrap().is_none());
        assert!(!tags.delete(&id).unwrap());
    }

    #[test]
    fn tag_catalog_lists_with_cursor() {
        let (_, tags) = catalogs();
        let mut ids = Vec::new();
        for name in ["a", "b", "c"] {
            ids.push(tags.create(name).unwrap());
        }
        let page = tags.list(Some(ids[1].as_str()), 10).unwrap();
        let names: Vec<&str> = page.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["b", "c"]);
    }

    #[test]
    fn total_counts_are_non_negative() {
        let (skills, tags) = catalogs();
        skills.create("Woodworking").unwrap();
        tags.create("craft").unwrap();
        assert!(skills.total_count().unwrap() >= 0);
        assert!(tags.total_count().unwrap() >= 0);
    }
}
