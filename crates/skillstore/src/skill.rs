use serde::{Deserialize, Serialize};

/// A fully assembled skill as seen at the public boundary.
///
/// The identifier is the external guid rendered as a string; the internal
/// row id never leaves the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<SkillTag>,
    pub aliases: Vec<String>,
    pub links: Vec<SkillLink>,
}

/// Listing row: identifier and name only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillSummary {
    pub id: String,
    pub name: String,
}

/// A tag assigned to a skill. The id is the tag's numeric identifier
/// rendered as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillTag {
    pub id: String,
    pub name: String,
}

/// A free-form web link attached to a skill. Both fields are required
/// non-empty; multiple links per skill are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillLink {
    pub title: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skill_serde_round_trip() {
        let skill = Skill {
            id: "3f0c8a6e-0b0a-4c9f-9d6e-0c1b2a3d4e5f".into(),
            name: "Woodworking".into(),
            description: Some("Hand tools and joinery".into()),
            tags: vec![SkillTag {
                id: "7".into(),
                name: "craft".into(),
            }],
            aliases: vec!["9b2d1c4a-5e6f-4a7b-8c9d-0e1f2a3b4c5d".into()],
            links: vec![SkillLink {
                title: "Guide".into(),
                url: "https://example.com/woodworking".into(),
            }],
        };
        let json = serde_json::to_string(&skill).unwrap();
        let back: Skill = serde_json::from_str(&json).unwrap();
        assert_eq!(skill, back);
    }
}
