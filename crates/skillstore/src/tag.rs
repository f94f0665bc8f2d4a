use serde::{Deserialize, Serialize};

/// A tag as seen at the public boundary. The id is the internal numeric
/// identifier rendered as a decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
}
