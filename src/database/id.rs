/*
 *     Copyright (C) 2023  Fritz Ochsmann
 *
 *     This program is free software: you can redistribute it and/or modify
 *     it under the terms of the GNU Affero General Public License as published
 *     by the Free Software Foundation, either version 3 of the License, or
 *     (at your option) any later version.
 *
 *     This program is distributed in the hope that it will be useful,
 *     but WITHOUT ANY WARRANTY; without even the implied warranty of
 *     MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *     GNU Affero General Public License for more details.
 *
 *     You should have received a copy of the GNU Affero General Public License
 *     along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use crate::error::ApplicationError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use surrealdb::sql::Thing;

const ALPHABET: [char; 52] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
    't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L',
    'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Id {
    pub table: String,
    pub id: String,
}

/// Removes the `⟨…⟩` escaping surrealdb applies to some record keys.
fn unescape(key: String) -> String {
    key.strip_prefix('⟨')
        .and_then(|key| key.strip_suffix('⟩'))
        .map(str::to_owned)
        .unwrap_or(key)
}

impl From<Thing> for Id {
    fn from(thing: Thing) -> Self {
        Self {
            table: thing.tb,
            id: unescape(thing.id.to_string()),
        }
    }
}

impl TryFrom<(&str, &str)> for Id {
    type Error = ApplicationError;

    /// Parses either `table:key` or a bare `key` into an id of the forced table.
    fn try_from((force, raw): (&str, &str)) -> Result<Self, Self::Error> {
        let raw = raw.trim();
        let (table, id) = raw.split_once(':').unwrap_or((force, raw));

        // for security reasons we can't allow every table
        if !table.eq(force) {
            return Err(ApplicationError::BadRequest("Invalid id".to_owned()));
        }
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ApplicationError::BadRequest("Invalid id".to_owned()));
        }

        Ok(Self::new((table, id)))
    }
}

impl Id {
    pub fn new((table, id): (&str, &str)) -> Self {
        Self {
            table: table.to_string(),
            id: id.to_string(),
        }
    }

    /// Creates a fresh random id in the given table.
    pub fn generate(table: &str) -> Self {
        Self::new((table, nanoid::nanoid!(20, &ALPHABET).as_str()))
    }

    pub fn to_thing(&self) -> Thing {
        Thing::from((self.table.as_str(), self.id.as_str()))
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw_value = serde_json::value::Value::deserialize(deserializer)?;

        if let Some(string) = raw_value.as_str() {
            let (table, id) = string
                .split_once(':')
                .ok_or_else(|| <D::Error as serde::de::Error>::custom("Invalid id format"))?;

            return Ok(Self::new((table, unescape(id.to_owned()).as_str())));
        }

        if raw_value.is_object() {
            let thing = serde_json::from_value::<Thing>(raw_value)
                .map_err(<D::Error as serde::de::Error>::custom)?;
            return Ok(Self::from(thing));
        }

        Err(<D::Error as serde::de::Error>::custom("Invalid datatype"))
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", &self.table, &self.id)
    }
}

impl Serialize for Id {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let id = Id::try_from(("submission", "submission:abc")).unwrap();
        assert_eq!(Id::new(("submission", "abc")), id);

        let bare = Id::try_from(("submission", "abc")).unwrap();
        assert_eq!(id, bare);

        assert!(Id::try_from(("submission", "employee:abc")).is_err());
        assert!(Id::try_from(("submission", "submission:")).is_err());
        assert!(Id::try_from(("submission", "abc; DELETE employee")).is_err());
    }

    #[test]
    fn test_serde() {
        let id = Id::generate("employee");
        assert_eq!(20, id.id.len());

        let value = serde_json::to_value(&id).unwrap();
        assert_eq!(json!(id.to_string()), value);
        assert_eq!(id, serde_json::from_value::<Id>(value).unwrap());

        let thing = serde_json::to_value(id.to_thing()).unwrap();
        assert_eq!(id, serde_json::from_value::<Id>(thing).unwrap());
    }
}
