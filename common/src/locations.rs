use crate::fields::{clean, clean_non_null, clean_nullable, deserialize_some, required, ValidationError};
use serde::{Deserialize, Serialize};

/// A room or space on campus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(diesel::Queryable, diesel::Selectable))]
#[cfg_attr(feature = "server", diesel(table_name = crate::schema::locations))]
#[cfg_attr(feature = "server", diesel(check_for_backend(diesel::pg::Pg)))]
pub struct Location {
    pub location_id: i32,
    pub room: Option<String>,
    pub floor: Option<String>,
    pub building: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub campus: Option<String>,

    /// The school which owns this location
    pub department: Option<String>,
}

/// A location along with the name and faculty of the school owning it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationListing {
    #[serde(flatten)]
    pub location: Location,
    pub dept_name: Option<String>,
    pub faculty: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "server", derive(diesel::Insertable))]
#[cfg_attr(feature = "server", diesel(table_name = crate::schema::locations))]
pub struct NewLocation {
    pub room: Option<String>,
    pub floor: Option<String>,
    pub building: String,
    pub kind: Option<String>,
    pub campus: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LocationInput {
    pub room: Option<String>,
    pub floor: Option<String>,
    pub building: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub campus: Option<String>,
    pub department: Option<String>,
}

impl LocationInput {
    pub fn validate(self) -> Result<NewLocation, ValidationError> {
        Ok(NewLocation {
            room: clean(self.room),
            floor: clean(self.floor),
            building: required("building", self.building)?,
            kind: clean(self.kind),
            campus: clean(self.campus),
            department: clean(self.department),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LocationUpdate {
    #[serde(default, deserialize_with = "deserialize_some")]
    pub room: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub floor: Option<Option<String>>,
    pub building: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "deserialize_some")]
    pub kind: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub campus: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub department: Option<Option<String>>,
}

#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "server", derive(diesel::AsChangeset))]
#[cfg_attr(feature = "server", diesel(table_name = crate::schema::locations))]
pub struct LocationChanges {
    pub room: Option<Option<String>>,
    pub floor: Option<Option<String>>,
    pub building: Option<String>,
    pub kind: Option<Option<String>>,
    pub campus: Option<Option<String>>,
    pub department: Option<Option<String>>,
}

impl LocationChanges {
    crate::changes_is_empty!(room, floor, building, kind, campus, department);
}

impl LocationUpdate {
    pub fn validate(self) -> Result<LocationChanges, ValidationError> {
        let changes = LocationChanges {
            room: clean_nullable(self.room),
            floor: clean_nullable(self.floor),
            building: clean_non_null("building", self.building)?,
            kind: clean_nullable(self.kind),
            campus: clean_nullable(self.campus),
            department: clean_nullable(self.department),
        };

        if changes.is_empty() {
            return Err(ValidationError::NoFields);
        }

        Ok(changes)
    }
}
