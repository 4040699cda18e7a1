use crate::fields::{clean, clean_non_null, clean_nullable, deserialize_some, required, ValidationError};
use serde::{Deserialize, Serialize};

/// A school or department, keyed by its department code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(diesel::Queryable, diesel::Selectable, diesel::Insertable))]
#[cfg_attr(feature = "server", diesel(table_name = crate::schema::schools))]
#[cfg_attr(feature = "server", diesel(check_for_backend(diesel::pg::Pg)))]
pub struct School {
    pub department: String,
    pub school_name: String,
    pub faculty: Option<String>,

    /// The building the school is headquartered in
    pub hq_building: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SchoolInput {
    pub department: Option<String>,
    pub school_name: Option<String>,
    pub faculty: Option<String>,
    pub hq_building: Option<String>,
}

impl SchoolInput {
    pub fn validate(self) -> Result<School, ValidationError> {
        Ok(School {
            department: required("department", self.department)?,
            school_name: required("school_name", self.school_name)?,
            faculty: clean(self.faculty),
            hq_building: clean(self.hq_building),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SchoolUpdate {
    pub school_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub faculty: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub hq_building: Option<Option<String>>,
}

#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "server", derive(diesel::AsChangeset))]
#[cfg_attr(feature = "server", diesel(table_name = crate::schema::schools))]
pub struct SchoolChanges {
    pub school_name: Option<String>,
    pub faculty: Option<Option<String>>,
    pub hq_building: Option<Option<String>>,
}

impl SchoolChanges {
    crate::changes_is_empty!(school_name, faculty, hq_building);
}

impl SchoolUpdate {
    pub fn validate(self) -> Result<SchoolChanges, ValidationError> {
        let changes = SchoolChanges {
            school_name: clean_non_null("school_name", self.school_name)?,
            faculty: clean_nullable(self.faculty),
            hq_building: clean_nullable(self.hq_building),
        };

        if changes.is_empty() {
            return Err(ValidationError::NoFields);
        }

        Ok(changes)
    }
}

/// Links a person to a school they belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(diesel::Queryable, diesel::Selectable, diesel::Insertable))]
#[cfg_attr(feature = "server", diesel(table_name = crate::schema::affiliations))]
#[cfg_attr(feature = "server", diesel(check_for_backend(diesel::pg::Pg)))]
pub struct Affiliation {
    pub personal_id: String,
    pub department: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffiliationListing {
    #[serde(flatten)]
    pub affiliation: Affiliation,
    pub person_name: String,
    pub school_name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AffiliationInput {
    pub personal_id: Option<String>,
    pub department: Option<String>,
}

impl AffiliationInput {
    pub fn validate(self) -> Result<Affiliation, ValidationError> {
        Ok(Affiliation {
            personal_id: required("personal_id", self.personal_id)?,
            department: required("department", self.department)?,
        })
    }
}
