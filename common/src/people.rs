use crate::fields::{
    self, clean, clean_non_null, clean_nullable, deserialize_some, flex_i32, nullable_date, nullable_i32, optional_date,
    required, ValidationError,
};
use crate::DEFAULT_PROFILE_STATUS;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[cfg(feature = "server")]
use {crate::schema, diesel::*, diesel_full_text_search::*};

/// A member of the campus, staff or student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(diesel::Queryable, diesel::Selectable))]
#[cfg_attr(feature = "server", diesel(table_name = crate::schema::persons))]
#[cfg_attr(feature = "server", diesel(check_for_backend(diesel::pg::Pg)))]
pub struct Person {
    pub personal_id: String,
    pub name: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub entry_date: NaiveDate,

    /// The personal_id of this person's supervisor
    pub supervisor_id: Option<String>,
}

/// A validated person ready to be inserted. A missing entry date is left to
/// the database default.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "server", derive(diesel::Insertable))]
#[cfg_attr(feature = "server", diesel(table_name = crate::schema::persons))]
pub struct NewPerson {
    pub personal_id: String,
    pub name: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub entry_date: Option<NaiveDate>,
    pub supervisor_id: Option<String>,
}

/// The body of a create request, as sent by the client.
#[derive(Debug, Default, Deserialize)]
pub struct PersonInput {
    pub personal_id: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "flex_i32")]
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub entry_date: Option<String>,
    pub supervisor_id: Option<String>,
}

impl PersonInput {
    pub fn validate(self) -> Result<NewPerson, ValidationError> {
        let personal_id = required("personal_id", self.personal_id)?;
        let name = required("name", self.name)?;

        if self.age.is_some_and(|age| age < 0) {
            return Err(ValidationError::invalid("age", "must not be negative"));
        }

        Ok(NewPerson {
            personal_id,
            name,
            age: self.age,
            gender: clean(self.gender),
            date_of_birth: optional_date("date_of_birth", self.date_of_birth)?,
            entry_date: optional_date("entry_date", self.entry_date)?,
            supervisor_id: clean(self.supervisor_id),
        })
    }
}

/// The body of an update request. Only the keys present are changed, an
/// explicit `null` clears a nullable field.
#[derive(Debug, Default, Deserialize)]
pub struct PersonUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable_i32")]
    pub age: Option<Option<i32>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub gender: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub date_of_birth: Option<Option<String>>,
    pub entry_date: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub supervisor_id: Option<Option<String>>,
}

/// The validated columns of a person update.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "server", derive(diesel::AsChangeset))]
#[cfg_attr(feature = "server", diesel(table_name = crate::schema::persons))]
pub struct PersonChanges {
    pub name: Option<String>,
    pub age: Option<Option<i32>>,
    pub gender: Option<Option<String>>,
    pub date_of_birth: Option<Option<NaiveDate>>,
    pub entry_date: Option<NaiveDate>,
    pub supervisor_id: Option<Option<String>>,
}

impl PersonChanges {
    crate::changes_is_empty!(name, age, gender, date_of_birth, entry_date, supervisor_id);
}

impl PersonUpdate {
    pub fn validate(self) -> Result<PersonChanges, ValidationError> {
        if self.age.is_some_and(|age| age.is_some_and(|age| age < 0)) {
            return Err(ValidationError::invalid("age", "must not be negative"));
        }

        let changes = PersonChanges {
            name: clean_non_null("name", self.name)?,
            age: self.age,
            gender: clean_nullable(self.gender),
            date_of_birth: nullable_date("date_of_birth", self.date_of_birth)?,
            entry_date: self.entry_date.map(|d| fields::parse_date("entry_date", &d)).transpose()?,
            supervisor_id: clean_nullable(self.supervisor_id),
        };

        if changes.is_empty() {
            return Err(ValidationError::NoFields);
        }

        Ok(changes)
    }
}

/// Query parameters of the person list. All optional, as Rocket skips the
/// route for a missing required parameter.
#[derive(Debug, Default, PartialEq, Serialize)]
#[cfg_attr(feature = "server", derive(rocket::FromForm))]
pub struct PersonQuery {
    /// Matched against names by full text search or substring
    pub name: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl PersonQuery {
    /// Builds the select for this query, ordered by personal_id
    #[cfg(feature = "server")]
    pub fn to_db_select(&self) -> schema::persons::BoxedQuery<'static, pg::Pg> {
        let mut res = schema::persons::table.order(schema::persons::personal_id).into_boxed();

        // Filter by name, if specified
        if let Some(query_name) = clean(self.name.to_owned()) {
            // Full text search first, ILIKE catches partial words
            res = res
                .filter(to_tsvector(schema::persons::name).matches(plainto_tsquery(query_name.to_owned())))
                .or_filter(schema::persons::name.ilike(format!("%{}%", query_name)));
        }

        // Set the limit, if present
        if let Some(limit) = self.limit {
            res = res.limit(limit as i64);
        }

        // Set the offset, if present
        if let Some(offset) = self.offset {
            if offset > 0 {
                res = res.offset(offset as i64);
            }
        }

        res
    }
}

/// A person's job role and employment status. Each person has at most one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(diesel::Queryable, diesel::Selectable, diesel::Insertable))]
#[cfg_attr(feature = "server", diesel(table_name = crate::schema::profiles))]
#[cfg_attr(feature = "server", diesel(check_for_backend(diesel::pg::Pg)))]
pub struct Profile {
    pub personal_id: String,
    pub job_role: String,
    pub status: String,
}

/// A profile along with the name of the person it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileListing {
    #[serde(flatten)]
    pub profile: Profile,
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileInput {
    pub personal_id: Option<String>,
    pub job_role: Option<String>,
    pub status: Option<String>,
}

impl ProfileInput {
    pub fn validate(self) -> Result<Profile, ValidationError> {
        Ok(Profile {
            personal_id: required("personal_id", self.personal_id)?,
            job_role: required("job_role", self.job_role)?,
            status: clean(self.status).unwrap_or_else(|| DEFAULT_PROFILE_STATUS.to_owned()),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    pub job_role: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "server", derive(diesel::AsChangeset))]
#[cfg_attr(feature = "server", diesel(table_name = crate::schema::profiles))]
pub struct ProfileChanges {
    pub job_role: Option<String>,
    pub status: Option<String>,
}

impl ProfileChanges {
    crate::changes_is_empty!(job_role, status);
}

impl ProfileUpdate {
    pub fn validate(self) -> Result<ProfileChanges, ValidationError> {
        let changes = ProfileChanges {
            job_role: clean_non_null("job_role", self.job_role)?,
            status: clean_non_null("status", self.status)?,
        };

        if changes.is_empty() {
            return Err(ValidationError::NoFields);
        }

        Ok(changes)
    }
}

/// The default number of profiles allowed per job role. Roles not listed are
/// unlimited.
pub fn default_role_limits() -> BTreeMap<String, i64> {
    BTreeMap::from([("Mid-level Manager".to_owned(), 10), ("Base-level Worker".to_owned(), 50)])
}

/// Looks up the capacity of a job role, if it has one.
pub fn role_limit(limits: &BTreeMap<String, i64>, job_role: &str) -> Option<i64> {
    limits.get(job_role.trim()).copied()
}

/// Checks whether one more profile fits in a role which already has
/// `current` profiles.
pub fn check_role_capacity(job_role: &str, limit: i64, current: i64) -> Result<(), ValidationError> {
    if current >= limit {
        return Err(ValidationError::LimitReached { role: job_role.to_owned(), limit });
    }

    Ok(())
}
