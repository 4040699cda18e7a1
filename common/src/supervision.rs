use crate::fields::{optional_date, required, ValidationError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Assigns a manager to look after a building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(diesel::Queryable, diesel::Selectable))]
#[cfg_attr(feature = "server", diesel(table_name = crate::schema::building_supervisions))]
#[cfg_attr(feature = "server", diesel(check_for_backend(diesel::pg::Pg)))]
pub struct BuildingSupervision {
    pub supervision_id: i32,
    pub personal_id: String,
    pub building: String,
    pub assigned_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisionListing {
    #[serde(flatten)]
    pub supervision: BuildingSupervision,
    pub manager_name: String,
}

/// A validated assignment. A missing date is left to the database, which uses
/// today.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "server", derive(diesel::Insertable))]
#[cfg_attr(feature = "server", diesel(table_name = crate::schema::building_supervisions))]
pub struct NewSupervision {
    pub personal_id: String,
    pub building: String,
    pub assigned_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SupervisionInput {
    pub personal_id: Option<String>,
    pub building: Option<String>,
    pub assigned_date: Option<String>,
}

impl SupervisionInput {
    pub fn validate(self) -> Result<NewSupervision, ValidationError> {
        Ok(NewSupervision {
            personal_id: required("personal_id", self.personal_id)?,
            building: required("building", self.building)?,
            assigned_date: optional_date("assigned_date", self.assigned_date)?,
        })
    }
}
