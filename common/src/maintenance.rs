use crate::fields::{
    clean, clean_non_null, clean_nullable, deserialize_some, flex_bool, flex_i32, nullable_i32, nullable_timestamp,
    optional_timestamp, parse_date, parse_timestamp, required, ValidationError,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// The maintenance type the safety search looks at
pub const CLEANING: &str = "Cleaning";

/// Attached to every safety search result which involves active chemicals
pub const CHEMICAL_WARNING: &str =
    "Hazardous chemicals in use: avoid the area during cleaning and follow posted safety instructions";

/// A recurring or scheduled upkeep task at a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(diesel::Queryable, diesel::Selectable))]
#[cfg_attr(feature = "server", diesel(table_name = crate::schema::maintenance_tasks))]
#[cfg_attr(feature = "server", diesel(check_for_backend(diesel::pg::Pg)))]
pub struct Maintenance {
    pub maintenance_id: i32,
    #[serde(rename = "type")]
    pub kind: String,
    pub frequency: Option<String>,
    pub location_id: i32,

    /// Whether the task uses chemicals people nearby should know about
    pub active_chemical: bool,

    /// The external company doing the work, if it's contracted out
    pub contracted_company_id: Option<i32>,
    pub scheduled_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
}

/// A maintenance task with where it happens and who does it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceListing {
    #[serde(flatten)]
    pub maintenance: Maintenance,
    pub building: String,
    pub room: Option<String>,
    pub campus: Option<String>,
    pub company_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "server", derive(diesel::Insertable))]
#[cfg_attr(feature = "server", diesel(table_name = crate::schema::maintenance_tasks))]
pub struct NewMaintenance {
    pub kind: String,
    pub frequency: Option<String>,
    pub location_id: i32,
    pub active_chemical: bool,
    pub contracted_company_id: Option<i32>,
    pub scheduled_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MaintenanceInput {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub frequency: Option<String>,
    #[serde(default, deserialize_with = "flex_i32")]
    pub location_id: Option<i32>,
    #[serde(default, deserialize_with = "flex_bool")]
    pub active_chemical: Option<bool>,
    #[serde(default, deserialize_with = "flex_i32")]
    pub contracted_company_id: Option<i32>,
    pub scheduled_time: Option<String>,
    pub end_time: Option<String>,
}

impl MaintenanceInput {
    pub fn validate(self) -> Result<NewMaintenance, ValidationError> {
        let kind = required("type", self.kind)?;
        let location_id = self.location_id.ok_or(ValidationError::MissingField("location_id"))?;
        let scheduled_time = optional_timestamp("scheduled_time", self.scheduled_time)?;
        let end_time = optional_timestamp("end_time", self.end_time)?;
        check_window(scheduled_time, end_time)?;

        Ok(NewMaintenance {
            kind,
            frequency: clean(self.frequency),
            location_id,
            active_chemical: self.active_chemical.unwrap_or(false),
            contracted_company_id: self.contracted_company_id,
            scheduled_time,
            end_time,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MaintenanceUpdate {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub frequency: Option<Option<String>>,
    #[serde(default, deserialize_with = "flex_i32")]
    pub location_id: Option<i32>,
    #[serde(default, deserialize_with = "flex_bool")]
    pub active_chemical: Option<bool>,
    #[serde(default, deserialize_with = "nullable_i32")]
    pub contracted_company_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub scheduled_time: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub end_time: Option<Option<String>>,
}

#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "server", derive(diesel::AsChangeset))]
#[cfg_attr(feature = "server", diesel(table_name = crate::schema::maintenance_tasks))]
pub struct MaintenanceChanges {
    pub kind: Option<String>,
    pub frequency: Option<Option<String>>,
    pub location_id: Option<i32>,
    pub active_chemical: Option<bool>,
    pub contracted_company_id: Option<Option<i32>>,
    pub scheduled_time: Option<Option<NaiveDateTime>>,
    pub end_time: Option<Option<NaiveDateTime>>,
}

impl MaintenanceChanges {
    crate::changes_is_empty!(
        kind,
        frequency,
        location_id,
        active_chemical,
        contracted_company_id,
        scheduled_time,
        end_time
    );
}

impl MaintenanceUpdate {
    pub fn validate(self) -> Result<MaintenanceChanges, ValidationError> {
        let changes = MaintenanceChanges {
            kind: clean_non_null("type", self.kind)?,
            frequency: clean_nullable(self.frequency),
            location_id: self.location_id,
            active_chemical: self.active_chemical,
            contracted_company_id: self.contracted_company_id,
            scheduled_time: nullable_timestamp("scheduled_time", self.scheduled_time)?,
            end_time: nullable_timestamp("end_time", self.end_time)?,
        };

        // only checkable here when both ends are sent, otherwise the other end lives in the db
        if let (Some(start), Some(end)) = (changes.scheduled_time, changes.end_time) {
            check_window(start, end)?;
        }

        if changes.is_empty() {
            return Err(ValidationError::NoFields);
        }

        Ok(changes)
    }
}

fn check_window(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Result<(), ValidationError> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => {
            Err(ValidationError::invalid("end_time", "must not be before scheduled_time"))
        }
        _ => Ok(()),
    }
}

/// A contractor maintenance tasks can be assigned to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(diesel::Queryable, diesel::Selectable))]
#[cfg_attr(feature = "server", diesel(table_name = crate::schema::external_companies))]
#[cfg_attr(feature = "server", diesel(check_for_backend(diesel::pg::Pg)))]
pub struct ExternalCompany {
    pub company_id: i32,
    pub name: String,
    pub contact_info: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "server", derive(diesel::Insertable))]
#[cfg_attr(feature = "server", diesel(table_name = crate::schema::external_companies))]
pub struct NewExternalCompany {
    pub name: String,
    pub contact_info: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExternalCompanyInput {
    pub name: Option<String>,
    pub contact_info: Option<String>,
}

impl ExternalCompanyInput {
    pub fn validate(self) -> Result<NewExternalCompany, ValidationError> {
        Ok(NewExternalCompany { name: required("name", self.name)?, contact_info: clean(self.contact_info) })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ExternalCompanyUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub contact_info: Option<Option<String>>,
}

#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "server", derive(diesel::AsChangeset))]
#[cfg_attr(feature = "server", diesel(table_name = crate::schema::external_companies))]
pub struct ExternalCompanyChanges {
    pub name: Option<String>,
    pub contact_info: Option<Option<String>>,
}

impl ExternalCompanyChanges {
    crate::changes_is_empty!(name, contact_info);
}

impl ExternalCompanyUpdate {
    pub fn validate(self) -> Result<ExternalCompanyChanges, ValidationError> {
        let changes = ExternalCompanyChanges {
            name: clean_non_null("name", self.name)?,
            contact_info: clean_nullable(self.contact_info),
        };

        if changes.is_empty() {
            return Err(ValidationError::NoFields);
        }

        Ok(changes)
    }
}

/// Query params for the cleaning safety search. Every parameter is optional.
#[derive(Debug, Default, PartialEq, Serialize)]
#[cfg_attr(feature = "server", derive(rocket::FromForm))]
pub struct SafetyQuery {
    pub building: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

/// Upper bound of a safety search window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEnd {
    /// An explicit timestamp, included in the window
    Through(NaiveDateTime),

    /// The midnight after a bare end date, excluded from the window
    Before(NaiveDateTime),
}

impl SafetyQuery {
    /// The building to search in, if one was given
    pub fn building(&self) -> Option<String> {
        clean(self.building.to_owned())
    }

    /// Parses the requested time window. A bare end date covers that whole
    /// day, up to but not including the next midnight.
    pub fn window(&self) -> Result<(Option<NaiveDateTime>, Option<WindowEnd>), ValidationError> {
        let start = optional_timestamp("start_time", self.start_time.to_owned())?;
        let end = match clean(self.end_time.to_owned()) {
            None => None,
            Some(end) => match parse_date("end_time", &end) {
                Ok(date) => {
                    let midnight = date
                        .succ_opt()
                        .and_then(|next| next.and_hms_opt(0, 0, 0))
                        .ok_or_else(|| ValidationError::invalid("end_time", "date out of range"))?;
                    Some(WindowEnd::Before(midnight))
                }
                Err(_) => Some(WindowEnd::Through(parse_timestamp("end_time", &end)?)),
            },
        };

        match (start, end) {
            (Some(start), Some(WindowEnd::Before(end))) if end <= start => {
                Err(ValidationError::invalid("end_time", "must not be before start_time"))
            }
            (Some(start), Some(WindowEnd::Through(end))) if end < start => {
                Err(ValidationError::invalid("end_time", "must not be before start_time"))
            }
            _ => Ok((start, end)),
        }
    }
}

/// A cleaning task found by the safety search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyRecord {
    #[serde(flatten)]
    pub maintenance: Maintenance,
    pub building: String,
    pub room: Option<String>,
    pub floor: Option<String>,
    pub campus: Option<String>,
    pub company_name: Option<String>,

    /// Only present when the task uses active chemicals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl SafetyRecord {
    pub fn new(
        maintenance: Maintenance,
        building: String,
        room: Option<String>,
        floor: Option<String>,
        campus: Option<String>,
        company_name: Option<String>,
    ) -> Self {
        let warning = maintenance.active_chemical.then(|| CHEMICAL_WARNING.to_owned());
        Self { maintenance, building, room, floor, campus, company_name, warning }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn task(active_chemical: bool) -> Maintenance {
        Maintenance {
            maintenance_id: 1,
            kind: CLEANING.to_owned(),
            frequency: Some("Daily".to_owned()),
            location_id: 1,
            active_chemical,
            contracted_company_id: None,
            scheduled_time: None,
            end_time: None,
        }
    }

    #[test]
    fn maintenance_requires_type_and_location() {
        let input: MaintenanceInput = serde_json::from_str(r#"{"type": "Cleaning"}"#).unwrap();
        assert_eq!(input.validate().unwrap_err(), ValidationError::MissingField("location_id"));

        let input: MaintenanceInput = serde_json::from_str(r#"{"location_id": 1}"#).unwrap();
        assert_eq!(input.validate().unwrap_err(), ValidationError::MissingField("type"));
    }

    #[test]
    fn maintenance_accepts_form_booleans() {
        let input: MaintenanceInput =
            serde_json::from_str(r#"{"type": "Cleaning", "location_id": "1", "active_chemical": "Yes"}"#).unwrap();
        let task = input.validate().unwrap();
        assert!(task.active_chemical);
        assert_eq!(task.location_id, 1);

        let input: MaintenanceInput = serde_json::from_str(r#"{"type": "Repair", "location_id": 1}"#).unwrap();
        assert!(!input.validate().unwrap().active_chemical);
    }

    #[test]
    fn maintenance_window_must_be_ordered() {
        let input: MaintenanceInput = serde_json::from_str(
            r#"{"type": "Cleaning", "location_id": 1, "scheduled_time": "2024-01-15 12:00", "end_time": "2024-01-15 10:00"}"#,
        )
        .unwrap();
        assert!(matches!(input.validate(), Err(ValidationError::InvalidValue { field: "end_time", .. })));
    }

    #[test]
    fn maintenance_update_sets_flags_and_clears_company() {
        let update: MaintenanceUpdate =
            serde_json::from_str(r#"{"frequency": "Weekly", "active_chemical": true, "contracted_company_id": null}"#)
                .unwrap();
        let changes = update.validate().unwrap();

        assert_eq!(changes.frequency, Some(Some("Weekly".to_owned())));
        assert_eq!(changes.active_chemical, Some(true));
        assert_eq!(changes.contracted_company_id, Some(None));
        assert_eq!(changes.kind, None);

        let update: MaintenanceUpdate = serde_json::from_str("{}").unwrap();
        assert_eq!(update.validate().unwrap_err(), ValidationError::NoFields);
    }

    #[test]
    fn company_requires_name() {
        let input: ExternalCompanyInput = serde_json::from_str(r#"{"contact_info": "info@test.com"}"#).unwrap();
        assert_eq!(input.validate().unwrap_err(), ValidationError::MissingField("name"));
    }

    #[test]
    fn safety_window_covers_whole_end_day() {
        let query = SafetyQuery {
            building: Some("Block A".to_owned()),
            start_time: Some("2024-01-01".to_owned()),
            end_time: Some("2024-01-31".to_owned()),
        };
        let (start, end) = query.window().unwrap();
        let next_midnight = NaiveDate::from_ymd_opt(2024, 2, 1).and_then(|d| d.and_hms_opt(0, 0, 0)).unwrap();

        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0)));
        assert_eq!(end, Some(WindowEnd::Before(next_midnight)));
        assert_eq!(query.building().as_deref(), Some("Block A"));
    }

    #[test]
    fn safety_window_end_keeps_fractional_seconds_of_last_day() {
        let query = SafetyQuery { end_time: Some("2024-01-31".to_owned()), ..Default::default() };
        let last_moment = NaiveDate::from_ymd_opt(2024, 1, 31).and_then(|d| d.and_hms_milli_opt(23, 59, 59, 500)).unwrap();

        let Ok((None, Some(WindowEnd::Before(end)))) = query.window() else {
            panic!("a bare end date should give an exclusive bound");
        };
        assert!(last_moment < end);

        let query = SafetyQuery { end_time: Some("2024-01-31 18:00".to_owned()), ..Default::default() };
        let six_pm = NaiveDate::from_ymd_opt(2024, 1, 31).and_then(|d| d.and_hms_opt(18, 0, 0)).unwrap();
        assert_eq!(query.window().unwrap(), (None, Some(WindowEnd::Through(six_pm))));
    }

    #[test]
    fn safety_window_is_optional() {
        assert_eq!(SafetyQuery::default().window().unwrap(), (None, None));

        let blank = SafetyQuery { building: Some("  ".to_owned()), ..Default::default() };
        assert_eq!(blank.building(), None);

        let backwards = SafetyQuery {
            start_time: Some("2024-02-01".to_owned()),
            end_time: Some("2024-01-01".to_owned()),
            ..Default::default()
        };
        assert!(backwards.window().is_err());

        let same_day = SafetyQuery {
            start_time: Some("2024-01-01".to_owned()),
            end_time: Some("2024-01-01".to_owned()),
            ..Default::default()
        };
        assert!(same_day.window().is_ok());
    }

    #[test]
    fn chemical_tasks_carry_a_warning() {
        let record = SafetyRecord::new(task(true), "Block A".to_owned(), None, None, None, None);
        assert!(record.warning.as_deref().is_some_and(|w| w.contains("Hazardous")));

        let record = SafetyRecord::new(task(false), "Block A".to_owned(), None, None, None, None);
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("warning").is_none());
        assert_eq!(json["type"], "Cleaning");
    }
}
