use crate::fields::{
    clean, clean_non_null, clean_nullable, deserialize_some, flex_i32, nullable_i32, nullable_timestamp,
    optional_timestamp, required, ValidationError,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A scheduled event organised by a person, optionally held at a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(diesel::Queryable, diesel::Selectable, diesel::Insertable))]
#[cfg_attr(feature = "server", diesel(table_name = crate::schema::activities))]
#[cfg_attr(feature = "server", diesel(check_for_backend(diesel::pg::Pg)))]
pub struct Activity {
    pub activity_id: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub time: Option<NaiveDateTime>,
    pub organiser_id: String,
    pub location_id: Option<i32>,
}

/// An activity with its organiser's name and where it takes place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityListing {
    #[serde(flatten)]
    pub activity: Activity,
    pub organiser_name: String,
    pub building: Option<String>,
    pub room: Option<String>,
    pub floor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityInput {
    pub activity_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub time: Option<String>,
    pub organiser_id: Option<String>,
    #[serde(default, deserialize_with = "flex_i32")]
    pub location_id: Option<i32>,
}

impl ActivityInput {
    pub fn validate(self) -> Result<Activity, ValidationError> {
        Ok(Activity {
            activity_id: required("activity_id", self.activity_id)?,
            kind: clean(self.kind),
            time: optional_timestamp("time", self.time)?,
            organiser_id: required("organiser_id", self.organiser_id)?,
            location_id: self.location_id,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityUpdate {
    #[serde(default, rename = "type", deserialize_with = "deserialize_some")]
    pub kind: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub time: Option<Option<String>>,
    pub organiser_id: Option<String>,
    #[serde(default, deserialize_with = "nullable_i32")]
    pub location_id: Option<Option<i32>>,
}

#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "server", derive(diesel::AsChangeset))]
#[cfg_attr(feature = "server", diesel(table_name = crate::schema::activities))]
pub struct ActivityChanges {
    pub kind: Option<Option<String>>,
    pub time: Option<Option<NaiveDateTime>>,
    pub organiser_id: Option<String>,
    pub location_id: Option<Option<i32>>,
}

impl ActivityChanges {
    crate::changes_is_empty!(kind, time, organiser_id, location_id);
}

impl ActivityUpdate {
    pub fn validate(self) -> Result<ActivityChanges, ValidationError> {
        let changes = ActivityChanges {
            kind: clean_nullable(self.kind),
            time: nullable_timestamp("time", self.time)?,
            organiser_id: clean_non_null("organiser_id", self.organiser_id)?,
            location_id: self.location_id,
        };

        if changes.is_empty() {
            return Err(ValidationError::NoFields);
        }

        Ok(changes)
    }
}

/// Records that a person takes part in an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(diesel::Queryable, diesel::Selectable, diesel::Insertable))]
#[cfg_attr(feature = "server", diesel(table_name = crate::schema::participations))]
#[cfg_attr(feature = "server", diesel(check_for_backend(diesel::pg::Pg)))]
pub struct Participation {
    pub personal_id: String,
    pub activity_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipationListing {
    #[serde(flatten)]
    pub participation: Participation,
    pub person_name: String,
    pub activity_type: Option<String>,
    pub activity_time: Option<NaiveDateTime>,
    pub building: Option<String>,
    pub room: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ParticipationInput {
    pub personal_id: Option<String>,
    pub activity_id: Option<String>,
}

impl ParticipationInput {
    pub fn validate(self) -> Result<Participation, ValidationError> {
        Ok(Participation {
            personal_id: required("personal_id", self.personal_id)?,
            activity_id: required("activity_id", self.activity_id)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn activity_requires_organiser() {
        let input: ActivityInput = serde_json::from_str(r#"{"activity_id": "A001"}"#).unwrap();
        assert_eq!(input.validate().unwrap_err(), ValidationError::MissingField("organiser_id"));
    }

    #[test]
    fn activity_parses_time_and_location() {
        let input: ActivityInput = serde_json::from_str(
            r#"{"activity_id": "A001", "type": "Seminar", "time": "2024-03-15 14:00:00", "organiser_id": "P001",
                "location_id": "1"}"#,
        )
        .unwrap();
        let activity = input.validate().unwrap();

        assert_eq!(activity.kind.as_deref(), Some("Seminar"));
        assert_eq!(activity.time, NaiveDate::from_ymd_opt(2024, 3, 15).and_then(|d| d.and_hms_opt(14, 0, 0)));
        assert_eq!(activity.location_id, Some(1));
    }

    #[test]
    fn activity_rejects_bad_time() {
        let input: ActivityInput =
            serde_json::from_str(r#"{"activity_id": "A001", "organiser_id": "P001", "time": "soon"}"#).unwrap();
        assert!(matches!(input.validate(), Err(ValidationError::InvalidValue { field: "time", .. })));
    }

    #[test]
    fn activity_update_detaches_location() {
        let update: ActivityUpdate = serde_json::from_str(r#"{"location_id": null}"#).unwrap();
        let changes = update.validate().unwrap();
        assert_eq!(changes.location_id, Some(None));

        let update: ActivityUpdate = serde_json::from_str(r#"{"type": "Workshop"}"#).unwrap();
        assert_eq!(update.validate().unwrap().kind, Some(Some("Workshop".to_owned())));

        let update: ActivityUpdate = serde_json::from_str("{}").unwrap();
        assert_eq!(update.validate().unwrap_err(), ValidationError::NoFields);
    }

    #[test]
    fn participation_requires_activity() {
        let input: ParticipationInput = serde_json::from_str(r#"{"personal_id": "P001"}"#).unwrap();
        assert_eq!(input.validate().unwrap_err(), ValidationError::MissingField("activity_id"));
    }
}
