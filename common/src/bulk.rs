use crate::activities::{Activity, ActivityInput};
use crate::fields::ValidationError;
use crate::locations::{LocationInput, NewLocation};
use crate::maintenance::{ExternalCompanyInput, MaintenanceInput, NewExternalCompany, NewMaintenance};
use crate::people::{NewPerson, PersonInput};
use crate::schools::{School, SchoolInput};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// The entity types which can be imported in bulk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkEntity {
    Persons,
    Schools,
    Locations,
    Activities,
    Maintenance,
    ExternalCompanies,
}

impl BulkEntity {
    pub fn key(&self) -> &'static str {
        match self {
            BulkEntity::Persons => "persons",
            BulkEntity::Schools => "schools",
            BulkEntity::Locations => "locations",
            BulkEntity::Activities => "activities",
            BulkEntity::Maintenance => "maintenance",
            BulkEntity::ExternalCompanies => "external-companies",
        }
    }
}

impl fmt::Display for BulkEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for BulkEntity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "persons" => Ok(BulkEntity::Persons),
            "schools" => Ok(BulkEntity::Schools),
            "locations" => Ok(BulkEntity::Locations),
            "activities" => Ok(BulkEntity::Activities),
            "maintenance" => Ok(BulkEntity::Maintenance),
            "external-companies" => Ok(BulkEntity::ExternalCompanies),
            other => Err(ValidationError::UnsupportedEntity(other.to_owned())),
        }
    }
}

/// The body of a bulk import. Both keys are kept loose so their absence or
/// wrong shape can be reported with a proper message.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct BulkImportRequest {
    pub entity: Option<String>,
    pub items: Option<Value>,
}

/// Validated rows of a single entity type, ready to be inserted together.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkRecords {
    Persons(Vec<NewPerson>),
    Schools(Vec<School>),
    Locations(Vec<NewLocation>),
    Activities(Vec<Activity>),
    Maintenance(Vec<NewMaintenance>),
    ExternalCompanies(Vec<NewExternalCompany>),
}

impl BulkRecords {
    pub fn entity(&self) -> BulkEntity {
        match self {
            BulkRecords::Persons(_) => BulkEntity::Persons,
            BulkRecords::Schools(_) => BulkEntity::Schools,
            BulkRecords::Locations(_) => BulkEntity::Locations,
            BulkRecords::Activities(_) => BulkEntity::Activities,
            BulkRecords::Maintenance(_) => BulkEntity::Maintenance,
            BulkRecords::ExternalCompanies(_) => BulkEntity::ExternalCompanies,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            BulkRecords::Persons(v) => v.len(),
            BulkRecords::Schools(v) => v.len(),
            BulkRecords::Locations(v) => v.len(),
            BulkRecords::Activities(v) => v.len(),
            BulkRecords::Maintenance(v) => v.len(),
            BulkRecords::ExternalCompanies(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BulkImportRequest {
    /// Checks the request and validates every item, stopping at the first bad
    /// one.
    pub fn into_records(self) -> Result<BulkRecords, ValidationError> {
        let entity: BulkEntity = self.entity.ok_or(ValidationError::MissingField("entity"))?.parse()?;

        let items = match self.items {
            None | Some(Value::Null) => return Err(ValidationError::MissingField("items")),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(ValidationError::ItemsNotList),
        };

        if items.is_empty() {
            return Err(ValidationError::NoItems);
        }

        Ok(match entity {
            BulkEntity::Persons => BulkRecords::Persons(parse_items(items, PersonInput::validate)?),
            BulkEntity::Schools => BulkRecords::Schools(parse_items(items, SchoolInput::validate)?),
            BulkEntity::Locations => BulkRecords::Locations(parse_items(items, LocationInput::validate)?),
            BulkEntity::Activities => BulkRecords::Activities(parse_items(items, ActivityInput::validate)?),
            BulkEntity::Maintenance => BulkRecords::Maintenance(parse_items(items, MaintenanceInput::validate)?),
            BulkEntity::ExternalCompanies => {
                BulkRecords::ExternalCompanies(parse_items(items, ExternalCompanyInput::validate)?)
            }
        })
    }
}

fn parse_items<I, T>(items: Vec<Value>, validate: fn(I) -> Result<T, ValidationError>) -> Result<Vec<T>, ValidationError>
where
    I: DeserializeOwned,
{
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let input: I = serde_json::from_value(item)
                .map_err(|e| ValidationError::InvalidItem { index, reason: e.to_string() })?;
            validate(input).map_err(|e| ValidationError::InvalidItem { index, reason: e.to_string() })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: Value) -> BulkImportRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn imports_persons() {
        let records = request(json!({
            "entity": "persons",
            "items": [{"personal_id": "P001", "name": "John Doe"}, {"personal_id": "P002", "name": "Jane Doe"}]
        }))
        .into_records()
        .unwrap();

        assert_eq!(records.entity(), BulkEntity::Persons);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn imports_external_companies() {
        let records = request(json!({"entity": "external-companies", "items": [{"name": "CleanCo"}]}))
            .into_records()
            .unwrap();

        assert_eq!(
            records,
            BulkRecords::ExternalCompanies(vec![NewExternalCompany { name: "CleanCo".to_owned(), contact_info: None }])
        );
    }

    #[test]
    fn request_shape_errors() {
        let err = request(json!({"items": []})).into_records().unwrap_err();
        assert_eq!(err, ValidationError::MissingField("entity"));

        let err = request(json!({"entity": "persons"})).into_records().unwrap_err();
        assert_eq!(err, ValidationError::MissingField("items"));

        let err = request(json!({"entity": "persons", "items": "P001"})).into_records().unwrap_err();
        assert_eq!(err.to_string(), "items must be a list");

        let err = request(json!({"entity": "persons", "items": []})).into_records().unwrap_err();
        assert_eq!(err, ValidationError::NoItems);
    }

    #[test]
    fn unknown_entities_are_refused() {
        let err = request(json!({"entity": "invoices", "items": [{}]})).into_records().unwrap_err();
        assert_eq!(err.to_string(), "Unsupported entity: invoices");
    }

    #[test]
    fn bad_items_report_their_index() {
        let err = request(json!({
            "entity": "locations",
            "items": [{"building": "Block A"}, {"room": "101"}]
        }))
        .into_records()
        .unwrap_err();

        match err {
            ValidationError::InvalidItem { index, reason } => {
                assert_eq!(index, 1);
                assert!(reason.contains("building"));
            }
            other => panic!("unexpected error {:?}", other),
        }

        let err = request(json!({"entity": "schools", "items": [42]})).into_records().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidItem { index: 0, .. }));
    }
}
