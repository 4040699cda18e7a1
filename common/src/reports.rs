//! Row types for the aggregate report queries and the request types of the
//! PDF export.

use crate::fields::ValidationError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Maintenance tasks counted per type and place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(diesel::QueryableByName))]
pub struct MaintenanceSummaryRow {
    #[serde(rename = "type")]
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::Text))]
    pub kind: String,
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::Text))]
    pub building: String,
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>))]
    pub campus: Option<String>,
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::BigInt))]
    pub count: i64,
}

/// Profiles counted per job role and status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(diesel::QueryableByName))]
pub struct PeopleSummaryRow {
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::Text))]
    pub job_role: String,
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::Text))]
    pub status: String,
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::BigInt))]
    pub count: i64,
}

/// Activities counted per type and organiser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(diesel::QueryableByName))]
pub struct ActivitySummaryRow {
    #[serde(rename = "type")]
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>))]
    pub kind: Option<String>,
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::Text))]
    pub organiser_name: String,
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::BigInt))]
    pub activity_count: i64,
}

/// How many people and locations belong to each school.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(diesel::QueryableByName))]
pub struct SchoolStatsRow {
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::Text))]
    pub department: String,
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::Text))]
    pub school_name: String,
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>))]
    pub faculty: Option<String>,
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::BigInt))]
    pub affiliated_people: i64,
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::BigInt))]
    pub locations_count: i64,
}

/// Maintenance tasks counted per frequency and type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(diesel::QueryableByName))]
pub struct FrequencyRow {
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>))]
    pub frequency: Option<String>,
    #[serde(rename = "type")]
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::Text))]
    pub kind: String,
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::BigInt))]
    pub task_count: i64,
}

/// Row counts of the main tables, shown on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(diesel::QueryableByName))]
pub struct OverviewCounts {
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::BigInt))]
    pub total_persons: i64,
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::BigInt))]
    pub total_schools: i64,
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::BigInt))]
    pub total_activities: i64,
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::BigInt))]
    pub total_maintenance: i64,
}

/// One supervised building, with the maintenance happening at its locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(diesel::QueryableByName))]
pub struct ManagerBuildingRow {
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::Text))]
    pub personal_id: String,
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::Text))]
    pub manager_name: String,
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::Text))]
    pub building: String,
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::Date))]
    pub assigned_date: NaiveDate,
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::BigInt))]
    pub maintenance_count: i64,
    #[cfg_attr(feature = "server", diesel(sql_type = diesel::sql_types::BigInt))]
    pub chemical_maintenance_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedBuilding {
    pub building: String,
    pub assigned_date: NaiveDate,
    pub maintenance_count: i64,
    pub chemical_maintenance_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerBuildings {
    pub personal_id: String,
    pub manager_name: String,
    pub buildings: Vec<ManagedBuilding>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManagerBuildingSummary {
    pub total_managers: usize,
    pub total_buildings: usize,
    pub total_maintenance: i64,
    pub total_chemical_maintenance: i64,
}

/// Every manager with the buildings they supervise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManagerBuildingReport {
    pub data: Vec<ManagerBuildings>,
    pub summary: ManagerBuildingSummary,
}

impl ManagerBuildingReport {
    /// Groups the flat rows by manager, keeping the order managers first
    /// appear in. Buildings supervised by several managers only count once
    /// towards the totals.
    pub fn from_rows(rows: Vec<ManagerBuildingRow>) -> Self {
        let mut data: Vec<ManagerBuildings> = Vec::new();
        let mut counted: BTreeMap<String, (i64, i64)> = BTreeMap::new();

        for row in rows {
            counted.insert(row.building.to_owned(), (row.maintenance_count, row.chemical_maintenance_count));

            let building = ManagedBuilding {
                building: row.building,
                assigned_date: row.assigned_date,
                maintenance_count: row.maintenance_count,
                chemical_maintenance_count: row.chemical_maintenance_count,
            };

            match data.iter_mut().find(|m| m.personal_id == row.personal_id) {
                Some(manager) => manager.buildings.push(building),
                None => data.push(ManagerBuildings {
                    personal_id: row.personal_id,
                    manager_name: row.manager_name,
                    buildings: vec![building],
                }),
            }
        }

        let summary = ManagerBuildingSummary {
            total_managers: data.len(),
            total_buildings: counted.len(),
            total_maintenance: counted.values().map(|(total, _)| total).sum(),
            total_chemical_maintenance: counted.values().map(|(_, chemical)| chemical).sum(),
        };

        Self { data, summary }
    }
}

/// A part of the generated PDF report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSection {
    ExecutiveSummary,
    Maintenance,
    Personnel,
    Activities,
    Schools,
    Safety,
}

impl ReportSection {
    /// Every section, in the order they appear in the report
    pub const ALL: [ReportSection; 6] = [
        ReportSection::ExecutiveSummary,
        ReportSection::Maintenance,
        ReportSection::Personnel,
        ReportSection::Activities,
        ReportSection::Schools,
        ReportSection::Safety,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            ReportSection::ExecutiveSummary => "executive_summary",
            ReportSection::Maintenance => "maintenance",
            ReportSection::Personnel => "personnel",
            ReportSection::Activities => "activities",
            ReportSection::Schools => "schools",
            ReportSection::Safety => "safety",
        }
    }

    /// The heading printed above the section
    pub fn title(&self) -> &'static str {
        match self {
            ReportSection::ExecutiveSummary => "Executive Summary",
            ReportSection::Maintenance => "Maintenance Analysis",
            ReportSection::Personnel => "Personnel Overview",
            ReportSection::Activities => "Activities Statistics",
            ReportSection::Schools => "Department Statistics",
            ReportSection::Safety => "Safety & Chemical Hazard Report",
        }
    }
}

impl fmt::Display for ReportSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ReportSection {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportSection::ALL
            .into_iter()
            .find(|section| section.key() == s.trim())
            .ok_or_else(|| ValidationError::UnknownSection(s.to_owned()))
    }
}

/// The body of a PDF export request.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfRequest {
    #[serde(default)]
    pub sections: Option<Vec<String>>,
}

impl PdfRequest {
    /// Resolves the requested sections into report order. Leaving sections
    /// out selects all of them, an empty list selects nothing and is refused.
    pub fn sections(&self) -> Result<Vec<ReportSection>, ValidationError> {
        let Some(requested) = self.sections.as_ref() else {
            return Ok(ReportSection::ALL.to_vec());
        };

        if requested.is_empty() {
            return Err(ValidationError::NoSections);
        }

        let wanted = requested.iter().map(|s| s.parse()).collect::<Result<BTreeSet<ReportSection>, _>>()?;
        Ok(ReportSection::ALL.into_iter().filter(|s| wanted.contains(s)).collect())
    }
}

/// Everything the PDF report is drawn from, gathered before rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    pub summary: OverviewCounts,
    pub maintenance_summary: Vec<MaintenanceSummaryRow>,
    pub people_summary: Vec<PeopleSummaryRow>,
    pub activities_summary: Vec<ActivitySummaryRow>,
    pub school_stats: Vec<SchoolStatsRow>,
    pub maintenance_frequency: Vec<FrequencyRow>,

    /// Cleaning tasks which use active chemicals
    pub chemical_tasks: i64,
}
