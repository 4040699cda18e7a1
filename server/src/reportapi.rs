use crate::auth::Requester;
use crate::db::{self, DbConnection};
use crate::error::ApiError;
use crate::pdf;
use chrono::Local;
use cmms_common::maintenance::CLEANING;
use cmms_common::reports::{
    ActivitySummaryRow, FrequencyRow, MaintenanceSummaryRow, ManagerBuildingReport, ManagerBuildingRow,
    OverviewCounts, PdfRequest, PeopleSummaryRow, ReportData, SchoolStatsRow,
};
use cmms_common::roles::Permission;
use cmms_common::schema::maintenance_tasks;
use diesel::{sql_query, ExpressionMethods, PgConnection, QueryDsl, QueryResult, RunQueryDsl};
use rocket::http::Header;
use rocket::serde::json::Json;
use rocket::{Route, State};
use std::ops::DerefMut;

const MAINTENANCE_SUMMARY: &str = "\
    SELECT m.type AS kind, l.building, l.campus, COUNT(*) AS count \
    FROM maintenance_tasks m \
    JOIN locations l ON m.location_id = l.location_id \
    GROUP BY m.type, l.building, l.campus \
    ORDER BY count DESC, l.building, m.type";

const PEOPLE_SUMMARY: &str = "\
    SELECT job_role, status, COUNT(*) AS count \
    FROM profiles \
    GROUP BY job_role, status \
    ORDER BY job_role, status";

const ACTIVITIES_SUMMARY: &str = "\
    SELECT a.type AS kind, p.name AS organiser_name, COUNT(*) AS activity_count \
    FROM activities a \
    JOIN persons p ON a.organiser_id = p.personal_id \
    GROUP BY a.type, p.name \
    ORDER BY activity_count DESC, p.name";

const SCHOOL_STATS: &str = "\
    SELECT s.department, s.school_name, s.faculty, \
        (SELECT COUNT(*) FROM affiliations a WHERE a.department = s.department) AS affiliated_people, \
        (SELECT COUNT(*) FROM locations l WHERE l.department = s.department) AS locations_count \
    FROM schools s \
    ORDER BY s.department";

const MAINTENANCE_FREQUENCY: &str = "\
    SELECT frequency, type AS kind, COUNT(*) AS task_count \
    FROM maintenance_tasks \
    GROUP BY frequency, type \
    ORDER BY task_count DESC, type";

const OVERVIEW: &str = "\
    SELECT \
        (SELECT COUNT(*) FROM persons) AS total_persons, \
        (SELECT COUNT(*) FROM schools) AS total_schools, \
        (SELECT COUNT(*) FROM activities) AS total_activities, \
        (SELECT COUNT(*) FROM maintenance_tasks) AS total_maintenance";

// Counts are per building, so every manager of a building sees the same totals
const MANAGER_BUILDINGS: &str = "\
    SELECT bs.personal_id, p.name AS manager_name, bs.building, bs.assigned_date, \
        (SELECT COUNT(*) FROM maintenance_tasks m \
            JOIN locations l ON m.location_id = l.location_id \
            WHERE l.building = bs.building) AS maintenance_count, \
        (SELECT COUNT(*) FROM maintenance_tasks m \
            JOIN locations l ON m.location_id = l.location_id \
            WHERE l.building = bs.building AND m.active_chemical) AS chemical_maintenance_count \
    FROM building_supervisions bs \
    JOIN persons p ON bs.personal_id = p.personal_id \
    ORDER BY p.name, bs.personal_id, bs.building";

pub fn get_report_api_routes() -> Vec<Route> {
    routes![
        api_report_maintenance_summary,
        api_report_people_summary,
        api_report_activities_summary,
        api_report_school_stats,
        api_report_maintenance_frequency,
        api_report_overview,
        api_report_manager_buildings,
        api_report_generate_pdf
    ]
}

/// Runs one of the aggregate queries, logging failures under the report's
/// name.
fn run_report<T>(requester: Requester, db_connection: &DbConnection, name: &str, query: &str) -> Result<Vec<T>, ApiError>
where
    T: diesel::QueryableByName<diesel::pg::Pg> + 'static,
{
    requester.require(Permission::ViewReports)?;

    let mut db_connection = db::lock(db_connection)?;
    let rows = sql_query(query)
        .load(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to load {} report: {:?}", name, e))?;

    Ok(rows)
}

#[get("/maintenance-summary")]
async fn api_report_maintenance_summary(
    requester: Requester,
    db_connection: &State<DbConnection>,
) -> Result<Json<Vec<MaintenanceSummaryRow>>, ApiError> {
    run_report(requester, db_connection, "maintenance summary", MAINTENANCE_SUMMARY).map(Json)
}

#[get("/people-summary")]
async fn api_report_people_summary(
    requester: Requester,
    db_connection: &State<DbConnection>,
) -> Result<Json<Vec<PeopleSummaryRow>>, ApiError> {
    run_report(requester, db_connection, "people summary", PEOPLE_SUMMARY).map(Json)
}

#[get("/activities-summary")]
async fn api_report_activities_summary(
    requester: Requester,
    db_connection: &State<DbConnection>,
) -> Result<Json<Vec<ActivitySummaryRow>>, ApiError> {
    run_report(requester, db_connection, "activities summary", ACTIVITIES_SUMMARY).map(Json)
}

#[get("/school-stats")]
async fn api_report_school_stats(
    requester: Requester,
    db_connection: &State<DbConnection>,
) -> Result<Json<Vec<SchoolStatsRow>>, ApiError> {
    run_report(requester, db_connection, "school stats", SCHOOL_STATS).map(Json)
}

#[get("/maintenance-frequency")]
async fn api_report_maintenance_frequency(
    requester: Requester,
    db_connection: &State<DbConnection>,
) -> Result<Json<Vec<FrequencyRow>>, ApiError> {
    run_report(requester, db_connection, "maintenance frequency", MAINTENANCE_FREQUENCY).map(Json)
}

#[get("/overview")]
async fn api_report_overview(
    requester: Requester,
    db_connection: &State<DbConnection>,
) -> Result<Json<OverviewCounts>, ApiError> {
    let mut rows: Vec<OverviewCounts> = run_report(requester, db_connection, "overview", OVERVIEW)?;
    Ok(Json(rows.pop().unwrap_or_default()))
}

/// Every manager with the buildings they supervise and the maintenance
/// happening in them.
#[get("/manager-buildings")]
async fn api_report_manager_buildings(
    requester: Requester,
    db_connection: &State<DbConnection>,
) -> Result<Json<ManagerBuildingReport>, ApiError> {
    let rows: Vec<ManagerBuildingRow> = run_report(requester, db_connection, "manager buildings", MANAGER_BUILDINGS)?;
    Ok(Json(ManagerBuildingReport::from_rows(rows)))
}

/// Gathers everything the PDF report can show.
fn load_report_data(conn: &mut PgConnection) -> QueryResult<ReportData> {
    let summary = sql_query(OVERVIEW).load::<OverviewCounts>(conn)?.pop().unwrap_or_default();

    let chemical_tasks = maintenance_tasks::table
        .filter(maintenance_tasks::kind.eq(CLEANING))
        .filter(maintenance_tasks::active_chemical.eq(true))
        .count()
        .get_result(conn)?;

    Ok(ReportData {
        summary,
        maintenance_summary: sql_query(MAINTENANCE_SUMMARY).load(conn)?,
        people_summary: sql_query(PEOPLE_SUMMARY).load(conn)?,
        activities_summary: sql_query(ACTIVITIES_SUMMARY).load(conn)?,
        school_stats: sql_query(SCHOOL_STATS).load(conn)?,
        maintenance_frequency: sql_query(MAINTENANCE_FREQUENCY).load(conn)?,
        chemical_tasks,
    })
}

/// A rendered report, downloaded as an attachment.
#[derive(Responder)]
#[response(content_type = "pdf")]
pub struct PdfReport {
    bytes: Vec<u8>,
    disposition: Header<'static>,
}

/// Renders the requested sections of the management report as a PDF.
/// - If sections is empty or names an unknown section, returns status 400
#[post("/generate-pdf", data = "<request>")]
async fn api_report_generate_pdf(
    requester: Requester,
    db_connection: &State<DbConnection>,
    request: Json<PdfRequest>,
) -> Result<PdfReport, ApiError> {
    requester.require(Permission::ViewReports)?;

    let sections = request.sections()?;
    let data = {
        let mut db_connection = db::lock(db_connection)?;
        load_report_data(db_connection.deref_mut()).inspect_err(|e| error!("Unable to load report data: {:?}", e))?
    };

    let now = Local::now().naive_local();
    let blocks = pdf::build_blocks(&data, &sections, now);
    let bytes = pdf::render(&blocks, now.date())
        .inspect_err(|e| error!("Unable to render report with sections {:?}: {:?}", sections, e))?;

    let filename = format!("CMMS_Report_{}.pdf", now.format("%Y-%m-%d"));
    Ok(PdfReport {
        bytes,
        disposition: Header::new("Content-Disposition", format!("attachment; filename=\"{}\"", filename)),
    })
}
