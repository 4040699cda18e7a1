use crate::auth::Requester;
use crate::db::{self, DbConnection};
use crate::error::ApiError;
use cmms_common::roles::Permission;
use cmms_common::schema::{building_supervisions, persons};
use cmms_common::supervision::{BuildingSupervision, SupervisionInput, SupervisionListing};
use cmms_common::{yuri, DataResponse, Message, SUPERVISION_API_ROOT};
use diesel::{Connection, ExpressionMethods, PgConnection, QueryDsl, QueryResult, RunQueryDsl, SelectableHelper};
use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::{Route, State};
use std::ops::DerefMut;

pub fn get_supervision_api_routes() -> Vec<Route> {
    routes![
        api_supervision_fetch,
        api_supervision_by_manager,
        api_supervision_by_building,
        api_supervision_create,
        api_supervision_delete
    ]
}

/// Filters for listing supervisions, both optional
#[derive(Debug, Default)]
struct SupervisionFilter<'a> {
    manager: Option<&'a str>,
    building: Option<&'a str>,
}

fn load_listings(conn: &mut PgConnection, filter: &SupervisionFilter) -> QueryResult<Vec<SupervisionListing>> {
    let mut sql_query = building_supervisions::table
        .inner_join(persons::table)
        .select((BuildingSupervision::as_select(), persons::name))
        .order((building_supervisions::building, persons::name))
        .into_boxed();

    if let Some(manager) = filter.manager {
        sql_query = sql_query.filter(building_supervisions::personal_id.eq(manager));
    }

    if let Some(building) = filter.building {
        sql_query = sql_query.filter(building_supervisions::building.eq(building));
    }

    let rows: Vec<(BuildingSupervision, String)> = sql_query.load(conn)?;
    Ok(rows.into_iter().map(|(supervision, manager_name)| SupervisionListing { supervision, manager_name }).collect())
}

fn fetch_listings(
    requester: Requester,
    db_connection: &State<DbConnection>,
    filter: SupervisionFilter<'_>,
) -> Result<Json<DataResponse<SupervisionListing>>, ApiError> {
    requester.require(Permission::ViewSupervision)?;

    let mut db_connection = db::lock(db_connection)?;
    let listings = load_listings(db_connection.deref_mut(), &filter)
        .inspect_err(|e| error!("Unable to load building supervisions for {:?}: {:?}", filter, e))?;

    Ok(Json(DataResponse::new(listings)))
}

#[get("/")]
async fn api_supervision_fetch(
    requester: Requester,
    db_connection: &State<DbConnection>,
) -> Result<Json<DataResponse<SupervisionListing>>, ApiError> {
    fetch_listings(requester, db_connection, SupervisionFilter::default())
}

#[get("/by-manager/<personal_id>")]
async fn api_supervision_by_manager(
    requester: Requester,
    db_connection: &State<DbConnection>,
    personal_id: &str,
) -> Result<Json<DataResponse<SupervisionListing>>, ApiError> {
    let filter = SupervisionFilter { manager: Some(personal_id), ..Default::default() };
    fetch_listings(requester, db_connection, filter)
}

#[get("/by-building/<building>")]
async fn api_supervision_by_building(
    requester: Requester,
    db_connection: &State<DbConnection>,
    building: &str,
) -> Result<Json<DataResponse<SupervisionListing>>, ApiError> {
    let filter = SupervisionFilter { building: Some(building), ..Default::default() };
    fetch_listings(requester, db_connection, filter)
}

/// Assigns a manager to a building. A manager can only be assigned to the
/// same building once.
#[post("/", data = "<supervision>")]
async fn api_supervision_create(
    requester: Requester,
    db_connection: &State<DbConnection>,
    supervision: Json<SupervisionInput>,
) -> Result<Created<Json<Message>>, ApiError> {
    requester.require(Permission::Create)?;

    let supervision = supervision.into_inner().validate()?;
    let mut db_connection = db::lock(db_connection)?;

    let id = db_connection
        .transaction::<_, ApiError, _>(|conn| {
            let existing: i64 = building_supervisions::table
                .filter(building_supervisions::personal_id.eq(&supervision.personal_id))
                .filter(building_supervisions::building.eq(&supervision.building))
                .count()
                .get_result(conn)?;

            if existing > 0 {
                return Err(ApiError::Conflict(format!(
                    "{} already supervises {}",
                    supervision.personal_id, supervision.building
                )));
            }

            Ok(diesel::insert_into(building_supervisions::table)
                .values(&supervision)
                .returning(building_supervisions::supervision_id)
                .get_result::<i32>(conn)?)
        })
        .inspect_err(|e| error!("Unable to save new building supervision {:?}: {:?}", supervision, e))?;

    Ok(Created::new(yuri!(SUPERVISION_API_ROOT, &id.to_string()))
        .body(Json(Message::created("Building supervisor assigned", id))))
}

#[delete("/<id>")]
async fn api_supervision_delete(
    requester: Requester,
    db_connection: &State<DbConnection>,
    id: i32,
) -> Result<Json<Message>, ApiError> {
    requester.require(Permission::Delete)?;

    let mut db_connection = db::lock(db_connection)?;
    let deleted = diesel::delete(building_supervisions::table.find(id))
        .execute(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to delete building supervision {:?}: {:?}", id, e))?;

    if deleted == 0 {
        return Err(ApiError::NotFound("Building supervision"));
    }

    Ok(Json(Message::new("Building supervisor removed")))
}
