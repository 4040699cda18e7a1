use cmms_server::build_rocket;
use cmms_server::config::Config;
use cmms_server::db;

// Start the web sever using the launch macro
#[rocket::launch]
fn rocket() -> _ {
    let figment = Config::load_figment();
    let config = Config::load_from_figment(&figment);

    // Connect and migrate before Rocket starts, there is nothing to serve
    // without a database
    let db_connection = db::establish(&config.database).unwrap_or_else(|e| panic!("{}", e));

    build_rocket(figment, config, db_connection)
}
