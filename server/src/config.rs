use cmms_common::people::default_role_limits;
use rocket::figment::providers::{Env, Format, Serialized, Toml};
use rocket::figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: Database,

    /// Directory of a built frontend to serve at `/`, if there is one
    pub client_path: Option<String>,

    /// When false, every request is treated as coming from an Admin
    pub enforce_roles: bool,

    /// Whether `POST /api/query` runs raw SQL. Off unless explicitly enabled.
    pub query_console: bool,

    /// The maximum number of profiles per job role. Roles not listed here are
    /// unlimited.
    pub role_limits: BTreeMap<String, i64>,

    /// Sent as `Access-Control-Allow-Origin`. CORS headers are only added when
    /// this is set.
    pub cors_origin: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: Default::default(),
            client_path: None,
            enforce_roles: false,
            query_console: false,
            role_limits: default_role_limits(),
            cors_origin: None,
        }
    }
}

impl Config {
    pub fn load() -> Config {
        Self::load_from_figment(&Self::load_figment())
    }

    pub fn load_from_figment(figment: &Figment) -> Config {
        figment.extract().unwrap_or_else(|e| {
            error!("Unable to read config, using defaults: {:?}", e);
            Config::default()
        })
    }

    /// The figment both this config and Rocket's own are read from
    pub fn load_figment() -> Figment {
        Figment::from(rocket::Config::default())
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(Env::var_or("CMMS_CONFIG", "Cmms.toml")))
            .merge(Env::prefixed("CMMS_").split("__"))
    }
}

// https://www.postgresql.org/docs/current/libpq-connect.html#LIBPQ-CONNSTRING
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Database {
    pub uri: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dbname: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Default for Database {
    fn default() -> Self {
        Database {
            uri: None,
            host: Some("localhost".to_owned()),
            port: Some(5432),
            dbname: Some("cmms".to_owned()),
            user: None,
            password: None,
        }
    }
}

impl Database {
    /// A full uri wins over the individual keys
    pub fn to_pg_connection_string(&self) -> String {
        if let Some(uri) = self.uri.to_owned() {
            return uri;
        }

        let mut parts = Vec::new();

        if let Some(host) = self.host.as_ref() {
            parts.push(format!("host='{}'", host));
        }

        if let Some(port) = self.port {
            parts.push(format!("port='{}'", port));
        }

        if let Some(dbname) = self.dbname.as_ref() {
            parts.push(format!("dbname='{}'", dbname));
        }

        if let Some(user) = self.user.as_ref() {
            parts.push(format!("user='{}'", user));
        }

        if let Some(password) = self.password.as_ref() {
            parts.push(format!("password='{}'", password));
        }

        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn default_connection_string() {
        assert_eq!(Database::default().to_pg_connection_string(), "host='localhost' port='5432' dbname='cmms'");
    }

    #[test]
    fn uri_overrides_parts() {
        let database = Database { uri: Some("postgres://cmms@db/cmms".to_owned()), ..Default::default() };
        assert_eq!(database.to_pg_connection_string(), "postgres://cmms@db/cmms");
    }

    #[test]
    fn credentials_are_included() {
        let database = Database {
            user: Some("cmms".to_owned()),
            password: Some("secret".to_owned()),
            host: None,
            port: None,
            ..Default::default()
        };
        assert_eq!(database.to_pg_connection_string(), "dbname='cmms' user='cmms' password='secret'");
    }

    #[test]
    fn defaults_are_safe() {
        let config = Config::default();
        assert!(!config.enforce_roles);
        assert!(!config.query_console);
        assert_eq!(config.role_limits.get("Mid-level Manager"), Some(&10));
        assert_eq!(config.role_limits.get("Base-level Worker"), Some(&50));
    }

    #[test]
    fn reads_toml_and_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "Cmms.toml",
                r#"
                enforce_roles = true
                cors_origin = "http://localhost:5173"

                [database]
                dbname = "campus"

                [role_limits]
                "Senior Manager" = 2
                "#,
            )?;
            jail.set_env("CMMS_QUERY_CONSOLE", "true");
            jail.set_env("CMMS_DATABASE__PORT", "6543");

            let config = Config::load();
            assert!(config.enforce_roles);
            assert!(config.query_console);
            assert_eq!(config.cors_origin.as_deref(), Some("http://localhost:5173"));
            assert_eq!(config.database.dbname.as_deref(), Some("campus"));
            assert_eq!(config.database.port, Some(6543));
            assert_eq!(config.role_limits.get("Senior Manager"), Some(&2));

            Ok(())
        });
    }
}
