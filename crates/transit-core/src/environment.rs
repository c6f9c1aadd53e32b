//! Connection facts for a named environment.
//!
//! Values are produced by the environment registry in `transit-config` and
//! consumed read-only by every other component.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default PostgreSQL port for host-mode connections.
pub const DEFAULT_DB_PORT: u16 = 5432;

/// A resolved environment (e.g. `dev`, `stage`, `prod`).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Logical name as given on the command line.
    pub name: String,
    /// Structural API endpoint.
    pub api: ApiEndpoint,
    /// Database descriptor. Always present in full mode.
    pub database: Option<DbConnection>,
}

impl Environment {
    /// Whether both environments point at the same physical database.
    #[must_use]
    pub fn shares_database_with(&self, other: &Self) -> bool {
        match (&self.database, &other.database) {
            (Some(a), Some(b)) => a.same_database(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("name", &self.name)
            .field("api", &self.api)
            .field("database", &self.database)
            .finish()
    }
}

/// Base URL and bearer credential for the structural API.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEndpoint {
    /// Base URL without trailing slash (e.g. `https://cms.example.com`).
    pub base_url: String,
    /// Static bearer token.
    #[serde(skip_serializing)]
    pub token: String,
}

impl ApiEndpoint {
    /// Join a path onto the base URL.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl fmt::Debug for ApiEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiEndpoint")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Where database commands execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DbTarget {
    /// Commands run through `docker exec` inside this container.
    Container { name: String },
    /// Commands run locally against a remote host.
    Host { host: String, port: u16 },
}

impl fmt::Display for DbTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Container { name } => write!(f, "container:{name}"),
            Self::Host { host, port } => write!(f, "{host}:{port}"),
        }
    }
}

/// Database connection descriptor.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConnection {
    pub target: DbTarget,
    pub user: String,
    pub database: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl DbConnection {
    /// Two descriptors address the same physical database when target and
    /// database name match. The user is irrelevant.
    #[must_use]
    pub fn same_database(&self, other: &Self) -> bool {
        self.target == other.target && self.database == other.database
    }
}

impl fmt::Debug for DbConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConnection")
            .field("target", &self.target)
            .field("user", &self.user)
            .field("database", &self.database)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl fmt::Display for DbConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} as {}", self.target, self.database, self.user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(target: DbTarget, database: &str, user: &str) -> DbConnection {
        DbConnection {
            target,
            user: user.into(),
            database: database.into(),
            password: Some("hunter2".into()),
        }
    }

    fn container(name: &str) -> DbTarget {
        DbTarget::Container { name: name.into() }
    }

    #[test]
    fn same_database_ignores_user() {
        let a = conn(container("pg"), "cms", "alice");
        let b = conn(container("pg"), "cms", "bob");
        assert!(a.same_database(&b));
    }

    #[test]
    fn different_database_name_is_distinct() {
        let a = conn(container("pg"), "cms_edit", "cms");
        let b = conn(container("pg"), "cms_prod", "cms");
        assert!(!a.same_database(&b));
    }

    #[test]
    fn environments_without_database_never_share() {
        let env = Environment {
            name: "dev".into(),
            api: ApiEndpoint {
                base_url: "http://dev".into(),
                token: "t".into(),
            },
            database: None,
        };
        assert!(!env.shares_database_with(&env.clone()));
    }

    #[test]
    fn debug_redacts_secrets() {
        let env = Environment {
            name: "prod".into(),
            api: ApiEndpoint {
                base_url: "https://cms".into(),
                token: "super-secret-token".into(),
            },
            database: Some(conn(container("pg"), "cms", "cms")),
        };
        let rendered = format!("{env:?}");
        assert!(!rendered.contains("super-secret-token"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn url_joins_without_double_slash() {
        let api = ApiEndpoint {
            base_url: "https://cms.example.com".into(),
            token: String::new(),
        };
        assert_eq!(
            api.url("/schema/snapshot"),
            "https://cms.example.com/schema/snapshot"
        );
        assert_eq!(api.url("server/health"), "https://cms.example.com/server/health");
    }

    #[test]
    fn target_display() {
        assert_eq!(container("pg").to_string(), "container:pg");
        let host = DbTarget::Host {
            host: "db.internal".into(),
            port: DEFAULT_DB_PORT,
        };
        assert_eq!(host.to_string(), "db.internal:5432");
    }
}
