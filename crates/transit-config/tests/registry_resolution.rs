//! Resolution fails closed: a `ConfigError` is returned exactly when a
//! variable required by the selected mode is unset or empty.

use std::io::Write;
use std::sync::{Arc, Mutex};

use rstest::rstest;
use transit_config::{ConfigError, EnvironmentRegistry};
use transit_core::MigrationMode;
use tracing_subscriber::fmt::MakeWriter;

const ALL_FIELDS: &[&str] = &[
    "POTATO_URL",
    "POTATO_TOKEN",
    "POTATO_DB_CONTAINER",
    "POTATO_DB_USER",
    "POTATO_DB_NAME",
];

fn registry_without(missing: Option<&str>, blank: bool) -> EnvironmentRegistry {
    EnvironmentRegistry::from_vars(ALL_FIELDS.iter().filter_map(|key| {
        if Some(*key) == missing {
            blank.then(|| ((*key).to_string(), "   ".to_string()))
        } else {
            Some(((*key).to_string(), format!("value-for-{key}")))
        }
    }))
}

fn required_in(mode: MigrationMode, key: &str) -> bool {
    match mode {
        MigrationMode::SchemaOnly => matches!(key, "POTATO_URL" | "POTATO_TOKEN"),
        MigrationMode::Full => true,
    }
}

#[rstest]
fn fails_iff_mode_required_field_unset(
    #[values(MigrationMode::SchemaOnly, MigrationMode::Full)] mode: MigrationMode,
    #[values(false, true)] blank: bool,
) {
    assert!(registry_without(None, blank).resolve("potato", mode).is_ok());

    for key in ALL_FIELDS {
        let result = registry_without(Some(key), blank).resolve("potato", mode);
        if required_in(mode, key) {
            match result {
                Err(ConfigError::MissingField { variable, .. }) => {
                    assert!(variable.starts_with(key), "{variable} vs {key}");
                }
                other => panic!("{key} unset in {mode} should fail, got {other:?}"),
            }
        } else {
            assert!(result.is_ok(), "{key} unset in {mode} should resolve");
        }
    }
}

#[test]
fn host_satisfies_full_mode_without_container() {
    let registry = EnvironmentRegistry::from_vars([
        ("POTATO_URL", "https://potato"),
        ("POTATO_TOKEN", "t"),
        ("POTATO_DB_HOST", "10.0.0.5"),
        ("POTATO_DB_PORT", "6543"),
        ("POTATO_DB_USER", "cms"),
        ("POTATO_DB_NAME", "cms"),
    ]);
    let env = registry
        .resolve("potato", MigrationMode::Full)
        .expect("host-mode environment resolves");
    assert_eq!(
        env.database.map(|db| db.target.to_string()).as_deref(),
        Some("10.0.0.5:6543")
    );
}

#[test]
fn names_are_case_insensitive() {
    let registry = registry_without(None, false);
    let env = registry
        .resolve("Potato", MigrationMode::Full)
        .expect("mixed case resolves");
    assert_eq!(env.name, "Potato");
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Captured {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn warnings_while(f: impl FnOnce()) -> String {
    let captured = Captured::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(captured.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    let bytes = captured.0.lock().unwrap().clone();
    String::from_utf8(bytes).unwrap()
}

#[test]
fn partial_database_in_schema_mode_is_dropped_with_a_warning() {
    let registry = EnvironmentRegistry::from_vars([
        ("POTATO_URL", "https://potato"),
        ("POTATO_TOKEN", "t"),
        ("POTATO_DB_CONTAINER", "pg-potato"),
        ("POTATO_DB_USER", "cms"),
    ]);
    let mut resolved = None;
    let logs = warnings_while(|| {
        resolved = Some(registry.resolve("potato", MigrationMode::SchemaOnly));
    });

    let env = resolved.unwrap().expect("schema mode still resolves");
    assert!(env.database.is_none());
    assert!(logs.contains("WARN"), "{logs}");
    assert!(logs.contains("POTATO_DB_NAME"), "{logs}");
    assert!(logs.contains("schema snapshot"), "{logs}");
}

#[test]
fn absent_database_in_schema_mode_stays_quiet() {
    let registry = EnvironmentRegistry::from_vars([("POTATO_URL", "https://potato"), ("POTATO_TOKEN", "t")]);
    let mut resolved = None;
    let logs = warnings_while(|| {
        resolved = Some(registry.resolve("potato", MigrationMode::SchemaOnly));
    });
    assert!(resolved.unwrap().unwrap().database.is_none());
    assert_eq!(logs, "");
}
