//! Settings for the `tallyup` binary, read from `settings.toml` with
//! `TALLYUP__SECTION__KEY` environment overrides.
//!
//! See `settings.toml` at the workspace root for a commented sample.
use config::{Config, ConfigError, Environment, File};
use engine::{CodePolicy, RemainderPolicy};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub database: Database,
    pub port: u16,
    pub bind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    pub remainder_policy: RemainderPolicy,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub server: Server,
    #[serde(default)]
    pub ledger: Ledger,
    #[serde(default)]
    pub codes: CodePolicy,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("app.level", "info")?
            .add_source(File::with_name("settings").required(false))
            .add_source(
                Environment::with_prefix("TALLYUP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn parse(toml: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn optional_sections_fall_back_to_defaults() {
        let settings = parse(
            r#"
            [app]
            level = "debug"

            [server]
            database = "memory"
            port = 3000
            "#,
        );
        assert!(matches!(settings.server.database, Database::Memory));
        assert_eq!(settings.ledger.remainder_policy, RemainderPolicy::FirstParticipant);
        assert_eq!(settings.codes, CodePolicy::default());
        assert!(settings.server.bind.is_none());
    }

    #[test]
    fn reads_sqlite_path_and_policies() {
        let settings = parse(
            r#"
            [app]
            level = "info"

            [server]
            database = { sqlite = "./trip.db" }
            port = 8080
            bind = "0.0.0.0"

            [ledger]
            remainder_policy = "spread"

            [codes]
            length = 7
            attempts_per_length = 3
            "#,
        );
        assert!(matches!(settings.server.database, Database::Sqlite(ref p) if p == "./trip.db"));
        assert_eq!(settings.ledger.remainder_policy, RemainderPolicy::Spread);
        assert_eq!(settings.codes.length, 7);
        assert_eq!(settings.codes.attempts_per_length, 3);
        assert_eq!(settings.codes.max_length, CodePolicy::default().max_length);
        assert!(settings.codes.validate().is_ok());
    }
}
