use crate::errors::ConfigurationError;
use config::{Config, FileFormat};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use std::env::var;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Settings {
    pub application: Application,
    pub local_store: LocalStoreSettings,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Application {
    pub host: String,
    pub port: u16,
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct LocalStoreSettings {
    #[serde_as(as = "DisplayFromStr")]
    pub store_type: StoreType,
    pub file_path: Option<String>,
    pub url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum StoreType {
    #[default]
    InMemory,
    Relational,
}

impl Display for StoreType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreType::InMemory => write!(f, "in_memory"),
            StoreType::Relational => write!(f, "relational"),
        }
    }
}

impl FromStr for StoreType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relational" => Ok(StoreType::Relational),
            "in_memory" => Ok(StoreType::InMemory),
            other => Err(ConfigurationError::UnknownStoreType(other.to_string())),
        }
    }
}

impl LocalStoreSettings {
    /// An in-memory store without `file_path` is volatile; a relational one needs a url.
    pub fn check_if_valid(&self) -> Result<(), ConfigurationError> {
        match self.store_type {
            StoreType::InMemory => Ok(()),
            StoreType::Relational => match &self.url {
                Some(url) if !url.trim().is_empty() => Ok(()),
                _ => Err(ConfigurationError::MissingDatabaseUrl),
            },
        }
    }

    pub fn url_unchecked(&self) -> String {
        self.url.to_owned().unwrap_or_default()
    }
}

/// The possible runtime environment for our application.
#[derive(Debug, Eq, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Prod => "prod",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = ConfigurationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            other => Err(ConfigurationError::UnknownEnvironment(other.to_string())),
        }
    }
}

pub fn get_env() -> Result<Environment, ConfigurationError> {
    var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "dev".into())
        .try_into()
}

pub fn get_configuration() -> Result<Settings, ConfigurationError> {
    let environment = get_env()?;
    let second_source = format!("configuration/{}", environment.as_str());
    let settings = Config::builder()
        .add_source(config::File::new("configuration/base", FileFormat::Yaml))
        .add_source(config::File::new(&second_source, FileFormat::Yaml).required(false))
        .build()?;
    Ok(settings.try_deserialize::<Settings>()?)
}
