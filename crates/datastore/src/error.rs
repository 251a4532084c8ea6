use enum_as_inner::EnumAsInner;
use regiondb_expr::ParseError;
use regiondb_table::RegionError;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq, EnumAsInner)]
pub enum IndexError {
    #[error("Index with name `{name}` already exists on region `{region}`.")]
    NameConflict { region: String, name: String },
    #[error("Region `{0}` not found.")]
    RegionNotFound(String),
    #[error("Index `{name}` has an invalid definition: {reason}")]
    InvalidDefinition { name: String, reason: String },
    #[error("Index with name `{0}` not found.")]
    IndexNotFound(String),
    #[error("Index `{0}` cannot seek a range of keys.")]
    CannotSeekRange(String),
}

impl IndexError {
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            name: name.to_owned(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug, EnumAsInner)]
pub enum ConfigError {
    #[error("invalid index configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Error, Debug, EnumAsInner)]
pub enum DatastoreError {
    #[error("IndexError: {0}")]
    Index(#[from] IndexError),
    #[error("RegionError: {0}")]
    Region(#[from] RegionError),
    #[error("ParseError: {0}")]
    Parse(#[from] ParseError),
    #[error("ConfigError: {0}")]
    Config(#[from] ConfigError),
}
