//! Engine configuration loaded from `depgate.toml`.
//!
//! Configuration is read-only here: it controls gate prompts, the package
//! format preference, metadata fan-out limits and the package sources.

pub mod parser;
pub mod schema;
pub mod store;

pub use parser::{parse_config, parse_config_str};
pub use schema::{
    EngineConfig, EngineSection, MetadataSection, PackageFormatSection, SourceConfigEntry,
    SourceKind,
};
pub use store::ConfigStore;
