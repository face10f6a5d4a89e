//! Parameterized SQL for `PgStore`: identifiers from type-author whitelists only, values as parameters.

mod builder;
pub mod params;
pub use builder::*;
pub use params::*;
