// FlatSQL - read-only SQL over flat files
// Modular architecture: parser, executor, row sources, stream ciphers

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::wildcard_enum_match_arm)]
#![allow(clippy::items_after_statements)]

// Values, types, rows, coercion and the error enum
pub mod core;

// Re-export all core types as types module
pub mod types {
    pub use crate::core::*;
}

// SELECT parser
pub mod parser;

// Filtering, projection, grouping, ordering and cursors
pub mod executor;

// Row sources (delimited, fixed-width, transposed, file sets)
pub mod reader;

// Decrypting stream filters
pub mod crypto;

// Configuration and query entry points
pub mod connection;

pub use self::core::{DataType, QueryError, Value};
pub use parser::{parse_statement, Statement};
pub use executor::{Cursor, QueryExecutor};
pub use reader::RowSource;
pub use crypto::{CipherRegistry, CryptoFilter};
pub use connection::{Connection, ConnectionConfig, TableReader};
