//! # bqlite Core
//!
//! Core types shared by every bqlite crate.
//!
//! - [`error`]: the error enum and its mapping onto wire error reasons
//! - [`schema`]: field/table schemas and the table DDL grammar
//! - [`value`]: engine-native values
//! - [`wire`]: the warehouse REST resources
//! - [`temporal`]: timestamp and date parsing/normalization

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod schema;
pub mod temporal;
pub mod value;
pub mod wire;

pub use error::{Error, Result};
pub use schema::{FieldSchema, Mode, TableSchema, TypeTag};
pub use value::NativeValue;
