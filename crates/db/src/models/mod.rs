//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row and, where the pipeline inserts rows, a create DTO.
//! Closed-set text columns decode straight into the `safehome-core` enums.

pub mod activity;
pub mod alert;
pub mod check_in;
pub mod family;
pub mod hub;
pub mod user;
