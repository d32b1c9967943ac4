//! Typed attribute queries over DICOM patients, studies and series.
//!
//! A [`Query`] collects constraints on the DICOM attributes of one entity kind
//! and runs either as a C-FIND against an archive (through a [`ProtocolHandler`])
//! or as a filter over entities that were retrieved before. Both paths merge
//! records of the same identity into one primary entity.

pub mod cache;
pub mod config;
pub mod constraint;
pub mod entity;
pub mod identifier;
pub mod identity;
pub mod mapping;
pub mod protocol;
pub mod query;
pub mod registry;
pub mod settings;
pub mod tag;
pub mod types;

pub use cache::{CacheStore, InMemoryCacheStore};
pub use constraint::{Constraint, ConstraintCollection, Operator};
pub use entity::{Entity, Patient, Series, Study};
pub use identifier::Identifier;
pub use protocol::ProtocolHandler;
pub use query::{Execution, Query, QueryError};
pub use registry::InfoRegistry;
pub use tag::FieldTag;
