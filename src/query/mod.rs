//! Typed queries over one entity kind, executed against an archive or a cache.
//!
//! ```ignore
//! let registry = InfoRegistry::new();
//! let studies = Query::<StudyAttributes>::new(&registry)?
//!     .where_like(FieldTag::PatientId, "910")?
//!     .execute_from_cache(&snapshot);
//! ```

mod cache;
mod network;

pub use cache::{CacheExecution, LikeMode, MatchOptions};
pub use network::NetworkExecution;

use crate::constraint::{Constraint, ConstraintCollection, ConstraintError, Operator};
use crate::entity::{Attributes, Entity, EntityError};
use crate::mapping::MappingError;
use crate::protocol::{ProtocolError, ProtocolHandler};
use crate::registry::{EntityInfo, InfoRegistry};
use crate::tag::FieldTag;
use async_trait::async_trait;
use dicom::core::PrimitiveValue;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
	#[error(transparent)]
	Constraint(#[from] ConstraintError),
	#[error(transparent)]
	Mapping(#[from] MappingError),
	#[error("{kind} has no field mapped to {tag}")]
	UnmappedTag { kind: &'static str, tag: FieldTag },
	#[error("{0} is constrained more than once, which a lookup request cannot express")]
	ConflictingConstraints(FieldTag),
	#[error("Failed to decode a lookup result: {0}")]
	Decode(#[from] EntityError),
	#[error(transparent)]
	Protocol(#[from] ProtocolError),
	#[error("Lookup timed out after {0:?}")]
	TimedOut(Duration),
}

/// Evaluates a constraint collection for one entity kind.
#[async_trait]
pub trait ExecutionStrategy<A: Attributes>: Send + Sync {
	async fn evaluate(
		&self,
		info: &EntityInfo<A>,
		constraints: &ConstraintCollection,
	) -> Result<Vec<Entity<A>>, QueryError>;
}

/// The strategy a caller picks for one execution.
pub enum Execution<'a, A: Attributes> {
	Network(NetworkExecution<'a>),
	Cache(CacheExecution<'a, A>),
}

#[async_trait]
impl<A: Attributes> ExecutionStrategy<A> for Execution<'_, A> {
	async fn evaluate(
		&self,
		info: &EntityInfo<A>,
		constraints: &ConstraintCollection,
	) -> Result<Vec<Entity<A>>, QueryError> {
		match self {
			Self::Network(network) => network.evaluate(info, constraints).await,
			Self::Cache(cache) => cache.evaluate(info, constraints).await,
		}
	}
}

/// A filter over one entity kind.
#[derive(Debug, Clone)]
pub struct Query<A: Attributes> {
	info: Arc<EntityInfo<A>>,
	constraints: ConstraintCollection,
}

impl<A: Attributes> Query<A> {
	/// Starts an unconstrained query. Fails if the kind's mapping is invalid.
	pub fn new(registry: &InfoRegistry) -> Result<Self, QueryError> {
		Ok(Self {
			info: registry.mapping_for::<A>()?,
			constraints: ConstraintCollection::new(),
		})
	}

	pub fn where_equals(
		self,
		tag: FieldTag,
		value: impl Into<PrimitiveValue>,
	) -> Result<Self, QueryError> {
		self.constrain(tag, Operator::Equals, value)
	}

	pub fn where_like(
		self,
		tag: FieldTag,
		value: impl Into<PrimitiveValue>,
	) -> Result<Self, QueryError> {
		self.constrain(tag, Operator::Like, value)
	}

	/// Adds a constraint with an explicit operator.
	pub fn constrain(
		mut self,
		tag: FieldTag,
		operator: Operator,
		value: impl Into<PrimitiveValue>,
	) -> Result<Self, QueryError> {
		let constraint = Constraint::new(tag, operator, value)?;
		if !self.info.mapping().contains(tag) {
			return Err(QueryError::UnmappedTag { kind: A::NAME, tag });
		}
		self.constraints.push(constraint);
		Ok(self)
	}

	#[inline]
	pub const fn constraints(&self) -> &ConstraintCollection {
		&self.constraints
	}

	#[inline]
	pub fn info(&self) -> &EntityInfo<A> {
		&self.info
	}

	/// Looks the entities up in the archive behind `handler`.
	pub async fn execute(
		&self,
		handler: &dyn ProtocolHandler,
		timeout: Duration,
	) -> Result<Vec<Entity<A>>, QueryError> {
		NetworkExecution::new(handler, timeout)
			.evaluate(&*self.info, &self.constraints)
			.await
	}

	/// Filters previously retrieved entities with the default match options.
	pub fn execute_from_cache(&self, snapshot: &[Entity<A>]) -> Vec<Entity<A>> {
		CacheExecution::new(snapshot).filter(&*self.info, &self.constraints)
	}

	pub async fn execute_with(
		&self,
		execution: &Execution<'_, A>,
	) -> Result<Vec<Entity<A>>, QueryError> {
		execution.evaluate(&*self.info, &self.constraints).await
	}
}
