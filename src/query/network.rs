use crate::constraint::{text_value, ConstraintCollection, Operator};
use crate::entity::{Attributes, Entity};
use crate::identity::{IdentityRegistry, Merge};
use crate::protocol::{FindRequest, ProtocolHandler, RequestAttribute};
use crate::query::{ExecutionStrategy, LikeMode, MatchOptions, QueryError};
use crate::registry::EntityInfo;
use crate::types::QueryInformationModel;
use async_trait::async_trait;
use dicom::core::PrimitiveValue;
use futures::StreamExt;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, info_span, trace, Instrument};
use uuid::Uuid;

/// Looks entities up in a remote archive.
pub struct NetworkExecution<'a> {
	handler: &'a dyn ProtocolHandler,
	timeout: Duration,
	options: MatchOptions,
}

impl<'a> NetworkExecution<'a> {
	pub fn new(handler: &'a dyn ProtocolHandler, timeout: Duration) -> Self {
		Self {
			handler,
			timeout,
			options: MatchOptions::default(),
		}
	}

	/// Only [`MatchOptions::like`] affects the request. Case handling is up to the archive.
	#[must_use]
	pub fn with_options(mut self, options: MatchOptions) -> Self {
		self.options = options;
		self
	}

	/// Translates constraints into a lookup request for the kind of `info`.
	pub fn translate<A: Attributes>(
		&self,
		info: &EntityInfo<A>,
		constraints: &ConstraintCollection,
	) -> Result<FindRequest, QueryError> {
		let mapping = info.mapping();
		let mut attributes: Vec<RequestAttribute> = mapping
			.tags()
			.map(|tag| RequestAttribute {
				tag,
				operator: None,
				value: PrimitiveValue::Empty,
			})
			.collect();

		let mut constrained = HashSet::new();
		for constraint in constraints {
			let tag = constraint.tag();
			if !mapping.contains(tag) {
				return Err(QueryError::UnmappedTag { kind: A::NAME, tag });
			}
			if !constrained.insert(tag) {
				return Err(QueryError::ConflictingConstraints(tag));
			}
			let value = match constraint.operator() {
				Operator::Equals => constraint.value().clone(),
				Operator::Like => text_value(
					constraint
						.values()
						.iter()
						.map(|value| wildcard(value, self.options.like))
						.collect(),
				),
			};
			debug!(%tag, operator = %constraint.operator(), "Added matching key");
			attributes.push(RequestAttribute {
				tag,
				operator: Some(constraint.operator()),
				value,
			});
		}

		Ok(FindRequest {
			level: info.level(),
			information_model: QueryInformationModel::for_level(info.level()),
			attributes,
		})
	}
}

fn wildcard(value: &str, mode: LikeMode) -> String {
	match mode {
		LikeMode::Contains => format!("*{value}*"),
		LikeMode::Prefix => format!("{value}*"),
	}
}

#[async_trait]
impl<A: Attributes> ExecutionStrategy<A> for NetworkExecution<'_> {
	async fn evaluate(
		&self,
		info: &EntityInfo<A>,
		constraints: &ConstraintCollection,
	) -> Result<Vec<Entity<A>>, QueryError> {
		let request = self.translate(info, constraints)?;
		let span = info_span!("lookup", request_id = %Uuid::new_v4(), kind = A::NAME);

		async move {
			let collect = async {
				let mut registry = IdentityRegistry::new();
				let mut records = self.handler.find(request);
				while let Some(record) = records.next().await {
					let entity = info.mapping().decode(&record?)?;
					if registry.insert(entity) == Merge::Linked {
						trace!("Linked duplicate record to its primary");
					}
				}
				Ok::<_, QueryError>(registry)
			};

			let registry = tokio::time::timeout(self.timeout, collect)
				.await
				.map_err(|_| QueryError::TimedOut(self.timeout))??;
			info!(matches = registry.len(), "Lookup completed");
			Ok::<_, QueryError>(registry.into_entries())
		}
		.instrument(span)
		.await
	}
}
