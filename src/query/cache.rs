use crate::constraint::{Constraint, ConstraintCollection, Operator};
use crate::entity::{Attributes, Entity};
use crate::identifier::Identifier;
use crate::identity::IdentityRegistry;
use crate::mapping::AttributeMapping;
use crate::query::{ExecutionStrategy, QueryError};
use crate::registry::EntityInfo;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// How a [`Operator::Like`] constraint matches.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeMode {
	/// The value occurs anywhere in the field.
	#[default]
	Contains,
	/// The field starts with the value.
	Prefix,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MatchOptions {
	pub like: LikeMode,
	/// Applies to Like only. Equals is always exact.
	pub case_sensitive: bool,
}

/// Filters entities that were retrieved earlier.
#[derive(Debug)]
pub struct CacheExecution<'a, A: Attributes> {
	snapshot: &'a [Entity<A>],
	options: MatchOptions,
}

impl<'a, A: Attributes> CacheExecution<'a, A> {
	pub fn new(snapshot: &'a [Entity<A>]) -> Self {
		Self {
			snapshot,
			options: MatchOptions::default(),
		}
	}

	#[must_use]
	pub fn with_options(mut self, options: MatchOptions) -> Self {
		self.options = options;
		self
	}

	/// Returns every entity that satisfies all constraints, merged by identity.
	/// Constraints on tags the kind does not map match nothing.
	pub fn filter(&self, info: &EntityInfo<A>, constraints: &ConstraintCollection) -> Vec<Entity<A>> {
		let mapping = info.mapping();
		let registry: IdentityRegistry<Entity<A>> = self
			.snapshot
			.iter()
			.filter(|entity| {
				constraints
					.iter()
					.all(|constraint| self.matches(mapping, entity, constraint))
			})
			.cloned()
			.collect();
		debug!(
			kind = A::NAME,
			candidates = self.snapshot.len(),
			matches = registry.len(),
			"Filtered cache snapshot"
		);
		registry.into_entries()
	}

	fn matches(
		&self,
		mapping: &AttributeMapping<A>,
		entity: &Entity<A>,
		constraint: &Constraint,
	) -> bool {
		let tag = constraint.tag();
		let expected = constraint.values();
		if constraint.operator() == Operator::Equals && tag == mapping.identity_tag() {
			return expected
				.iter()
				.any(|value| Identifier::new(value) == *entity.identity());
		}

		// Either side may hold a list. One matching pair is enough.
		let actual: Vec<&str> = mapping.read_values(entity, tag).collect();
		expected.iter().any(|expected| {
			actual.iter().any(|actual| match constraint.operator() {
				Operator::Equals => actual == expected,
				Operator::Like => self.like(actual, expected),
			})
		})
	}

	fn like(&self, actual: &str, pattern: &str) -> bool {
		let (actual, pattern) = if self.options.case_sensitive {
			(actual.to_owned(), pattern.to_owned())
		} else {
			(actual.to_lowercase(), pattern.to_lowercase())
		};
		match self.options.like {
			LikeMode::Contains => actual.contains(&pattern),
			LikeMode::Prefix => actual.starts_with(&pattern),
		}
	}
}

#[async_trait]
impl<A: Attributes> ExecutionStrategy<A> for CacheExecution<'_, A> {
	async fn evaluate(
		&self,
		info: &EntityInfo<A>,
		constraints: &ConstraintCollection,
	) -> Result<Vec<Entity<A>>, QueryError> {
		if let Some(constraint) = constraints
			.iter()
			.find(|constraint| !info.mapping().contains(constraint.tag()))
		{
			return Err(QueryError::UnmappedTag {
				kind: A::NAME,
				tag: constraint.tag(),
			});
		}
		Ok(self.filter(info, constraints))
	}
}
