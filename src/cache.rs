//! Storage for entities that were looked up before, so queries can be answered
//! without another round trip to the archive.

use crate::entity::{Attributes, Entity};
use crate::identity::IdentityRegistry;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

pub trait CacheStore<A: Attributes>: Send + Sync {
	/// A point-in-time copy. Later writes do not show up in it.
	fn snapshot(&self) -> Arc<[Entity<A>]>;

	/// Merges entities into the store and returns how many were added.
	fn persist(&self, entities: Vec<Entity<A>>) -> usize;
}

/// Keeps all entities of one kind in memory. Readers share the current snapshot,
/// writers replace it.
#[derive(Debug)]
pub struct InMemoryCacheStore<A: Attributes> {
	current: RwLock<Arc<[Entity<A>]>>,
}

impl<A: Attributes> Default for InMemoryCacheStore<A> {
	fn default() -> Self {
		Self {
			current: RwLock::new(Arc::from(Vec::new())),
		}
	}
}

impl<A: Attributes> InMemoryCacheStore<A> {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.current
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl<A: Attributes> CacheStore<A> for InMemoryCacheStore<A> {
	fn snapshot(&self) -> Arc<[Entity<A>]> {
		Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
	}

	fn persist(&self, entities: Vec<Entity<A>>) -> usize {
		let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
		let mut registry: IdentityRegistry<Entity<A>> = current.iter().cloned().collect();

		let mut added = 0;
		for entity in entities.into_iter().flat_map(Entity::into_instances) {
			// Skip payloads the primary or one of its linked records already holds.
			let duplicate = registry
				.get(entity.identity().as_str())
				.is_some_and(|primary| {
					primary.same_payload(&entity)
						|| primary
							.additional_instances()
							.iter()
							.any(|linked| linked.same_payload(&entity))
				});
			if duplicate {
				continue;
			}
			registry.insert(entity);
			added += 1;
		}

		*current = Arc::from(registry.into_entries());
		debug!(kind = A::NAME, added, total = current.len(), "Persisted entities");
		added
	}
}
