//! Merging of records that describe the same external identity.

use crate::entity::{Attributes, Entity};
use crate::identifier::{normalize, Identifier};
use std::collections::HashMap;

/// A kind whose duplicate records are linked to one primary record instead of
/// being dropped or reported twice.
pub trait MultipleInstance: Sized {
	fn identity_hash(&self) -> &Identifier;

	fn additional_instances(&self) -> &[Self];

	fn additional_instances_mut(&mut self) -> &mut Vec<Self>;
}

impl<A: Attributes> MultipleInstance for Entity<A> {
	#[inline]
	fn identity_hash(&self) -> &Identifier {
		self.identity()
	}

	#[inline]
	fn additional_instances(&self) -> &[Self] {
		Entity::additional_instances(self)
	}

	#[inline]
	fn additional_instances_mut(&mut self) -> &mut Vec<Self> {
		Entity::additional_instances_mut(self)
	}
}

/// The outcome of [`IdentityRegistry::insert`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Merge {
	/// First record for its identity.
	Primary,
	/// Appended to the additional instances of an existing primary.
	Linked,
}

/// Primary records in insertion order, indexed by identity.
#[derive(Debug, Clone)]
pub struct IdentityRegistry<E> {
	index: HashMap<Identifier, usize>,
	entries: Vec<E>,
}

impl<E> Default for IdentityRegistry<E> {
	fn default() -> Self {
		Self {
			index: HashMap::new(),
			entries: Vec::new(),
		}
	}
}

impl<E: MultipleInstance> IdentityRegistry<E> {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_capacity(capacity: usize) -> Self {
		Self {
			index: HashMap::with_capacity(capacity),
			entries: Vec::with_capacity(capacity),
		}
	}

	pub fn insert(&mut self, instance: E) -> Merge {
		if let Some(&position) = self.index.get(instance.identity_hash()) {
			self.entries[position]
				.additional_instances_mut()
				.push(instance);
			Merge::Linked
		} else {
			self.index
				.insert(instance.identity_hash().clone(), self.entries.len());
			self.entries.push(instance);
			Merge::Primary
		}
	}

	/// Looks a primary up by identity. Padding in `identity` is ignored.
	pub fn get(&self, identity: &str) -> Option<&E> {
		self.index
			.get(normalize(identity))
			.map(|&position| &self.entries[position])
	}

	pub fn get_mut(&mut self, identity: &str) -> Option<&mut E> {
		self.index
			.get(normalize(identity))
			.map(|&position| &mut self.entries[position])
	}

	#[inline]
	pub fn contains(&self, identity: &str) -> bool {
		self.index.contains_key(normalize(identity))
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn iter(&self) -> std::slice::Iter<'_, E> {
		self.entries.iter()
	}

	/// The primary records in the order their identities were first seen.
	pub fn into_entries(self) -> Vec<E> {
		self.entries
	}
}

impl<E: MultipleInstance> Extend<E> for IdentityRegistry<E> {
	fn extend<T: IntoIterator<Item = E>>(&mut self, iter: T) {
		for instance in iter {
			self.insert(instance);
		}
	}
}

impl<E: MultipleInstance> FromIterator<E> for IdentityRegistry<E> {
	fn from_iter<T: IntoIterator<Item = E>>(iter: T) -> Self {
		let mut registry = Self::new();
		registry.extend(iter);
		registry
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::entity::Series;

	fn series(uid: &str, source: &str) -> Series {
		Series::builder()
			.identity(uid)
			.with(|attributes| attributes.source_path = Some(source.to_owned()))
			.build()
			.unwrap()
	}

	#[test]
	fn duplicate_identity_is_linked_to_the_first_record() {
		let mut registry = IdentityRegistry::new();
		assert_eq!(registry.insert(series("1.2.3", "DICOMDIR/A")), Merge::Primary);
		assert_eq!(registry.insert(series("1.2.3\0", "DICOMDIR/B")), Merge::Linked);

		assert_eq!(registry.len(), 1);
		let primary = registry.get("1.2.3").unwrap();
		assert_eq!(
			primary.attributes().source_path.as_deref(),
			Some("DICOMDIR/A")
		);
		assert_eq!(primary.additional_instances().len(), 1);
		assert_eq!(
			primary.additional_instances()[0]
				.attributes()
				.source_path
				.as_deref(),
			Some("DICOMDIR/B")
		);
	}

	#[test]
	fn distinct_identities_keep_insertion_order() {
		let registry: IdentityRegistry<Series> = [
			series("2", "a"),
			series("1", "b"),
			series("2", "c"),
			series("3", "d"),
		]
		.into_iter()
		.collect();

		let order: Vec<_> = registry
			.iter()
			.map(|series| series.identity().as_str().to_owned())
			.collect();
		assert_eq!(order, vec!["2", "1", "3"]);
		assert!(registry.contains("3"));
		assert!(!registry.contains("4"));
	}

	#[test]
	fn padded_lookups_find_the_primary() {
		let mut registry = IdentityRegistry::new();
		registry.insert(series("1.2", "DICOMDIR/A"));

		assert!(registry.contains("1.2\0"));
		assert!(registry.contains(" 1.2"));
		assert!(registry.get("1.2 ").is_some());
		assert!(registry.get_mut("1.2\0").is_some());
		assert!(!registry.contains("1.20"));
	}
}
