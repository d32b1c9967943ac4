//! Patients, studies and series as retrieved from an archive.
//!
//! Every kind is an [`Entity`] over its own [`Attributes`] set. Entities are
//! assembled through an [`EntityBuilder`], the only place where the identifying
//! field can be written. Hashing and equality are only available on the finished
//! [`Entity`], so an identity cannot change after the entity entered a hash-based
//! container.

mod patient;
mod series;
mod study;

pub use patient::{Patient, PatientAttributes};
pub use series::{Series, SeriesAttributes};
pub use study::{Study, StudyAttributes};

use crate::identifier::Identifier;
use crate::mapping::{AttributeMapping, FieldDeclaration};
use crate::tag::FieldTag;
use crate::types::QueryRetrieveLevel;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use thiserror::Error;

/// The descriptive attributes of one entity kind, together with the declaration
/// table that maps its fields to DICOM attributes.
pub trait Attributes: Default + Clone + Debug + PartialEq + Send + Sync + 'static {
	/// The level a lookup for this kind runs at.
	const LEVEL: QueryRetrieveLevel;

	/// Human readable kind name used in errors and logs.
	const NAME: &'static str;

	/// Declares the fields of this kind in order. Fields without a tag are kept
	/// out of the mapping.
	fn declare() -> Vec<FieldDeclaration<Self>>;

	/// Keys of enclosing entities that a retrieve at [`Self::LEVEL`] must carry.
	fn parent_keys(&self) -> Vec<(FieldTag, Identifier)> {
		Vec::new()
	}
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntityError {
	#[error("{0} record has no identifying value")]
	MissingIdentity(&'static str),
	#[error("Identifying field {0} cannot change once the entity is built")]
	IdentityFrozen(FieldTag),
	#[error("{kind} has no field mapped to {tag}")]
	UnmappedField { kind: &'static str, tag: FieldTag },
}

/// A finished, hashable entity.
#[derive(Debug, Clone)]
pub struct Entity<A: Attributes> {
	identity: Identifier,
	attributes: A,
	additional_instances: Vec<Self>,
}

impl<A: Attributes> Entity<A> {
	pub fn builder() -> EntityBuilder<A> {
		EntityBuilder::default()
	}

	#[inline]
	pub const fn identity(&self) -> &Identifier {
		&self.identity
	}

	#[inline]
	pub const fn attributes(&self) -> &A {
		&self.attributes
	}

	/// Descriptive attributes stay writable after the entity is built.
	#[inline]
	pub fn attributes_mut(&mut self) -> &mut A {
		&mut self.attributes
	}

	/// Other records found for the same identity, in the order they were merged.
	#[inline]
	pub fn additional_instances(&self) -> &[Self] {
		&self.additional_instances
	}

	pub(crate) fn additional_instances_mut(&mut self) -> &mut Vec<Self> {
		&mut self.additional_instances
	}

	/// Writes a mapped field. Writing the identifying field always fails here.
	pub fn assign(
		&mut self,
		mapping: &AttributeMapping<A>,
		tag: FieldTag,
		value: impl Into<String>,
	) -> Result<(), EntityError> {
		let descriptor = mapping.descriptor(tag).ok_or(EntityError::UnmappedField {
			kind: A::NAME,
			tag,
		})?;
		if descriptor.is_identity() {
			return Err(EntityError::IdentityFrozen(tag));
		}
		descriptor.write(&mut self.attributes, value.into());
		Ok(())
	}

	/// Splits a merged entity into its primary record followed by every linked
	/// record, each without links of its own.
	pub fn into_instances(mut self) -> Vec<Self> {
		let linked = std::mem::take(&mut self.additional_instances);
		let mut instances = vec![self];
		for instance in linked {
			instances.extend(instance.into_instances());
		}
		instances
	}

	/// Whether both records carry the same identity and the same attribute values.
	pub fn same_payload(&self, other: &Self) -> bool {
		self.identity == other.identity && self.attributes == other.attributes
	}

	/// Returns the builder state again, dropping merged instances.
	pub fn into_builder(self) -> EntityBuilder<A> {
		EntityBuilder {
			identity: Some(self.identity),
			attributes: self.attributes,
		}
	}
}

impl<A: Attributes> PartialEq for Entity<A> {
	fn eq(&self, other: &Self) -> bool {
		self.identity == other.identity
	}
}

impl<A: Attributes> Eq for Entity<A> {}

impl<A: Attributes> Hash for Entity<A> {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.identity.hash(state);
	}
}

/// The mutable, not yet hashable state of an entity.
#[derive(Debug, Clone, Default)]
pub struct EntityBuilder<A: Attributes> {
	identity: Option<Identifier>,
	attributes: A,
}

impl<A: Attributes> EntityBuilder<A> {
	pub fn identity(mut self, identity: impl Into<Identifier>) -> Self {
		self.identity = Some(identity.into());
		self
	}

	pub fn attributes(mut self, attributes: A) -> Self {
		self.attributes = attributes;
		self
	}

	pub fn with(mut self, update: impl FnOnce(&mut A)) -> Self {
		update(&mut self.attributes);
		self
	}

	/// Writes any mapped field, the identifying one included.
	pub fn assign(
		&mut self,
		mapping: &AttributeMapping<A>,
		tag: FieldTag,
		value: impl Into<String>,
	) -> Result<(), EntityError> {
		let descriptor = mapping.descriptor(tag).ok_or(EntityError::UnmappedField {
			kind: A::NAME,
			tag,
		})?;
		let value = value.into();
		if descriptor.is_identity() {
			self.identity = Some(Identifier::new(value));
		} else {
			descriptor.write(&mut self.attributes, value);
		}
		Ok(())
	}

	pub fn build(self) -> Result<Entity<A>, EntityError> {
		let identity = self
			.identity
			.filter(|identity| !identity.as_str().is_empty())
			.ok_or(EntityError::MissingIdentity(A::NAME))?;
		Ok(Entity {
			identity,
			attributes: self.attributes,
			additional_instances: Vec::new(),
		})
	}
}
