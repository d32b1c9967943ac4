//! Mapping between entity fields and the DICOM attributes they are exchanged as.
//!
//! Each [`Attributes`] kind publishes a declaration table. [`AttributeMapping::build`]
//! validates it once and keeps the tagged fields in declaration order.

use crate::entity::{Attributes, Entity, EntityError};
use crate::tag::FieldTag;
use dicom::object::InMemDicomObject;
use std::collections::HashSet;
use std::fmt::{Debug, Formatter};
use thiserror::Error;
use tracing::trace;

pub type ReadFn<A> = for<'a> fn(&'a A) -> Option<&'a str>;
pub type WriteFn<A> = fn(&mut A, String);

enum FieldAccess<A> {
	Identity,
	Attribute { read: ReadFn<A>, write: WriteFn<A> },
}

impl<A> Clone for FieldAccess<A> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<A> Copy for FieldAccess<A> {}

/// Describes how to read and write one field of an entity kind.
pub struct FieldDescriptor<A> {
	name: &'static str,
	access: FieldAccess<A>,
}

impl<A> Clone for FieldDescriptor<A> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<A> Copy for FieldDescriptor<A> {}

impl<A> Debug for FieldDescriptor<A> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FieldDescriptor")
			.field("name", &self.name)
			.field("identity", &self.is_identity())
			.finish()
	}
}

impl<A> FieldDescriptor<A> {
	#[inline]
	pub const fn name(&self) -> &'static str {
		self.name
	}

	#[inline]
	pub const fn is_identity(&self) -> bool {
		matches!(self.access, FieldAccess::Identity)
	}

	/// Writes a descriptive value. Identity fields are written by the entity builder.
	pub(crate) fn write(&self, attributes: &mut A, value: String) {
		if let FieldAccess::Attribute { write, .. } = self.access {
			write(attributes, value);
		}
	}
}

/// One row of a declaration table: a field and, if annotated, its tag.
pub struct FieldDeclaration<A> {
	descriptor: FieldDescriptor<A>,
	tag: Option<FieldTag>,
}

impl<A> FieldDeclaration<A> {
	/// The field holding the entity's identity.
	pub fn identity(name: &'static str) -> Self {
		Self {
			descriptor: FieldDescriptor {
				name,
				access: FieldAccess::Identity,
			},
			tag: None,
		}
	}

	pub fn attribute(name: &'static str, read: ReadFn<A>, write: WriteFn<A>) -> Self {
		Self {
			descriptor: FieldDescriptor {
				name,
				access: FieldAccess::Attribute { read, write },
			},
			tag: None,
		}
	}

	/// Annotates the field with the attribute it maps to.
	#[must_use]
	pub fn tagged(mut self, tag: FieldTag) -> Self {
		self.tag = Some(tag);
		self
	}
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
	#[error("{0} declares no mapped fields")]
	NoMappedFields(&'static str),
	#[error("{kind}.{field} is mapped to the undefined tag")]
	UndefinedTag { kind: &'static str, field: &'static str },
	#[error("{kind} maps {tag} more than once")]
	DuplicateTag { kind: &'static str, tag: FieldTag },
	#[error("{0} does not map its identifying field")]
	UnmappedIdentity(&'static str),
}

/// The validated, read-only field mapping of one entity kind.
pub struct AttributeMapping<A> {
	fields: Vec<(FieldDescriptor<A>, FieldTag)>,
	identity: FieldTag,
}

impl<A> Debug for AttributeMapping<A> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AttributeMapping")
			.field("fields", &self.fields)
			.field("identity", &self.identity)
			.finish()
	}
}

impl<A: Attributes> AttributeMapping<A> {
	pub fn build() -> Result<Self, MappingError> {
		let mut fields = Vec::new();
		let mut seen = HashSet::new();

		for declaration in A::declare() {
			let Some(tag) = declaration.tag else {
				trace!(kind = A::NAME, field = declaration.descriptor.name, "Field is not mapped");
				continue;
			};
			if !tag.is_defined() {
				return Err(MappingError::UndefinedTag {
					kind: A::NAME,
					field: declaration.descriptor.name,
				});
			}
			if !seen.insert(tag) {
				return Err(MappingError::DuplicateTag { kind: A::NAME, tag });
			}
			fields.push((declaration.descriptor, tag));
		}

		if fields.is_empty() {
			return Err(MappingError::NoMappedFields(A::NAME));
		}

		let identity = fields
			.iter()
			.find(|(descriptor, _)| descriptor.is_identity())
			.map(|(_, tag)| *tag)
			.ok_or(MappingError::UnmappedIdentity(A::NAME))?;

		Ok(Self { fields, identity })
	}

	/// The mapped tags in declaration order.
	pub fn tags(&self) -> impl Iterator<Item = FieldTag> + '_ {
		self.fields.iter().map(|(_, tag)| *tag)
	}

	pub fn fields(&self) -> impl Iterator<Item = (&FieldDescriptor<A>, FieldTag)> {
		self.fields.iter().map(|(descriptor, tag)| (descriptor, *tag))
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.fields.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}

	#[inline]
	pub const fn identity_tag(&self) -> FieldTag {
		self.identity
	}

	pub fn contains(&self, tag: FieldTag) -> bool {
		self.descriptor(tag).is_some()
	}

	pub fn descriptor(&self, tag: FieldTag) -> Option<&FieldDescriptor<A>> {
		self.fields
			.iter()
			.find(|(_, mapped)| *mapped == tag)
			.map(|(descriptor, _)| descriptor)
	}

	/// Reads the string form of a mapped field.
	pub fn read<'e>(&self, entity: &'e Entity<A>, tag: FieldTag) -> Option<&'e str> {
		match self.descriptor(tag)?.access {
			FieldAccess::Identity => Some(entity.identity().as_str()),
			FieldAccess::Attribute { read, .. } => read(entity.attributes()),
		}
	}

	/// Reads the values of a mapped field. Multi-valued attributes are stored in
	/// their backslash separated form and come back one value at a time.
	pub fn read_values<'e>(
		&self,
		entity: &'e Entity<A>,
		tag: FieldTag,
	) -> impl Iterator<Item = &'e str> + 'e {
		self.read(entity, tag)
			.into_iter()
			.flat_map(|value| value.split('\\'))
			.map(|value| value.trim_matches([' ', '\0']))
			.filter(|value| !value.is_empty())
	}

	/// Builds an entity from a C-FIND response data set. Attributes that are
	/// absent, empty or not representable as text are left unset.
	pub fn decode(&self, record: &InMemDicomObject) -> Result<Entity<A>, EntityError> {
		let mut builder = Entity::<A>::builder();
		for (_, tag) in &self.fields {
			let Some(dicom_tag) = tag.dicom_tag() else {
				continue;
			};
			let Some(element) = record.get(dicom_tag) else {
				continue;
			};
			let Ok(value) = element.to_str() else {
				continue;
			};
			let value = value.trim_end_matches(['\0', ' ']);
			if !value.is_empty() {
				builder.assign(self, *tag, value)?;
			}
		}
		builder.build()
	}
}
