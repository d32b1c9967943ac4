use crate::tag::FieldTag;
use dicom::core::PrimitiveValue;
use serde::Deserialize;
use std::fmt::{Display, Formatter};
use thiserror::Error;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
	/// Exact value equality.
	Equals,
	/// Partial match on the string form of the value.
	Like,
}

impl Display for Operator {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Equals => write!(f, "="),
			Self::Like => write!(f, "~"),
		}
	}
}

/// A single filter condition. Values are kept as text: padding trimmed and
/// backslash separated lists split into their values.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
	tag: FieldTag,
	operator: Operator,
	value: PrimitiveValue,
}

impl Constraint {
	pub fn new(
		tag: FieldTag,
		operator: Operator,
		value: impl Into<PrimitiveValue>,
	) -> Result<Self, ConstraintError> {
		if !tag.is_defined() {
			return Err(ConstraintError::UndefinedTag);
		}
		let value: PrimitiveValue = value.into();
		let values: Vec<String> = value
			.to_multi_str()
			.iter()
			.flat_map(|value| value.split('\\'))
			.map(|value| value.trim_matches([' ', '\0']).to_owned())
			.collect();
		if values.is_empty() || values.iter().any(String::is_empty) {
			return Err(ConstraintError::MissingValue(tag));
		}
		// Archives read these as wildcards, the cache would compare them literally.
		if values.iter().any(|value| value.contains(['*', '?'])) {
			return Err(ConstraintError::WildcardValue(tag));
		}
		Ok(Self {
			tag,
			operator,
			value: text_value(values),
		})
	}

	#[inline]
	pub const fn tag(&self) -> FieldTag {
		self.tag
	}

	#[inline]
	pub const fn operator(&self) -> Operator {
		self.operator
	}

	#[inline]
	pub const fn value(&self) -> &PrimitiveValue {
		&self.value
	}

	/// The values in list order. A single value is a list of one.
	pub fn values(&self) -> &[String] {
		match &self.value {
			PrimitiveValue::Str(value) => std::slice::from_ref(value),
			PrimitiveValue::Strs(values) => values.as_slice(),
			_ => &[],
		}
	}
}

/// A single string for one value, a string list otherwise.
pub(crate) fn text_value(values: Vec<String>) -> PrimitiveValue {
	match <[String; 1]>::try_from(values) {
		Ok([value]) => PrimitiveValue::Str(value),
		Err(values) => PrimitiveValue::Strs(values.into_iter().collect()),
	}
}

impl Display for Constraint {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}{}{}", self.tag, self.operator, self.value.to_str())
	}
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConstraintError {
	#[error("Constraints cannot use the undefined tag")]
	UndefinedTag,
	#[error("Constraint on {0} has no value")]
	MissingValue(FieldTag),
	#[error("Constraint on {0} contains a wildcard character")]
	WildcardValue(FieldTag),
}

/// Constraints in insertion order. Append only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintCollection(Vec<Constraint>);

impl ConstraintCollection {
	pub const fn new() -> Self {
		Self(Vec::new())
	}

	pub fn add(
		&mut self,
		tag: FieldTag,
		operator: Operator,
		value: impl Into<PrimitiveValue>,
	) -> Result<&mut Self, ConstraintError> {
		Ok(self.push(Constraint::new(tag, operator, value)?))
	}

	/// Appends an already validated constraint.
	pub fn push(&mut self, constraint: Constraint) -> &mut Self {
		self.0.push(constraint);
		self
	}

	pub fn equals(
		&mut self,
		tag: FieldTag,
		value: impl Into<PrimitiveValue>,
	) -> Result<&mut Self, ConstraintError> {
		self.add(tag, Operator::Equals, value)
	}

	pub fn like(
		&mut self,
		tag: FieldTag,
		value: impl Into<PrimitiveValue>,
	) -> Result<&mut Self, ConstraintError> {
		self.add(tag, Operator::Like, value)
	}

	/// Appends every constraint of `other`, keeping its order.
	pub fn extend(&mut self, other: &Self) -> &mut Self {
		self.0.extend(other.0.iter().cloned());
		self
	}

	pub fn iter(&self) -> std::slice::Iter<'_, Constraint> {
		self.0.iter()
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl<'a> IntoIterator for &'a ConstraintCollection {
	type Item = &'a Constraint;
	type IntoIter = std::slice::Iter<'a, Constraint>;

	fn into_iter(self) -> Self::IntoIter {
		self.0.iter()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn builders_append_in_order() {
		let mut constraints = ConstraintCollection::new();
		constraints
			.equals(FieldTag::StudyInstanceUid, "1.2")
			.unwrap()
			.like(FieldTag::PatientName, "MUSTER")
			.unwrap();

		let collected: Vec<_> = constraints
			.iter()
			.map(|c| (c.tag(), c.operator(), c.value().to_str().into_owned()))
			.collect();
		assert_eq!(
			collected,
			vec![
				(FieldTag::StudyInstanceUid, Operator::Equals, String::from("1.2")),
				(FieldTag::PatientName, Operator::Like, String::from("MUSTER")),
			]
		);
	}

	#[test]
	fn undefined_tag_is_rejected_by_every_builder() {
		let mut constraints = ConstraintCollection::new();
		assert_eq!(
			constraints.equals(FieldTag::Undefined, "x").unwrap_err(),
			ConstraintError::UndefinedTag
		);
		assert_eq!(
			constraints.like(FieldTag::Undefined, "x").unwrap_err(),
			ConstraintError::UndefinedTag
		);
		assert!(constraints.is_empty());
	}

	#[test]
	fn empty_value_is_rejected_by_every_builder() {
		let mut constraints = ConstraintCollection::new();
		assert_eq!(
			constraints
				.equals(FieldTag::PatientId, PrimitiveValue::Empty)
				.unwrap_err(),
			ConstraintError::MissingValue(FieldTag::PatientId)
		);
		assert_eq!(
			constraints
				.like(FieldTag::PatientId, PrimitiveValue::Empty)
				.unwrap_err(),
			ConstraintError::MissingValue(FieldTag::PatientId)
		);
		assert!(constraints.is_empty());
	}

	#[test]
	fn blank_strings_are_missing_values() {
		let mut constraints = ConstraintCollection::new();
		for blank in ["", "  ", "\0", "CT\\"] {
			assert_eq!(
				constraints.equals(FieldTag::StudyDescription, blank).unwrap_err(),
				ConstraintError::MissingValue(FieldTag::StudyDescription)
			);
		}
		assert!(constraints.is_empty());
	}

	#[test]
	fn wildcards_are_rejected() {
		let mut constraints = ConstraintCollection::new();
		assert_eq!(
			constraints.equals(FieldTag::StudyDescription, "C*").unwrap_err(),
			ConstraintError::WildcardValue(FieldTag::StudyDescription)
		);
		assert_eq!(
			constraints.like(FieldTag::PatientName, "M?STER").unwrap_err(),
			ConstraintError::WildcardValue(FieldTag::PatientName)
		);
		assert!(constraints.is_empty());
	}

	#[test]
	fn values_are_trimmed_and_split() {
		let constraint =
			Constraint::new(FieldTag::ModalitiesInStudy, Operator::Equals, "CT\\MR ").unwrap();
		assert_eq!(constraint.values(), ["CT", "MR"]);
		assert_eq!(constraint.value().to_multi_str().len(), 2);

		let constraint =
			Constraint::new(FieldTag::StudyInstanceUid, Operator::Equals, "1.2\0").unwrap();
		assert_eq!(constraint.values(), ["1.2"]);
		assert_eq!(constraint.value(), &PrimitiveValue::from("1.2"));
	}

	#[test]
	fn extend_keeps_both_orders() {
		let mut first = ConstraintCollection::new();
		first.equals(FieldTag::PatientId, "1").unwrap();
		let mut second = ConstraintCollection::new();
		second.like(FieldTag::Modality, "CT").unwrap();

		first.extend(&second);
		assert_eq!(
			first.iter().map(Constraint::tag).collect::<Vec<_>>(),
			vec![FieldTag::PatientId, FieldTag::Modality]
		);
	}

	fn defined_tag() -> impl Strategy<Value = FieldTag> {
		prop_oneof![
			Just(FieldTag::PatientId),
			Just(FieldTag::PatientName),
			Just(FieldTag::StudyInstanceUid),
			Just(FieldTag::StudyDate),
			Just(FieldTag::SeriesInstanceUid),
			Just(FieldTag::Modality),
		]
	}

	proptest! {
		#[test]
		fn each_valid_call_appends_exactly_one(
			calls in prop::collection::vec((defined_tag(), any::<bool>(), "[A-Z0-9.^]{1,16}"), 0..32)
		) {
			let mut constraints = ConstraintCollection::new();
			for (index, (tag, like, value)) in calls.iter().enumerate() {
				if *like {
					constraints.like(*tag, value.as_str()).unwrap();
				} else {
					constraints.equals(*tag, value.as_str()).unwrap();
				}
				prop_assert_eq!(constraints.len(), index + 1);

				let last = constraints.iter().last().unwrap();
				prop_assert_eq!(last.tag(), *tag);
				prop_assert_eq!(last.value(), &PrimitiveValue::from(value.as_str()));
				let operator = if *like { Operator::Like } else { Operator::Equals };
				prop_assert_eq!(last.operator(), operator);
			}
		}
	}
}
