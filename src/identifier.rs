use dicom::core::PrimitiveValue;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// A normalized, opaque identity such as a Patient ID or a Study Instance UID.
///
/// DICOM pads odd-length values (spaces for text, NUL for UIDs), so the same UID
/// can arrive as `"1.2"` from one archive and `"1.2\0"` from another.
/// Normalization strips that padding once, at construction, and equality and
/// hashing only ever see the normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
	pub fn new(raw: impl AsRef<str>) -> Self {
		Self(normalize(raw.as_ref()).to_owned())
	}

	#[inline]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

/// The normalized form of `raw`, without allocating.
pub(crate) fn normalize(raw: &str) -> &str {
	raw.trim_end_matches(['\0', ' ']).trim_start_matches(' ')
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentifierError {
	#[error("Cannot create an identifier from an empty value")]
	Empty,
}

impl TryFrom<&PrimitiveValue> for Identifier {
	type Error = IdentifierError;

	fn try_from(value: &PrimitiveValue) -> Result<Self, Self::Error> {
		match value {
			PrimitiveValue::Empty => Err(IdentifierError::Empty),
			value => Ok(Self::new(value.to_str())),
		}
	}
}

impl From<String> for Identifier {
	fn from(raw: String) -> Self {
		Self::new(raw)
	}
}

impl From<&str> for Identifier {
	fn from(raw: &str) -> Self {
		Self::new(raw)
	}
}

impl From<Identifier> for String {
	fn from(identifier: Identifier) -> Self {
		identifier.0
	}
}

impl AsRef<str> for Identifier {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl Borrow<str> for Identifier {
	fn borrow(&self) -> &str {
		&self.0
	}
}

impl Display for Identifier {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<Identifier> for PrimitiveValue {
	fn from(identifier: Identifier) -> Self {
		Self::Str(identifier.0)
	}
}
