use dicom::core::PrimitiveValue;
use dicom::dictionary_std::uids;
use serde::Deserialize;
use std::fmt::{Display, Formatter};

/// UI (Unique Identifier) value representation.
pub type UI = String;

/// US (Unsigned Short) value representation.
pub type US = u16;

/// AE (Application Entity) value representation.
pub type AE = String;

/// Priority (0000,0700) values for DIMSE operations.
#[derive(Debug, Copy, Clone, Default)]
pub enum Priority {
	Low = 0x0002,
	#[default]
	Medium = 0x0000,
	High = 0x0001,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum QueryInformationModel {
	#[default]
	Study,
	Patient,
}

impl QueryInformationModel {
	/// The information model a lookup at the given level is addressed to.
	/// Patients live at the top of the Patient Root model, everything else is
	/// queried relative to the Study Root.
	pub const fn for_level(level: QueryRetrieveLevel) -> Self {
		match level {
			QueryRetrieveLevel::Patient => Self::Patient,
			QueryRetrieveLevel::Study | QueryRetrieveLevel::Series => Self::Study,
		}
	}

	pub const fn as_find_sop_class(&self) -> &str {
		match self {
			Self::Study => uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_FIND,
			Self::Patient => uids::PATIENT_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_FIND,
		}
	}

	pub const fn as_move_sop_class(&self) -> &str {
		match self {
			Self::Study => uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_MOVE,
			Self::Patient => uids::PATIENT_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_MOVE,
		}
	}
}

/// The query/retrieve level of a lookup. Doubles as the entity kind of the
/// records the lookup yields.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryRetrieveLevel {
	Patient,
	Study,
	Series,
}

impl Display for QueryRetrieveLevel {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Patient => write!(f, "PATIENT"),
			Self::Study => write!(f, "STUDY"),
			Self::Series => write!(f, "SERIES"),
		}
	}
}

impl From<QueryRetrieveLevel> for PrimitiveValue {
	fn from(level: QueryRetrieveLevel) -> Self {
		Self::Str(level.to_string())
	}
}
