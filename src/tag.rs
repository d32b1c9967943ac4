use dicom::core::Tag;
use dicom::dictionary_std::tags;
use serde::{Deserialize, Deserializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// The DICOM attributes an entity field can be mapped to.
///
/// [`FieldTag::Undefined`] is a reserved placeholder. It has no DICOM tag and is
/// rejected by every constraint and mapping constructor.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum FieldTag {
	#[default]
	Undefined,
	PatientId,
	PatientName,
	PatientBirthDate,
	PatientSex,
	StudyInstanceUid,
	StudyId,
	StudyDate,
	StudyTime,
	StudyDescription,
	AccessionNumber,
	ModalitiesInStudy,
	ReferringPhysicianName,
	SeriesInstanceUid,
	SeriesNumber,
	SeriesDescription,
	Modality,
	NumberOfSeriesRelatedInstances,
}

/// (field tag, DICOM tag, DICOM keyword)
const DICTIONARY: &[(FieldTag, Tag, &str)] = &[
	(FieldTag::PatientId, tags::PATIENT_ID, "PatientID"),
	(FieldTag::PatientName, tags::PATIENT_NAME, "PatientName"),
	(FieldTag::PatientBirthDate, tags::PATIENT_BIRTH_DATE, "PatientBirthDate"),
	(FieldTag::PatientSex, tags::PATIENT_SEX, "PatientSex"),
	(FieldTag::StudyInstanceUid, tags::STUDY_INSTANCE_UID, "StudyInstanceUID"),
	(FieldTag::StudyId, tags::STUDY_ID, "StudyID"),
	(FieldTag::StudyDate, tags::STUDY_DATE, "StudyDate"),
	(FieldTag::StudyTime, tags::STUDY_TIME, "StudyTime"),
	(FieldTag::StudyDescription, tags::STUDY_DESCRIPTION, "StudyDescription"),
	(FieldTag::AccessionNumber, tags::ACCESSION_NUMBER, "AccessionNumber"),
	(FieldTag::ModalitiesInStudy, tags::MODALITIES_IN_STUDY, "ModalitiesInStudy"),
	(
		FieldTag::ReferringPhysicianName,
		tags::REFERRING_PHYSICIAN_NAME,
		"ReferringPhysicianName",
	),
	(FieldTag::SeriesInstanceUid, tags::SERIES_INSTANCE_UID, "SeriesInstanceUID"),
	(FieldTag::SeriesNumber, tags::SERIES_NUMBER, "SeriesNumber"),
	(FieldTag::SeriesDescription, tags::SERIES_DESCRIPTION, "SeriesDescription"),
	(FieldTag::Modality, tags::MODALITY, "Modality"),
	(
		FieldTag::NumberOfSeriesRelatedInstances,
		tags::NUMBER_OF_SERIES_RELATED_INSTANCES,
		"NumberOfSeriesRelatedInstances",
	),
];

impl FieldTag {
	#[inline]
	pub const fn is_defined(self) -> bool {
		!matches!(self, Self::Undefined)
	}

	/// The DICOM tag of this attribute, or `None` for [`FieldTag::Undefined`].
	pub fn dicom_tag(self) -> Option<Tag> {
		DICTIONARY
			.iter()
			.find(|(field_tag, ..)| *field_tag == self)
			.map(|(_, tag, _)| *tag)
	}

	/// The DICOM keyword of this attribute, or `None` for [`FieldTag::Undefined`].
	pub fn keyword(self) -> Option<&'static str> {
		DICTIONARY
			.iter()
			.find(|(field_tag, ..)| *field_tag == self)
			.map(|(.., keyword)| *keyword)
	}

	pub fn from_dicom_tag(tag: Tag) -> Option<Self> {
		DICTIONARY
			.iter()
			.find(|(_, dicom_tag, _)| *dicom_tag == tag)
			.map(|(field_tag, ..)| *field_tag)
	}
}

impl Display for FieldTag {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.keyword().unwrap_or("Undefined"))
	}
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown attribute keyword '{0}'")]
pub struct UnknownKeyword(pub String);

impl FromStr for FieldTag {
	type Err = UnknownKeyword;

	/// Parses a DICOM keyword (`PatientID`). `Undefined` is not a keyword and is
	/// never produced.
	fn from_str(keyword: &str) -> Result<Self, Self::Err> {
		DICTIONARY
			.iter()
			.find(|(.., known)| known.eq_ignore_ascii_case(keyword))
			.map(|(field_tag, ..)| *field_tag)
			.ok_or_else(|| UnknownKeyword(keyword.to_owned()))
	}
}

impl<'de> Deserialize<'de> for FieldTag {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let keyword = String::deserialize(deserializer)?;
		keyword.parse().map_err(serde::de::Error::custom)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn undefined_has_no_dicom_tag() {
		assert!(!FieldTag::Undefined.is_defined());
		assert_eq!(FieldTag::Undefined.dicom_tag(), None);
		assert_eq!(FieldTag::Undefined.to_string(), "Undefined");
	}

	#[test]
	fn keywords_round_trip_through_dicom_tags() {
		for (field_tag, tag, keyword) in DICTIONARY {
			assert_eq!(field_tag.dicom_tag(), Some(*tag));
			assert_eq!(FieldTag::from_dicom_tag(*tag), Some(*field_tag));
			assert_eq!(keyword.parse::<FieldTag>(), Ok(*field_tag));
		}
	}

	#[test]
	fn parse_keyword() {
		assert_eq!("PatientID".parse(), Ok(FieldTag::PatientId));
		assert_eq!("studyinstanceuid".parse(), Ok(FieldTag::StudyInstanceUid));
		assert_eq!(
			"Undefined".parse::<FieldTag>(),
			Err(UnknownKeyword(String::from("Undefined")))
		);
	}
}
