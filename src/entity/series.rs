use crate::entity::{Attributes, Entity};
use crate::identifier::Identifier;
use crate::mapping::FieldDeclaration;
use crate::tag::FieldTag;
use crate::types::QueryRetrieveLevel;

type Field = FieldDeclaration<SeriesAttributes>;

pub type Series = Entity<SeriesAttributes>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesAttributes {
	pub study_instance_uid: Option<String>,
	pub modality: Option<String>,
	pub series_number: Option<String>,
	pub series_description: Option<String>,
	pub number_of_instances: Option<String>,
	/// Where the series was read from when it came out of a local archive.
	/// Not a DICOM attribute, so it is never sent to or matched against a PACS.
	pub source_path: Option<String>,
}

impl Attributes for SeriesAttributes {
	const LEVEL: QueryRetrieveLevel = QueryRetrieveLevel::Series;
	const NAME: &'static str = "Series";

	#[rustfmt::skip]
	fn declare() -> Vec<Field> {
		vec![
			Field::identity("series_instance_uid").tagged(FieldTag::SeriesInstanceUid),
			Field::attribute("study_instance_uid", |a| a.study_instance_uid.as_deref(), |a, v| a.study_instance_uid = Some(v))
				.tagged(FieldTag::StudyInstanceUid),
			Field::attribute("modality", |a| a.modality.as_deref(), |a, v| a.modality = Some(v))
				.tagged(FieldTag::Modality),
			Field::attribute("series_number", |a| a.series_number.as_deref(), |a, v| a.series_number = Some(v))
				.tagged(FieldTag::SeriesNumber),
			Field::attribute("series_description", |a| a.series_description.as_deref(), |a, v| a.series_description = Some(v))
				.tagged(FieldTag::SeriesDescription),
			Field::attribute("number_of_instances", |a| a.number_of_instances.as_deref(), |a, v| a.number_of_instances = Some(v))
				.tagged(FieldTag::NumberOfSeriesRelatedInstances),
			Field::attribute("source_path", |a| a.source_path.as_deref(), |a, v| a.source_path = Some(v)),
		]
	}

	/// A Study Root retrieve of a series also names its study.
	fn parent_keys(&self) -> Vec<(FieldTag, Identifier)> {
		self.study_instance_uid
			.as_deref()
			.map(|uid| vec![(FieldTag::StudyInstanceUid, Identifier::new(uid))])
			.unwrap_or_default()
	}
}
