use crate::entity::{Attributes, Entity};
use crate::mapping::FieldDeclaration;
use crate::tag::FieldTag;
use crate::types::QueryRetrieveLevel;

type Field = FieldDeclaration<StudyAttributes>;

pub type Study = Entity<StudyAttributes>;

/// Study level attributes, including the patient keys a Study Root lookup returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudyAttributes {
	pub patient_id: Option<String>,
	pub patient_name: Option<String>,
	pub study_id: Option<String>,
	pub study_date: Option<String>,
	pub study_time: Option<String>,
	pub study_description: Option<String>,
	pub accession_number: Option<String>,
	pub modalities_in_study: Option<String>,
	pub referring_physician_name: Option<String>,
}

impl Attributes for StudyAttributes {
	const LEVEL: QueryRetrieveLevel = QueryRetrieveLevel::Study;
	const NAME: &'static str = "Study";

	#[rustfmt::skip]
	fn declare() -> Vec<Field> {
		vec![
			Field::identity("study_instance_uid").tagged(FieldTag::StudyInstanceUid),
			Field::attribute("patient_id", |a| a.patient_id.as_deref(), |a, v| a.patient_id = Some(v))
				.tagged(FieldTag::PatientId),
			Field::attribute("patient_name", |a| a.patient_name.as_deref(), |a, v| a.patient_name = Some(v))
				.tagged(FieldTag::PatientName),
			Field::attribute("study_id", |a| a.study_id.as_deref(), |a, v| a.study_id = Some(v))
				.tagged(FieldTag::StudyId),
			Field::attribute("study_date", |a| a.study_date.as_deref(), |a, v| a.study_date = Some(v))
				.tagged(FieldTag::StudyDate),
			Field::attribute("study_time", |a| a.study_time.as_deref(), |a, v| a.study_time = Some(v))
				.tagged(FieldTag::StudyTime),
			Field::attribute("study_description", |a| a.study_description.as_deref(), |a, v| a.study_description = Some(v))
				.tagged(FieldTag::StudyDescription),
			Field::attribute("accession_number", |a| a.accession_number.as_deref(), |a, v| a.accession_number = Some(v))
				.tagged(FieldTag::AccessionNumber),
			Field::attribute("modalities_in_study", |a| a.modalities_in_study.as_deref(), |a, v| a.modalities_in_study = Some(v))
				.tagged(FieldTag::ModalitiesInStudy),
			Field::attribute("referring_physician_name", |a| a.referring_physician_name.as_deref(), |a, v| a.referring_physician_name = Some(v))
				.tagged(FieldTag::ReferringPhysicianName),
		]
	}
}
