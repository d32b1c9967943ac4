use crate::entity::{Attributes, Entity};
use crate::mapping::FieldDeclaration;
use crate::tag::FieldTag;
use crate::types::QueryRetrieveLevel;

type Field = FieldDeclaration<PatientAttributes>;

pub type Patient = Entity<PatientAttributes>;

/// Patient module attributes. The Patient ID is the identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientAttributes {
	pub patient_name: Option<String>,
	pub birth_date: Option<String>,
	pub sex: Option<String>,
}

impl Attributes for PatientAttributes {
	const LEVEL: QueryRetrieveLevel = QueryRetrieveLevel::Patient;
	const NAME: &'static str = "Patient";

	fn declare() -> Vec<Field> {
		vec![
			Field::identity("patient_id").tagged(FieldTag::PatientId),
			Field::attribute(
				"patient_name",
				|a| a.patient_name.as_deref(),
				|a, v| a.patient_name = Some(v),
			)
			.tagged(FieldTag::PatientName),
			Field::attribute(
				"birth_date",
				|a| a.birth_date.as_deref(),
				|a, v| a.birth_date = Some(v),
			)
			.tagged(FieldTag::PatientBirthDate),
			Field::attribute("sex", |a| a.sex.as_deref(), |a, v| a.sex = Some(v))
				.tagged(FieldTag::PatientSex),
		]
	}
}
