use crate::protocol::dimse::{next_message_id, DicomMessage, DATA_SET_EXISTS};
use crate::protocol::{MoveRequest, ProtocolError};
use crate::types::{Priority, AE, UI, US};
use dicom::core::{DataElement, VR};
use dicom::dicom_value;
use dicom::dictionary_std::tags;
use dicom::object::InMemDicomObject;

// Magic numbers defined by the DICOM specification.
pub const COMMAND_FIELD_COMPOSITE_MOVE_REQUEST: US = 0x0021;

/// C-MOVE-RQ
/// <https://dicom.nema.org/medical/dicom/current/output/chtml/part07/sect_9.3.4.html>
pub struct CompositeMoveRequest {
	pub message_id: US,
	pub priority: Priority,
	pub affected_sop_class_uid: UI,
	pub destination: AE,
	pub identifier: InMemDicomObject,
}

impl CompositeMoveRequest {
	/// Prepares the C-MOVE-RQ of a retrieve with a fresh message id.
	pub fn for_retrieve(request: &MoveRequest) -> Result<Self, ProtocolError> {
		Ok(Self {
			message_id: next_message_id(),
			priority: Priority::default(),
			affected_sop_class_uid: UI::from(request.information_model.as_move_sop_class()),
			destination: request.destination.clone(),
			identifier: request.identifier()?,
		})
	}
}

impl From<CompositeMoveRequest> for DicomMessage {
	#[rustfmt::skip]
	fn from(request: CompositeMoveRequest) -> Self {
		let command = InMemDicomObject::command_from_element_iter([
			DataElement::new(tags::AFFECTED_SOP_CLASS_UID, VR::UI, dicom_value!(Str, request.affected_sop_class_uid)),
			DataElement::new(tags::COMMAND_FIELD, VR::US, dicom_value!(U16, [COMMAND_FIELD_COMPOSITE_MOVE_REQUEST])),
			DataElement::new(tags::MESSAGE_ID, VR::US, dicom_value!(U16, [request.message_id])),
			DataElement::new(tags::PRIORITY, VR::US, dicom_value!(U16, [request.priority as US])),
			DataElement::new(tags::MOVE_DESTINATION, VR::AE, dicom_value!(Str, request.destination)),
			DataElement::new(tags::COMMAND_DATA_SET_TYPE, VR::US, dicom_value!(U16, [DATA_SET_EXISTS])),
		]);

		Self {
			command,
			data: Some(request.identifier),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::identifier::Identifier;
	use crate::tag::FieldTag;
	use crate::types::{QueryInformationModel, QueryRetrieveLevel};
	use dicom::object::mem::InMemElement;

	#[test]
	fn move_command_names_destination() {
		let retrieve = MoveRequest {
			destination: AE::from("STORESCP"),
			level: QueryRetrieveLevel::Study,
			information_model: QueryInformationModel::Study,
			keys: vec![(FieldTag::StudyInstanceUid, Identifier::new("1.2.3"))],
		};
		let message = DicomMessage::from(CompositeMoveRequest::for_retrieve(&retrieve).unwrap());

		let destination = message
			.command
			.get(tags::MOVE_DESTINATION)
			.map(InMemElement::to_str)
			.and_then(Result::ok)
			.map(|value| value.trim_end().to_owned());
		assert_eq!(destination.as_deref(), Some("STORESCP"));
		assert!(message
			.data
			.is_some_and(|identifier| identifier.get(tags::STUDY_INSTANCE_UID).is_some()));
	}
}
