use crate::protocol::dimse::{next_message_id, DicomMessage, DATA_SET_EXISTS};
use crate::protocol::{FindRequest, ProtocolError};
use crate::types::{Priority, UI, US};
use dicom::core::{DataElement, VR};
use dicom::dicom_value;
use dicom::dictionary_std::tags;
use dicom::object::InMemDicomObject;

// Magic numbers defined by the DICOM specification.
pub const COMMAND_FIELD_COMPOSITE_FIND_REQUEST: US = 0x0020;

/// C-FIND-RQ
/// <https://dicom.nema.org/medical/dicom/current/output/chtml/part07/chapter_9.html#table_9.1-2>
pub struct CompositeFindRequest {
	pub message_id: US,
	pub priority: Priority,
	pub affected_sop_class_uid: UI,
	pub identifier: InMemDicomObject,
}

impl CompositeFindRequest {
	/// Prepares the C-FIND-RQ of a lookup with a fresh message id.
	pub fn for_lookup(request: &FindRequest) -> Result<Self, ProtocolError> {
		Ok(Self {
			message_id: next_message_id(),
			priority: Priority::default(),
			affected_sop_class_uid: UI::from(request.information_model.as_find_sop_class()),
			identifier: request.identifier()?,
		})
	}
}

impl From<CompositeFindRequest> for DicomMessage {
	#[rustfmt::skip]
	fn from(request: CompositeFindRequest) -> Self {
		let command = InMemDicomObject::command_from_element_iter([
			DataElement::new(tags::AFFECTED_SOP_CLASS_UID, VR::UI, dicom_value!(Str, request.affected_sop_class_uid)),
			DataElement::new(tags::COMMAND_FIELD, VR::US, dicom_value!(U16, [COMMAND_FIELD_COMPOSITE_FIND_REQUEST])),
			DataElement::new(tags::MESSAGE_ID, VR::US, dicom_value!(U16, [request.message_id])),
			DataElement::new(tags::PRIORITY, VR::US, dicom_value!(U16, [request.priority as US])),
			DataElement::new(tags::COMMAND_DATA_SET_TYPE, VR::US, dicom_value!(U16, [DATA_SET_EXISTS])),
		]);

		Self {
			command,
			data: Some(request.identifier),
		}
	}
}
