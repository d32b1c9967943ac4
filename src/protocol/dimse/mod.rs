//! A [`ProtocolHandler`](super::ProtocolHandler) speaking DIMSE over `dicom-ul`.
//! - Lookups are C-FIND requests (find service class user).
//! - Retrieves are C-MOVE requests (move service class user). The move destination
//!   must run its own storage service class provider.
//!

mod cfind;
mod cmove;
mod handler;

pub use handler::{DimseProtocolHandler, DimseSettings};

use crate::protocol::ProtocolError;
use crate::types::{UI, US};
use dicom::dictionary_std::tags;
use dicom::encoding::{TransferSyntax, TransferSyntaxIndex};
use dicom::object::mem::InMemElement;
use dicom::object::InMemDicomObject;
use dicom::transfer_syntax::entries::IMPLICIT_VR_LITTLE_ENDIAN;
use dicom::transfer_syntax::TransferSyntaxRegistry;
use dicom::ul::pdu::{PDataValue, PDataValueType, PresentationContextNegotiated};
use dicom::ul::Pdu;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU16, Ordering};
use tracing::trace;

/// Should be set for [`tags::COMMAND_DATA_SET_TYPE`] if a DICOM message contains a data set.
/// For reading DICOM messages, prefer checking if (command_data_set_type != DATA_SET_MISSING) as
/// AEs are free to choose another value for a truthy state.
pub const DATA_SET_EXISTS: US = 0x0102;
/// Should be set for [`tags::COMMAND_DATA_SET_TYPE`] if a DICOM message has no data set.
pub const DATA_SET_MISSING: US = 0x0101; // DICOM NULL

/// Represents a DICOM message composed of a command set followed by an optional data set.
/// <https://dicom.nema.org/medical/dicom/current/output/chtml/part07/sect_6.3.html>
pub struct DicomMessage {
	/// The command set.
	pub command: InMemDicomObject,
	/// The data set.
	pub data: Option<InMemDicomObject>,
}

impl Debug for DicomMessage {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		if self.data.is_some() {
			write!(f, "DicomMessage {{ command, data }}")
		} else {
			write!(f, "DicomMessage {{ command }}")
		}
	}
}

impl DicomMessage {
	/// The Status (0000,0900) of a response message.
	pub fn status(&self) -> Result<US, ProtocolError> {
		self.command
			.get(tags::STATUS)
			.map(InMemElement::to_int::<US>)
			.and_then(Result::ok)
			.ok_or(ProtocolError::MissingAttribute(tags::STATUS))
	}

	/// Encodes the message as P-DATA-TF PDUs on the given presentation context.
	pub fn into_pdus(
		self,
		presentation_context: &PresentationContextNegotiated,
	) -> Result<Vec<Pdu>, ProtocolError> {
		let mut command_buf = Vec::new();
		self.command
			.write_dataset_with_ts(&mut command_buf, &IMPLICIT_VR_LITTLE_ENDIAN.erased())?;

		let mut pdus = vec![Pdu::PData {
			data: vec![PDataValue {
				value_type: PDataValueType::Command,
				presentation_context_id: presentation_context.id,
				is_last: true,
				data: command_buf,
			}],
		}];

		if let Some(data) = self.data {
			let transfer_syntax = transfer_syntax_of(presentation_context)?;
			let mut data_buf = Vec::new();
			data.write_dataset_with_ts(&mut data_buf, transfer_syntax)?;

			pdus.push(Pdu::PData {
				data: vec![PDataValue {
					value_type: PDataValueType::Data,
					presentation_context_id: presentation_context.id,
					is_last: true,
					data: data_buf,
				}],
			});
		}

		Ok(pdus)
	}
}

fn transfer_syntax_of(
	presentation_context: &PresentationContextNegotiated,
) -> Result<&'static TransferSyntax, ProtocolError> {
	let uid = presentation_context.transfer_syntax.trim_end_matches('\0');
	TransferSyntaxRegistry
		.get(uid)
		.ok_or_else(|| ProtocolError::UnknownTransferSyntax(UI::from(uid)))
}

/// Status types supported by the DIMSE services.
/// <https://dicom.nema.org/medical/dicom/current/output/chtml/part07/chapter_C.html>
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StatusType {
	Success,
	Warning,
	Failure,
	Cancel,
	Pending,
}

impl TryFrom<u16> for StatusType {
	type Error = u16;

	/// <https://dicom.nema.org/medical/dicom/current/output/chtml/part07/chapter_C.html>
	fn try_from(value: u16) -> Result<Self, Self::Error> {
		match value {
			0 => Ok(Self::Success),
			1 | 0x0107 | 0x0116 | 0xB000..=0xBFFF => Ok(Self::Warning),
			0xA000..=0xAFFF | 0x0100..=0x01FF | 0x0200..=0x02FF | 0xC000..=0xCFFF => {
				Ok(Self::Failure)
			}
			0xFE00 => Ok(Self::Cancel),
			0xFF00 | 0xFF01 => Ok(Self::Pending),
			_ => Err(value),
		}
	}
}

/// Reassembles DICOM messages from the P-DATA fragments of one association.
pub struct MessageAssembler<'a> {
	presentation_contexts: &'a [PresentationContextNegotiated],
	command_fragments: Vec<u8>,
	data_fragments: Vec<u8>,
	command: Option<InMemDicomObject>,
}

impl<'a> MessageAssembler<'a> {
	pub const fn new(presentation_contexts: &'a [PresentationContextNegotiated]) -> Self {
		Self {
			presentation_contexts,
			command_fragments: Vec::new(),
			data_fragments: Vec::new(),
			command: None,
		}
	}

	/// Feeds one PDU. Returns a message once its last fragment arrived.
	pub fn push(&mut self, pdu: Pdu) -> Result<Option<DicomMessage>, ProtocolError> {
		let data = match pdu {
			Pdu::PData { data } => data,
			pdu => return Err(ProtocolError::UnexpectedPdu(Box::new(pdu))),
		};

		for mut pdv in data {
			match pdv.value_type {
				PDataValueType::Command => {
					trace!("Received command fragment (last={})", pdv.is_last);
					if self.command.is_some() {
						// Already received the full command set.
						return Err(ProtocolError::OutOfOrder);
					}
					self.command_fragments.append(&mut pdv.data);
					if pdv.is_last {
						let command = InMemDicomObject::read_dataset_with_ts(
							self.command_fragments.as_slice(),
							&IMPLICIT_VR_LITTLE_ENDIAN.erased(),
						)?;
						self.command_fragments.clear();

						let has_data_set = command
							.get(tags::COMMAND_DATA_SET_TYPE)
							.map(InMemElement::to_int::<US>)
							.and_then(Result::ok)
							.is_some_and(|value| value != DATA_SET_MISSING);

						if has_data_set {
							self.command = Some(command);
						} else {
							return Ok(Some(DicomMessage {
								command,
								data: None,
							}));
						}
					}
				}
				PDataValueType::Data => {
					trace!("Received data fragment (last={})", pdv.is_last);
					if self.command.is_none() {
						// Cannot handle data fragments before the entire command set is received.
						return Err(ProtocolError::OutOfOrder);
					}
					self.data_fragments.append(&mut pdv.data);
					if pdv.is_last {
						let presentation_context = self
							.presentation_contexts
							.iter()
							.find(|pctx| pctx.id == pdv.presentation_context_id)
							.ok_or(ProtocolError::NoPresentationContext)?;
						let data = InMemDicomObject::read_dataset_with_ts(
							self.data_fragments.as_slice(),
							transfer_syntax_of(presentation_context)?,
						)?;
						self.data_fragments.clear();

						return Ok(self.command.take().map(|command| DicomMessage {
							command,
							data: Some(data),
						}));
					}
				}
			}
		}

		Ok(None)
	}
}

/// Returns a new message id by incrementing a global counter.
pub fn next_message_id() -> US {
	static CURRENT_MSG_ID: AtomicU16 = AtomicU16::new(1);
	CURRENT_MSG_ID.fetch_add(1, Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
	use super::*;
	use dicom::core::{DataElement, VR};
	use dicom::dicom_value;
	use dicom::dictionary_std::uids;
	use dicom::ul::pdu::PresentationContextResultReason;

	fn implicit_context() -> PresentationContextNegotiated {
		PresentationContextNegotiated {
			id: 1,
			reason: PresentationContextResultReason::Acceptance,
			transfer_syntax: String::from(uids::IMPLICIT_VR_LITTLE_ENDIAN),
			abstract_syntax: String::from(uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_FIND),
		}
	}

	#[test]
	fn status_classification() {
		assert_eq!(StatusType::try_from(0x0000), Ok(StatusType::Success));
		assert_eq!(StatusType::try_from(0xFF00), Ok(StatusType::Pending));
		assert_eq!(StatusType::try_from(0xFF01), Ok(StatusType::Pending));
		assert_eq!(StatusType::try_from(0xA700), Ok(StatusType::Failure));
		assert_eq!(StatusType::try_from(0xC001), Ok(StatusType::Failure));
		assert_eq!(StatusType::try_from(0xFE00), Ok(StatusType::Cancel));
		assert_eq!(StatusType::try_from(0xB000), Ok(StatusType::Warning));
		assert_eq!(StatusType::try_from(0x9999), Err(0x9999));
	}

	#[test]
	fn encoded_message_reassembles() {
		let context = implicit_context();
		let command = InMemDicomObject::command_from_element_iter([
			DataElement::new(tags::STATUS, VR::US, dicom_value!(U16, [0xFF00])),
			DataElement::new(
				tags::COMMAND_DATA_SET_TYPE,
				VR::US,
				dicom_value!(U16, [DATA_SET_EXISTS]),
			),
		]);
		let data = InMemDicomObject::from_element_iter([DataElement::new(
			tags::PATIENT_ID,
			VR::LO,
			"9107256444",
		)]);
		let message = DicomMessage {
			command,
			data: Some(data),
		};

		let contexts = [context.clone()];
		let mut assembler = MessageAssembler::new(&contexts);
		let mut pdus = message.into_pdus(&context).unwrap().into_iter();

		assert!(assembler.push(pdus.next().unwrap()).unwrap().is_none());
		let message = assembler.push(pdus.next().unwrap()).unwrap().unwrap();
		assert_eq!(message.status().unwrap(), 0xFF00);
		assert!(message.data.unwrap().get(tags::PATIENT_ID).is_some());
	}

	#[test]
	fn data_before_command_is_out_of_order() {
		let contexts = [implicit_context()];
		let mut assembler = MessageAssembler::new(&contexts);
		let pdu = Pdu::PData {
			data: vec![PDataValue {
				value_type: PDataValueType::Data,
				presentation_context_id: 1,
				is_last: true,
				data: Vec::new(),
			}],
		};
		assert!(matches!(
			assembler.push(pdu),
			Err(ProtocolError::OutOfOrder)
		));
	}
}
