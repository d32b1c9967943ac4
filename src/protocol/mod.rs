//! The boundary to the archive. A [`ProtocolHandler`] performs the network round
//! trip of a lookup or a retrieve; the query engine only prepares the requests.

pub mod dimse;

use crate::constraint::Operator;
use crate::entity::{Attributes, Entity};
use crate::identifier::Identifier;
use crate::mapping::AttributeMapping;
use crate::tag::FieldTag;
use crate::types::{QueryInformationModel, QueryRetrieveLevel, AE, UI, US};
use async_trait::async_trait;
use dicom::core::ops::{ApplyOp, AttributeAction, AttributeOp, AttributeSelector};
use dicom::core::{PrimitiveValue, Tag};
use dicom::dictionary_std::tags;
use dicom::object::InMemDicomObject;
use dicom::ul::Pdu;
use futures::stream::BoxStream;
use thiserror::Error;

/// Performs lookups and retrieves against a remote archive.
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
	/// Issues a lookup. Each item is one matching record as returned by the archive.
	fn find(&self, request: FindRequest) -> BoxStream<'_, Result<InMemDicomObject, ProtocolError>>;

	/// Asks the archive to send the instances below an entity to another application entity.
	async fn move_to(&self, request: MoveRequest) -> Result<(), ProtocolError>;
}

/// One attribute of a lookup request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestAttribute {
	pub tag: FieldTag,
	/// `None` for return keys that only ask the archive to include the attribute.
	pub operator: Option<Operator>,
	pub value: PrimitiveValue,
}

/// A lookup, translated from a constraint collection.
#[derive(Debug, Clone, PartialEq)]
pub struct FindRequest {
	pub level: QueryRetrieveLevel,
	pub information_model: QueryInformationModel,
	/// Return keys first, then matching keys in constraint order.
	pub attributes: Vec<RequestAttribute>,
}

impl FindRequest {
	pub fn matching_keys(&self) -> impl Iterator<Item = &RequestAttribute> {
		self.attributes
			.iter()
			.filter(|attribute| attribute.operator.is_some())
	}

	/// Builds the C-FIND identifier. A matching key overrides the return key for
	/// the same attribute.
	pub fn identifier(&self) -> Result<InMemDicomObject, ProtocolError> {
		let mut identifier = InMemDicomObject::new_empty();
		for attribute in &self.attributes {
			let tag = attribute
				.tag
				.dicom_tag()
				.ok_or(ProtocolError::UndefinedAttribute)?;
			set(&mut identifier, tag, attribute.value.clone())?;
		}
		set(
			&mut identifier,
			tags::QUERY_RETRIEVE_LEVEL,
			PrimitiveValue::from(self.level),
		)?;
		Ok(identifier)
	}
}

/// A retrieve of everything below one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
	pub destination: AE,
	pub level: QueryRetrieveLevel,
	pub information_model: QueryInformationModel,
	/// Unique keys from the top of the hierarchy down to the entity itself.
	pub keys: Vec<(FieldTag, Identifier)>,
}

impl MoveRequest {
	pub fn for_entity<A: Attributes>(
		mapping: &AttributeMapping<A>,
		entity: &Entity<A>,
		destination: impl Into<AE>,
	) -> Self {
		let mut keys = entity.attributes().parent_keys();
		keys.push((mapping.identity_tag(), entity.identity().clone()));
		Self {
			destination: destination.into(),
			level: A::LEVEL,
			information_model: QueryInformationModel::for_level(A::LEVEL),
			keys,
		}
	}

	pub fn identifier(&self) -> Result<InMemDicomObject, ProtocolError> {
		let mut identifier = InMemDicomObject::new_empty();
		set(
			&mut identifier,
			tags::QUERY_RETRIEVE_LEVEL,
			PrimitiveValue::from(self.level),
		)?;
		for (tag, key) in &self.keys {
			let tag = tag.dicom_tag().ok_or(ProtocolError::UndefinedAttribute)?;
			set(&mut identifier, tag, PrimitiveValue::from(key.clone()))?;
		}
		Ok(identifier)
	}
}

fn set(identifier: &mut InMemDicomObject, tag: Tag, value: PrimitiveValue) -> Result<(), ProtocolError> {
	identifier
		.apply(AttributeOp::new(
			AttributeSelector::from(tag),
			AttributeAction::Set(value),
		))
		.map_err(|err| ProtocolError::Identifier(err.to_string()))
}

#[derive(Debug, Error)]
pub enum ProtocolError {
	#[error("Association failed: {0}")]
	Association(#[from] dicom::ul::association::Error),
	#[error("Failed to read DICOM object: {0}")]
	Reader(#[from] dicom::object::ReadError),
	#[error("Failed to write DICOM object: {0}")]
	Writer(#[from] dicom::object::WriteError),
	#[error("Received unexpected PDU {0:?}")]
	UnexpectedPdu(Box<Pdu>),
	#[error("Failed to write P-DATA chunk: {0}")]
	ChunkWriter(std::io::Error),
	#[error("Received fragments out of order")]
	OutOfOrder,
	#[error("Failed to negotiate a presentation context")]
	NoPresentationContext,
	#[error("Unknown transfer syntax with UID '{0}'")]
	UnknownTransferSyntax(UI),
	#[error("Mandatory attribute {0} is missing")]
	MissingAttribute(Tag),
	#[error("Cannot encode the undefined attribute")]
	UndefinedAttribute,
	#[error("Failed to build identifier: {0}")]
	Identifier(String),
	#[error("Archive answered with failure status {0:#06X}")]
	Status(US),
	#[error("Operation was cancelled by the archive")]
	Cancelled,
	#[error("Receiver went away before the operation completed")]
	Abandoned,
	#[error("Protocol worker failed: {0}")]
	Worker(String),
	#[error(transparent)]
	Backend {
		source: Box<dyn std::error::Error + Send + Sync>,
	},
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::entity::{Series, SeriesAttributes};
	use dicom::object::mem::InMemElement;

	fn text(object: &InMemDicomObject, tag: Tag) -> Option<String> {
		object
			.get(tag)
			.map(InMemElement::to_str)
			.and_then(Result::ok)
			.map(|value| value.trim_end_matches(['\0', ' ']).to_owned())
	}

	#[test]
	fn find_identifier_carries_return_and_matching_keys() {
		let request = FindRequest {
			level: QueryRetrieveLevel::Study,
			information_model: QueryInformationModel::Study,
			attributes: vec![
				RequestAttribute {
					tag: FieldTag::StudyInstanceUid,
					operator: None,
					value: PrimitiveValue::Empty,
				},
				RequestAttribute {
					tag: FieldTag::PatientId,
					operator: None,
					value: PrimitiveValue::Empty,
				},
				RequestAttribute {
					tag: FieldTag::PatientId,
					operator: Some(Operator::Like),
					value: PrimitiveValue::from("*910*"),
				},
			],
		};

		let identifier = request.identifier().unwrap();
		assert_eq!(text(&identifier, tags::PATIENT_ID).as_deref(), Some("*910*"));
		assert_eq!(
			text(&identifier, tags::QUERY_RETRIEVE_LEVEL).as_deref(),
			Some("STUDY")
		);
		assert!(identifier.get(tags::STUDY_INSTANCE_UID).is_some());
		assert_eq!(request.matching_keys().count(), 1);
	}

	#[test]
	fn series_move_names_its_study() {
		let mapping = AttributeMapping::<SeriesAttributes>::build().unwrap();
		let series = Series::builder()
			.identity("1.2.3.4")
			.with(|attributes| attributes.study_instance_uid = Some(String::from("1.2.3")))
			.build()
			.unwrap();

		let request = MoveRequest::for_entity(&mapping, &series, "STORESCP");
		assert_eq!(request.level, QueryRetrieveLevel::Series);
		assert_eq!(
			request.keys,
			vec![
				(FieldTag::StudyInstanceUid, Identifier::new("1.2.3")),
				(FieldTag::SeriesInstanceUid, Identifier::new("1.2.3.4")),
			]
		);

		let identifier = request.identifier().unwrap();
		assert_eq!(
			text(&identifier, tags::SERIES_INSTANCE_UID).as_deref(),
			Some("1.2.3.4")
		);
		assert_eq!(
			text(&identifier, tags::QUERY_RETRIEVE_LEVEL).as_deref(),
			Some("SERIES")
		);
	}
}
