use crate::protocol::dimse::cfind::CompositeFindRequest;
use crate::protocol::dimse::cmove::CompositeMoveRequest;
use crate::protocol::dimse::{DicomMessage, MessageAssembler, StatusType};
use crate::protocol::{FindRequest, MoveRequest, ProtocolError, ProtocolHandler};
use crate::settings::NetworkSettings;
use crate::types::{AE, UI};
use async_stream::try_stream;
use async_trait::async_trait;
use dicom::dictionary_std::uids;
use dicom::object::InMemDicomObject;
use dicom::ul::pdu::PDataValueType;
use dicom::ul::{ClientAssociation, ClientAssociationOptions, Pdu};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, trace, warn};

/// Addressing of the archive and of this node.
#[derive(Debug, Clone)]
pub struct DimseSettings {
	pub calling_aet: AE,
	pub called_aet: AE,
	/// `host:port` of the archive.
	pub address: String,
	pub timeout: Duration,
}

impl DimseSettings {
	pub fn from_network(network: &NetworkSettings, timeout: Duration) -> Self {
		Self {
			calling_aet: network.local_aet.clone(),
			called_aet: network.remote_aet.clone(),
			address: format!("{}:{}", network.remote_host, network.remote_port),
			timeout,
		}
	}
}

/// Runs every operation on its own association, on a blocking worker thread.
#[derive(Debug, Clone)]
pub struct DimseProtocolHandler {
	settings: DimseSettings,
}

enum Flow {
	Continue,
	Done,
}

impl DimseProtocolHandler {
	pub const fn new(settings: DimseSettings) -> Self {
		Self { settings }
	}

	/// Opens an association for `abstract_syntax`, sends `request` and passes every
	/// response to `on_response` until it reports [`Flow::Done`] or fails.
	fn exchange(
		settings: &DimseSettings,
		abstract_syntax: UI,
		request: DicomMessage,
		mut on_response: impl FnMut(DicomMessage) -> Result<Flow, ProtocolError>,
	) -> Result<(), ProtocolError> {
		let mut association = ClientAssociationOptions::new()
			.calling_ae_title(settings.calling_aet.clone())
			.called_ae_title(settings.called_aet.clone())
			.with_presentation_context(
				abstract_syntax,
				vec![
					UI::from(uids::EXPLICIT_VR_LITTLE_ENDIAN),
					UI::from(uids::IMPLICIT_VR_LITTLE_ENDIAN),
				],
			)
			.read_timeout(settings.timeout)
			.write_timeout(settings.timeout)
			.establish_with(&settings.address)?;
		debug!(address = %settings.address, "Established association");

		let presentation_contexts = association.presentation_contexts().to_vec();
		let presentation_context = presentation_contexts
			.first()
			.ok_or(ProtocolError::NoPresentationContext)?;

		for pdu in request.into_pdus(presentation_context)? {
			Self::chunked_send(&mut association, pdu)?;
		}

		let mut assembler = MessageAssembler::new(&presentation_contexts);
		let outcome = loop {
			let pdu = match association.receive() {
				Ok(pdu) => pdu,
				Err(err) => break Err(ProtocolError::from(err)),
			};
			match assembler.push(pdu) {
				Ok(Some(message)) => match on_response(message) {
					Ok(Flow::Continue) => {}
					Ok(Flow::Done) => break Ok(()),
					Err(err) => break Err(err),
				},
				Ok(None) => {}
				Err(err) => break Err(err),
			}
		};

		if outcome.is_ok() {
			if let Err(err) = association.release() {
				debug!("Failed to release association: {err}");
			}
		} else if let Err(err) = association.abort() {
			debug!("Failed to abort association: {err}");
		}
		outcome
	}

	/// Sends a PDU, streaming data sets that exceed the acceptor's maximum PDU
	/// length as several P-DATA fragments.
	fn chunked_send(association: &mut ClientAssociation<std::net::TcpStream>, pdu: Pdu) -> Result<(), ProtocolError> {
		if !exceeds_max_pdu_length(&pdu, association.acceptor_max_pdu_length()) {
			return Ok(association.send(&pdu)?);
		}
		if let Pdu::PData { data } = pdu {
			for pdv in data {
				trace!(length = pdv.data.len(), "Sending data set in fragments");
				let mut writer = association.send_pdata(pdv.presentation_context_id);
				writer
					.write_all(&pdv.data)
					.map_err(ProtocolError::ChunkWriter)?;
			}
		}
		Ok(())
	}
}

/// Command sets always fit into one PDU. Data sets may not.
fn exceeds_max_pdu_length(pdu: &Pdu, max_pdu_length: u32) -> bool {
	let Pdu::PData { data } = pdu else {
		return false;
	};
	let is_command = data
		.first()
		.is_some_and(|pdv| pdv.value_type == PDataValueType::Command);
	let data_length: usize = data.iter().map(|pdv| pdv.data.len()).sum();
	!is_command && data_length > max_pdu_length as usize
}

/// Maps a response status onto the exchange flow. Warnings end the operation
/// like a success does.
fn classify(status: u16) -> Result<Flow, ProtocolError> {
	match StatusType::try_from(status).unwrap_or(StatusType::Failure) {
		StatusType::Pending => Ok(Flow::Continue),
		StatusType::Success => Ok(Flow::Done),
		StatusType::Warning => {
			warn!(status, "Operation completed with warning");
			Ok(Flow::Done)
		}
		StatusType::Cancel => Err(ProtocolError::Cancelled),
		StatusType::Failure => Err(ProtocolError::Status(status)),
	}
}

fn find_stream(
	settings: DimseSettings,
	request: FindRequest,
) -> impl Stream<Item = Result<InMemDicomObject, ProtocolError>> + Send + 'static {
	let (tx, mut rx) = mpsc::channel::<InMemDicomObject>(16);

	try_stream! {
		debug!(level = %request.level, "Sending C-FIND-RQ");
		let find = CompositeFindRequest::for_lookup(&request)?;
		let abstract_syntax = find.affected_sop_class_uid.clone();
		let message = DicomMessage::from(find);

		let worker = tokio::task::spawn_blocking(move || {
			DimseProtocolHandler::exchange(&settings, abstract_syntax, message, |response| {
				trace!("Received C-FIND-RSP");
				let flow = classify(response.status()?)?;
				if let (Flow::Continue, Some(data)) = (&flow, response.data) {
					// The receiver is gone once the caller dropped the stream.
					tx.blocking_send(data).map_err(|_| ProtocolError::Abandoned)?;
				}
				Ok(flow)
			})
		});

		while let Some(data) = rx.recv().await {
			yield data;
		}

		worker
			.await
			.map_err(|err| ProtocolError::Worker(err.to_string()))??;
	}
}

#[async_trait]
impl ProtocolHandler for DimseProtocolHandler {
	fn find(&self, request: FindRequest) -> BoxStream<'_, Result<InMemDicomObject, ProtocolError>> {
		find_stream(self.settings.clone(), request).boxed()
	}

	#[instrument(skip_all, name = "MOVE-SCU", fields(destination = %request.destination))]
	async fn move_to(&self, request: MoveRequest) -> Result<(), ProtocolError> {
		let settings = self.settings.clone();
		let retrieve = CompositeMoveRequest::for_retrieve(&request)?;
		let abstract_syntax = retrieve.affected_sop_class_uid.clone();
		let message = DicomMessage::from(retrieve);

		tokio::task::spawn_blocking(move || {
			Self::exchange(&settings, abstract_syntax, message, |response| {
				trace!("Received C-MOVE-RSP");
				classify(response.status()?)
			})
		})
		.await
		.map_err(|err| ProtocolError::Worker(err.to_string()))??;

		info!("C-MOVE completed successfully");
		Ok(())
	}
}
