//! The protocol engine shared by both session roles.
//!
//! Owns the transport and both halves of the chunk codec, and layers on the
//! bookkeeping the message flow requires: acknowledgement windowing, the
//! outbound-request transaction table, transparent handling of peer control
//! messages, and the drain-until-match receive loop the role state
//! machines are built from.

use tracing::{debug, trace};

use super::errors::ProtocolError;
use crate::buffer::FastBuffer;
use crate::chunk::{ChunkDecoder, ChunkEncoder};
use crate::messages::{msg_type, CommonMessage, SharedMessage};
use crate::packets::{RtmpPacket, TransactionTable, UserControlEvent};
use crate::time::RtmpTimestamp;
use crate::transport::ReaderWriter;

/// Acknowledgement window state for the inbound direction.
#[derive(Debug, Default, Clone, Copy)]
pub struct AckWindow {
    /// Ack every time this many unacknowledged bytes arrive; zero disables.
    pub window: u32,
    /// Transport recv counter as of the last acknowledgement sent.
    pub acked_bytes: u64,
}

pub struct Protocol<T: ReaderWriter> {
    io: T,
    in_buffer: FastBuffer,
    decoder: ChunkDecoder,
    encoder: ChunkEncoder,
    requests: TransactionTable,
    in_ack: AckWindow,
    peer_bandwidth: u32,
    auto_response: bool,
    manual_queue: Vec<RtmpPacket>,
    next_transaction_id: f64,
}

impl<T: ReaderWriter> Protocol<T> {
    pub fn new(io: T) -> Protocol<T> {
        Protocol {
            io,
            in_buffer: FastBuffer::new(),
            decoder: ChunkDecoder::new(),
            encoder: ChunkEncoder::new(),
            requests: TransactionTable::new(),
            in_ack: AckWindow::default(),
            peer_bandwidth: 0,
            auto_response: true,
            manual_queue: Vec::new(),
            next_transaction_id: 0.0,
        }
    }

    pub fn io(&self) -> &T {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut T {
        &mut self.io
    }

    pub fn set_recv_timeout(&mut self, timeout_us: i64) {
        self.io.set_recv_timeout(timeout_us);
    }

    pub fn recv_timeout(&self) -> i64 {
        self.io.recv_timeout()
    }

    pub fn set_send_timeout(&mut self, timeout_us: i64) {
        self.io.set_send_timeout(timeout_us);
    }

    pub fn send_timeout(&self) -> i64 {
        self.io.send_timeout()
    }

    pub fn recv_bytes(&self) -> u64 {
        self.io.recv_bytes()
    }

    pub fn send_bytes(&self) -> u64 {
        self.io.send_bytes()
    }

    /// The ack window the peer asked for, and the bandwidth cap the peer
    /// announced.
    pub fn in_ack_window(&self) -> AckWindow {
        self.in_ack
    }

    pub fn peer_bandwidth(&self) -> u32 {
        self.peer_bandwidth
    }

    /// Whether control messages are answered inline during receive. When
    /// disabled, replies queue until `manual_response_flush`.
    pub fn set_auto_response(&mut self, auto: bool) {
        self.auto_response = auto;
    }

    /// Sends every queued manual response, in the order it was queued.
    pub fn manual_response_flush(&mut self) -> Result<(), ProtocolError> {
        let queued = std::mem::take(&mut self.manual_queue);
        for packet in queued {
            self.send_packet(packet, 0)?;
        }

        Ok(())
    }

    /// A transaction id no other request in this session has used.
    pub fn next_transaction_id(&mut self) -> f64 {
        self.next_transaction_id += 1.0;
        self.next_transaction_id
    }

    /// Receives the next non-empty message, transparently acknowledging
    /// received bytes and answering peer control messages on the way.
    pub fn recv_message(&mut self) -> Result<CommonMessage, ProtocolError> {
        loop {
            let message = self.decoder.read_message(&mut self.io, &mut self.in_buffer)?;

            if message.header.payload_length == 0 {
                trace!(
                    message_type = message.header.message_type,
                    "dropping empty message"
                );
                continue;
            }

            self.on_recv_message(&message)?;
            return Ok(message);
        }
    }

    /// Decodes a received message into a typed packet, consulting the
    /// transaction table for responses. `None` means the message is not a
    /// packet (audio, video, unknown data).
    pub fn decode_message(
        &mut self,
        message: &CommonMessage,
    ) -> Result<Option<RtmpPacket>, ProtocolError> {
        Ok(RtmpPacket::decode(message, &mut self.requests)?)
    }

    /// Encodes and sends a packet on the given message stream, recording
    /// outgoing requests so their responses can be decoded later.
    pub fn send_packet(&mut self, packet: RtmpPacket, stream_id: u32) -> Result<(), ProtocolError> {
        if let Some((transaction_id, command_name)) = packet.request_entry() {
            self.requests.insert(transaction_id, command_name);
        }

        let message = packet.clone().into_message(RtmpTimestamp::new(0), stream_id)?;
        self.encoder.send_message(&mut self.io, &message)?;
        self.on_send_packet(&packet)?;
        Ok(())
    }

    /// Sends one already-encoded message on the given stream.
    pub fn send_message(
        &mut self,
        mut message: SharedMessage,
        stream_id: u32,
    ) -> Result<(), ProtocolError> {
        message.header.stream_id = stream_id;
        self.encoder.send_message(&mut self.io, &message)?;
        Ok(())
    }

    /// Sends a batch of messages in order on the given stream.
    pub fn send_messages(
        &mut self,
        mut messages: Vec<SharedMessage>,
        stream_id: u32,
    ) -> Result<(), ProtocolError> {
        for message in &mut messages {
            message.header.stream_id = stream_id;
        }

        self.encoder.send_messages(&mut self.io, &messages)?;
        Ok(())
    }

    /// Receives and decodes messages until `select` accepts one, dropping
    /// everything else. Transport errors surface unchanged.
    pub fn expect_message<P, F>(&mut self, mut select: F) -> Result<(CommonMessage, P), ProtocolError>
    where
        F: FnMut(RtmpPacket) -> Option<P>,
    {
        loop {
            let message = self.recv_message()?;
            match self.decode_message(&message)? {
                Some(packet) => match select(packet) {
                    Some(selected) => return Ok((message, selected)),
                    None => {
                        trace!(
                            message_type = message.header.message_type,
                            "dropping packet while expecting another"
                        );
                    }
                },
                None => continue,
            }
        }
    }

    fn on_recv_message(&mut self, message: &CommonMessage) -> Result<(), ProtocolError> {
        self.acknowledge_if_due()?;

        match message.header.message_type {
            msg_type::SET_CHUNK_SIZE
            | msg_type::USER_CONTROL
            | msg_type::WINDOW_ACK_SIZE
            | msg_type::SET_PEER_BANDWIDTH => (),
            _ => return Ok(()),
        }

        let packet = match RtmpPacket::decode(message, &mut self.requests)? {
            Some(packet) => packet,
            None => return Ok(()),
        };

        match packet {
            RtmpPacket::SetChunkSize { chunk_size } => {
                debug!(chunk_size, "peer changed inbound chunk size");
                self.decoder.set_chunk_size(chunk_size)?;
            }

            RtmpPacket::SetWindowAckSize { ack_window_size } => {
                debug!(ack_window_size, "peer set acknowledgement window");
                self.in_ack.window = ack_window_size;
            }

            RtmpPacket::SetPeerBandwidth { bandwidth, .. } => {
                self.peer_bandwidth = bandwidth;
            }

            RtmpPacket::UserControl {
                event: UserControlEvent::PingRequest,
                event_data,
                ..
            } => {
                let response = RtmpPacket::UserControl {
                    event: UserControlEvent::PingResponse,
                    event_data,
                    extra_data: 0,
                };
                self.respond(response)?;
            }

            _ => (),
        }

        Ok(())
    }

    fn on_send_packet(&mut self, packet: &RtmpPacket) -> Result<(), ProtocolError> {
        match packet {
            RtmpPacket::SetChunkSize { chunk_size } => {
                self.encoder.set_chunk_size(*chunk_size)?;
            }

            _ => (),
        }

        Ok(())
    }

    fn acknowledge_if_due(&mut self) -> Result<(), ProtocolError> {
        if self.in_ack.window == 0 {
            return Ok(());
        }

        let received = self.io.recv_bytes();
        if received - self.in_ack.acked_bytes < self.in_ack.window as u64 {
            return Ok(());
        }

        self.in_ack.acked_bytes = received;
        self.respond(RtmpPacket::Acknowledgement {
            sequence_number: received as u32,
        })
    }

    fn respond(&mut self, packet: RtmpPacket) -> Result<(), ProtocolError> {
        if self.auto_response {
            self.send_packet(packet, 0)
        } else {
            self.manual_queue.push(packet);
            Ok(())
        }
    }
}
