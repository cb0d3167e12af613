//! The server role: accepts a connection, identifies what the client wants
//! to do, and drives the play and publish reply sequences.

use rand::Rng;
use riptide_amf0::Amf0Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::errors::ProtocolError;
use super::protocol::Protocol;
use super::request::Request;
use crate::handshake;
use crate::packets::{sig, status, PeerBandwidthLimit, RtmpPacket, UserControlEvent};
use crate::transport::ReaderWriter;

/// Tunables for the server dialogue.
#[derive(Clone)]
pub struct ServerConfig {
    pub fms_version: String,
    pub window_ack_size: u32,
    pub peer_bandwidth: u32,
    pub chunk_size: u32,
    /// How many unexpected commands the identify loop tolerates before
    /// giving up on the client.
    pub identify_budget: u32,
}

impl ServerConfig {
    pub fn new() -> ServerConfig {
        ServerConfig {
            fms_version: sig::FMS_VERSION.to_string(),
            window_ack_size: 2_500_000,
            peer_bandwidth: 2_500_000,
            chunk_size: 4096,
            identify_budget: 64,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig::new()
    }
}

/// What the connected client turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnType {
    /// The client plays a stream.
    Play,
    /// The client publishes through the FMLE workflow
    /// (releaseStream/FCPublish before createStream).
    FmlePublish,
    /// The client publishes through the plain flash workflow.
    FlashPublish,
}

impl ConnType {
    pub fn is_publish(self) -> bool {
        matches!(self, ConnType::FmlePublish | ConnType::FlashPublish)
    }
}

/// The outcome of identifying a client.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentifiedClient {
    pub conn_type: ConnType,
    pub stream_name: String,
    /// Play duration limit in milliseconds; zero when the client did not
    /// set one.
    pub duration: f64,
}

/// The server side of one RTMP connection.
pub struct ServerSession<T: ReaderWriter> {
    protocol: Protocol<T>,
    config: ServerConfig,
    /// Transaction id of the client's connect, echoed in the response.
    connect_transaction_id: f64,
    client_id: String,
}

impl<T: ReaderWriter> ServerSession<T> {
    pub fn new(io: T) -> ServerSession<T> {
        ServerSession::with_config(io, ServerConfig::new())
    }

    pub fn with_config(io: T, config: ServerConfig) -> ServerSession<T> {
        ServerSession {
            protocol: Protocol::new(io),
            config,
            connect_transaction_id: 1.0,
            client_id: generate_client_id(),
        }
    }

    pub fn protocol(&mut self) -> &mut Protocol<T> {
        &mut self.protocol
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Exchanges the handshake blobs with the client.
    pub fn handshake(&mut self) -> Result<(), ProtocolError> {
        handshake::server_handshake(self.protocol.io_mut())?;
        Ok(())
    }

    /// Waits for the client's connect command and discovers the request it
    /// describes.
    pub fn connect_app(&mut self) -> Result<Request, ProtocolError> {
        let (_, (transaction_id, command_object, args)) =
            self.protocol.expect_message(|packet| match packet {
                RtmpPacket::Connect {
                    transaction_id,
                    command_object,
                    args,
                } => Some((transaction_id, command_object, args)),
                _ => None,
            })?;

        self.connect_transaction_id = transaction_id;

        let mut request = Request::new();
        request.tc_url = command_object
            .get("tcUrl")
            .and_then(Amf0Value::as_str)
            .ok_or(ProtocolError::ConnectRequired { field: "tcUrl" })?
            .to_string();

        let string = |name: &str| {
            command_object
                .get(name)
                .and_then(Amf0Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        request.page_url = string("pageUrl");
        request.swf_url = string("swfUrl");
        request.object_encoding = command_object
            .get("objectEncoding")
            .and_then(Amf0Value::as_number)
            .unwrap_or(0.0);
        request.args = args;

        request.discover()?;
        request.strip();
        debug!(tc_url = %request.tc_url, vhost = %request.vhost, "client connecting");
        Ok(request)
    }

    /// Tells the client how often to acknowledge received bytes.
    pub fn set_window_ack_size(&mut self, ack_window_size: u32) -> Result<(), ProtocolError> {
        self.protocol
            .send_packet(RtmpPacket::SetWindowAckSize { ack_window_size }, 0)
    }

    pub fn set_peer_bandwidth(
        &mut self,
        bandwidth: u32,
        limit_type: PeerBandwidthLimit,
    ) -> Result<(), ProtocolError> {
        self.protocol.send_packet(
            RtmpPacket::SetPeerBandwidth {
                bandwidth,
                limit_type,
            },
            0,
        )
    }

    /// Accepts the connection request.
    pub fn response_connect_app(
        &mut self,
        req: &Request,
        server_ip: Option<&str>,
    ) -> Result<(), ProtocolError> {
        let mut props = HashMap::new();
        props.insert(
            "fmsVer".to_string(),
            Amf0Value::Utf8String(format!("FMS/{}", self.config.fms_version)),
        );
        props.insert("capabilities".to_string(), Amf0Value::Number(127.0));
        props.insert("mode".to_string(), Amf0Value::Number(1.0));

        let mut data = HashMap::new();
        data.insert(
            "version".to_string(),
            Amf0Value::Utf8String(self.config.fms_version.clone()),
        );
        data.insert(
            "amf0_version".to_string(),
            Amf0Value::Number(sig::AMF0_VERSION),
        );
        if let Some(server_ip) = server_ip {
            data.insert(
                "server_ip".to_string(),
                Amf0Value::Utf8String(server_ip.to_string()),
            );
        }
        data.insert(
            status::CLIENT_ID.to_string(),
            Amf0Value::Utf8String(self.client_id.clone()),
        );
        data.insert("pid".to_string(), Amf0Value::Number(std::process::id() as f64));

        let mut info = HashMap::new();
        info.insert(
            status::LEVEL.to_string(),
            Amf0Value::Utf8String(status::LEVEL_STATUS.to_string()),
        );
        info.insert(
            status::CODE.to_string(),
            Amf0Value::Utf8String(status::CONNECT_SUCCESS.to_string()),
        );
        info.insert(
            status::DESCRIPTION.to_string(),
            Amf0Value::Utf8String("Connection succeeded".to_string()),
        );
        info.insert(
            "objectEncoding".to_string(),
            Amf0Value::Number(req.object_encoding),
        );
        info.insert("data".to_string(), Amf0Value::Object(data));

        self.protocol.send_packet(
            RtmpPacket::ConnectRes {
                transaction_id: self.connect_transaction_id,
                props,
                info,
            },
            0,
        )
    }

    /// Rejects the connection request with a description.
    pub fn response_connect_reject(&mut self, description: &str) -> Result<(), ProtocolError> {
        let data = status_object(
            status::LEVEL_ERROR,
            status::CONNECT_REJECTED,
            description,
        );

        self.protocol.send_packet(
            RtmpPacket::Call {
                command_name: "_error".to_string(),
                transaction_id: self.connect_transaction_id,
                command_object: Amf0Value::Null,
                arguments: vec![Amf0Value::Object(data)],
            },
            0,
        )
    }

    /// Notifies the client the (stub) bandwidth round is done.
    pub fn on_bw_done(&mut self) -> Result<(), ProtocolError> {
        self.protocol.send_packet(RtmpPacket::OnBwDone, 0)
    }

    /// Drains commands until the client reveals whether it plays or
    /// publishes. createStream is answered inline with `stream_id`;
    /// releaseStream/FCPublish are acknowledged as the FMLE preamble.
    pub fn identify_client(
        &mut self,
        stream_id: u32,
        req: &mut Request,
    ) -> Result<IdentifiedClient, ProtocolError> {
        let mut budget = self.config.identify_budget;
        let mut fmle_preamble = false;

        loop {
            let message = self.protocol.recv_message()?;
            let packet = match self.protocol.decode_message(&message)? {
                Some(packet) => packet,
                None => continue,
            };

            match packet {
                RtmpPacket::CreateStream { transaction_id } => {
                    self.protocol.send_packet(
                        RtmpPacket::CreateStreamRes {
                            transaction_id,
                            stream_id: stream_id as f64,
                        },
                        0,
                    )?;
                }

                RtmpPacket::FmleStart {
                    command_name,
                    transaction_id,
                    stream_name,
                } => {
                    if command_name == "FCUnpublish" {
                        continue;
                    }

                    fmle_preamble = true;
                    req.set_stream(&stream_name);
                    self.protocol
                        .send_packet(RtmpPacket::FmleStartRes { transaction_id }, 0)?;
                }

                RtmpPacket::Play {
                    stream_name,
                    duration,
                    ..
                } => {
                    req.set_stream(&stream_name);
                    req.duration = duration * 1000.0;
                    return Ok(IdentifiedClient {
                        conn_type: ConnType::Play,
                        stream_name: req.stream.clone(),
                        duration: req.duration,
                    });
                }

                RtmpPacket::Publish { stream_name, .. } => {
                    req.set_stream(&stream_name);
                    let conn_type = if fmle_preamble {
                        ConnType::FmlePublish
                    } else {
                        ConnType::FlashPublish
                    };

                    return Ok(IdentifiedClient {
                        conn_type,
                        stream_name: req.stream.clone(),
                        duration: 0.0,
                    });
                }

                RtmpPacket::CloseStream { .. } => return Err(ProtocolError::StreamClosed),

                // Control traffic was already applied by the receive path.
                RtmpPacket::UserControl { .. }
                | RtmpPacket::Acknowledgement { .. }
                | RtmpPacket::SetChunkSize { .. }
                | RtmpPacket::SetWindowAckSize { .. }
                | RtmpPacket::SetPeerBandwidth { .. } => continue,

                other => {
                    budget = budget.saturating_sub(1);
                    if budget == 0 {
                        warn!("identify gave up after too many unexpected commands");
                        return Err(ProtocolError::IdentifyRetriesExceeded);
                    }

                    debug!(packet = ?other, "ignoring command while identifying");
                }
            }
        }
    }

    /// Moves the session to the configured chunk size once the client is
    /// identified.
    pub fn set_chunk_size(&mut self) -> Result<(), ProtocolError> {
        self.protocol.send_packet(
            RtmpPacket::SetChunkSize {
                chunk_size: self.config.chunk_size,
            },
            0,
        )
    }

    /// The reply sequence that opens playback.
    pub fn start_play(&mut self, stream_id: u32) -> Result<(), ProtocolError> {
        self.protocol.send_packet(
            RtmpPacket::UserControl {
                event: UserControlEvent::StreamBegin,
                event_data: stream_id,
                extra_data: 0,
            },
            0,
        )?;

        self.protocol.send_packet(
            RtmpPacket::OnStatus {
                transaction_id: 0.0,
                data: status_object(
                    status::LEVEL_STATUS,
                    status::PLAY_RESET,
                    "Playing and resetting stream.",
                ),
            },
            stream_id,
        )?;

        self.protocol.send_packet(
            RtmpPacket::OnStatus {
                transaction_id: 0.0,
                data: status_object(
                    status::LEVEL_STATUS,
                    status::PLAY_START,
                    "Started playing stream.",
                ),
            },
            stream_id,
        )?;

        self.protocol.send_packet(
            RtmpPacket::SampleAccess {
                video_access: false,
                audio_access: false,
            },
            stream_id,
        )?;

        let mut data_start = HashMap::new();
        data_start.insert(
            status::CODE.to_string(),
            Amf0Value::Utf8String(status::DATA_START.to_string()),
        );
        self.protocol
            .send_packet(RtmpPacket::OnStatusData { data: data_start }, stream_id)?;

        Ok(())
    }

    /// Pause and resume replies for a playing client.
    pub fn on_play_client_pause(
        &mut self,
        stream_id: u32,
        is_pause: bool,
    ) -> Result<(), ProtocolError> {
        if is_pause {
            self.protocol.send_packet(
                RtmpPacket::OnStatus {
                    transaction_id: 0.0,
                    data: status_object(
                        status::LEVEL_STATUS,
                        status::PAUSE_NOTIFY,
                        "Paused stream.",
                    ),
                },
                stream_id,
            )?;

            self.protocol.send_packet(
                RtmpPacket::UserControl {
                    event: UserControlEvent::StreamEof,
                    event_data: stream_id,
                    extra_data: 0,
                },
                0,
            )
        } else {
            self.protocol.send_packet(
                RtmpPacket::OnStatus {
                    transaction_id: 0.0,
                    data: status_object(
                        status::LEVEL_STATUS,
                        status::UNPAUSE_NOTIFY,
                        "Unpaused stream.",
                    ),
                },
                stream_id,
            )?;

            self.protocol.send_packet(
                RtmpPacket::UserControl {
                    event: UserControlEvent::StreamBegin,
                    event_data: stream_id,
                    extra_data: 0,
                },
                0,
            )
        }
    }

    /// The reply sequence that opens an FMLE publish. The FCPublish and
    /// createStream results were already sent while identifying.
    pub fn start_fmle_publish(&mut self, stream_id: u32) -> Result<(), ProtocolError> {
        self.protocol.send_packet(
            RtmpPacket::Call {
                command_name: "onFCPublish".to_string(),
                transaction_id: 0.0,
                command_object: Amf0Value::Null,
                arguments: vec![Amf0Value::Object(status_object(
                    status::LEVEL_STATUS,
                    status::PUBLISH_START,
                    "Started publishing stream.",
                ))],
            },
            0,
        )?;

        self.protocol.send_packet(
            RtmpPacket::OnStatus {
                transaction_id: 0.0,
                data: status_object(
                    status::LEVEL_STATUS,
                    status::PUBLISH_START,
                    "Started publishing stream.",
                ),
            },
            stream_id,
        )
    }

    /// The reply sequence that opens a plain flash publish.
    pub fn start_flash_publish(&mut self, stream_id: u32) -> Result<(), ProtocolError> {
        self.protocol.send_packet(
            RtmpPacket::OnStatus {
                transaction_id: 0.0,
                data: status_object(
                    status::LEVEL_STATUS,
                    status::PUBLISH_START,
                    "Started publishing stream.",
                ),
            },
            stream_id,
        )
    }

    /// Answers an FMLE unpublish: onFCUnpublish, the _result for the
    /// FCUnpublish transaction, and the final unpublish status.
    pub fn fmle_unpublish(
        &mut self,
        stream_id: u32,
        unpublish_transaction_id: f64,
    ) -> Result<(), ProtocolError> {
        self.protocol.send_packet(
            RtmpPacket::Call {
                command_name: "onFCUnpublish".to_string(),
                transaction_id: 0.0,
                command_object: Amf0Value::Null,
                arguments: vec![Amf0Value::Object(status_object(
                    status::LEVEL_STATUS,
                    status::UNPUBLISH_SUCCESS,
                    "Stopped publishing stream.",
                ))],
            },
            0,
        )?;

        self.protocol.send_packet(
            RtmpPacket::FmleStartRes {
                transaction_id: unpublish_transaction_id,
            },
            0,
        )?;

        self.protocol.send_packet(
            RtmpPacket::OnStatus {
                transaction_id: 0.0,
                data: status_object(
                    status::LEVEL_STATUS,
                    status::UNPUBLISH_SUCCESS,
                    "Stopped publishing stream.",
                ),
            },
            stream_id,
        )
    }

    /// Routes stream-lifecycle commands received while relaying media.
    /// closeStream and FCUnpublish surface as control signals after their
    /// replies are sent; anything else is left to the caller.
    pub fn on_stream_command(
        &mut self,
        packet: &RtmpPacket,
        stream_id: u32,
    ) -> Result<(), ProtocolError> {
        match packet {
            RtmpPacket::CloseStream { .. } => {
                self.protocol.send_packet(
                    RtmpPacket::OnStatus {
                        transaction_id: 0.0,
                        data: status_object(
                            status::LEVEL_STATUS,
                            status::UNPUBLISH_SUCCESS,
                            "Stopped publishing stream.",
                        ),
                    },
                    stream_id,
                )?;

                Err(ProtocolError::StreamClosed)
            }

            RtmpPacket::FmleStart {
                command_name,
                transaction_id,
                ..
            } if command_name == "FCUnpublish" => {
                self.fmle_unpublish(stream_id, *transaction_id)?;
                Err(ProtocolError::Republish)
            }

            _ => Ok(()),
        }
    }
}

/// The level/code/description object onStatus replies carry.
pub fn status_object(
    level: &str,
    code: &str,
    description: &str,
) -> HashMap<String, Amf0Value> {
    let mut properties = HashMap::new();
    properties.insert(
        status::LEVEL.to_string(),
        Amf0Value::Utf8String(level.to_string()),
    );
    properties.insert(
        status::CODE.to_string(),
        Amf0Value::Utf8String(code.to_string()),
    );
    properties.insert(
        status::DESCRIPTION.to_string(),
        Amf0Value::Utf8String(description.to_string()),
    );
    properties
}

fn generate_client_id() -> String {
    let mut rng = rand::thread_rng();
    (0..sig::CLIENT_ID_LENGTH)
        .map(|_| rng.gen_range(b'A'..=b'Z') as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ids_are_eight_characters() {
        let id = generate_client_id();
        assert_eq!(id.len(), sig::CLIENT_ID_LENGTH);
        assert!(id.chars().all(|character| character.is_ascii_uppercase()));
    }

    #[test]
    fn status_objects_carry_the_three_fields() {
        let object = status_object(status::LEVEL_STATUS, status::PLAY_START, "d");
        assert_eq!(
            object.get(status::LEVEL),
            Some(&Amf0Value::Utf8String("status".to_string()))
        );
        assert_eq!(
            object.get(status::CODE),
            Some(&Amf0Value::Utf8String(status::PLAY_START.to_string()))
        );
        assert!(object.contains_key(status::DESCRIPTION));
    }

    #[test]
    fn conn_types_classify_publishing() {
        assert!(ConnType::FmlePublish.is_publish());
        assert!(ConnType::FlashPublish.is_publish());
        assert!(!ConnType::Play.is_publish());
    }
}
