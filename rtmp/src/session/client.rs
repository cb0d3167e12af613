//! The client role: drives connect, stream creation and the play/publish
//! dialogues against a server.

use riptide_amf0::Amf0Value;
use std::collections::HashMap;
use tracing::debug;

use super::errors::ProtocolError;
use super::protocol::Protocol;
use super::request::Request;
use crate::handshake;
use crate::packets::{status, PublishType, RtmpPacket, UserControlEvent};
use crate::transport::ReaderWriter;

/// Tunables for the client dialogue.
#[derive(Clone)]
pub struct ClientConfig {
    pub flash_version: String,
    /// Playback buffer advertised before play, in milliseconds.
    pub playback_buffer_ms: u32,
    pub window_ack_size: u32,
}

impl ClientConfig {
    pub fn new() -> ClientConfig {
        ClientConfig {
            flash_version: "WIN 15,0,0,239".to_string(),
            playback_buffer_ms: 3000,
            window_ack_size: 2_500_000,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig::new()
    }
}

/// Where the client sits in the connection dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Fresh,
    Handshaken,
    Connected,
    StreamCreated,
    Streaming,
    Closed,
}

impl ClientState {
    fn name(self) -> &'static str {
        match self {
            ClientState::Fresh => "fresh",
            ClientState::Handshaken => "handshaken",
            ClientState::Connected => "connected",
            ClientState::StreamCreated => "stream-created",
            ClientState::Streaming => "streaming",
            ClientState::Closed => "closed",
        }
    }
}

/// Identification the server volunteered in its connect response.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ServerInfo {
    pub ip: Option<String>,
    pub server: Option<String>,
    pub version: Option<String>,
    pub primary: Option<String>,
    pub authors: Option<String>,
    pub id: Option<f64>,
    pub pid: Option<f64>,
}

/// The client side of one RTMP connection.
pub struct ClientSession<T: ReaderWriter> {
    protocol: Protocol<T>,
    config: ClientConfig,
    state: ClientState,
}

impl<T: ReaderWriter> ClientSession<T> {
    pub fn new(io: T) -> ClientSession<T> {
        ClientSession::with_config(io, ClientConfig::new())
    }

    pub fn with_config(io: T, config: ClientConfig) -> ClientSession<T> {
        ClientSession {
            protocol: Protocol::new(io),
            config,
            state: ClientState::Fresh,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn protocol(&mut self) -> &mut Protocol<T> {
        &mut self.protocol
    }

    /// Exchanges the handshake blobs with the server.
    pub fn handshake(&mut self) -> Result<(), ProtocolError> {
        self.require(ClientState::Fresh, "handshake")?;
        handshake::client_handshake(self.protocol.io_mut())?;
        self.state = ClientState::Handshaken;
        Ok(())
    }

    /// Connects to an application on the server and surfaces whatever the
    /// server said about itself.
    pub fn connect_app(
        &mut self,
        app: &str,
        tc_url: &str,
        req: Option<&Request>,
        debug_peer: bool,
    ) -> Result<ServerInfo, ProtocolError> {
        self.require(ClientState::Handshaken, "connect_app")?;

        self.protocol.send_packet(
            RtmpPacket::SetWindowAckSize {
                ack_window_size: self.config.window_ack_size,
            },
            0,
        )?;

        let mut command_object = HashMap::new();
        command_object.insert("app".to_string(), Amf0Value::Utf8String(app.to_string()));
        command_object.insert(
            "flashVer".to_string(),
            Amf0Value::Utf8String(self.config.flash_version.clone()),
        );
        command_object.insert(
            "swfUrl".to_string(),
            Amf0Value::Utf8String(req.map(|req| req.swf_url.clone()).unwrap_or_default()),
        );
        command_object.insert(
            "tcUrl".to_string(),
            Amf0Value::Utf8String(tc_url.to_string()),
        );
        command_object.insert("fpad".to_string(), Amf0Value::Boolean(false));
        command_object.insert("capabilities".to_string(), Amf0Value::Number(15.0));
        command_object.insert("audioCodecs".to_string(), Amf0Value::Number(3575.0));
        command_object.insert("videoCodecs".to_string(), Amf0Value::Number(252.0));
        command_object.insert("videoFunction".to_string(), Amf0Value::Number(1.0));
        command_object.insert(
            "pageUrl".to_string(),
            Amf0Value::Utf8String(req.map(|req| req.page_url.clone()).unwrap_or_default()),
        );
        command_object.insert("objectEncoding".to_string(), Amf0Value::Number(0.0));

        let args = if debug_peer {
            req.and_then(|req| req.args.clone())
        } else {
            None
        };

        let transaction_id = self.protocol.next_transaction_id();
        self.protocol.send_packet(
            RtmpPacket::Connect {
                transaction_id,
                command_object,
                args,
            },
            0,
        )?;

        let (_, info) = self.protocol.expect_message(|packet| match packet {
            RtmpPacket::ConnectRes { info, .. } => Some(info),
            _ => None,
        })?;

        let code = info
            .get(status::CODE)
            .and_then(Amf0Value::as_str)
            .unwrap_or_default();
        if code != status::CONNECT_SUCCESS {
            let description = info
                .get(status::DESCRIPTION)
                .and_then(Amf0Value::as_str)
                .unwrap_or(code)
                .to_string();
            return Err(ProtocolError::ConnectRejected { description });
        }

        self.state = ClientState::Connected;
        debug!(app, "connected");
        Ok(extract_server_info(&info))
    }

    /// Asks the server for a message stream and returns its id.
    pub fn create_stream(&mut self) -> Result<u32, ProtocolError> {
        self.require(ClientState::Connected, "create_stream")?;

        let transaction_id = self.protocol.next_transaction_id();
        self.protocol
            .send_packet(RtmpPacket::CreateStream { transaction_id }, 0)?;

        let (_, stream_id) = self.protocol.expect_message(|packet| match packet {
            RtmpPacket::CreateStreamRes { stream_id, .. } => Some(stream_id),
            _ => None,
        })?;

        self.state = ClientState::StreamCreated;
        Ok(stream_id as u32)
    }

    /// Starts playback of a stream on a previously created message stream.
    pub fn play(&mut self, stream: &str, stream_id: u32) -> Result<(), ProtocolError> {
        self.require(ClientState::StreamCreated, "play")?;

        self.protocol.send_packet(
            RtmpPacket::UserControl {
                event: UserControlEvent::SetBufferLength,
                event_data: stream_id,
                extra_data: self.config.playback_buffer_ms,
            },
            0,
        )?;

        self.protocol.send_packet(
            RtmpPacket::Play {
                transaction_id: 0.0,
                stream_name: stream.to_string(),
                start: -2.0,
                duration: -1.0,
                reset: true,
            },
            stream_id,
        )?;

        self.state = ClientState::Streaming;
        Ok(())
    }

    /// Starts publishing with the flash workflow: the stream was created
    /// with `create_stream` and publish is the only command left to send.
    pub fn publish(&mut self, stream: &str, stream_id: u32) -> Result<(), ProtocolError> {
        self.require(ClientState::StreamCreated, "publish")?;

        self.protocol.send_packet(
            RtmpPacket::Publish {
                transaction_id: 0.0,
                stream_name: stream.to_string(),
                publish_type: PublishType::Live,
            },
            stream_id,
        )?;

        self.state = ClientState::Streaming;
        Ok(())
    }

    /// Starts publishing with the FMLE workflow: releaseStream and
    /// FCPublish ahead of createStream, then publish on the new stream.
    /// Returns the stream id the server allocated.
    pub fn fmle_publish(&mut self, stream: &str) -> Result<u32, ProtocolError> {
        self.require(ClientState::Connected, "fmle_publish")?;

        for command_name in ["releaseStream", "FCPublish"] {
            let transaction_id = self.protocol.next_transaction_id();
            self.protocol.send_packet(
                RtmpPacket::FmleStart {
                    command_name: command_name.to_string(),
                    transaction_id,
                    stream_name: stream.to_string(),
                },
                0,
            )?;

            self.protocol.expect_message(|packet| match packet {
                RtmpPacket::FmleStartRes { transaction_id: tid } if tid == transaction_id => {
                    Some(())
                }
                _ => None,
            })?;
        }

        let transaction_id = self.protocol.next_transaction_id();
        self.protocol
            .send_packet(RtmpPacket::CreateStream { transaction_id }, 0)?;
        let (_, stream_id) = self.protocol.expect_message(|packet| match packet {
            RtmpPacket::CreateStreamRes { stream_id, .. } => Some(stream_id),
            _ => None,
        })?;
        let stream_id = stream_id as u32;

        let transaction_id = self.protocol.next_transaction_id();
        self.protocol.send_packet(
            RtmpPacket::Publish {
                transaction_id,
                stream_name: stream.to_string(),
                publish_type: PublishType::Live,
            },
            stream_id,
        )?;

        self.state = ClientState::Streaming;
        Ok(stream_id)
    }

    fn require(&self, state: ClientState, operation: &'static str) -> Result<(), ProtocolError> {
        if self.state == state {
            Ok(())
        } else {
            Err(ProtocolError::InvalidState {
                operation,
                state: self.state.name(),
            })
        }
    }
}

fn extract_server_info(info: &HashMap<String, Amf0Value>) -> ServerInfo {
    let mut server_info = ServerInfo::default();

    let data = match info.get("data").and_then(Amf0Value::as_object) {
        Some(data) => data,
        None => return server_info,
    };

    let string = |name: &str| {
        data.get(name)
            .and_then(Amf0Value::as_str)
            .map(str::to_string)
    };

    server_info.ip = string("server_ip");
    server_info.server = string("server");
    server_info.version = string("version");
    server_info.primary = string("primary");
    server_info.authors = string("authors");
    server_info.id = data.get("id").and_then(Amf0Value::as_number);
    server_info.pid = data.get("pid").and_then(Amf0Value::as_number);
    server_info
}
