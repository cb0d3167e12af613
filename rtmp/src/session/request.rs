//! The connection request a client describes through its connect command.
//!
//! Everything the command layer needs downstream (vhost routing, stream
//! naming, play duration) is discovered from the tcUrl plus the play or
//! publish stream name, so parsing lives here rather than in callers.

use riptide_amf0::Amf0Value;
use std::collections::HashMap;

use super::errors::ProtocolError;

pub const DEFAULT_RTMP_PORT: u16 = 1935;

/// The original request from a client, plus everything discovered from it.
///
/// `tcUrl` has the shape `rtmp://host:port/app`, optionally carrying a
/// query string; a `vhost` query parameter (in the tcUrl or smuggled into
/// the app) overrides the vhost that would otherwise be the host itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Peer address, supplied by the caller that accepted the connection.
    pub ip: String,

    pub tc_url: String,
    pub page_url: String,
    pub swf_url: String,
    pub object_encoding: f64,

    // Discovered from tcUrl and play/publish.
    pub schema: String,
    pub vhost: String,
    pub host: String,
    pub port: u16,
    pub app: String,
    pub param: String,
    pub stream: String,

    /// Play duration limit in milliseconds; zero or negative means
    /// unbounded.
    pub duration: f64,

    /// Extra connect arguments, surfaced untouched for callers that do
    /// their own authentication on top.
    pub args: Option<HashMap<String, Amf0Value>>,
}

impl Request {
    pub fn new() -> Request {
        Request {
            ip: String::new(),
            tc_url: String::new(),
            page_url: String::new(),
            swf_url: String::new(),
            object_encoding: 0.0,
            schema: String::new(),
            vhost: String::new(),
            host: String::new(),
            port: DEFAULT_RTMP_PORT,
            app: String::new(),
            param: String::new(),
            stream: String::new(),
            duration: 0.0,
            args: None,
        }
    }

    /// Parses `tc_url` into schema, host, vhost, port, app and param.
    pub fn discover(&mut self) -> Result<(), ProtocolError> {
        let invalid = || ProtocolError::InvalidTcUrl {
            tc_url: self.tc_url.clone(),
        };

        let (schema, rest) = self.tc_url.split_once("://").ok_or_else(invalid)?;
        if schema.is_empty() || rest.is_empty() {
            return Err(invalid());
        }

        let (authority, path) = match rest.split_once('/') {
            Some((authority, path)) => (authority, path),
            None => (rest, ""),
        };

        if authority.is_empty() {
            return Err(invalid());
        }

        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => {
                let port = port.parse().map_err(|_| invalid())?;
                (host, port)
            }
            None => (authority, DEFAULT_RTMP_PORT),
        };

        let (app, param) = match path.split_once('?') {
            Some((app, param)) => (app.to_string(), param.to_string()),
            None => (path.to_string(), String::new()),
        };

        self.schema = schema.to_string();
        self.host = host.to_string();
        self.port = port;
        self.app = app;
        self.param = param;

        // vhost defaults to the host, overridden by a vhost query
        // parameter carried in the tcUrl or in the app itself.
        self.vhost = self.host.clone();
        if let Some(vhost) = query_param(&self.param, "vhost") {
            self.vhost = vhost;
        }

        Ok(())
    }

    /// Records the stream name from a play or publish command. Parameters
    /// riding on the name (`stream?token=x`) move into `param`.
    pub fn set_stream(&mut self, name: &str) {
        match name.split_once('?') {
            Some((stream, extra)) => {
                self.stream = stream.to_string();
                if self.param.is_empty() {
                    self.param = extra.to_string();
                } else {
                    self.param = format!("{}&{}", self.param, extra);
                }

                if let Some(vhost) = query_param(&self.param, "vhost") {
                    self.vhost = vhost;
                }
            }
            None => self.stream = name.to_string(),
        }
    }

    /// The stream identity used for routing: vhost/app/stream.
    pub fn stream_url(&self) -> String {
        format!("{}/{}/{}", self.vhost, self.app, self.stream)
    }

    /// Removes line breaks and blanks that would corrupt logs or routing
    /// keys built from these fields.
    pub fn strip(&mut self) {
        for field in [
            &mut self.host,
            &mut self.vhost,
            &mut self.app,
            &mut self.stream,
        ] {
            field.retain(|character| !character.is_whitespace());
        }
    }
}

impl Default for Request {
    fn default() -> Self {
        Request::new()
    }
}

fn query_param(query: &str, name: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key == name && !value.is_empty() {
            Some(value.to_string())
        } else {
            None
        }
    })
}
