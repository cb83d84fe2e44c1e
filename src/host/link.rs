use std::string::{String, ToString};
use log::*;

use crate::frame::{self, NodeId};
use super::{Error, Transport};


/**
    command channel to one node of the bus

    each command is a full round trip: stale input is discarded, the frame is sent, then exactly one response line is read and checked. Nothing is ever resent, since many commands are not idempotent.
*/
pub struct NodeLink<T> {
    transport: T,
    node: NodeId,
}
impl<T: Transport> NodeLink<T> {
    pub fn new(transport: T, node: NodeId) -> Self {
        Self {transport, node}
    }
    pub fn node(&self) -> NodeId {self.node}
    pub fn transport(&mut self) -> &mut T {&mut self.transport}
    pub fn into_transport(self) -> T {self.transport}

    /**
        send a command and return its response payload

        the response must echo the command character, which is removed along with the framing. A payload containing `error` is reported as [Error::Device]
    */
    pub async fn command(&mut self, command: &str) -> Result<String, Error> {
        let frame = frame::encode_command(self.node, command)
            .map_err(|error| Error::Frame {error, line: command.to_string()})?;
        // the encoder refuses empty commands
        let echo = command.chars().next().unwrap_or_default();

        self.transport.discard_input()?;
        debug!("send {:?}", frame.as_str());
        self.transport.write_all(frame.as_bytes()).await?;
        let line = self.transport.read_line().await?;
        debug!("receive {:?}", line);

        let body = frame::decode_response(&line)
            .map_err(|error| Error::Frame {error, line: line.trim().to_string()})?;
        let payload = body.strip_prefix(echo)
            .ok_or_else(|| Error::Unexpected {
                command: command.to_string(),
                response: body.to_string(),
                })?
            .trim();
        if payload.contains("error") {
            warn!("node {} reported an error for command {:?}: {:?}", self.node, command, payload);
            return Err(Error::Device {
                command: command.to_string(),
                response: payload.to_string(),
                });
        }
        Ok(payload.to_string())
    }
}
