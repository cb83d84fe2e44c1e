/*!
    text frames exchanged on the rs485 bus

    every node listens to every frame but only answers the frames carrying its own identity. The host always uses the reserved [MASTER] identity in its responses.

    ```text
    command:   / <node> <command text> ! \n
    response:  / 0 <echoed command char> <payload> # \n
    ```

    there is no checksum: well-formedness is only judged by the delimiters, and by the echo of the command character (checked one layer above, in the link).
*/

use core::fmt::{self, Write};


/// first character of any frame
pub const START: char = '/';
/// last character of a command frame, before the line terminator
pub const COMMAND_END: char = '!';
/// last character of a response frame, before the line terminator
pub const RESPONSE_END: char = '#';
pub const LINE_END: char = '\n';
/// identity reserved for the host
pub const MASTER: char = '0';
/// maximum size of an encoded frame
pub const MAX_FRAME: usize = 160;

/// an encoded frame, ready to be written on the bus
pub type Frame = heapless::String<MAX_FRAME>;


/// addressing character of a node on the bus
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(char);
impl NodeId {
    /// nodes are `'1' ..= '9'`, `'A' ..= 'Z'` or `'a' ..= 'z'`, `'0'` belongs to the host
    pub const fn new(id: char) -> Result<Self, FrameError> {
        if id != MASTER && id.is_ascii_alphanumeric()
            {Ok(Self(id))}
        else
            {Err(FrameError::InvalidNode)}
    }
    pub const fn as_char(self) -> char {self.0}
}
impl TryFrom<char> for NodeId {
    type Error = FrameError;
    fn try_from(id: char) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}
impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char(self.0)
    }
}

/// structural problem in a frame
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameError {
    /// there is no command character
    Empty,
    /// the encoded frame does not fit in [MAX_FRAME]
    TooLong,
    /// the text contains a delimiter that would break the frame
    ReservedCharacter,
    /// the frame does not start with the expected prefix
    MissingStart,
    /// the end marker never arrived
    Incomplete,
    /// the addressing character is not a valid node identity
    InvalidNode,
}
impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Empty => "empty command",
            Self::TooLong => "frame too long",
            Self::ReservedCharacter => "reserved delimiter in frame text",
            Self::MissingStart => "invalid frame start",
            Self::Incomplete => "incomplete frame",
            Self::InvalidNode => "invalid node identity",
        })
    }
}


/// wrap a command for the given node
pub fn encode_command(node: NodeId, command: &str) -> Result<Frame, FrameError> {
    if command.is_empty()
        {return Err(FrameError::Empty)}
    check_text(command)?;
    let mut frame = Frame::new();
    write!(frame, "{START}{node}{command}{COMMAND_END}{LINE_END}")
        .map_err(|_| FrameError::TooLong)?;
    Ok(frame)
}

/**
    unwrap a response line received by the host

    the master prefix and the end marker are removed, leaving the echoed command character followed by the payload
*/
pub fn decode_response(line: &str) -> Result<&str, FrameError> {
    let body = line.trim()
        .strip_prefix(START)
        .and_then(|rest| rest.strip_prefix(MASTER))
        .ok_or(FrameError::MissingStart)?;
    let end = body.find(RESPONSE_END)
        .ok_or(FrameError::Incomplete)?;
    Ok(body[.. end].trim())
}

/// unwrap a command line received by a node, returning the addressed node and the command text
pub fn decode_command(line: &str) -> Result<(NodeId, &str), FrameError> {
    let body = line.trim()
        .strip_prefix(START)
        .ok_or(FrameError::MissingStart)?;
    let mut chars = body.chars();
    let node = NodeId::new(chars.next().ok_or(FrameError::Incomplete)?)?;
    let text = chars.as_str()
        .strip_suffix(COMMAND_END)
        .ok_or(FrameError::Incomplete)?;
    if text.is_empty()
        {return Err(FrameError::Empty)}
    Ok((node, text))
}

/// wrap the response body (echoed command character and payload) sent back by a node
pub fn encode_response(body: &str) -> Result<Frame, FrameError> {
    check_text(body)?;
    let mut frame = Frame::new();
    write!(frame, "{START}{MASTER}{body}{RESPONSE_END}{LINE_END}")
        .map_err(|_| FrameError::TooLong)?;
    Ok(frame)
}

fn check_text(text: &str) -> Result<(), FrameError> {
    if text.contains([COMMAND_END, RESPONSE_END, LINE_END, '\r'])
        {Err(FrameError::ReservedCharacter)}
    else
        {Ok(())}
}
