/*!
    talk to eDAQS nodes from a `std` host, asynchronously.

    The layering follows the hardware:

    - a [Transport] carries bytes on the bus, [SerialTransport] is the real serial port
    - a [NodeLink] exchanges one framed command with one node
    - a [Gateway] implements the commands of the bus-attached controller, and forwards the others to the sampling controller
    - sampling controllers are driven through the capability traits [RegisterFile], [TriggerControl] and [SampleStore], implemented by one struct per device family ([Avr64ea28], [Pico2Bu79100g], [Pico2Ads131m04])

    every exchange is a round trip awaited in sequence through `&mut self`, nothing is cached on the host: register values and memory metadata are read again when needed.
*/

/// byte streams carrying the frames
mod transport;
/// one command, one response
mod link;
/// commands of the bus-attached controller
mod gateway;
/// capability traits of the sampling controllers
mod daq;
/// retrieved recordings
mod store;
mod avr64ea28;
mod pico2_bu79100g;
mod pico2_ads131m04;

pub use transport::*;
pub use link::*;
pub use gateway::*;
pub use daq::*;
pub use store::*;
pub use avr64ea28::Avr64ea28;
pub use pico2_bu79100g::Pico2Bu79100g;
pub use pico2_ads131m04::Pico2Ads131m04;


use std::{string::String, time::Duration};
use thiserror::Error;
use crate::{
    frame::FrameError,
    selection::LayoutError,
    };

/// error regarding eDAQS communication
#[derive(Error, Debug)]
pub enum Error {
    #[error("problem with serial bus")]
    Bus(std::io::Error),
    #[error("{error} in {line:?}")]
    Frame {error: FrameError, line: String},
    #[error("unexpected response {response:?} to command {command:?}")]
    Unexpected {command: String, response: String},
    #[error("device reported an error for command {command:?}: {response:?}")]
    Device {command: String, response: String},
    #[error("DAQ_MCU response not ok for command {command:?}: {response:?}")]
    NotConfirmed {command: String, response: String},
    #[error("register index {index} out of range, the device has {count} registers")]
    Range {index: usize, count: usize},
    #[error("the device has {device} registers but its table has {table}")]
    TableMismatch {device: usize, table: usize},
    #[error("no register labeled {0:?}")]
    UnknownRegister(String),
    #[error("cannot read {text:?} as {expected}")]
    Parse {text: String, expected: &'static str},
    #[error("inconsistent sample memory: {0}")]
    Layout(LayoutError),
    #[error("{0} is not supported by this device")]
    Unsupported(&'static str),
    #[error("no data arrived in expected time")]
    Timeout,
}
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Bus(error)
    }
}
impl From<LayoutError> for Error {
    fn from(error: LayoutError) -> Self {
        Self::Layout(error)
    }
}

/// serial and polling settings
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub baud_rate: u32,
    /// maximum wait for a response line
    pub timeout: Duration,
    /// pause between two status queries when waiting for an event
    pub poll_interval: Duration,
}
impl Default for Settings {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            timeout: Duration::from_millis(500),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// parse a numeric payload, reporting what was expected
pub(crate) fn parse<T: core::str::FromStr>(text: &str, expected: &'static str) -> Result<T, Error> {
    text.trim().parse().map_err(|_| Error::Parse {text: text.into(), expected})
}
