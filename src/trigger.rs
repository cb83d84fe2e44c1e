/*!
    trigger modes of the sampling controllers and status of the gateway

    sampling always starts on the start command. What differs between modes is when it stops:

    - [TriggerMode::Immediate] records exactly the configured number of samples and stops
    - the waiting modes record continuously into the circular memory until an event, then record the configured number of samples more

    once a waiting mode is started, the only ways out are the event or a reset of the sampling controller.
*/

use core::fmt;
use bilge::prelude::*;


/// symbolic trigger mode, each device variant maps a subset of them to register codes
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TriggerMode {
    /// sampling stops after the configured number of samples
    Immediate,
    /// a comparator watches a sampled channel
    Internal,
    /// a comparator watches a dedicated input pin
    External,
    /// the shared event line is driven active by another party
    WaitForEventLine,
}
impl TriggerMode {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Immediate => "IMMEDIATE",
            Self::Internal => "INTERNAL",
            Self::External => "EXTERNAL",
            Self::WaitForEventLine => "WAIT_FOR_EVENT_LINE",
        }
    }
    /// true for the modes recording before the trigger event
    pub const fn waits(self) -> bool {
        !matches!(self, Self::Immediate)
    }
}
impl fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// direction of the comparator crossing
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Slope {
    /// the signal goes below the level
    Falling,
    /// the signal goes above the level
    #[default]
    Rising,
}
impl Slope {
    /// code used on the wire and in the registers
    pub const fn code(self) -> u8 {
        match self {
            Self::Falling => 0,
            Self::Rising => 1,
        }
    }
}

/// full trigger configuration to write to a sampling controller
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Trigger {
    Immediate,
    Internal {
        /// sampled channel watched by the comparator
        channel: u8,
        /// level in raw conversion codes
        level: i32,
        slope: Slope,
    },
    External,
    WaitForEventLine,
}
impl Trigger {
    pub const fn mode(&self) -> TriggerMode {
        match self {
            Self::Immediate => TriggerMode::Immediate,
            Self::Internal {..} => TriggerMode::Internal,
            Self::External => TriggerMode::External,
            Self::WaitForEventLine => TriggerMode::WaitForEventLine,
        }
    }
}


/**
    status word reported by the gateway

    both bits are independent: an event may have passed while post-trigger samples are still being recorded
*/
#[bitsize(2)]
#[derive(Copy, Clone, FromBits, DebugBits, PartialEq, Default)]
pub struct Status {
    /// the event line has been latched active
    pub event_passed: bool,
    /// sampling has stopped and the memory is consistent
    pub ready: bool,
}
impl Status {
    /**
        parse the status payload `"<event> <ready>"`

        the event line is active-low, so `0` in the first field means the event has passed
    */
    pub fn parse(payload: &str) -> Option<Self> {
        let flag = |field: &str| match field {
            "0" => Some(false),
            "1" => Some(true),
            _ => None,
        };
        let mut fields = payload.split_whitespace();
        let event_line = flag(fields.next()?)?;
        let ready = flag(fields.next()?)?;
        if fields.next().is_some()
            {return None}
        Some(Self::new(! event_line, ready))
    }
}
