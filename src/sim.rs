/*!
    in-process simulation of eDAQS nodes, to exercise the host side without hardware

    a [SimulatedBus] is a [Transport] delivering every frame to the [SimulatedNode]s attached to it, and queueing their responses. Nodes implement the gateway command set, the pass-through register file and a circular sample memory filled with [pattern] when a recording completes.

    recordings complete instantly: immediately in [TriggerMode::Immediate], on [SimulatedNode::fire_event] or on an event line assertion in the waiting modes.
*/

use std::{
    collections::VecDeque,
    format,
    string::{String, ToString},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    vec,
    vec::Vec,
    };
use core::fmt::Write;
use log::*;

use crate::{
    frame::{self, NodeId},
    registers::{Variant, avr64ea28, pico2_bu79100g, pico2_ads131m04},
    selection::PAGE_SIZE,
    trigger::TriggerMode,
    host::{Error, Transport, Confirmation},
    };


/// version string of the simulated gateways
pub const GATEWAY_VERSION: &str = "SIM-COMMS v0.1";

/**
    deterministic value recorded for a channel at a sample index, counted from the oldest sample of a recording

    it covers both signs and differs between channels
*/
pub fn pattern(index: usize, channel: usize) -> i32 {
    ((index * 3 + channel * 4099) % 65536) as i32 - 32768
}


/// sampling controller family simulated by a node
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Profile {
    Avr64ea28,
    Pico2Bu79100g,
    Pico2Ads131m04,
}
impl Profile {
    pub fn variant(self) -> Variant {
        match self {
            Self::Avr64ea28 => avr64ea28::VARIANT,
            Self::Pico2Bu79100g => pico2_bu79100g::VARIANT,
            Self::Pico2Ads131m04 => pico2_ads131m04::VARIANT,
        }
    }
    /// register values after a factory reset
    pub fn factory_values(self) -> Vec<i32> {
        match self {
            Self::Avr64ea28 => {
                let mut values = vec![0; avr64ea28::REGISTERS.len()];
                values[avr64ea28::PER_TICKS.index()] = 250;
                values[avr64ea28::NCHANNELS.index()] = 1;
                values[avr64ea28::NSAMPLES.index()] = 128;
                values[avr64ea28::TRIG_SLOPE.index()] = 1;
                values[avr64ea28::V_REF.index()] = 3;
                for channel in 0 .. avr64ea28::MAX_CHANNELS {
                    values[10 + 2*channel] = 28;
                    values[11 + 2*channel] = 48;
                }
                values
            },
            Self::Pico2Bu79100g => {
                let mut values = vec![0; pico2_bu79100g::REGISTERS.len()];
                values[pico2_bu79100g::PERIOD_US.index()] = 10;
                values[pico2_bu79100g::NCHANNELS.index()] = 8;
                values[pico2_bu79100g::NSAMPLES.index()] = 128;
                values
            },
            Self::Pico2Ads131m04 => {
                let mut values = vec![0; pico2_ads131m04::REGISTERS.len()];
                values[pico2_ads131m04::CLK_KHZ.index()] = 8192;
                values[pico2_ads131m04::OSR.index()] = 1024;
                values[pico2_ads131m04::NCHANNELS.index()] = 4;
                values[pico2_ads131m04::NSAMPLES.index()] = 128;
                values
            },
        }
    }
    /// size of the sample memory
    pub fn memory(self) -> usize {
        match self {
            Self::Avr64ea28 => 128 * 1024,
            Self::Pico2Bu79100g | Self::Pico2Ads131m04 => 256 * 1024,
        }
    }
    /// how the gateway of this family confirms pass-through commands
    pub fn confirmation(self) -> Confirmation {
        match self {
            Self::Pico2Ads131m04 => Confirmation::Echo,
            _ => Confirmation::Ok,
        }
    }
    fn max_channels(self) -> usize {
        match self {
            Self::Avr64ea28 => avr64ea28::MAX_CHANNELS,
            Self::Pico2Bu79100g => 8,
            Self::Pico2Ads131m04 => pico2_ads131m04::MAX_CHANNELS,
        }
    }
}


#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Sampling {
    Idle,
    /// recording into the circular memory until the event
    Waiting,
    Done,
}

/// recording parameters fixed when sampling starts
#[derive(Copy, Clone, Debug, Default)]
struct Recording {
    nchan: usize,
    bytes_per_sample_set: usize,
    capacity: usize,
    nsamples_after_trigger: usize,
}

struct NodeState {
    id: NodeId,
    profile: Profile,
    confirmation: Confirmation,
    registers: Vec<i32>,
    register_count: usize,
    memory: Vec<u8>,
    oldest: usize,
    forced_oldest: Option<usize>,
    sampling: Sampling,
    recording: Recording,
    late: bool,
    event_latched: bool,
    comparator_met: bool,
    armed: bool,
    led: bool,
    daq_led: bool,
    vref: Option<u8>,
    millivolts: u32,
}

/// handle to a simulated node, clones share the same node
#[derive(Clone)]
pub struct SimulatedNode(Arc<Mutex<NodeState>>);

impl SimulatedNode {
    pub fn new(id: NodeId, profile: Profile) -> Self {
        let registers = profile.factory_values();
        Self(Arc::new(Mutex::new(NodeState {
            id,
            profile,
            confirmation: profile.confirmation(),
            register_count: registers.len(),
            registers,
            memory: vec![0; profile.memory()],
            oldest: 0,
            forced_oldest: None,
            sampling: Sampling::Idle,
            recording: Recording::default(),
            late: false,
            event_latched: false,
            comparator_met: false,
            armed: false,
            led: false,
            daq_led: false,
            vref: None,
            millivolts: 3300,
        })))
    }
    /// how the gateway of this node confirms pass-through commands
    pub fn with_confirmation(self, confirmation: Confirmation) -> Self {
        self.lock().confirmation = confirmation;
        self
    }
    /// replace the sample memory with a zeroed one of the given size, a multiple of the page size
    pub fn with_memory(self, total_bytes: usize) -> Self {
        self.lock().memory = vec![0; total_bytes];
        self
    }
    fn lock(&self) -> MutexGuard<'_, NodeState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> NodeId {self.lock().id}
    /// latch the event, completing a recording waiting for it
    pub fn fire_event(&self) {self.lock().event()}
    /// place the oldest sample of the next recording at this byte address
    pub fn set_oldest(&self, addr: usize) {self.lock().forced_oldest = Some(addr)}
    /// report the next recordings as late or not
    pub fn set_late(&self, late: bool) {self.lock().late = late}
    /// pretend the firmware implements only the first `count` registers
    pub fn set_register_count(&self, count: usize) {self.lock().register_count = count}
    /// make the comparators refuse to arm, as if their condition was already met
    pub fn set_comparator_met(&self, met: bool) {self.lock().comparator_met = met}
    pub fn set_millivolts(&self, millivolts: u32) {self.lock().millivolts = millivolts}

    pub fn register(&self, index: usize) -> Option<i32> {self.lock().registers.get(index).copied()}
    pub fn led(&self) -> bool {self.lock().led}
    /// led of the sampling controller
    pub fn daq_led(&self) -> bool {self.lock().daq_led}
    pub fn vref(&self) -> Option<u8> {self.lock().vref}
    pub fn armed(&self) -> bool {self.lock().armed}
    pub fn is_ready(&self) -> bool {self.lock().sampling != Sampling::Waiting}
    pub fn event_passed(&self) -> bool {self.lock().event_latched}
    /// copy of the whole sample memory
    pub fn memory(&self) -> Vec<u8> {self.lock().memory.clone()}
}

impl NodeState {
    fn variant(&self) -> Variant {self.profile.variant()}
    fn reg(&self, index: usize) -> i32 {
        self.registers.get(index).copied().unwrap_or_default()
    }
    fn total_bytes(&self) -> usize {self.memory.len()}
    /// channel count register, as understood by the firmware
    fn nchan(&self) -> usize {
        usize::try_from(self.reg(self.variant().nchannels.index())).unwrap_or_default()
            .clamp(1, self.profile.max_channels())
    }
    fn bytes_per_sample_set(&self) -> usize {
        (self.nchan() * self.variant().sample_format.value_size()).next_power_of_two().min(PAGE_SIZE)
    }
    fn capacity(&self) -> usize {
        self.total_bytes() / self.bytes_per_sample_set()
    }

    fn gateway_command(&mut self, text: &str) -> String {
        let mut chars = text.chars();
        let Some(command) = chars.next()
            else {return String::new()};
        let args = chars.as_str();
        let fields = args.split_whitespace().collect::<Vec<_>>();
        match command {
            'v' => format!("v {}", GATEWAY_VERSION),
            'L' => {
                self.led = args.trim() == "1";
                format!("L{}", args.trim())
            },
            't' | 'z' | 'F' => command.to_string(),
            'R' => {
                self.sampling = Sampling::Idle;
                "R".into()
            },
            'Q' => format!("Q {} {}",
                if self.event_latched {0} else {1},
                if self.sampling == Sampling::Waiting {0} else {1},
                ),
            'e' | 'i' => {
                if fields.len() != 2
                    {format!("{} error expected level and slope", command)}
                else if self.comparator_met
                    {format!("{} error condition already met", command)}
                else {
                    self.armed = true;
                    command.to_string()
                }
            },
            'd' => {
                self.armed = false;
                "d".into()
            },
            'w' => {
                match fields.as_slice() {
                    [level, "1"] => self.vref = level.parse().ok(),
                    _ => self.vref = None,
                }
                "w".into()
            },
            'a' => format!("a {}", self.millivolts),
            'X' => {
                let inner = args;
                match self.daq_command(inner) {
                    Ok(payload) => match self.confirmation {
                        Confirmation::Ok => format!("Xok {}", payload),
                        Confirmation::Echo => format!("X{} {}", inner.chars().next().unwrap_or(' '), payload),
                    },
                    Err(message) => format!("X error {}", message),
                }
            },
            _ => format!("{} error unknown command", command),
        }
    }

    fn daq_command(&mut self, text: &str) -> Result<String, &'static str> {
        let mut chars = text.chars();
        let command = chars.next().ok_or("empty command")?;
        let fields = chars.as_str().split_whitespace().collect::<Vec<_>>();
        let number = |i: usize| -> Result<i64, &'static str> {
            fields.get(i).ok_or("missing argument")?
                .parse().map_err(|_| "bad number")
        };
        let variant = self.variant();
        Ok(match command {
            'v' => format!("{} sim v0.1", variant.name),
            'n' => self.register_count.to_string(),
            'r' => {
                let index = self.register_index(number(0)?)?;
                self.reg(index).to_string()
            },
            's' => {
                let index = self.register_index(number(0)?)?;
                let value = i32::try_from(number(1)?).map_err(|_| "bad number")?;
                self.registers[index] = value;
                format!("{} {}", index, value)
            },
            'F' => {
                self.registers = self.profile.factory_values();
                String::new()
            },
            'g' => {
                self.start();
                String::new()
            },
            'k' => (if self.late {"1"} else {"0"}).to_string(),
            'L' => {
                self.daq_led = match text.get(1 ..).map(str::trim) {
                    Some(",1") => true,
                    Some(",0") => false,
                    _ => return Err("bad led state"),
                };
                String::new()
            },
            'I' => join((0 .. self.nchan()).map(|channel| pattern(0, channel))),
            'P' => {
                let index = usize::try_from(number(0)?).map_err(|_| "bad sample index")?;
                let Recording {nchan, bytes_per_sample_set, ..} = self.recording;
                let addr = (self.oldest + index * bytes_per_sample_set) % self.total_bytes();
                let format = variant.sample_format;
                join((0 .. nchan).map(|channel| {
                    format.decode(&self.memory[addr + channel * format.value_size() ..]).unwrap_or_default()
                }))
            },
            'b' => self.bytes_per_sample_set().to_string(),
            'm' => self.capacity().to_string(),
            'T' => self.total_bytes().to_string(),
            'N' => (self.total_bytes() / PAGE_SIZE).to_string(),
            'a' => self.oldest.to_string(),
            'M' => {
                let addr = usize::try_from(number(0)?).map_err(|_| "bad address")?;
                if addr % PAGE_SIZE != 0 || addr >= self.total_bytes()
                    {return Err("bad page address")}
                let mut text = String::with_capacity(2 * PAGE_SIZE);
                for byte in &self.memory[addr .. addr + PAGE_SIZE] {
                    let _ = write!(text, "{:02x}", byte);
                }
                text
            },
            _ => return Err("unknown command"),
        })
    }
    fn register_index(&self, index: i64) -> Result<usize, &'static str> {
        usize::try_from(index).ok()
            .filter(|&index| index < self.register_count && index < self.registers.len())
            .ok_or("bad register index")
    }

    fn start(&mut self) {
        let variant = self.variant();
        let bytes_per_sample_set = self.bytes_per_sample_set();
        let capacity = self.capacity();
        let nchan = self.nchan();
        let nsamples = usize::try_from(self.reg(variant.nsamples.index())).unwrap_or_default();
        let mode = variant.mode(self.reg(variant.trigger_mode.index()))
            .unwrap_or(TriggerMode::Immediate);

        self.recording = Recording {
            nchan,
            bytes_per_sample_set,
            capacity,
            nsamples_after_trigger: nsamples.min(capacity),
        };
        self.oldest = match self.forced_oldest.take() {
            Some(addr) => addr % self.total_bytes(),
            None if capacity > 0 => rand::random_range(0 .. capacity) * bytes_per_sample_set,
            None => 0,
        };
        self.event_latched = false;
        debug!("node {} starts sampling in mode {}", self.id, mode);
        if mode.waits()
            {self.sampling = Sampling::Waiting}
        else {
            self.record(self.recording.nsamples_after_trigger);
            self.sampling = Sampling::Done;
        }
    }
    fn event(&mut self) {
        self.event_latched = true;
        self.armed = false;
        if self.sampling == Sampling::Waiting {
            self.record(self.recording.capacity);
            self.sampling = Sampling::Done;
        }
    }
    /// write `n` sample sets from the oldest address
    fn record(&mut self, n: usize) {
        let Recording {nchan, bytes_per_sample_set, ..} = self.recording;
        let format = self.variant().sample_format;
        let total_bytes = self.total_bytes();
        for index in 0 .. n {
            let addr = (self.oldest + index * bytes_per_sample_set) % total_bytes;
            for channel in 0 .. nchan {
                let start = addr + channel * format.value_size();
                let _ = format.encode(pattern(index, channel), &mut self.memory[start ..]);
            }
        }
    }
}

fn join(values: impl Iterator<Item=i32>) -> String {
    let mut text = String::new();
    for value in values {
        if ! text.is_empty() {text.push(' ')}
        let _ = write!(text, "{}", value);
    }
    text
}


/**
    bus shared by simulated nodes

    clones share the nodes but each one has its own reception queue, like several ports opened on the same bus
*/
#[derive(Clone, Default)]
pub struct SimulatedBus {
    nodes: Vec<SimulatedNode>,
    received: VecDeque<String>,
}
impl SimulatedBus {
    pub fn new() -> Self {Self::default()}
    pub fn with_node(mut self, node: SimulatedNode) -> Self {
        self.nodes.push(node);
        self
    }
    pub fn nodes(&self) -> &[SimulatedNode] {&self.nodes}
    /// queue a raw line, as if some device had sent it
    pub fn inject(&mut self, line: &str) {
        self.received.push_back(line.to_string());
    }
}
impl Transport for SimulatedBus {
    fn discard_input(&mut self) -> Result<(), Error> {
        self.received.clear();
        Ok(())
    }
    async fn write_all(&mut self, data: &[u8]) -> Result<(), Error> {
        let Ok(line) = core::str::from_utf8(data)
            else {return Ok(())};
        // nodes ignore malformed frames
        let Ok((id, text)) = frame::decode_command(line)
            else {return Ok(())};
        for node in &self.nodes {
            let mut state = node.lock();
            if state.id != id {continue}
            let body = state.gateway_command(text);
            drop(state);
            match frame::encode_response(&body) {
                Ok(response) => self.received.push_back(response.as_str().into()),
                Err(error) => warn!("simulated node {} cannot frame {:?}: {}", id, body, error),
            }
        }
        // the event line is shared by all nodes
        if text == "t" && self.nodes.iter().any(|node| node.id() == id) {
            for node in &self.nodes {
                node.fire_event();
            }
        }
        Ok(())
    }
    async fn read_line(&mut self) -> Result<String, Error> {
        self.received.pop_front().ok_or(Error::Timeout)
    }
}
