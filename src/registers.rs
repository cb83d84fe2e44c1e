/*!
    virtual registers of the sampling controllers

    each sampling controller firmware exposes a small indexed set of named integer registers, only reachable through the gateway pass-through. Each family of controller has its own table, described here by a [Variant] along with the other per-family constants.

    tables are checked when built in const context: indices must match their position and labels must be unique, so that index and label lookups are both bijective.
*/

use crate::{
    trigger::TriggerMode,
    sample::SampleFormat,
    };


/**
    a named register of a sampling controller

    it only holds the register's index and label, hence can be created, copied or destroyed at no cost
*/
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Register {
    index: u8,
    label: &'static str,
}
impl Register {
    pub const fn new(index: u8, label: &'static str) -> Self {
        Self {index, label}
    }
    pub const fn index(&self) -> usize {self.index as usize}
    pub const fn label(&self) -> &'static str {self.label}
}

/// ordered set of the registers of one firmware
#[derive(Copy, Clone, Debug)]
pub struct RegisterTable {
    registers: &'static [Register],
}
impl RegisterTable {
    /// panics (at compile time in const context) if the table is not bijective
    pub const fn new(registers: &'static [Register]) -> Self {
        let mut i = 0;
        while i < registers.len() {
            assert!(registers[i].index as usize == i, "register index does not match its position");
            let mut j = 0;
            while j < i {
                assert!(! str_eq(registers[i].label, registers[j].label), "duplicated register label");
                j += 1;
            }
            i += 1;
        }
        Self {registers}
    }
    pub const fn len(&self) -> usize {self.registers.len()}
    pub const fn is_empty(&self) -> bool {self.registers.is_empty()}
    pub fn get(&self, index: usize) -> Option<Register> {
        self.registers.get(index).copied()
    }
    pub fn label(&self, index: usize) -> Option<&'static str> {
        self.get(index).map(|register| register.label)
    }
    /// register with the given label, case sensitive
    pub fn find(&self, label: &str) -> Option<Register> {
        self.registers.iter().find(|register| register.label == label).copied()
    }
    pub fn iter(&self) -> impl Iterator<Item=Register> + '_ {
        self.registers.iter().copied()
    }
}

const fn str_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len()
        {return false}
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i]
            {return false}
        i += 1;
    }
    true
}


/// registers configuring the comparator of the internal trigger
#[derive(Copy, Clone, Debug)]
pub struct Comparator {
    pub channel: Register,
    pub level: Register,
    pub slope: Register,
}

/// how the sample period is programmed
#[derive(Copy, Clone, Debug)]
pub enum Period {
    /// a timer counts ticks of fixed duration between two samples
    Ticks {
        register: Register,
        us_per_tick: f64,
    },
    /**
        a delta-sigma modulator clocked at half the input clock, decimated by the oversampling ratio

        the period is `2 * osr / clock`, the ratio can only take the listed values
    */
    Oversampling {
        clock_khz: Register,
        osr: Register,
        ratios: &'static [u16],
    },
}
impl Period {
    /// sample period of an oversampling converter, `None` for a stopped clock
    pub fn oversampled_us(clock_khz: i32, osr: i32) -> Option<f64> {
        (clock_khz > 0).then(|| 2e3 * f64::from(osr) / f64::from(clock_khz))
    }
    /// largest ratio giving a period not above `period_us`, or the smallest ratio if none does
    pub fn oversampling_ratio(ratios: &[u16], clock_khz: i32, period_us: f64) -> Option<u16> {
        ratios.iter().copied()
            .filter(|&osr| Self::oversampled_us(clock_khz, osr.into()).is_some_and(|us| us <= period_us))
            .max()
            .or_else(|| ratios.iter().copied().min())
    }
}

/// constants of one family of sampling controller
#[derive(Copy, Clone, Debug)]
pub struct Variant {
    pub name: &'static str,
    pub registers: RegisterTable,
    pub period: Period,
    /// register holding the number of recorded channels
    pub nchannels: Register,
    /// register holding the number of samples recorded after the trigger event
    pub nsamples: Register,
    /// largest value accepted in [Self::nsamples]
    pub max_nsamples: i32,
    pub trigger_mode: Register,
    /// present if the variant supports [TriggerMode::Internal]
    pub comparator: Option<Comparator>,
    /// register code of each supported trigger mode
    pub trigger_modes: &'static [(i32, TriggerMode)],
    pub sample_format: SampleFormat,
}
impl Variant {
    pub fn mode_code(&self, mode: TriggerMode) -> Option<i32> {
        self.trigger_modes.iter()
            .find(|&&(_, m)| m == mode)
            .map(|&(code, _)| code)
    }
    pub fn mode(&self, code: i32) -> Option<TriggerMode> {
        self.trigger_modes.iter()
            .find(|&&(c, _)| c == code)
            .map(|&(_, mode)| mode)
    }
}

/// panics (at compile time in const context) if a code or a mode appears twice
const fn check_modes(modes: &'static [(i32, TriggerMode)]) -> &'static [(i32, TriggerMode)] {
    let mut i = 0;
    while i < modes.len() {
        let mut j = 0;
        while j < i {
            assert!(modes[i].0 != modes[j].0, "duplicated trigger mode code");
            assert!(modes[i].1 as u8 != modes[j].1 as u8, "duplicated trigger mode");
            j += 1;
        }
        i += 1;
    }
    modes
}


/**
    AVR64EA28 sampling controller of the avr-edaq boards

    up to 12 channels, each one a pair of analog inputs (single-ended against GND, or differential), optional programmable gain amplifier and selectable reference voltage
*/
pub mod avr64ea28 {
    use super::*;

    pub const PER_TICKS: Register = Register::new(0, "PER_TICKS");
    pub const NCHANNELS: Register = Register::new(1, "NCHANNELS");
    pub const NSAMPLES: Register = Register::new(2, "NSAMPLES");
    pub const TRIG_MODE: Register = Register::new(3, "TRIG_MODE");
    pub const TRIG_CHAN: Register = Register::new(4, "TRIG_CHAN");
    pub const TRIG_LEVEL: Register = Register::new(5, "TRIG_LEVEL");
    pub const TRIG_SLOPE: Register = Register::new(6, "TRIG_SLOPE");
    pub const PGA_FLAG: Register = Register::new(7, "PGA_FLAG");
    pub const PGA_GAIN: Register = Register::new(8, "PGA_GAIN");
    pub const V_REF: Register = Register::new(9, "V_REF");
    pub const NBURST: Register = Register::new(34, "NBURST");
    pub const DIFF_CONV: Register = Register::new(35, "DIFF_CONV");

    /// maximum number of channels in a sample set
    pub const MAX_CHANNELS: usize = 12;

    const TABLE: &[Register] = &[
        PER_TICKS, NCHANNELS, NSAMPLES,
        TRIG_MODE, TRIG_CHAN, TRIG_LEVEL, TRIG_SLOPE,
        PGA_FLAG, PGA_GAIN, V_REF,
        Register::new(10, "CH0+"), Register::new(11, "CH0-"),
        Register::new(12, "CH1+"), Register::new(13, "CH1-"),
        Register::new(14, "CH2+"), Register::new(15, "CH2-"),
        Register::new(16, "CH3+"), Register::new(17, "CH3-"),
        Register::new(18, "CH4+"), Register::new(19, "CH4-"),
        Register::new(20, "CH5+"), Register::new(21, "CH5-"),
        Register::new(22, "CH6+"), Register::new(23, "CH6-"),
        Register::new(24, "CH7+"), Register::new(25, "CH7-"),
        Register::new(26, "CH8+"), Register::new(27, "CH8-"),
        Register::new(28, "CH9+"), Register::new(29, "CH9-"),
        Register::new(30, "CH10+"), Register::new(31, "CH10-"),
        Register::new(32, "CH11+"), Register::new(33, "CH11-"),
        NBURST, DIFF_CONV,
        ];
    pub const REGISTERS: RegisterTable = RegisterTable::new(TABLE);
    const MODES: &[(i32, TriggerMode)] = &[
        (0, TriggerMode::Immediate),
        (1, TriggerMode::Internal),
        (2, TriggerMode::External),
        ];

    pub const VARIANT: Variant = Variant {
        name: "AVR64EA28",
        registers: REGISTERS,
        period: Period::Ticks {register: PER_TICKS, us_per_tick: 0.8},
        nchannels: NCHANNELS,
        // reported back as a 16 bit signed integer
        nsamples: NSAMPLES,
        max_nsamples: 32767,
        trigger_mode: TRIG_MODE,
        comparator: Some(Comparator {
            channel: TRIG_CHAN,
            level: TRIG_LEVEL,
            slope: TRIG_SLOPE,
        }),
        trigger_modes: check_modes(MODES),
        sample_format: SampleFormat::I16_BE,
    };

    /// positive input register of a channel
    pub fn positive_input(channel: usize) -> Option<Register> {
        if channel >= MAX_CHANNELS {return None}
        REGISTERS.get(10 + 2*channel)
    }
    /// negative input register of a channel
    pub fn negative_input(channel: usize) -> Option<Register> {
        if channel >= MAX_CHANNELS {return None}
        REGISTERS.get(11 + 2*channel)
    }

    /// analog input names and the multiplexer code selecting them
    pub const PINS: &[(&str, u8)] = &[
        ("AIN0", 0), ("PD0", 0), ("AIN1", 1), ("PD1", 1),
        ("AIN2", 2), ("PD2", 2), ("AIN3", 3), ("PD3", 3),
        ("AIN4", 4), ("PD4", 4), ("AIN5", 5), ("PD5", 5),
        ("AIN6", 6), ("PD6", 6), ("AIN7", 7), ("PD7", 7),
        ("AIN28", 28), ("PC0", 28), ("AIN29", 29), ("PC1", 29),
        ("AIN30", 30), ("PC2", 30), ("AIN31", 31), ("PC3", 31),
        ("GND", 48),
        ];
    /// multiplexer code of a pin given by name (case insensitive) or by its code in decimal
    pub fn pin(name: &str) -> Option<u8> {
        let name = name.trim();
        if let Some(&(_, code)) = PINS.iter().find(|(pin, _)| pin.eq_ignore_ascii_case(name))
            {return Some(code)}
        let code = name.parse::<u8>().ok()?;
        PINS.iter().any(|&(_, c)| c == code).then_some(code)
    }

    /// gain of the programmable amplifier
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub enum PgaGain {
        X1,
        X2,
        X4,
        X8,
        X16,
    }
    impl PgaGain {
        pub const ALL: [Self; 5] = [Self::X1, Self::X2, Self::X4, Self::X8, Self::X16];
        pub const fn code(self) -> i32 {self as i32}
        pub const fn gain(self) -> u32 {1 << (self as u32)}
        pub fn from_code(code: i32) -> Option<Self> {
            Self::ALL.into_iter().find(|gain| gain.code() == code)
        }
    }

    /// reference voltage of the converter
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub enum RefVoltage {
        /// supply voltage after the schottky diode drop
        Vdd,
        V1_024,
        V2_048,
        V4_096,
        V2_500,
    }
    impl RefVoltage {
        pub const ALL: [Self; 5] = [Self::Vdd, Self::V1_024, Self::V2_048, Self::V4_096, Self::V2_500];
        pub const fn code(self) -> i32 {self as i32}
        pub const fn volts(self) -> f64 {
            match self {
                Self::Vdd => 4.75,
                Self::V1_024 => 1.024,
                Self::V2_048 => 2.048,
                Self::V4_096 => 4.096,
                Self::V2_500 => 2.500,
            }
        }
        pub fn from_code(code: i32) -> Option<Self> {
            Self::ALL.into_iter().find(|voltage| voltage.code() == code)
        }
    }

    /// largest number of accumulated conversions per sample, as a power of 2
    pub const MAX_BURST_LOG2: u32 = 10;
}


/// Pico2 sampling controller driving 8 BU79100G converters
pub mod pico2_bu79100g {
    use super::*;

    pub const PERIOD_US: Register = Register::new(0, "PERIOD_US");
    pub const NCHANNELS: Register = Register::new(1, "NCHANNELS");
    pub const NSAMPLES: Register = Register::new(2, "NSAMPLES");
    pub const TRIG_MODE: Register = Register::new(3, "TRIG_MODE");
    /// timeout of the real-time data port, 0 disables it
    pub const RTDP_US: Register = Register::new(4, "RTDP_US");

    const TABLE: &[Register] = &[PERIOD_US, NCHANNELS, NSAMPLES, TRIG_MODE, RTDP_US];
    pub const REGISTERS: RegisterTable = RegisterTable::new(TABLE);
    const MODES: &[(i32, TriggerMode)] = &[
        (0, TriggerMode::Immediate),
        (1, TriggerMode::WaitForEventLine),
        ];

    pub const VARIANT: Variant = Variant {
        name: "PICO2_BU79100G",
        registers: REGISTERS,
        period: Period::Ticks {register: PERIOD_US, us_per_tick: 1.0},
        nchannels: NCHANNELS,
        nsamples: NSAMPLES,
        max_nsamples: 32768,
        trigger_mode: TRIG_MODE,
        comparator: None,
        trigger_modes: check_modes(MODES),
        sample_format: SampleFormat::I16_BE,
    };
}


/**
    Pico2 sampling controller driving an ADS131M04 delta-sigma converter

    4 simultaneous channels of 24 bit codes, stored as 32 bit little-endian values. Its gateway confirms pass-through commands by echoing them.
*/
pub mod pico2_ads131m04 {
    use super::*;

    /// clock of the converter, in kHz
    pub const CLK_KHZ: Register = Register::new(0, "CLK_KHZ");
    pub const OSR: Register = Register::new(1, "OSR");
    pub const NCHANNELS: Register = Register::new(2, "NCHANNELS");
    pub const NSAMPLES: Register = Register::new(3, "NSAMPLES");
    pub const TRIG_MODE: Register = Register::new(4, "TRIG_MODE");
    /// gain of the converter amplifier, as a power of 2
    pub const PGA_GAIN: Register = Register::new(5, "PGA_GAIN");

    pub const MAX_CHANNELS: usize = 4;
    /// oversampling ratios of the converter
    pub const RATIOS: &[u16] = &[128, 256, 512, 1024, 2048, 4096, 8192, 16256];
    /// internal reference, in volts
    pub const REF_VOLTAGE: f64 = 1.2;
    /// code of the positive full scale input, the codes are signed 24 bit integers
    pub const FULL_SCALE: f64 = 8_388_608.;
    /// largest amplifier gain, as a power of 2
    pub const MAX_GAIN_LOG2: u32 = 7;

    const TABLE: &[Register] = &[CLK_KHZ, OSR, NCHANNELS, NSAMPLES, TRIG_MODE, PGA_GAIN];
    pub const REGISTERS: RegisterTable = RegisterTable::new(TABLE);
    const MODES: &[(i32, TriggerMode)] = &[
        (0, TriggerMode::Immediate),
        (1, TriggerMode::WaitForEventLine),
        (2, TriggerMode::External),
        ];

    pub const VARIANT: Variant = Variant {
        name: "PICO2_ADS131M04",
        registers: REGISTERS,
        period: Period::Oversampling {clock_khz: CLK_KHZ, osr: OSR, ratios: RATIOS},
        nchannels: NCHANNELS,
        nsamples: NSAMPLES,
        max_nsamples: 32768,
        trigger_mode: TRIG_MODE,
        comparator: None,
        trigger_modes: check_modes(MODES),
        sample_format: SampleFormat::I32_LE,
    };

    /// input voltage of a conversion code
    pub fn volts(code: i32, gain: f64) -> f64 {
        f64::from(code) / FULL_SCALE * REF_VOLTAGE / gain
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avr_table() {
        let table = avr64ea28::REGISTERS;
        assert_eq!(table.len(), 36);
        assert_eq!(table.label(9), Some("V_REF"));
        assert_eq!(table.find("CH3-").map(|r| r.index()), Some(17));
        assert_eq!(table.find("NBURST"), Some(avr64ea28::NBURST));
        assert_eq!(table.find("nburst"), None);
        assert_eq!(table.get(36), None);
        // label and index lookups agree everywhere
        for register in table.iter() {
            assert_eq!(table.find(register.label()), Some(register));
            assert_eq!(table.get(register.index()), Some(register));
        }
        assert_eq!(avr64ea28::positive_input(11).map(|r| r.label()), Some("CH11+"));
        assert_eq!(avr64ea28::negative_input(0).map(|r| r.label()), Some("CH0-"));
        assert_eq!(avr64ea28::positive_input(12), None);
    }

    #[test]
    fn trigger_codes() {
        let avr = avr64ea28::VARIANT;
        assert_eq!(avr.mode_code(TriggerMode::External), Some(2));
        assert_eq!(avr.mode(1), Some(TriggerMode::Internal));
        assert_eq!(avr.mode_code(TriggerMode::WaitForEventLine), None);

        let pico = pico2_bu79100g::VARIANT;
        assert_eq!(pico.mode(1), Some(TriggerMode::WaitForEventLine));
        assert_eq!(pico.mode(2), None);
        assert!(pico.comparator.is_none());
        assert_eq!(pico.registers.len(), 5);
    }

    #[test]
    fn avr_constants() {
        use avr64ea28::*;
        assert_eq!(pin("ain3"), Some(3));
        assert_eq!(pin("PC3"), Some(31));
        assert_eq!(pin("gnd"), Some(48));
        assert_eq!(pin("29"), Some(29));
        assert_eq!(pin("12"), None);
        assert_eq!(pin("PB0"), None);

        assert_eq!(PgaGain::X8.gain(), 8);
        assert_eq!(PgaGain::from_code(4), Some(PgaGain::X16));
        assert_eq!(PgaGain::from_code(5), None);
        assert_eq!(RefVoltage::from_code(3).map(RefVoltage::volts), Some(4.096));
    }

    #[test]
    fn ads131m04_constants() {
        use pico2_ads131m04::*;
        assert_eq!(VARIANT.sample_format, SampleFormat::I32_LE);
        assert_eq!(VARIANT.mode_code(TriggerMode::External), Some(2));
        assert_eq!(VARIANT.mode_code(TriggerMode::Internal), None);
        assert_eq!(REGISTERS.find("PGA_GAIN"), Some(PGA_GAIN));
        assert_eq!(volts(-8_388_608, 1.), -1.2);
        assert_eq!(volts(4_194_304, 2.), 0.3);
    }

    #[test]
    fn oversampling_period() {
        use pico2_ads131m04::RATIOS;
        assert_eq!(Period::oversampled_us(8192, 1024), Some(250.));
        assert_eq!(Period::oversampled_us(0, 1024), None);
        assert_eq!(Period::oversampling_ratio(RATIOS, 8192, 250.), Some(1024));
        assert_eq!(Period::oversampling_ratio(RATIOS, 8192, 400.), Some(1024));
        assert_eq!(Period::oversampling_ratio(RATIOS, 8192, 1.), Some(128));
        assert_eq!(Period::oversampling_ratio(RATIOS, 8192, 1e6), Some(16256));
    }
}
