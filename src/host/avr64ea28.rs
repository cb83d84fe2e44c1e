use std::string::ToString;
use log::*;

use crate::registers::{
    Register, Variant,
    avr64ea28::{self, PgaGain, RefVoltage, MAX_CHANNELS, MAX_BURST_LOG2},
    };
use super::{Error, Transport, Gateway, RegisterFile, TriggerControl, SampleStore};


/**
    AVR64EA28 sampling controller, behind its gateway

    channels are pairs of analog inputs named after the pins of the microcontroller, see [avr64ea28::PINS]
*/
pub struct Avr64ea28<T> {
    gateway: Gateway<T>,
}
impl<T: Transport> Avr64ea28<T> {
    pub fn new(gateway: Gateway<T>) -> Self {
        Self {gateway}
    }
    pub fn into_gateway(self) -> Gateway<T> {self.gateway}

    /// configure the recorded channels from (positive, negative) input pairs, at most 12 are kept
    pub async fn set_analog_channels(&mut self, channels: &[(&str, &str)]) -> Result<(), Error> {
        if channels.len() > MAX_CHANNELS {
            warn!("only the first {} of {} channels are recorded", MAX_CHANNELS, channels.len());
        }
        let channels = &channels[.. channels.len().min(MAX_CHANNELS)];
        let pin = |name: &str| avr64ea28::pin(name)
            .map(i32::from)
            .ok_or_else(|| Error::Parse {text: name.into(), expected: "analog input pin"});
        // resolve everything before touching the device
        let mut codes = heapless::Vec::<(i32, i32), MAX_CHANNELS>::new();
        for &(positive, negative) in channels {
            let _ = codes.push((pin(positive)?, pin(negative)?));
        }
        // at most 12 channels, always fits
        self.write(avr64ea28::NCHANNELS, codes.len() as i32).await?;
        for (channel, &(positive, negative)) in codes.iter().enumerate() {
            self.write(register(avr64ea28::positive_input(channel))?, positive).await?;
            self.write(register(avr64ea28::negative_input(channel))?, negative).await?;
        }
        Ok(())
    }
    /// amplify through the programmable gain amplifier
    pub async fn set_pga(&mut self, gain: PgaGain) -> Result<(), Error> {
        self.write(avr64ea28::PGA_FLAG, 1).await?;
        self.write(avr64ea28::PGA_GAIN, gain.code()).await?;
        Ok(())
    }
    /// convert directly, bypassing the amplifier
    pub async fn clear_pga(&mut self) -> Result<(), Error> {
        self.write(avr64ea28::PGA_FLAG, 0).await?;
        self.write(avr64ea28::PGA_GAIN, PgaGain::X1.code()).await?;
        Ok(())
    }
    pub async fn set_ref_voltage(&mut self, voltage: RefVoltage) -> Result<(), Error> {
        self.write(avr64ea28::V_REF, voltage.code()).await?;
        Ok(())
    }
    /// number of conversions accumulated in each sample
    pub async fn burst(&mut self) -> Result<u32, Error> {
        let log2 = self.read(avr64ea28::NBURST).await?;
        u32::try_from(log2).ok()
            .filter(|&log2| log2 <= MAX_BURST_LOG2)
            .map(|log2| 1 << log2)
            .ok_or_else(|| Error::Parse {text: log2.to_string(), expected: "burst size"})
    }
    /**
        accumulate `n` conversions per sample, `n` must be a power of 2 up to 1024

        accumulated results are scaled by 16 relative to a single 12 bit conversion
    */
    pub async fn set_burst(&mut self, n: u32) -> Result<(), Error> {
        if ! n.is_power_of_two() || n.trailing_zeros() > MAX_BURST_LOG2
            {return Err(Error::Unsupported("burst size"))}
        self.write(avr64ea28::NBURST, n.trailing_zeros() as i32).await?;
        Ok(())
    }
    /// convert each channel as the difference of its two inputs
    pub async fn set_differential_conversion(&mut self) -> Result<(), Error> {
        self.write(avr64ea28::DIFF_CONV, 1).await?;
        Ok(())
    }
    /// convert each channel positive input against ground
    pub async fn set_single_sided_conversion(&mut self) -> Result<(), Error> {
        self.write(avr64ea28::DIFF_CONV, 0).await?;
        Ok(())
    }
}

fn register(register: Option<Register>) -> Result<Register, Error> {
    register.ok_or(Error::Unsupported("channel index"))
}

impl<T: Transport> RegisterFile for Avr64ea28<T> {
    type Transport = T;
    fn gateway(&mut self) -> &mut Gateway<T> {&mut self.gateway}
    fn variant(&self) -> Variant {avr64ea28::VARIANT}
}
impl<T: Transport> TriggerControl for Avr64ea28<T> {}
impl<T: Transport> SampleStore for Avr64ea28<T> {
    async fn analog_gain(&mut self) -> Result<f64, Error> {
        if self.read(avr64ea28::PGA_FLAG).await? == 0
            {return Ok(1.)}
        let code = self.read(avr64ea28::PGA_GAIN).await?;
        PgaGain::from_code(code)
            .map(|gain| f64::from(gain.gain()))
            .ok_or_else(|| Error::Parse {text: code.to_string(), expected: "amplifier gain code"})
    }
    async fn ref_voltage(&mut self) -> Result<f64, Error> {
        let code = self.read(avr64ea28::V_REF).await?;
        RefVoltage::from_code(code)
            .map(RefVoltage::volts)
            .ok_or_else(|| Error::Parse {text: code.to_string(), expected: "reference voltage code"})
    }
}
