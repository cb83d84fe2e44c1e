use std::{
    string::ToString,
    vec::Vec,
    };

use crate::registers::{Variant, pico2_ads131m04::{self, RATIOS, MAX_GAIN_LOG2, REF_VOLTAGE}};
use super::{Error, Transport, Gateway, Confirmation, RegisterFile, TriggerControl, SampleStore, parse};


/**
    Pico2 sampling controller with an ADS131M04 converter, behind its gateway

    the gateways of these boards confirm pass-through commands by echoing the command character, so the gateway given is switched to [Confirmation::Echo]
*/
pub struct Pico2Ads131m04<T> {
    gateway: Gateway<T>,
}
impl<T: Transport> Pico2Ads131m04<T> {
    pub fn new(gateway: Gateway<T>) -> Self {
        Self {gateway: gateway.with_confirmation(Confirmation::Echo)}
    }
    pub fn into_gateway(self) -> Gateway<T> {self.gateway}

    /// clock fed to the converter, in kHz
    pub async fn set_clock_khz(&mut self, clock: u32) -> Result<u32, Error> {
        let value = i32::try_from(clock).unwrap_or(i32::MAX);
        let reported = self.write(pico2_ads131m04::CLK_KHZ, value).await?;
        u32::try_from(reported).map_err(|_| Error::Parse {text: reported.to_string(), expected: "clock frequency"})
    }
    pub async fn oversampling_ratio(&mut self) -> Result<u16, Error> {
        let osr = self.read(pico2_ads131m04::OSR).await?;
        u16::try_from(osr).ok()
            .filter(|osr| RATIOS.contains(osr))
            .ok_or_else(|| Error::Parse {text: osr.to_string(), expected: "oversampling ratio"})
    }
    /// only the ratios of [RATIOS] are accepted
    pub async fn set_oversampling_ratio(&mut self, osr: u16) -> Result<(), Error> {
        if ! RATIOS.contains(&osr)
            {return Err(Error::Unsupported("oversampling ratio"))}
        self.write(pico2_ads131m04::OSR, osr.into()).await?;
        Ok(())
    }
    /// amplifier gain, a power of 2 up to 128
    pub async fn set_gain(&mut self, gain: u32) -> Result<(), Error> {
        if ! gain.is_power_of_two() || gain.trailing_zeros() > MAX_GAIN_LOG2
            {return Err(Error::Unsupported("amplifier gain"))}
        self.write(pico2_ads131m04::PGA_GAIN, gain.trailing_zeros() as i32).await?;
        Ok(())
    }
    /// error flags of the converter, zero when every conversion went fine
    pub async fn error_flags(&mut self) -> Result<u32, Error> {
        let payload = self.command("k").await?;
        parse(&payload, "error flags")
    }
    /// switch the led driven by the sampling controller
    pub async fn set_led(&mut self, on: bool) -> Result<(), Error> {
        self.command(if on {"L,1"} else {"L,0"}).await?;
        Ok(())
    }
    /// convert every channel once, in volts
    pub async fn immediate_volts(&mut self) -> Result<Vec<f64>, Error> {
        let gain = self.analog_gain().await?;
        let codes = self.immediate_sample_set().await?;
        Ok(codes.into_iter()
            .map(|code| pico2_ads131m04::volts(code, gain))
            .collect())
    }
}

impl<T: Transport> RegisterFile for Pico2Ads131m04<T> {
    type Transport = T;
    fn gateway(&mut self) -> &mut Gateway<T> {&mut self.gateway}
    fn variant(&self) -> Variant {pico2_ads131m04::VARIANT}
}
impl<T: Transport> TriggerControl for Pico2Ads131m04<T> {}
impl<T: Transport> SampleStore for Pico2Ads131m04<T> {
    async fn analog_gain(&mut self) -> Result<f64, Error> {
        let log2 = self.read(pico2_ads131m04::PGA_GAIN).await?;
        u32::try_from(log2).ok()
            .filter(|&log2| log2 <= MAX_GAIN_LOG2)
            .map(|log2| f64::from(1u32 << log2))
            .ok_or_else(|| Error::Parse {text: log2.to_string(), expected: "amplifier gain code"})
    }
    async fn ref_voltage(&mut self) -> Result<f64, Error> {
        Ok(REF_VOLTAGE)
    }
    /// any converter error flag marks the recording
    async fn late(&mut self) -> Result<bool, Error> {
        Ok(self.error_flags().await? != 0)
    }
}
