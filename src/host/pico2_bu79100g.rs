use std::string::ToString;

use crate::registers::{Variant, pico2_bu79100g};
use super::{Error, Transport, Gateway, RegisterFile, TriggerControl, SampleStore};


/// Pico2 sampling controller with BU79100G converters, behind its gateway
pub struct Pico2Bu79100g<T> {
    gateway: Gateway<T>,
}
impl<T: Transport> Pico2Bu79100g<T> {
    pub fn new(gateway: Gateway<T>) -> Self {
        Self {gateway}
    }
    pub fn into_gateway(self) -> Gateway<T> {self.gateway}

    /**
        timeout of the real-time data port in microseconds, a non-zero value enables it

        the port is only active with a sample period of at least 2 microseconds
    */
    pub async fn set_rtdp_timeout_us(&mut self, timeout: u32) -> Result<u32, Error> {
        let value = i32::try_from(timeout).unwrap_or(i32::MAX);
        let reported = self.write(pico2_bu79100g::RTDP_US, value).await?;
        u32::try_from(reported).map_err(|_| Error::Parse {text: reported.to_string(), expected: "timeout"})
    }
    /// supply voltage of the converters, measured by the gateway
    pub async fn analog_millivolts(&mut self) -> Result<u32, Error> {
        self.gateway.analog_millivolts().await
    }
}

impl<T: Transport> RegisterFile for Pico2Bu79100g<T> {
    type Transport = T;
    fn gateway(&mut self) -> &mut Gateway<T> {&mut self.gateway}
    fn variant(&self) -> Variant {pico2_bu79100g::VARIANT}
}
impl<T: Transport> TriggerControl for Pico2Bu79100g<T> {}
impl<T: Transport> SampleStore for Pico2Bu79100g<T> {
    async fn analog_gain(&mut self) -> Result<f64, Error> {
        Ok(1.)
    }
    /// the converters use their supply as reference
    async fn ref_voltage(&mut self) -> Result<f64, Error> {
        Ok(f64::from(self.analog_millivolts().await?) / 1000.)
    }
}
