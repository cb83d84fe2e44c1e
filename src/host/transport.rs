use std::{
    path::Path,
    string::String,
    vec::Vec,
    time::Duration,
    };
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use serial2_tokio::{SerialPort, CharSize, StopBits, Parity};
use log::*;

use crate::frame::LINE_END;
use super::{Error, Settings};


/**
    duplex byte stream reaching the nodes

    the host is the only initiator on the bus, so a transport only needs to send a frame and read the line that follows
*/
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// drop any received byte not read yet, stale responses or bus noise
    fn discard_input(&mut self) -> Result<(), Error>;
    /// send all the given bytes, returns once they are flushed
    async fn write_all(&mut self, data: &[u8]) -> Result<(), Error>;
    /**
        read until a line terminator or the transport timeout

        on timeout, the bytes received so far are returned as the line, so that a truncated frame can be reported as such. [Error::Timeout] is only returned if nothing arrived
    */
    async fn read_line(&mut self) -> Result<String, Error>;
}

impl<T: Transport> Transport for &mut T {
    fn discard_input(&mut self) -> Result<(), Error> {
        (**self).discard_input()
    }
    async fn write_all(&mut self, data: &[u8]) -> Result<(), Error> {
        (**self).write_all(data).await
    }
    async fn read_line(&mut self) -> Result<String, Error> {
        (**self).read_line().await
    }
}


/// rs485 bus behind a serial port adapter
pub struct SerialTransport {
    port: SerialPort,
    timeout: Duration,
    /// bytes received after the last line returned
    received: Vec<u8>,
}
impl SerialTransport {
    /// open the given serial port file, in 8N1 raw mode
    pub fn open(path: impl AsRef<Path>, settings: &Settings) -> Result<Self, Error> {
        let port = SerialPort::open(path, |mut serial: serial2_tokio::Settings| {
                serial.set_raw();
                serial.set_baud_rate(settings.baud_rate)?;
                serial.set_char_size(CharSize::Bits8);
                serial.set_stop_bits(StopBits::One);
                serial.set_parity(Parity::None);
                Ok(serial)
                })?;
        Ok(Self {
            port,
            timeout: settings.timeout,
            received: Vec::new(),
        })
    }
    /// take the first complete line out of the reception buffer
    fn take_line(&mut self) -> Option<Vec<u8>> {
        let end = self.received.iter().position(|&b| b == LINE_END as u8)?;
        Some(self.received.drain(..= end).collect())
    }
}
impl Transport for SerialTransport {
    fn discard_input(&mut self) -> Result<(), Error> {
        self.received.clear();
        self.port.discard_input_buffer()?;
        Ok(())
    }
    async fn write_all(&mut self, data: &[u8]) -> Result<(), Error> {
        AsyncWriteExt::write_all(&mut self.port, data).await?;
        AsyncWriteExt::flush(&mut self.port).await?;
        Ok(())
    }
    async fn read_line(&mut self) -> Result<String, Error> {
        let timeout = self.timeout;
        let reception = async {
            let mut chunk = [0u8; 64];
            loop {
                if let Some(line) = self.take_line()
                    {return Ok::<_, Error>(line)}
                let size = AsyncReadExt::read(&mut self.port, &mut chunk).await?;
                if size == 0
                    {return Err(Error::Bus(std::io::ErrorKind::UnexpectedEof.into()))}
                self.received.extend_from_slice(&chunk[.. size]);
            }
        };
        let received = tokio::time::timeout(timeout, reception).await;
        let line = match received {
            Ok(line) => line?,
            Err(_) => {
                if self.received.is_empty()
                    {return Err(Error::Timeout)}
                debug!("partial line after timeout: {:?}", self.received);
                core::mem::take(&mut self.received)
            },
        };
        Ok(String::from_utf8_lossy(&line).into_owned())
    }
}
