use std::{
    format,
    string::{String, ToString},
    time::Duration,
    };
use log::*;

use crate::{
    frame::NodeId,
    trigger::{Status, Slope},
    };
use super::{Error, Transport, NodeLink, Settings, parse};


/// how the gateway confirms that the sampling controller accepted a pass-through command
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Confirmation {
    /// the reply starts with `ok`
    #[default]
    Ok,
    /// the reply starts with the inner command character
    Echo,
}


/**
    bus-attached controller of a node

    it owns the rs485 link, drives the shared event line and its comparators, and forwards pass-through commands to the sampling controller of the node
*/
pub struct Gateway<T> {
    link: NodeLink<T>,
    confirmation: Confirmation,
    poll_interval: Duration,
}
impl<T: Transport> Gateway<T> {
    pub fn new(transport: T, node: NodeId) -> Self {
        Self {
            link: NodeLink::new(transport, node),
            confirmation: Confirmation::default(),
            poll_interval: Settings::default().poll_interval,
        }
    }
    pub fn with_confirmation(mut self, confirmation: Confirmation) -> Self {
        self.confirmation = confirmation;
        self
    }
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.poll_interval = settings.poll_interval;
        self
    }
    pub fn node(&self) -> NodeId {self.link.node()}
    pub fn confirmation(&self) -> Confirmation {self.confirmation}
    pub fn link(&mut self) -> &mut NodeLink<T> {&mut self.link}

    /// send a raw command to the gateway itself
    pub async fn command(&mut self, command: &str) -> Result<String, Error> {
        self.link.command(command).await
    }

    pub async fn version(&mut self) -> Result<String, Error> {
        self.command("v").await
    }
    /// switch the indicator led
    pub async fn set_led(&mut self, on: bool) -> Result<(), Error> {
        self.command(if on {"L1"} else {"L0"}).await?;
        Ok(())
    }
    /// drive the shared event line active (low), triggering every node waiting for it
    pub async fn assert_event_line(&mut self) -> Result<(), Error> {
        self.command("t").await?;
        Ok(())
    }
    pub async fn release_event_line(&mut self) -> Result<(), Error> {
        self.command("z").await?;
        Ok(())
    }
    /// hardware reset of the sampling controller, any recording in progress is lost
    pub async fn reset_daq(&mut self) -> Result<(), Error> {
        self.command("R").await?;
        Ok(())
    }
    /// drop whatever the gateway received from the sampling controller and did not forward
    pub async fn flush_daq_input(&mut self) -> Result<(), Error> {
        self.command("F").await?;
        Ok(())
    }

    pub async fn status(&mut self) -> Result<Status, Error> {
        let payload = self.command("Q").await?;
        Status::parse(&payload)
            .ok_or(Error::Parse {text: payload, expected: "status fields"})
    }
    /// true once the event line has been latched active
    pub async fn event_has_passed(&mut self) -> Result<bool, Error> {
        Ok(self.status().await?.event_passed())
    }
    /// true when the sampling controller is not recording
    pub async fn is_ready(&mut self) -> Result<bool, Error> {
        Ok(self.status().await?.ready())
    }

    /**
        arm the comparator watching the external trigger input

        the threshold is `level/256 * 2.048` volts. The gateway refuses to arm if the condition is already met, this is reported as [Error::Device]
    */
    pub async fn enable_external_trigger(&mut self, level: u8, slope: Slope) -> Result<(), Error> {
        self.command(&format!("e {} {}", level, slope.code())).await?;
        Ok(())
    }
    /// arm the comparator watching the buffer amplifier of channel 0, same conventions as [Self::enable_external_trigger]
    pub async fn enable_internal_trigger(&mut self, level: u8, slope: Slope) -> Result<(), Error> {
        self.command(&format!("i {} {}", level, slope.code())).await?;
        Ok(())
    }
    pub async fn disable_trigger(&mut self) -> Result<(), Error> {
        self.command("d").await?;
        Ok(())
    }

    /// enable the analog reference output at `level/256 * 4.096` volts
    pub async fn set_vref_on(&mut self, level: u8) -> Result<(), Error> {
        self.command(&format!("w {} 1", level)).await?;
        Ok(())
    }
    pub async fn set_vref_off(&mut self) -> Result<(), Error> {
        self.command("w 0 0").await?;
        Ok(())
    }
    /// analog supply voltage of the converters, in millivolts
    pub async fn analog_millivolts(&mut self) -> Result<u32, Error> {
        let payload = self.command("a").await?;
        parse(&payload, "millivolts")
    }

    /**
        send a command to the sampling controller through the gateway

        the reply must carry the confirmation selected for this gateway, which is removed from the returned text. A missing confirmation is reported as [Error::NotConfirmed]
    */
    pub async fn command_daq(&mut self, command: &str) -> Result<String, Error> {
        let reply = self.command(&format!("X{}", command)).await?;
        let confirmed = match self.confirmation {
            Confirmation::Ok => reply.strip_prefix("ok"),
            Confirmation::Echo => command.chars().next()
                .and_then(|echo| reply.strip_prefix(echo)),
        };
        match confirmed {
            Some(payload) => Ok(payload.trim().to_string()),
            None => Err(Error::NotConfirmed {
                command: command.to_string(),
                response: reply,
                }),
        }
    }

    /**
        poll the status until `condition` holds or `timeout` elapses

        errors reported by the device are logged and polling continues, any other failure aborts. The last status observed is returned.
    */
    pub async fn wait_for(&mut self,
            condition: impl Fn(Status) -> bool,
            interval: Duration,
            timeout: Duration,
            ) -> Result<Status, Error>
    {
        let polling = async {
            loop {
                match self.status().await {
                    Ok(status) if condition(status) => break Ok(status),
                    Ok(_) => {},
                    Err(Error::Device {command, response}) =>
                        warn!("ignoring error while polling, {:?} returned {:?}", command, response),
                    Err(error) => break Err(error),
                }
                tokio::time::sleep(interval).await;
            }
        };
        tokio::time::timeout(timeout, polling).await
            .map_err(|_| Error::Timeout)?
    }
    /// wait until the sampling controller has finished recording
    pub async fn wait_until_ready(&mut self, timeout: Duration) -> Result<Status, Error> {
        self.wait_for(|status| status.ready(), self.poll_interval, timeout).await
    }
    /// wait until the event line has been latched active
    pub async fn wait_for_event(&mut self, timeout: Duration) -> Result<Status, Error> {
        self.wait_for(|status| status.event_passed(), self.poll_interval, timeout).await
    }
}
