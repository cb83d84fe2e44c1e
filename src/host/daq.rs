/*!
    capability traits of the sampling controllers

    all the protocol lives in default methods, a device family only has to give access to its gateway, its [Variant] descriptor and the few conversions that differ (gain, reference voltage)
*/

use std::{
    format,
    string::{String, ToString},
    vec,
    vec::Vec,
    };
use core::fmt::Write;
use log::*;

use crate::{
    registers::{Register, Variant, Period},
    trigger::{Trigger, TriggerMode},
    selection::{Layout, PAGE_SIZE},
    sample::parse_hex,
    };
use super::{Error, Transport, Gateway, Snapshot, RecordingInfo, parse};


/// header line of [RegisterFile::dump_as_text]
pub const DUMP_HEADER: &str = "Reg  Val  Label";


/**
    indexed virtual registers of a sampling controller

    register indices are checked against the count reported by the device before every access, never against a cached value
*/
#[allow(async_fn_in_trait)]
pub trait RegisterFile {
    type Transport: Transport;

    /// gateway forwarding the commands to the sampling controller
    fn gateway(&mut self) -> &mut Gateway<Self::Transport>;
    /// constants of this device family
    fn variant(&self) -> Variant;

    async fn command(&mut self, command: &str) -> Result<String, Error> {
        self.gateway().command_daq(command).await
    }
    async fn version(&mut self) -> Result<String, Error> {
        self.command("v").await
    }
    /// number of registers implemented by the firmware
    async fn register_count(&mut self) -> Result<usize, Error> {
        let payload = self.command("n").await?;
        parse(&payload, "register count")
    }
    /// fail with [Error::Range] if the device has no register at this index
    async fn check_index(&mut self, index: usize) -> Result<(), Error> {
        let count = self.register_count().await?;
        if index < count
            {Ok(())}
        else
            {Err(Error::Range {index, count})}
    }
    async fn get(&mut self, index: usize) -> Result<i32, Error> {
        self.check_index(index).await?;
        let payload = self.command(&format!("r {}", index)).await?;
        parse(&payload, "register value")
    }
    /// write a register, returns the value the device reports it holds now
    async fn set(&mut self, index: usize, value: i32) -> Result<i32, Error> {
        self.check_index(index).await?;
        let payload = self.command(&format!("s {} {}", index, value)).await?;
        // the device replies with the index and the new value
        let reported = payload.split_whitespace().nth(1)
            .ok_or_else(|| Error::Parse {text: payload.clone(), expected: "register index and value"})?;
        parse(reported, "register value")
    }
    async fn read(&mut self, register: Register) -> Result<i32, Error> {
        self.get(register.index()).await
    }
    async fn write(&mut self, register: Register, value: i32) -> Result<i32, Error> {
        self.set(register.index(), value).await
    }
    /// look a register up by label in the table of this device family
    fn register(&self, label: &str) -> Result<Register, Error> {
        self.variant().registers.find(label)
            .ok_or_else(|| Error::UnknownRegister(label.to_string()))
    }

    /// write registers by index, in the given order
    async fn set_many(&mut self, values: &[(usize, i32)]) -> Result<(), Error> {
        for &(index, value) in values {
            let reported = self.set(index, value).await?;
            info!("register {} set to {}", index, reported);
        }
        Ok(())
    }
    /// write registers by label, in the given order
    async fn set_from_map(&mut self, values: &[(&str, i32)]) -> Result<(), Error> {
        for &(label, value) in values {
            let register = self.register(label)?;
            let reported = self.set(register.index(), value).await?;
            info!("register {} ({}) set to {}", register.index(), label, reported);
        }
        Ok(())
    }
    async fn factory_reset(&mut self) -> Result<(), Error> {
        self.command("F").await?;
        Ok(())
    }
    /// fail with [Error::TableMismatch] if the firmware does not implement the expected register table
    async fn check_table(&mut self) -> Result<(), Error> {
        let device = self.register_count().await?;
        let table = self.variant().registers.len();
        if device == table
            {Ok(())}
        else
            {Err(Error::TableMismatch {device, table})}
    }
    /// all register values, one per line after a header
    async fn dump_as_text(&mut self) -> Result<String, Error> {
        self.check_table().await?;
        let registers = self.variant().registers;
        let mut text = String::from(DUMP_HEADER);
        text.push('\n');
        for register in registers.iter() {
            let value = self.get(register.index()).await?;
            // writing to a String cannot fail
            let _ = writeln!(text, "{} {} {}", register.index(), value, register.label());
        }
        Ok(text)
    }

    async fn sample_period_us(&mut self) -> Result<f64, Error> {
        match self.variant().period {
            Period::Ticks {register, us_per_tick} =>
                Ok(f64::from(self.read(register).await?) * us_per_tick),
            Period::Oversampling {clock_khz, osr, ..} => {
                let clock = self.read(clock_khz).await?;
                let osr = self.read(osr).await?;
                Period::oversampled_us(clock, osr)
                    .ok_or_else(|| Error::Parse {text: clock.to_string(), expected: "converter clock"})
            },
        }
    }
    /**
        program the closest period below the given one

        with a timer this is a number of ticks, with an oversampling converter the largest oversampling ratio that fits (or the smallest ratio if none does)
    */
    async fn set_sample_period_us(&mut self, period: f64) -> Result<f64, Error> {
        match self.variant().period {
            Period::Ticks {register, us_per_tick} => {
                let ticks = (period / us_per_tick) as i32;
                let ticks = self.write(register, ticks).await?;
                Ok(f64::from(ticks) * us_per_tick)
            },
            Period::Oversampling {clock_khz, osr, ratios} => {
                let clock = self.read(clock_khz).await?;
                let ratio = Period::oversampling_ratio(ratios, clock, period)
                    .ok_or(Error::Unsupported("oversampling ratio"))?;
                let ratio = self.write(osr, ratio.into()).await?;
                Period::oversampled_us(clock, ratio)
                    .ok_or_else(|| Error::Parse {text: clock.to_string(), expected: "converter clock"})
            },
        }
    }
    async fn nchannels(&mut self) -> Result<usize, Error> {
        let nchannels = self.variant().nchannels;
        let value = self.read(nchannels).await?;
        usize::try_from(value).map_err(|_| Error::Parse {text: value.to_string(), expected: "channel count"})
    }
}


/**
    trigger configuration of a sampling controller

    every setting is a plain register write, sampling starts on [Self::start_sampling]. Once a waiting mode is started there is no way to cancel it but the trigger event or [Gateway::reset_daq]
*/
#[allow(async_fn_in_trait)]
pub trait TriggerControl: RegisterFile {
    /// fails with [Error::Unsupported] if the device family has no such mode
    async fn set_trigger(&mut self, trigger: Trigger) -> Result<(), Error> {
        let variant = self.variant();
        let mode = trigger.mode();
        let code = variant.mode_code(mode)
            .ok_or(Error::Unsupported(mode.name()))?;
        if let Trigger::Internal {channel, level, slope} = trigger {
            let comparator = variant.comparator
                .ok_or(Error::Unsupported(mode.name()))?;
            self.write(variant.trigger_mode, code).await?;
            self.write(comparator.channel, channel.into()).await?;
            self.write(comparator.level, level).await?;
            self.write(comparator.slope, slope.code().into()).await?;
        }
        else {
            self.write(variant.trigger_mode, code).await?;
        }
        info!("trigger mode {}", mode);
        Ok(())
    }
    async fn trigger_mode(&mut self) -> Result<TriggerMode, Error> {
        let variant = self.variant();
        let code = self.read(variant.trigger_mode).await?;
        variant.mode(code)
            .ok_or_else(|| Error::Parse {text: code.to_string(), expected: "trigger mode code"})
    }
    /// number of samples recorded after the trigger event, clamped to what the device supports
    async fn set_post_trigger_samples(&mut self, n: usize) -> Result<usize, Error> {
        let variant = self.variant();
        let clamped = i32::try_from(n).unwrap_or(i32::MAX).min(variant.max_nsamples);
        if usize::try_from(clamped) != Ok(n) {
            warn!("post-trigger samples clamped from {} to {}", n, clamped);
        }
        let reported = self.write(variant.nsamples, clamped).await?;
        usize::try_from(reported).map_err(|_| Error::Parse {text: reported.to_string(), expected: "sample count"})
    }
    async fn post_trigger_samples(&mut self) -> Result<usize, Error> {
        let nsamples = self.variant().nsamples;
        let value = self.read(nsamples).await?;
        usize::try_from(value).map_err(|_| Error::Parse {text: value.to_string(), expected: "sample count"})
    }
    async fn start_sampling(&mut self) -> Result<(), Error> {
        self.command("g").await?;
        Ok(())
    }
}


/**
    circular sample memory of a sampling controller

    recordings are retrieved by pages of [PAGE_SIZE] bytes into a local mirror of the whole memory, see [Snapshot]
*/
#[allow(async_fn_in_trait)]
pub trait SampleStore: TriggerControl {
    /// amplification applied before conversion
    async fn analog_gain(&mut self) -> Result<f64, Error>;
    /// reference voltage of the conversion, in volts
    async fn ref_voltage(&mut self) -> Result<f64, Error>;

    /// true if the sampling controller ever missed a conversion deadline during the last recording
    async fn late(&mut self) -> Result<bool, Error> {
        Ok(self.command("k").await? == "1")
    }
    async fn bytes_per_sample_set(&mut self) -> Result<usize, Error> {
        let payload = self.command("b").await?;
        parse(&payload, "sample set size")
    }
    /// number of sample sets the memory can hold
    async fn capacity(&mut self) -> Result<usize, Error> {
        let payload = self.command("m").await?;
        parse(&payload, "sample capacity")
    }
    async fn total_bytes(&mut self) -> Result<usize, Error> {
        let payload = self.command("T").await?;
        parse(&payload, "memory size")
    }
    async fn total_pages(&mut self) -> Result<usize, Error> {
        let payload = self.command("N").await?;
        parse(&payload, "page count")
    }
    /// byte address of the oldest sample set in the memory
    async fn oldest(&mut self) -> Result<usize, Error> {
        let payload = self.command("a").await?;
        parse(&payload, "byte address")
    }
    /// page starting at the given absolute byte address
    async fn read_page(&mut self, addr: usize) -> Result<[u8; PAGE_SIZE], Error> {
        let payload = self.command(&format!("M {}", addr)).await?;
        let mut page = [0; PAGE_SIZE];
        parse_hex(&payload, &mut page)
            .ok_or(Error::Parse {text: payload, expected: "hexadecimal page"})?;
        Ok(page)
    }
    /// read and check the memory metadata
    async fn layout(&mut self) -> Result<Layout, Error> {
        let layout = Layout {
            oldest: self.oldest().await?,
            total_bytes: self.total_bytes().await?,
            total_pages: self.total_pages().await?,
            bytes_per_sample_set: self.bytes_per_sample_set().await?,
            nchan: self.nchannels().await?,
            nsamples_after_trigger: self.post_trigger_samples().await?,
            mode: self.trigger_mode().await?,
            capacity: self.capacity().await?,
        };
        debug!("{:?}", layout);
        layout.validate(self.variant().sample_format.value_size())?;
        Ok(layout)
    }
    async fn info(&mut self, mode: TriggerMode, nchan: usize) -> Result<RecordingInfo, Error> {
        Ok(RecordingInfo {
            mode,
            nchan,
            dt_us: self.sample_period_us().await?,
            late: self.late().await?,
            analog_gain: self.analog_gain().await?,
            ref_voltage: self.ref_voltage().await?,
        })
    }
    /**
        retrieve a trigger-relative window of the last recording

        `n_select` samples are selected, `n_pretrigger` of them before the trigger. `None` stands for as many as available, larger requests are clamped.
        Only the pages covering the selection are transfered.
    */
    async fn fetch(&mut self, n_select: Option<usize>, n_pretrigger: Option<usize>) -> Result<Snapshot, Error> {
        let layout = self.layout().await?;
        let selection = layout.select(n_select, n_pretrigger);
        info!("fetching {} pages from page {}", selection.n_pages, selection.first_page_index);

        let mut data = vec![0; layout.total_bytes];
        for (i, addr) in layout.page_addrs(&selection).enumerate() {
            if i > 0 && i % 100 == 0 {
                info!("page {} at byte address {}", i, addr);
            }
            let page = self.read_page(addr).await?;
            data[addr .. addr + PAGE_SIZE].copy_from_slice(&page);
        }
        let info = self.info(layout.mode, layout.nchan).await?;
        Ok(Snapshot::new(layout, selection, self.variant().sample_format, info, data)?)
    }

    /// values of a sample set, decoded by the device, index 0 is the oldest sample
    async fn formatted_sample(&mut self, index: usize) -> Result<Vec<i32>, Error> {
        let payload = self.command(&format!("P {}", index)).await?;
        payload.split_whitespace()
            .map(|value| parse(value, "sample value"))
            .collect()
    }
    /**
        all samples of the last recording, one sequence per channel

        every sample set is a round trip formatted by the device, much slower than [Self::fetch]
    */
    async fn recorded_data(&mut self) -> Result<Vec<Vec<i32>>, Error> {
        let nchan = self.nchannels().await?;
        let after = self.post_trigger_samples().await?;
        let capacity = self.capacity().await?;
        let total = if self.trigger_mode().await?.waits() {capacity} else {after};
        let mut channels = vec![Vec::with_capacity(total); nchan];
        for i in 0 .. total {
            let values = self.formatted_sample(i).await?;
            if values.len() < nchan {
                return Err(Error::Parse {text: format!("{:?}", values), expected: "one value per channel"});
            }
            for (channel, value) in channels.iter_mut().zip(values) {
                channel.push(value);
            }
        }
        Ok(channels)
    }
    /// convert every channel once, without recording
    async fn immediate_sample_set(&mut self) -> Result<Vec<i32>, Error> {
        let payload = self.command("I").await?;
        payload.split_whitespace()
            .map(|value| parse(value, "sample value"))
            .collect()
    }
}
