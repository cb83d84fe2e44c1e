use std::{vec, vec::Vec};

use crate::{
    trigger::TriggerMode,
    selection::{Layout, LayoutError, Selection},
    sample::SampleFormat,
    };


/// metadata needed downstream to interpret raw sample values
#[derive(Clone, Debug, PartialEq)]
pub struct RecordingInfo {
    pub mode: TriggerMode,
    pub nchan: usize,
    /// sample period in microseconds
    pub dt_us: f64,
    /// the device missed at least one conversion deadline, values are still recorded
    pub late: bool,
    pub analog_gain: f64,
    /// reference voltage in volts
    pub ref_voltage: f64,
}

/**
    local mirror of the device sample memory after a fetch

    only the pages covering the selection hold retrieved data, at the same absolute addresses as on the device, the rest is zero. Unpacking then uses the same wraparound arithmetic as the device.
*/
#[derive(Clone, Debug)]
pub struct Snapshot {
    layout: Layout,
    selection: Selection,
    format: SampleFormat,
    info: RecordingInfo,
    data: Vec<u8>,
}
impl Snapshot {
    /// `data` must mirror the whole circular region
    pub fn new(layout: Layout, selection: Selection, format: SampleFormat, info: RecordingInfo, data: Vec<u8>) -> Result<Self, LayoutError> {
        layout.validate(format.value_size())?;
        if data.len() != layout.total_bytes
            {return Err(LayoutError::RegionSize)}
        Ok(Self {layout, selection, format, info, data})
    }
    pub fn layout(&self) -> &Layout {&self.layout}
    pub fn selection(&self) -> &Selection {&self.selection}
    pub fn format(&self) -> SampleFormat {self.format}
    pub fn info(&self) -> &RecordingInfo {&self.info}
    pub fn data(&self) -> &[u8] {&self.data}

    /**
        decode the selected samples, one sequence per channel, oldest first

        fails with [LayoutError::Channels] if a sample set runs past the end of the mirror
    */
    pub fn unpack(&self) -> Result<Recording, LayoutError> {
        let nchan = self.layout.nchan;
        let mut channels = vec![Vec::with_capacity(self.selection.n_select); nchan];
        let mut set = vec![0; nchan];
        for i in 0 .. self.selection.n_select {
            let addr = self.layout.sample_addr(self.selection.first_sample_index + i);
            let end = addr + self.layout.bytes_per_sample_set;
            self.data.get(addr .. end)
                .and_then(|bytes| self.format.decode_set(bytes, &mut set))
                .ok_or(LayoutError::Channels)?;
            for (channel, &value) in channels.iter_mut().zip(&set) {
                channel.push(value);
            }
        }
        Ok(Recording {
            info: self.info.clone(),
            n_select: self.selection.n_select,
            n_pretrigger: self.selection.n_pretrigger,
            channels,
        })
    }
}

/// selected samples of a recording
#[derive(Clone, Debug, PartialEq)]
pub struct Recording {
    pub info: RecordingInfo,
    pub n_select: usize,
    /// number of samples before the trigger, which is also the index of the trigger sample
    pub n_pretrigger: usize,
    /// raw values, one sequence per channel
    pub channels: Vec<Vec<i32>>,
}
