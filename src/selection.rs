/*!
    arithmetic of trigger-relative retrieval from the circular sample memory

    the sampling controller records sample sets one after the other in a circular memory, read back by pages of [PAGE_SIZE] bytes. The sample at index 0 is the oldest one stored, the trigger sample sits right after all the pre-trigger samples.

    ```text
    memory:    |------- oldest ---------------------------|------------|
                        ^ index 0          ^ trigger       wraps to 0
    selection:                       |-----+--------|
                                     pre-    post-trigger
    ```

    nothing here talks to a device: a [Layout] is built from freshly read metadata, and a [Selection] tells which pages to fetch and where each sample lies.
*/

use core::fmt;
use crate::trigger::TriggerMode;


/// size of a memory page, the unit of remote reads
pub const PAGE_SIZE: usize = 32;


/// metadata of the circular memory, as reported by the sampling controller right before a fetch
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    /// size of the circular region
    pub total_bytes: usize,
    /// number of pages in the circular region
    pub total_pages: usize,
    /// space taken by one sample set, padding included
    pub bytes_per_sample_set: usize,
    /// address of the oldest sample set stored
    pub oldest: usize,
    /// number of values in a sample set
    pub nchan: usize,
    /// configured number of samples recorded after the trigger
    pub nsamples_after_trigger: usize,
    /// number of sample sets the memory can hold
    pub capacity: usize,
    pub mode: TriggerMode,
}

/// inconsistency in the metadata reported by the device
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LayoutError {
    /// sample sets do not tile a page
    SampleSetSize,
    /// the region is empty or not made of whole pages
    RegionSize,
    /// page count disagrees with the region size
    PageCount,
    /// the oldest address is outside the region or not on a sample set boundary
    OldestAddress,
    /// the channel values do not fit in a sample set
    Channels,
    /// more samples than the memory can hold
    Capacity,
}
impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SampleSetSize => "sample set size does not divide the page size",
            Self::RegionSize => "circular region is not a whole number of pages",
            Self::PageCount => "page count does not match the region size",
            Self::OldestAddress => "oldest data address is not a sample set address",
            Self::Channels => "channels do not fit in a sample set",
            Self::Capacity => "sample count exceeds the memory capacity",
        })
    }
}

impl Layout {
    /// check the invariants every other method relies on, `value_size` is the size of one channel value
    pub fn validate(&self, value_size: usize) -> Result<(), LayoutError> {
        let bps = self.bytes_per_sample_set;
        if bps == 0 || PAGE_SIZE % bps != 0
            {return Err(LayoutError::SampleSetSize)}
        if self.total_bytes == 0 || self.total_bytes % PAGE_SIZE != 0
            {return Err(LayoutError::RegionSize)}
        if self.total_pages != self.total_bytes / PAGE_SIZE
            {return Err(LayoutError::PageCount)}
        if self.oldest >= self.total_bytes || self.oldest % bps != 0
            {return Err(LayoutError::OldestAddress)}
        if self.nchan == 0 || self.nchan * value_size > bps
            {return Err(LayoutError::Channels)}
        if self.capacity * bps > self.total_bytes
            || (self.mode.waits() && self.nsamples_after_trigger > self.capacity)
            {return Err(LayoutError::Capacity)}
        Ok(())
    }

    /**
        number of sample sets available for retrieval

        an immediate recording longer than the memory overwrites its own beginning, only the last `capacity` samples remain
    */
    pub fn total_samples(&self) -> usize {
        if self.mode.waits()
            {self.capacity}
        else
            {self.nsamples_after_trigger.min(self.capacity)}
    }
    pub fn nsamples_before_trigger(&self) -> usize {
        if self.mode.waits()
            {self.capacity.saturating_sub(self.nsamples_after_trigger)}
        else
            {0}
    }
    /// index of the trigger sample, the oldest sample having index 0
    pub fn trigger_sample_index(&self) -> usize {
        self.nsamples_before_trigger()
    }
    pub fn samples_per_page(&self) -> usize {
        PAGE_SIZE / self.bytes_per_sample_set
    }
    /// byte address of a sample set, wrapped around the circular region
    pub fn sample_addr(&self, index: usize) -> usize {
        (self.oldest + self.bytes_per_sample_set * index) % self.total_bytes
    }

    /**
        clamp the requested counts and locate the pages to fetch

        `None` requests as much as available. The selection never asks for more pages than the region holds.
    */
    pub fn select(&self, n_select: Option<usize>, n_pretrigger: Option<usize>) -> Selection {
        let total_samples = self.total_samples();
        let before = self.nsamples_before_trigger();
        let n_select = n_select.map_or(total_samples, |n| n.min(total_samples));
        let n_pretrigger = n_pretrigger.map_or(before, |n| n.min(before));

        let first_sample_index = self.trigger_sample_index() - n_pretrigger;
        let first_sample_byte_addr = self.sample_addr(first_sample_index);
        let samples_per_page = self.samples_per_page();
        let first_page_index = first_sample_byte_addr / PAGE_SIZE;
        let mut n_pages = n_select.div_ceil(samples_per_page);
        // partial leading page
        if n_select != 0 && first_sample_byte_addr % PAGE_SIZE != 0
            {n_pages += 1}
        let n_pages = n_pages.min(self.total_pages);

        Selection {
            n_select,
            n_pretrigger,
            first_sample_index,
            first_sample_byte_addr,
            samples_per_page,
            first_page_index,
            n_pages,
        }
    }

    /// absolute byte addresses of the pages to fetch for a selection, in fetch order
    pub fn page_addrs(&self, selection: &Selection) -> impl Iterator<Item=usize> + use<> {
        let (first, total_bytes) = (selection.first_page_index, self.total_bytes);
        (0 .. selection.n_pages).map(move |i| (first + i) * PAGE_SIZE % total_bytes)
    }
}


/// trigger-relative window of samples, clamped to what is stored
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub n_select: usize,
    pub n_pretrigger: usize,
    pub first_sample_index: usize,
    pub first_sample_byte_addr: usize,
    pub samples_per_page: usize,
    pub first_page_index: usize,
    pub n_pages: usize,
}


#[cfg(test)]
mod tests {
    use super::*;

    fn layout(mode: TriggerMode) -> Layout {
        Layout {
            total_bytes: 3200,
            total_pages: 100,
            bytes_per_sample_set: 4,
            oldest: 1600,
            nchan: 2,
            nsamples_after_trigger: 200,
            capacity: 800,
            mode,
        }
    }

    #[test]
    fn wait_for_event_window() {
        let layout = layout(TriggerMode::WaitForEventLine);
        layout.validate(2).unwrap();
        assert_eq!(layout.total_samples(), 800);
        assert_eq!(layout.nsamples_before_trigger(), 600);
        assert_eq!(layout.trigger_sample_index(), 600);

        let selection = layout.select(Some(50), Some(10));
        assert_eq!(selection.first_sample_index, 590);
        // 1600 + 4*590 = 3960 wraps to 760, in the middle of page 23
        assert_eq!(selection.first_sample_byte_addr, 760);
        assert_eq!(selection.samples_per_page, 8);
        assert_eq!(selection.first_page_index, 23);
        assert_eq!(selection.n_pages, 8);
    }

    #[test]
    fn aligned_window() {
        let layout = Layout {oldest: 1640, .. layout(TriggerMode::WaitForEventLine)};
        let selection = layout.select(Some(50), Some(10));
        assert_eq!(selection.first_sample_byte_addr, 800);
        assert_eq!(selection.first_page_index, 25);
        assert_eq!(selection.n_pages, 7);
        let pages = layout.page_addrs(&selection).collect::<Vec<_>>();
        assert_eq!(pages, [800, 832, 864, 896, 928, 960, 992]);
    }

    #[test]
    fn pages_wrap() {
        let layout = Layout {oldest: 3000, .. layout(TriggerMode::Immediate)};
        let selection = layout.select(Some(40), None);
        assert_eq!(selection.first_sample_byte_addr, 3000);
        assert_eq!(selection.n_pages, 6);
        let pages = layout.page_addrs(&selection).collect::<Vec<_>>();
        assert_eq!(pages, [2976, 3008, 3040, 3072, 3104, 3136]);

        let selection = layout.select(None, None);
        assert_eq!(selection.n_select, 200);
        let pages = layout.page_addrs(&selection).collect::<Vec<_>>();
        assert_eq!(pages.len(), 26);
        assert_eq!(pages[7], 0);
    }

    #[test]
    fn clamping() {
        for capacity in [0, 1, 7, 8, 800] {
            for after in 0 ..= capacity.min(20) {
                let layout = Layout {
                    capacity,
                    nsamples_after_trigger: after,
                    .. layout(TriggerMode::Internal)
                };
                let total = layout.total_samples();
                let before = layout.nsamples_before_trigger();
                assert!(before <= total);

                let selection = layout.select(Some(total + 5), Some(before + 3));
                assert_eq!(selection.n_select, total);
                assert_eq!(selection.n_pretrigger, before);
                assert_eq!(selection.first_sample_index, 0);
                assert!(selection.n_pages <= layout.total_pages);

                let selection = layout.select(Some(0), Some(0));
                assert_eq!(selection.n_select, 0);
                assert_eq!(selection.first_sample_index, before);
                assert_eq!(selection.n_pages, 0);
            }
        }
    }

    #[test]
    fn wraparound_idempotence() {
        let layout = layout(TriggerMode::External);
        let total = layout.total_samples();
        for k in [0, 1, 199, 590, 799] {
            assert_eq!(layout.sample_addr(k), layout.sample_addr(k + total));
            assert_eq!(layout.sample_addr(k), layout.sample_addr(k + 3*total));
        }
    }

    #[test]
    fn immediate_within_capacity() {
        for capacity in [200, 400, 800] {
            let layout = Layout {capacity, .. layout(TriggerMode::Immediate)};
            assert_eq!(layout.nsamples_before_trigger(), 0);
            assert_eq!(layout.total_samples(), 200);
            let selection = layout.select(None, Some(50));
            assert_eq!(selection.n_pretrigger, 0);
            assert_eq!(selection.first_sample_index, 0);
            assert_eq!(selection.n_select, 200);
        }
    }

    #[test]
    fn immediate_longer_than_memory() {
        // 1000 samples asked in a memory holding 256
        let layout = Layout {
            total_bytes: 1024,
            total_pages: 32,
            oldest: 512,
            nsamples_after_trigger: 1000,
            capacity: 256,
            .. layout(TriggerMode::Immediate)
        };
        layout.validate(2).unwrap();
        assert_eq!(layout.total_samples(), 256);
        let selection = layout.select(None, None);
        assert_eq!(selection.n_select, 256);
        assert_eq!(selection.n_pages, 32);
        assert_eq!(layout.select(Some(1000), None).n_select, 256);
        // every selected sample has its own address
        let mut addrs = (0 .. selection.n_select)
            .map(|i| layout.sample_addr(selection.first_sample_index + i))
            .collect::<Vec<_>>();
        addrs.sort();
        addrs.dedup();
        assert_eq!(addrs.len(), 256);
    }

    #[test]
    fn invalid_layouts() {
        let good = layout(TriggerMode::Internal);
        assert_eq!(Layout {bytes_per_sample_set: 3, .. good}.validate(2), Err(LayoutError::SampleSetSize));
        assert_eq!(Layout {bytes_per_sample_set: 0, .. good}.validate(2), Err(LayoutError::SampleSetSize));
        assert_eq!(Layout {total_bytes: 3210, .. good}.validate(2), Err(LayoutError::RegionSize));
        assert_eq!(Layout {total_pages: 99, .. good}.validate(2), Err(LayoutError::PageCount));
        assert_eq!(Layout {oldest: 3200, .. good}.validate(2), Err(LayoutError::OldestAddress));
        assert_eq!(Layout {oldest: 1602, .. good}.validate(2), Err(LayoutError::OldestAddress));
        assert_eq!(Layout {nchan: 3, .. good}.validate(2), Err(LayoutError::Channels));
        assert_eq!(good.validate(4), Err(LayoutError::Channels));
        assert_eq!(Layout {capacity: 801, .. good}.validate(2), Err(LayoutError::Capacity));
        assert_eq!(Layout {nsamples_after_trigger: 900, .. good}.validate(2), Err(LayoutError::Capacity));
    }
}
