//! Ring of CPU-mappable staging buffers for the reduction grids.
//!
//! Each slot holds one frame's `cover` grid followed by its `fragments` grid.
//! A slot is armed when the copy is recorded, mapped once the frame is
//! submitted, and collected on a later frame.

use overdraw_core::{ReadbackMode, ReductionResult, GRID_BYTES};
use std::sync::mpsc;

pub const READBACK_SLOTS: usize = 2;

type MapResult = Result<(), wgpu::BufferAsyncError>;

enum SlotState {
    Idle,
    /// Copy recorded, frame not yet submitted.
    Armed,
    /// `map_async` issued after `submission`.
    Pending {
        submission: wgpu::SubmissionIndex,
        receiver: mpsc::Receiver<MapResult>,
    },
}

struct ReadbackSlot {
    buffer: wgpu::Buffer,
    state: SlotState,
    frame_index: u64,
}

pub struct ReadbackRing {
    slots: [ReadbackSlot; READBACK_SLOTS],
    mode: ReadbackMode,
}

impl ReadbackRing {
    pub fn new(device: &wgpu::Device, mode: ReadbackMode) -> Self {
        let slots = std::array::from_fn(|i| ReadbackSlot {
            buffer: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("Overdraw Readback Slot {i}")),
                size: 2 * GRID_BYTES,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
            state: SlotState::Idle,
            frame_index: 0,
        });

        Self { slots, mode }
    }

    pub fn slot_for(frame_index: u64) -> usize {
        (frame_index % READBACK_SLOTS as u64) as usize
    }

    pub fn is_idle(&self, slot: usize) -> bool {
        matches!(self.slots[slot].state, SlotState::Idle)
    }

    pub fn buffer(&self, slot: usize) -> &wgpu::Buffer {
        &self.slots[slot].buffer
    }

    /// Mark `slot` as holding the copy recorded for `frame_index`.
    pub fn arm(&mut self, slot: usize, frame_index: u64) {
        let slot = &mut self.slots[slot];
        slot.state = SlotState::Armed;
        slot.frame_index = frame_index;
    }

    /// Start mapping every armed slot; called once their copies are submitted.
    pub fn map_armed(&mut self, submission: &wgpu::SubmissionIndex) {
        for slot in &mut self.slots {
            if !matches!(slot.state, SlotState::Armed) {
                continue;
            }

            let (sender, receiver) = mpsc::channel();
            slot.buffer
                .slice(..)
                .map_async(wgpu::MapMode::Read, move |result| {
                    let _ = sender.send(result);
                });
            slot.state = SlotState::Pending {
                submission: submission.clone(),
                receiver,
            };
        }
    }

    /// Read the grids held by `slot` if its mapping has completed, tagged
    /// with the frame they were reduced from.
    ///
    /// In [`ReadbackMode::Wait`] this blocks on the slot's submission. Any
    /// failure is logged and recycles the slot.
    pub fn collect(
        &mut self,
        device: &wgpu::Device,
        slot: usize,
    ) -> Option<(u64, ReductionResult)> {
        let mode = self.mode;
        let slot = &mut self.slots[slot];
        let SlotState::Pending {
            submission,
            receiver,
        } = &slot.state
        else {
            return None;
        };

        let poll_type = match mode {
            ReadbackMode::Wait => wgpu::PollType::Wait {
                submission_index: Some(submission.clone()),
                timeout: None,
            },
            ReadbackMode::Poll => wgpu::PollType::Poll,
        };
        if let Err(e) = device.poll(poll_type) {
            log::warn!(
                "Overdraw readback poll failed for frame {}: {e}",
                slot.frame_index
            );
            slot.buffer.unmap();
            slot.state = SlotState::Idle;
            return None;
        }

        match receiver.try_recv() {
            Ok(Ok(())) => {
                let result = {
                    let data = slot.buffer.slice(..).get_mapped_range();
                    ReductionResult::from_staging_bytes(&data)
                };
                slot.buffer.unmap();
                slot.state = SlotState::Idle;
                log::debug!(
                    "Collected overdraw grids of frame {}: {:?}",
                    slot.frame_index,
                    result
                );
                Some((slot.frame_index, result))
            }
            Ok(Err(e)) => {
                log::warn!(
                    "Overdraw readback map failed for frame {}: {e}",
                    slot.frame_index
                );
                slot.state = SlotState::Idle;
                None
            }
            Err(mpsc::TryRecvError::Empty) => {
                log::debug!(
                    "Overdraw readback of frame {} not ready yet",
                    slot.frame_index
                );
                None
            }
            Err(mpsc::TryRecvError::Disconnected) => {
                log::warn!(
                    "Overdraw readback callback dropped for frame {}",
                    slot.frame_index
                );
                slot.state = SlotState::Idle;
                None
            }
        }
    }

    pub fn destroy(&mut self) {
        for slot in &mut self.slots {
            slot.buffer.destroy();
            slot.state = SlotState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_alternate_by_frame() {
        assert_eq!(ReadbackRing::slot_for(0), 0);
        assert_eq!(ReadbackRing::slot_for(1), 1);
        assert_eq!(ReadbackRing::slot_for(2), 0);
        assert_ne!(
            ReadbackRing::slot_for(41),
            ReadbackRing::slot_for(42),
            "consecutive frames must never share a slot"
        );
    }
}
