//! Staging Readback
//!
//! A [`StagingSlot`] is a small `MAP_READ | COPY_DST` buffer receiving a single
//! texel. Its lifecycle:
//!
//! ```text
//! Idle ──copy──► Recorded ──submit (map_async)──► Pending ──callback──► Mapped
//!   ▲                                                │                    │
//!   └──────────────────────── unmap ─────────────────┴────────────────────┘
//! ```
//!
//! `unmap` on a pending slot abandons the map request. The adaptation filter
//! only does that on teardown; while running it keeps a pending slot out of
//! the copy rotation until it has been read.
//!
//! A map that is still pending is reported as `ReadbackContention`. A failed
//! or dropped map request is a `ResourceCreation` error and leaves the slot
//! idle.

use std::sync::Arc;

use parking_lot::Mutex;

use lumen_core::{LumenError, Result};

/// Size of a staging buffer. Copies use a 256-byte row pitch.
pub const STAGING_SIZE: u64 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as u64;

type MapResult = std::result::Result<(), wgpu::BufferAsyncError>;

enum SlotState {
    Idle,
    Recorded,
    Pending(flume::Receiver<MapResult>),
    Mapped,
}

pub struct StagingSlot {
    label: String,
    buffer: wgpu::Buffer,
    state: Arc<Mutex<SlotState>>,
}

impl StagingSlot {
    pub(crate) fn new(device: &wgpu::Device, label: &str) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: STAGING_SIZE,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            label: label.to_string(),
            buffer,
            state: Arc::new(Mutex::new(SlotState::Idle)),
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Releases an active or requested mapping so the buffer can be copied
    /// into again.
    pub(crate) fn release(&self) {
        let mut state = self.state.lock();
        if matches!(*state, SlotState::Pending(_) | SlotState::Mapped) {
            self.buffer.unmap();
            *state = SlotState::Idle;
        }
    }

    pub(crate) fn mark_recorded(&self) -> PendingMap {
        self.release();
        *self.state.lock() = SlotState::Recorded;
        PendingMap {
            buffer: self.buffer.clone(),
            state: Arc::clone(&self.state),
        }
    }

    /// Reads the mapped texel, or reports why it is not available.
    pub(crate) fn read(&self) -> Result<f32> {
        let mut state = self.state.lock();
        let polled = match &*state {
            SlotState::Pending(rx) => Some(rx.try_recv()),
            SlotState::Mapped => None,
            SlotState::Recorded => {
                return Err(LumenError::contention(&self.label, "copy not submitted"));
            }
            SlotState::Idle => {
                return Err(LumenError::contention(&self.label, "no readback in flight"));
            }
        };

        match polled {
            None | Some(Ok(Ok(()))) => *state = SlotState::Mapped,
            Some(Ok(Err(e))) => {
                *state = SlotState::Idle;
                return Err(LumenError::resource(&self.label, format!("map failed: {e}")));
            }
            Some(Err(flume::TryRecvError::Empty)) => {
                return Err(LumenError::contention(&self.label, "map still pending"));
            }
            Some(Err(flume::TryRecvError::Disconnected)) => {
                *state = SlotState::Idle;
                return Err(LumenError::resource(&self.label, "map request dropped"));
            }
        }
        drop(state);

        let view = self.buffer.slice(..).get_mapped_range();
        Ok(bytemuck::pod_read_unaligned::<f32>(&view[..4]))
    }
}

/// A slot whose copy was recorded and needs a map request after submission.
pub(crate) struct PendingMap {
    buffer: wgpu::Buffer,
    state: Arc<Mutex<SlotState>>,
}

impl PendingMap {
    /// Requests the CPU mapping. Must be called after the copy was submitted.
    pub(crate) fn request(self) {
        let mut state = self.state.lock();
        if !matches!(*state, SlotState::Recorded) {
            // Released or re-recorded since; nothing to map.
            return;
        }
        let (tx, rx) = flume::bounded(1);
        self.buffer
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let _ = tx.send(result);
            });
        *state = SlotState::Pending(rx);
    }
}
