//! GPU-side instance storage.
//!
//! The CPU copy of the records lives in the instancer. This module owns the
//! mirrored GPU buffer: it grows geometrically and only re-uploads the span
//! of records touched since the last frame.

use std::ops::Range;

use crate::config::InstancerConfig;
use crate::gpu::{BufferId, BufferKind, GpuSink};

/// Span of records modified since the last upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtyRange {
    span: Option<Range<usize>>,
}

impl DirtyRange {
    /// Marks one record.
    #[inline]
    pub fn mark(&mut self, index: usize) {
        self.mark_range(index..index + 1);
    }

    /// Marks a span of records.
    pub fn mark_range(&mut self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        self.span = Some(match self.span.take() {
            Some(span) => span.start.min(range.start)..span.end.max(range.end),
            None => range,
        });
    }

    /// Marks every record.
    pub fn mark_all(&mut self, len: usize) {
        self.mark_range(0..len);
    }

    /// True if nothing needs uploading.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.span.is_none()
    }

    /// Takes the span, clipped to `len` records.
    pub fn take(&mut self, len: usize) -> Option<Range<usize>> {
        let span = self.span.take()?;
        let clipped = span.start.min(len)..span.end.min(len);
        (!clipped.is_empty()).then_some(clipped)
    }

    /// Forgets everything marked.
    pub fn reset(&mut self) {
        self.span = None;
    }
}

/// A growable GPU buffer of fixed-stride records.
#[derive(Debug)]
pub struct InstanceBuffer {
    buffer: Option<BufferId>,
    capacity: usize,
    stride: usize,
}

impl InstanceBuffer {
    /// Creates an unallocated buffer for records of `stride` bytes.
    #[must_use]
    pub const fn new(stride: usize) -> Self {
        Self {
            buffer: None,
            capacity: 0,
            stride,
        }
    }

    /// The backend buffer, once allocated.
    #[must_use]
    pub const fn id(&self) -> Option<BufferId> {
        self.buffer
    }

    /// Records the buffer can hold without growing.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Brings the GPU copy in line with `records`.
    ///
    /// `records` is every live record, packed. When the buffer is too small
    /// it is replaced and fully uploaded; otherwise only `dirty` is written.
    pub fn sync(
        &mut self,
        sink: &mut dyn GpuSink,
        records: &[u8],
        dirty: Option<Range<usize>>,
        policy: &InstancerConfig,
    ) -> BufferId {
        debug_assert_eq!(records.len() % self.stride.max(1), 0);
        let count = records.len() / self.stride.max(1);

        match self.buffer {
            Some(buffer) if count <= self.capacity => {
                if let Some(range) = dirty {
                    let bytes = &records[range.start * self.stride..range.end * self.stride];
                    sink.upload(buffer, range.start * self.stride, bytes);
                }
                buffer
            }
            previous => {
                let capacity = policy.grow(self.capacity, count);
                if let Some(old) = previous {
                    sink.destroy_buffer(old);
                    tracing::debug!(from = self.capacity, to = capacity, "instance buffer grown");
                }
                let buffer = sink.create_buffer(BufferKind::Instance, capacity * self.stride);
                if !records.is_empty() {
                    sink.upload(buffer, 0, records);
                }
                self.buffer = Some(buffer);
                self.capacity = capacity;
                buffer
            }
        }
    }

    /// Destroys the GPU buffer, if any.
    pub fn release(&mut self, sink: &mut dyn GpuSink) {
        if let Some(buffer) = self.buffer.take() {
            sink.destroy_buffer(buffer);
        }
        self.capacity = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GpuCommand, RecordingSink};

    #[test]
    fn test_dirty_range_merges() {
        let mut dirty = DirtyRange::default();
        assert!(dirty.is_clean());

        dirty.mark(5);
        dirty.mark(2);
        dirty.mark_range(3..4);
        assert_eq!(dirty.take(10), Some(2..6));
        assert!(dirty.is_clean());
    }

    #[test]
    fn test_dirty_range_clips_to_len() {
        let mut dirty = DirtyRange::default();
        dirty.mark(7);
        assert_eq!(dirty.take(5), None);

        dirty.mark_all(4);
        assert_eq!(dirty.take(3), Some(0..3));
    }

    #[test]
    fn test_growth_and_partial_upload() {
        let policy = InstancerConfig {
            initial_capacity: 2,
            growth_factor: 2.0,
        };
        let mut sink = RecordingSink::new();
        let mut buffer = InstanceBuffer::new(4);

        let first = buffer.sync(&mut sink, &[1; 8], Some(0..2), &policy);
        assert_eq!(buffer.capacity(), 2);

        // In place: only the dirty record is written
        sink.clear_commands();
        buffer.sync(&mut sink, &[2; 8], Some(1..2), &policy);
        assert_eq!(
            sink.commands(),
            &[GpuCommand::Upload {
                buffer: first,
                offset: 4,
                len: 4,
            }]
        );

        // Overflow: old buffer destroyed, new one fully written
        let grown = buffer.sync(&mut sink, &[3; 12], Some(2..3), &policy);
        assert_ne!(grown, first);
        assert_eq!(buffer.capacity(), 4);
        assert_eq!(sink.live_buffers(), 1);
        assert_eq!(sink.buffer_contents(grown).map(|b| b[..12].to_vec()), Some(vec![3; 12]));

        buffer.release(&mut sink);
        assert_eq!(sink.live_buffers(), 0);
        assert_eq!(buffer.id(), None);
    }
}
