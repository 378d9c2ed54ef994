//! Blocking device-to-host transfers.

use crate::device::ComputeContext;
use crate::error::{DeviceStatus, RenderError, Result};

/// A `MAP_READ` buffer that device arrays are copied into before mapping.
#[derive(Debug)]
pub struct StagingBuffer {
    buffer: wgpu::Buffer,
}

impl StagingBuffer {
    #[track_caller]
    pub fn new(ctx: &ComputeContext, label: &'static str, size: u64) -> Result<Self> {
        let size = size.max(wgpu::COPY_BUFFER_ALIGNMENT);
        ctx.check_buffer_size(label, size)?;
        let buffer = ctx.scoped(|device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        })?;
        Ok(Self { buffer })
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn size(&self) -> u64 {
        self.buffer.size()
    }

    /// Maps the first `len` bytes, hands them to `f`, then unmaps.
    ///
    /// Blocks until every submitted command has finished. The buffer is
    /// unmapped on every exit path once the map succeeded, including a panic
    /// inside `f`.
    #[track_caller]
    pub fn read<R>(&self, ctx: &ComputeContext, len: u64, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        if len > self.size() {
            return Err(RenderError::device(DeviceStatus::BufferTooLarge {
                label: "staging read".into(),
                size: len,
                max: self.size(),
            }));
        }
        let slice = self.buffer.slice(..len);

        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        ctx.wait_idle()?;

        rx.recv()
            .map_err(|_| RenderError::device(DeviceStatus::MapFailed("map callback dropped".into())))?
            .map_err(|e| RenderError::device(DeviceStatus::MapFailed(e.to_string())))?;

        let _unmap = Unmap(&self.buffer);
        let view = slice.get_mapped_range();
        let out = f(&view);
        drop(view);
        Ok(out)
    }
}

/// Unmaps on drop.
struct Unmap<'a>(&'a wgpu::Buffer);

impl Drop for Unmap<'_> {
    fn drop(&mut self) {
        self.0.unmap();
    }
}

/// Reinterprets mapped bytes as `T`s (copying; mapped ranges are not
/// guaranteed to be aligned for `T`).
pub fn to_vec<T: bytemuck::Pod>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(size_of::<T>())
        .map(bytemuck::pod_read_unaligned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::test_context;

    #[test]
    fn reads_back_uploaded_words() {
        let Some(ctx) = test_context() else { return };
        use wgpu::util::DeviceExt;

        let data: Vec<u32> = (0..64).collect();
        let src = ctx.device().create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("src"),
            contents: bytemuck::cast_slice(&data),
            usage: wgpu::BufferUsages::COPY_SRC,
        });
        let staging = StagingBuffer::new(&ctx, "staging", 256).unwrap();

        let mut encoder = ctx.device().create_command_encoder(&Default::default());
        encoder.copy_buffer_to_buffer(&src, 0, staging.buffer(), 0, 256);
        ctx.queue().submit([encoder.finish()]);

        let back: Vec<u32> = staging.read(&ctx, 256, to_vec::<u32>).unwrap();
        assert_eq!(back, data);

        // Unmapped again: a second read must succeed.
        let first = staging.read(&ctx, 4, |b| to_vec::<u32>(b)[0]).unwrap();
        assert_eq!(first, 0);
    }

    #[test]
    fn read_past_the_end_is_rejected() {
        let Some(ctx) = test_context() else { return };
        let staging = StagingBuffer::new(&ctx, "staging", 16).unwrap();
        let err = staging.read(&ctx, 32, |b| b.len()).unwrap_err();
        assert!(matches!(
            err.device_status(),
            Some(DeviceStatus::BufferTooLarge { size: 32, max: 16, .. })
        ));
        assert_eq!(staging.read(&ctx, 16, |b| b.len()).unwrap(), 16);
    }

    #[test]
    fn to_vec_handles_unaligned_input() {
        let bytes = [0u8, 1, 0, 0, 0, 2, 0, 0, 0];
        let words: Vec<u32> = to_vec(&bytes[1..]);
        assert_eq!(words, vec![1, 2]);
    }
}
