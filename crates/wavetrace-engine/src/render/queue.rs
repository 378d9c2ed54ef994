//! Event-ordered command queue.
//!
//! Every command (kernel dispatch, fill, copy) returns an [`Event`]. Later
//! commands name the events they depend on in an explicit wait list, which
//! makes the dependency graph of a tile visible and checkable instead of
//! implied by recording order.
//!
//! Commands are recorded into one pending encoder and reach the device on
//! [`KernelQueue::flush`]. wgpu executes passes of one queue in order and
//! inserts the memory barriers between them, so a validated wait list is
//! always satisfied on the device. Validation covers two things: every
//! waited event was issued earlier by this queue, and every dispatch waits
//! on a stage listed in [`KernelStage::inputs`].
//!
//! The dependency log keeps the commands recorded since the last
//! [`KernelQueue::clear_log`]; the tile loop clears it per region.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::device::ComputeContext;
use crate::error::{DeviceStatus, RenderError, Result};

use super::kernels::Kernel;
use super::program::KernelStage;

static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

/// What a queued command does.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Command {
    Dispatch(KernelStage),
    Fill,
    Copy,
}

/// Completion handle of a queued command.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Event {
    queue: u64,
    id: u64,
}

impl Event {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// One entry of the dependency log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    pub event: u64,
    pub command: Command,
    pub waits_on: Vec<u64>,
    /// Index of the submission that carried this command.
    pub submission: u64,
}

pub struct KernelQueue<'a> {
    ctx: &'a ComputeContext,
    id: u64,
    encoder: Option<wgpu::CommandEncoder>,
    next_event: u64,
    submissions: u64,
    log: Vec<CommandRecord>,
}

impl<'a> KernelQueue<'a> {
    pub fn new(ctx: &'a ComputeContext) -> Self {
        Self {
            ctx,
            id: NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed),
            encoder: None,
            next_event: 0,
            submissions: 0,
            log: Vec::new(),
        }
    }

    /// Records a dispatch of `kernel` that runs after every event in `wait_list`.
    #[track_caller]
    pub fn enqueue(&mut self, kernel: &Kernel, wait_list: &[Event]) -> Result<Event> {
        self.check_wait_list(wait_list)?;
        self.check_inputs(kernel.stage, wait_list)?;
        let [x, y] = kernel.launch.work_groups;

        let encoder = self.encoder();
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kernel.stage.entry_point()),
                timestamp_writes: None,
            });
            pass.set_pipeline(&kernel.pipeline);
            pass.set_bind_group(0, &kernel.bind_group, &[]);
            pass.dispatch_workgroups(x, y, 1);
        }

        Ok(self.record(Command::Dispatch(kernel.stage), wait_list))
    }

    /// Records a zero-fill of every buffer in `buffers`.
    #[track_caller]
    pub fn fill_zero(&mut self, buffers: &[&wgpu::Buffer], wait_list: &[Event]) -> Result<Event> {
        self.check_wait_list(wait_list)?;
        let encoder = self.encoder();
        for buffer in buffers {
            encoder.clear_buffer(buffer, 0, None);
        }
        Ok(self.record(Command::Fill, wait_list))
    }

    /// Records a copy of the first `size` bytes of `src` into `dst`.
    #[track_caller]
    pub fn copy(
        &mut self,
        src: &wgpu::Buffer,
        dst: &wgpu::Buffer,
        size: u64,
        wait_list: &[Event],
    ) -> Result<Event> {
        self.check_wait_list(wait_list)?;
        self.encoder().copy_buffer_to_buffer(src, 0, dst, 0, size);
        Ok(self.record(Command::Copy, wait_list))
    }

    /// Submits everything recorded so far. Does not block.
    pub fn flush(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.ctx.queue().submit(std::iter::once(encoder.finish()));
            self.submissions += 1;
        }
    }

    /// Submits pending work and blocks until the device is idle.
    pub fn finish(&mut self) -> Result<()> {
        self.flush();
        self.ctx.wait_idle()
    }

    /// Commands recorded since the log was last cleared, in issue order.
    pub fn dependency_log(&self) -> &[CommandRecord] {
        &self.log
    }

    /// Forgets the recorded commands. Event ids keep counting; events issued
    /// before the clear can still be waited on but no longer satisfy a
    /// dispatch's input check.
    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    pub fn submissions(&self) -> u64 {
        self.submissions
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let ctx = self.ctx;
        self.encoder.get_or_insert_with(|| {
            ctx.device().create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("wavetrace tile encoder"),
            })
        })
    }

    #[track_caller]
    fn check_wait_list(&self, wait_list: &[Event]) -> Result<()> {
        match wait_list
            .iter()
            .find(|e| e.queue != self.id || e.id >= self.next_event)
        {
            Some(e) => Err(RenderError::device(DeviceStatus::ForeignEvent { event: e.id })),
            None => Ok(()),
        }
    }

    #[track_caller]
    fn check_inputs(&self, stage: KernelStage, wait_list: &[Event]) -> Result<()> {
        let inputs = stage.inputs();
        if inputs.is_empty() {
            return Ok(());
        }
        let satisfied = wait_list.iter().any(|e| {
            matches!(self.command_of(*e), Some(Command::Dispatch(s)) if inputs.contains(&s))
        });
        if satisfied {
            Ok(())
        } else {
            Err(RenderError::device(DeviceStatus::MissingDependency {
                kernel: stage.entry_point(),
            }))
        }
    }

    /// Looks `event` up in the log. Ids are contiguous, so this is an index.
    fn command_of(&self, event: Event) -> Option<Command> {
        let first = self.log.first()?.event;
        let offset = usize::try_from(event.id.checked_sub(first)?).ok()?;
        self.log.get(offset).map(|r| r.command)
    }

    fn record(&mut self, command: Command, wait_list: &[Event]) -> Event {
        let event = Event { queue: self.id, id: self.next_event };
        self.next_event += 1;
        log::trace!("queue {}: #{} {:?} after {:?}", self.id, event.id, command, wait_list);
        self.log.push(CommandRecord {
            event: event.id,
            command,
            waits_on: wait_list.iter().map(|e| e.id).collect(),
            submission: self.submissions,
        });
        event
    }
}

impl std::fmt::Debug for KernelQueue<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelQueue")
            .field("id", &self.id)
            .field("next_event", &self.next_event)
            .field("submissions", &self.submissions)
            .finish()
    }
}
