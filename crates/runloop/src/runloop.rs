//! The runloop proper.
//!
//! The loop body drains dispatched jobs, fires due timers, polls fd
//! monitors and calls the idle hook, in that order. Callbacks are taken
//! out of their registries before they run, so a callback may freely
//! register or remove monitors and timers on its own runloop.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::os::unix::io::RawFd;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bitflags::bitflags;
use parking_lot::Mutex;

use crate::error::{RunLoopError, RunLoopResult};
use crate::timer::{TimerHandle, TimerTable};

bitflags! {
    /// Event mask for fd monitors, mirroring poll(2).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IoEventMask: u32 {
        /// Data available to read
        const IN = 0x01;
        /// Urgent data available
        const PRI = 0x02;
        /// Writable without blocking
        const OUT = 0x04;
        /// Error condition
        const ERR = 0x08;
        /// Peer hung up
        const HUP = 0x10;
        /// Invalid descriptor
        const NVAL = 0x20;
    }
}

/// A callback attached to an fd monitor. Returning false detaches the
/// monitor.
pub type IoCallback = Box<dyn FnMut(RawFd, IoEventMask) -> bool>;

type Job = Box<dyn FnOnce() + Send>;

/// Identifies a registered fd monitor.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MonitorHandle(u64);

impl MonitorHandle {
    /// The raw handle value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

struct Monitor {
    fd: RawFd,
    mask: IoEventMask,
    callback: IoCallback,
}

struct Shared {
    queue: Mutex<VecDeque<Job>>,
    stop: AtomicBool,
    wake_write_fd: RawFd,
}

impl Shared {
    fn wake(&self) {
        let byte = [1u8];
        // A full pipe already guarantees a pending wakeup.
        unsafe {
            libc::write(self.wake_write_fd, byte.as_ptr() as *const libc::c_void, 1);
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.wake_write_fd);
        }
    }
}

/// A cloneable, `Send` reference to a runloop, usable from any thread.
#[derive(Clone)]
pub struct RunLoopHandle {
    shared: Arc<Shared>,
}

impl RunLoopHandle {
    /// Enqueues `job` for the loop's next iteration and wakes it.
    pub fn dispatch<F: FnOnce() + Send + 'static>(&self, job: F) {
        self.shared.queue.lock().push_back(Box::new(job));
        self.shared.wake();
    }

    /// Interrupts a blocking poll without enqueuing work.
    pub fn wakeup(&self) {
        self.shared.wake();
    }

    /// Asks the loop to exit after the current iteration.
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        self.shared.wake();
    }
}

struct Inner {
    shared: Arc<Shared>,
    wake_read_fd: RawFd,
    monitors: RefCell<Vec<(u64, Monitor)>>,
    next_monitor_id: Cell<u64>,
    timers: RefCell<TimerTable>,
    idle: RefCell<Option<Box<dyn FnMut()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.wake_read_fd);
        }
    }
}

thread_local! {
    static CURRENT: RefCell<Option<RunLoop>> = const { RefCell::new(None) };
}

/// Poll cap while an idle hook is installed, so the hook keeps getting
/// called without spinning.
const IDLE_POLL_CAP: Duration = Duration::from_millis(10);
/// Poll cap with no idle hook and no due timer.
const DEFAULT_POLL_CAP: Duration = Duration::from_millis(500);

/// A single-threaded cooperative runloop.
#[derive(Clone)]
pub struct RunLoop {
    inner: Rc<Inner>,
}

impl RunLoop {
    /// The runloop of the current thread, created on first use.
    pub fn current() -> RunLoop {
        CURRENT.with(|slot| {
            let mut slot = slot.borrow_mut();
            if let Some(runloop) = slot.as_ref() {
                return runloop.clone();
            }
            let runloop = RunLoop::new().expect("self-pipe creation failed");
            *slot = Some(runloop.clone());
            runloop
        })
    }

    fn new() -> RunLoopResult<RunLoop> {
        let mut fds = [0 as RawFd; 2];
        let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
        if rc != 0 {
            return Err(RunLoopError::from(std::io::Error::last_os_error()));
        }
        for fd in fds {
            unsafe {
                let flags = libc::fcntl(fd, libc::F_GETFL);
                libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
            }
        }

        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            stop: AtomicBool::new(false),
            wake_write_fd: fds[1],
        });

        Ok(RunLoop {
            inner: Rc::new(Inner {
                shared,
                wake_read_fd: fds[0],
                monitors: RefCell::new(Vec::new()),
                next_monitor_id: Cell::new(0),
                timers: RefCell::new(TimerTable::default()),
                idle: RefCell::new(None),
            }),
        })
    }

    /// A `Send` handle to this loop.
    pub fn handle(&self) -> RunLoopHandle {
        RunLoopHandle {
            shared: Arc::clone(&self.inner.shared),
        }
    }

    /// Enqueues `job` for the next iteration.
    pub fn dispatch<F: FnOnce() + Send + 'static>(&self, job: F) {
        self.handle().dispatch(job);
    }

    /// Installs the idle hook, called on every iteration.
    pub fn set_idle_func<F: FnMut() + 'static>(&self, func: F) {
        *self.inner.idle.borrow_mut() = Some(Box::new(func));
    }

    /// Removes the idle hook.
    pub fn clear_idle_func(&self) {
        *self.inner.idle.borrow_mut() = None;
    }

    /// Registers an fd monitor. The callback is invoked with the subset
    /// of `mask` that fired; returning false detaches the monitor.
    pub fn add_fd_monitor<F>(&self, fd: RawFd, mask: IoEventMask, callback: F) -> MonitorHandle
    where
        F: FnMut(RawFd, IoEventMask) -> bool + 'static,
    {
        let id = self.inner.next_monitor_id.get() + 1;
        self.inner.next_monitor_id.set(id);
        self.inner.monitors.borrow_mut().push((
            id,
            Monitor {
                fd,
                mask,
                callback: Box::new(callback),
            },
        ));
        MonitorHandle(id)
    }

    /// Removes an fd monitor. After removal no further callback fires for
    /// it. Returns false for a stale handle.
    pub fn remove_fd_monitor(&self, handle: MonitorHandle) -> bool {
        let mut monitors = self.inner.monitors.borrow_mut();
        let before = monitors.len();
        monitors.retain(|(id, _)| *id != handle.0);
        monitors.len() != before
    }

    /// Registers an interval timer. The callback returning false removes
    /// the timer.
    pub fn add_timer<F: FnMut() -> bool + 'static>(
        &self,
        interval: Duration,
        callback: F,
    ) -> TimerHandle {
        self.inner.timers.borrow_mut().add(interval, Box::new(callback))
    }

    /// Removes a timer. Returns false for a stale handle.
    pub fn remove_timer(&self, handle: TimerHandle) -> bool {
        self.inner.timers.borrow_mut().remove(handle)
    }

    /// Asks the loop to exit after the current iteration.
    pub fn stop(&self) {
        self.handle().stop();
    }

    /// Runs until [`RunLoop::stop`] is called.
    pub fn run(&self) {
        self.inner.shared.stop.store(false, Ordering::SeqCst);
        while !self.inner.shared.stop.load(Ordering::SeqCst) {
            self.turn();
        }
    }

    /// Runs one iteration: jobs, timers, poll, idle. Public so embedders
    /// can interleave the loop with their own scheduling.
    pub fn turn(&self) {
        self.drain_jobs();
        self.fire_due_timers();
        self.poll_monitors(self.poll_timeout());
        self.call_idle();
    }

    fn drain_jobs(&self) {
        loop {
            let job = self.inner.shared.queue.lock().pop_front();
            match job {
                Some(job) => job(),
                None => break,
            }
        }
    }

    fn fire_due_timers(&self) {
        let due = self.inner.timers.borrow_mut().take_due(Instant::now());
        for (id, mut entry) in due {
            let keep = (entry.callback)();
            if keep {
                self.inner.timers.borrow_mut().reinstall(id, entry);
            }
        }
    }

    fn poll_timeout(&self) -> Duration {
        if !self.inner.shared.queue.lock().is_empty() {
            return Duration::ZERO;
        }

        let cap = if self.inner.idle.borrow().is_some() {
            IDLE_POLL_CAP
        } else {
            DEFAULT_POLL_CAP
        };

        match self.inner.timers.borrow().next_due() {
            Some(due) => due.saturating_duration_since(Instant::now()).min(cap),
            None => cap,
        }
    }

    fn poll_monitors(&self, timeout: Duration) {
        let mut pollfds: Vec<libc::pollfd> = Vec::new();
        pollfds.push(libc::pollfd {
            fd: self.inner.wake_read_fd,
            events: libc::POLLIN,
            revents: 0,
        });

        let registered: Vec<(u64, RawFd, IoEventMask)> = self
            .inner
            .monitors
            .borrow()
            .iter()
            .map(|(id, monitor)| (*id, monitor.fd, monitor.mask))
            .collect();

        for (_, fd, mask) in &registered {
            pollfds.push(libc::pollfd {
                fd: *fd,
                events: mask_to_poll_events(*mask),
                revents: 0,
            });
        }

        let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;
        let rc = unsafe { libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, timeout_ms) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() != std::io::ErrorKind::Interrupted {
                log::warn!("runloop poll failed: {err}");
            }
            return;
        }
        if rc == 0 {
            return;
        }

        if pollfds[0].revents & libc::POLLIN != 0 {
            self.drain_wake_pipe();
        }

        for (slot, (id, fd, _)) in registered.iter().enumerate() {
            let revents = pollfds[slot + 1].revents;
            if revents == 0 {
                continue;
            }
            let fired = poll_events_to_mask(revents);

            // Take the monitor out so the callback can touch the registry.
            let taken = {
                let mut monitors = self.inner.monitors.borrow_mut();
                monitors
                    .iter()
                    .position(|(mid, _)| mid == id)
                    .map(|pos| monitors.remove(pos))
            };
            let Some((mid, mut monitor)) = taken else {
                continue; // removed by an earlier callback this round
            };

            let keep = (monitor.callback)(*fd, fired);
            if keep {
                self.inner.monitors.borrow_mut().push((mid, monitor));
            }
        }
    }

    fn drain_wake_pipe(&self) {
        let mut buf = [0u8; 64];
        loop {
            let n = unsafe {
                libc::read(
                    self.inner.wake_read_fd,
                    buf.as_mut_ptr() as *mut libc::c_void,
                    buf.len(),
                )
            };
            if n <= 0 {
                break;
            }
        }
    }

    fn call_idle(&self) {
        let taken = self.inner.idle.borrow_mut().take();
        if let Some(mut idle) = taken {
            idle();
            let mut slot = self.inner.idle.borrow_mut();
            // the hook may have replaced itself while running
            if slot.is_none() {
                *slot = Some(idle);
            }
        }
    }
}

fn mask_to_poll_events(mask: IoEventMask) -> libc::c_short {
    let mut events = 0;
    if mask.contains(IoEventMask::IN) {
        events |= libc::POLLIN;
    }
    if mask.contains(IoEventMask::PRI) {
        events |= libc::POLLPRI;
    }
    if mask.contains(IoEventMask::OUT) {
        events |= libc::POLLOUT;
    }
    events
}

fn poll_events_to_mask(revents: libc::c_short) -> IoEventMask {
    let mut mask = IoEventMask::empty();
    if revents & libc::POLLIN != 0 {
        mask |= IoEventMask::IN;
    }
    if revents & libc::POLLPRI != 0 {
        mask |= IoEventMask::PRI;
    }
    if revents & libc::POLLOUT != 0 {
        mask |= IoEventMask::OUT;
    }
    if revents & libc::POLLERR != 0 {
        mask |= IoEventMask::ERR;
    }
    if revents & libc::POLLHUP != 0 {
        mask |= IoEventMask::HUP;
    }
    if revents & libc::POLLNVAL != 0 {
        mask |= IoEventMask::NVAL;
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;
    use std::rc::Rc as StdRc;

    #[test]
    fn test_dispatch_runs_in_order() {
        let runloop = RunLoop::current();
        let seen: StdRc<StdRefCell<Vec<u32>>> = StdRc::new(StdRefCell::new(Vec::new()));

        for i in 0..3 {
            let seen = StdRc::clone(&seen);
            runloop.dispatch(move || seen.borrow_mut().push(i));
        }
        let handle = runloop.handle();
        runloop.dispatch(move || handle.stop());

        runloop.run();
        assert_eq!(*seen.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_timer_fires_and_detaches() {
        let runloop = RunLoop::current();
        let fired = StdRc::new(StdRefCell::new(0u32));

        let counter = StdRc::clone(&fired);
        let handle = runloop.handle();
        runloop.add_timer(Duration::from_millis(5), move || {
            let mut count = counter.borrow_mut();
            *count += 1;
            if *count >= 3 {
                handle.stop();
                false
            } else {
                true
            }
        });

        runloop.run();
        assert_eq!(*fired.borrow(), 3);
    }

    #[test]
    fn test_fd_monitor_reports_readable() {
        let runloop = RunLoop::current();

        let mut fds = [0 as RawFd; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        let payload = b"x";
        unsafe {
            libc::write(fds[1], payload.as_ptr() as *const libc::c_void, 1);
        }

        let got: StdRc<StdRefCell<Option<IoEventMask>>> = StdRc::new(StdRefCell::new(None));
        let sink = StdRc::clone(&got);
        let handle = runloop.handle();
        runloop.add_fd_monitor(fds[0], IoEventMask::IN, move |_fd, events| {
            *sink.borrow_mut() = Some(events);
            handle.stop();
            false
        });

        runloop.run();
        assert_eq!(*got.borrow(), Some(IoEventMask::IN));

        unsafe {
            libc::close(fds[0]);
            libc::close(fds[1]);
        }
    }

    #[test]
    fn test_removed_monitor_stays_silent() {
        let runloop = RunLoop::current();

        let mut fds = [0 as RawFd; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        unsafe {
            libc::write(fds[1], b"x".as_ptr() as *const libc::c_void, 1);
        }

        let fired = StdRc::new(StdRefCell::new(false));
        let sink = StdRc::clone(&fired);
        let monitor = runloop.add_fd_monitor(fds[0], IoEventMask::IN, move |_, _| {
            *sink.borrow_mut() = true;
            true
        });
        assert!(runloop.remove_fd_monitor(monitor));
        assert!(!runloop.remove_fd_monitor(monitor));

        let handle = runloop.handle();
        runloop.dispatch(move || handle.stop());
        runloop.run();

        assert!(!*fired.borrow());
        unsafe {
            libc::close(fds[0]);
            libc::close(fds[1]);
        }
    }

    #[test]
    fn test_idle_hook_runs() {
        let runloop = RunLoop::current();
        let ticks = StdRc::new(StdRefCell::new(0u32));

        let counter = StdRc::clone(&ticks);
        let handle = runloop.handle();
        runloop.set_idle_func(move || {
            let mut count = counter.borrow_mut();
            *count += 1;
            if *count >= 2 {
                handle.stop();
            }
        });

        runloop.run();
        runloop.clear_idle_func();
        assert!(*ticks.borrow() >= 2);
    }
}
