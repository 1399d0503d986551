//! Timers and file-descriptor handlers registered by Linux editors through
//! `IRunLoop`, serviced from the editor's winit loop.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use vst3::Steinberg::Linux::{
    FileDescriptor, IEventHandler, IEventHandlerTrait, ITimerHandler, ITimerHandlerTrait,
    TimerInterval,
};
use vst3::Steinberg::{kInvalidArgument, kResultFalse, kResultOk, tresult};
use vst3::{ComPtr, ComRef};

/// How often registered descriptors are serviced when no timer is due sooner.
pub const FD_POLL_INTERVAL: Duration = Duration::from_millis(10);

struct Timer {
    handler: ComPtr<ITimerHandler>,
    interval: Duration,
    due: Instant,
}

#[derive(Default)]
struct Registrations {
    handlers: Vec<(ComPtr<IEventHandler>, FileDescriptor)>,
    timers: Vec<Timer>,
}

#[derive(Default)]
pub struct RunLoop {
    inner: Mutex<Registrations>,
}

impl RunLoop {
    pub fn register_event_handler(&self, handler: *mut IEventHandler, fd: FileDescriptor) -> tresult {
        let Some(handler) = (unsafe { ComRef::from_raw(handler) }) else {
            return kInvalidArgument;
        };
        let Ok(mut inner) = self.inner.lock() else {
            return kResultFalse;
        };
        log::debug!("Editor registered fd {fd}");
        inner.handlers.push((handler.to_com_ptr(), fd));
        kResultOk
    }

    pub fn unregister_event_handler(&self, handler: *mut IEventHandler) -> tresult {
        let Ok(mut inner) = self.inner.lock() else {
            return kResultFalse;
        };
        let before = inner.handlers.len();
        inner.handlers.retain(|(h, _)| h.as_ptr() != handler);
        if inner.handlers.len() == before {
            kInvalidArgument
        } else {
            kResultOk
        }
    }

    pub fn register_timer(&self, handler: *mut ITimerHandler, milliseconds: TimerInterval) -> tresult {
        let Some(handler) = (unsafe { ComRef::from_raw(handler) }) else {
            return kInvalidArgument;
        };
        let Ok(mut inner) = self.inner.lock() else {
            return kResultFalse;
        };
        let interval = Duration::from_millis(milliseconds.max(1));
        log::debug!("Editor registered a {}ms timer", interval.as_millis());
        inner.timers.push(Timer {
            handler: handler.to_com_ptr(),
            interval,
            due: Instant::now() + interval,
        });
        kResultOk
    }

    pub fn unregister_timer(&self, handler: *mut ITimerHandler) -> tresult {
        let Ok(mut inner) = self.inner.lock() else {
            return kResultFalse;
        };
        let before = inner.timers.len();
        inner.timers.retain(|t| t.handler.as_ptr() != handler);
        if inner.timers.len() == before {
            kInvalidArgument
        } else {
            kResultOk
        }
    }

    /// Fires due timers and services every registered descriptor. Returns
    /// when the loop should wake next, or `None` if nothing is registered.
    ///
    /// Callbacks run without the lock held, since handlers may register or
    /// unregister from inside them.
    pub fn dispatch(&self, now: Instant) -> Option<Instant> {
        let (due, fds) = {
            let Ok(mut inner) = self.inner.lock() else {
                return None;
            };
            let mut due = Vec::new();
            for timer in inner.timers.iter_mut().filter(|t| t.due <= now) {
                timer.due = now + timer.interval;
                due.push(timer.handler.clone());
            }
            (due, inner.handlers.clone())
        };

        for timer in &due {
            unsafe { timer.onTimer() };
        }
        // Without a poll on the descriptors, handlers are expected to read
        // non-blocking, as X11 editors do.
        for (handler, fd) in &fds {
            unsafe { handler.onFDIsSet(*fd) };
        }

        self.next_wake(now)
    }

    fn next_wake(&self, now: Instant) -> Option<Instant> {
        let inner = self.inner.lock().ok()?;
        let timer = inner.timers.iter().map(|t| t.due).min();
        let poll = (!inner.handlers.is_empty()).then(|| now + FD_POLL_INTERVAL);
        match (timer, poll) {
            (Some(t), Some(p)) => Some(t.min(p)),
            (t, p) => t.or(p),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner
            .lock()
            .map(|inner| inner.handlers.is_empty() && inner.timers.is_empty())
            .unwrap_or(true)
    }

    /// Drops every registration, releasing the plugin's handler objects.
    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.handlers.clear();
            inner.timers.clear();
        }
    }
}
