/// Unwinding plumbing: interruption payloads and the panic hook
///
/// Exit requests, standard-input reads, "fail now" and cancellation all
/// unwind the supervised code with a dedicated payload through
/// `resume_unwind`, which bypasses the panic hook. Genuine panics go through
/// a process-wide hook, installed once and chained to the previous one, that
/// records location and backtrace for supervised threads and stays silent
/// there; other threads keep the previous behavior.
use crate::beautify::{PanicLocation, StudentException};
use crate::config::types::Paragraphs;
use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::panic;
use std::sync::Once;

static HOOK: Once = Once::new();

thread_local! {
    static SUPERVISED: Cell<bool> = const { Cell::new(false) };
    static LAST_PANIC: RefCell<Option<PanicRecord>> = const { RefCell::new(None) };
}

/// Reasons for leaving supervised code other than a panic
#[derive(Debug)]
pub(crate) enum Interrupt {
    Exit(i32),
    Input,
    Fail(Paragraphs),
    Cancelled,
}

/// How a supervised block unwound
#[derive(Debug)]
pub(crate) enum Unwound {
    Interrupt(Interrupt),
    Panic(StudentException),
}

#[derive(Debug)]
struct PanicRecord {
    location: Option<PanicLocation>,
    backtrace: Option<String>,
}

pub(crate) fn raise(interrupt: Interrupt) -> ! {
    panic::resume_unwind(Box::new(interrupt))
}

/// Install the recording hook; later calls are no-ops
pub(crate) fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !SUPERVISED.with(Cell::get) {
                previous(info);
                return;
            }
            let location = info.location().map(|l| PanicLocation {
                file: l.file().to_string(),
                line: l.line(),
                column: l.column(),
            });
            let backtrace = Backtrace::capture();
            let backtrace = (backtrace.status() == BacktraceStatus::Captured)
                .then(|| backtrace.to_string());
            LAST_PANIC.with(|last| {
                *last.borrow_mut() = Some(PanicRecord {
                    location,
                    backtrace,
                })
            });
        }));
        log::debug!("panic hook installed");
    });
}

/// Marks the current thread as running supervised code until dropped
pub(crate) struct SupervisedThread {
    previous: bool,
    // Tied to the thread it marked
    _not_send: PhantomData<*const ()>,
}

impl SupervisedThread {
    pub(crate) fn enter() -> Self {
        let previous = SUPERVISED.with(|s| s.replace(true));
        Self {
            previous,
            _not_send: PhantomData,
        }
    }
}

impl Drop for SupervisedThread {
    fn drop(&mut self) {
        SUPERVISED.with(|s| s.set(self.previous));
    }
}

/// Turn a `catch_unwind` payload into an interruption or an exception.
///
/// Must run on the thread that panicked, right after `catch_unwind`.
pub(crate) fn classify_payload(payload: Box<dyn Any + Send>) -> Unwound {
    let payload = match payload.downcast::<Interrupt>() {
        Ok(interrupt) => return Unwound::Interrupt(*interrupt),
        Err(payload) => payload,
    };

    let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Box<dyn Any>".to_string()
    };

    let mut exception = StudentException::panic(message);
    if let Some(record) = LAST_PANIC.with(|last| last.borrow_mut().take()) {
        if let Some(location) = record.location {
            exception = exception.with_location(location);
        }
        if let Some(backtrace) = record.backtrace {
            exception = exception.with_backtrace(backtrace);
        }
    }
    if let Some(name) = std::thread::current().name() {
        exception = exception.with_thread(name);
    }
    Unwound::Panic(exception)
}
