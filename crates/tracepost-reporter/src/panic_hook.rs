//! Panic hook integration
//!
//! [`PanicHookBridge`] is the [`IExceptionHook`] for Rust panics. Installing
//! a handler through it replaces the process panic hook with one that:
//!
//! 1. converts the `PanicHookInfo` into a [`ThreadIdentity`] and a
//!    [`CapturedError`] (payload message plus resolved stack frames),
//! 2. hands both to the installed [`IFaultHandler`],
//! 3. parks the panicking thread until the handler forwards the fault to
//!    the handler it replaced (or `forward_wait` elapses); the delivery
//!    worker thread is never parked,
//! 4. runs the previous panic hook on the panicking thread, so the default
//!    behavior (message on stderr, abort on a double panic, ...) still
//!    happens.
//!
//! The "previous handler" the bridge reports is a [`IFaultHandler`] whose
//! only job is to release step 3. A std panic hook needs the borrowed
//! `PanicHookInfo`, which cannot leave the panicking thread, so the actual
//! call always happens there.

use std::any::Any;
use std::collections::HashMap;
use std::panic::PanicHookInfo;
use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, warn};
use tracepost_core::domain::{CapturedError, StackFrame, ThreadIdentity};
use tracepost_core::ports::{IExceptionHook, IFaultHandler};

use crate::transport::WORKER_THREAD_NAME;

/// Type name given to captured panics
pub const PANIC_TYPE_NAME: &str = "Panic";

/// Upper bound on frames kept per crash
const MAX_FRAMES: usize = 128;

/// Placeholder for unresolvable frame parts
const UNKNOWN: &str = "<unknown>";

/// Symbol prefixes of the panic machinery sitting above the faulting frame
const MACHINERY_PREFIXES: &[&str] = &[
    "backtrace::",
    "tracepost_reporter::panic_hook",
    "<alloc::boxed::Box<",
    "std::panicking::",
    "core::panicking::",
    "std::sys::backtrace::",
    "std::sys_common::backtrace::",
    "rust_begin_unwind",
    "__rustc::",
];

// ============================================================================
// PanicHookBridge
// ============================================================================

/// [`IExceptionHook`] over `std::panic::{take_hook, set_hook}`
#[derive(Clone)]
pub struct PanicHookBridge {
    state: Arc<BridgeState>,
}

struct BridgeState {
    /// Panicking threads waiting to be forwarded, by thread id
    waiters: Mutex<HashMap<String, mpsc::Sender<()>>>,
    forward_wait: Duration,
}

impl BridgeState {
    fn register(&self, thread: &ThreadIdentity) -> mpsc::Receiver<()> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut waiters) = self.waiters.lock() {
            waiters.insert(thread.id.clone(), tx);
        }
        rx
    }

    fn release(&self, thread: &ThreadIdentity) -> bool {
        let sender = match self.waiters.lock() {
            Ok(mut waiters) => waiters.remove(&thread.id),
            Err(_) => None,
        };
        match sender {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

impl PanicHookBridge {
    /// Creates a bridge; a panicking thread waits at most `forward_wait`.
    pub fn new(forward_wait: Duration) -> Self {
        Self {
            state: Arc::new(BridgeState {
                waiters: Mutex::new(HashMap::new()),
                forward_wait,
            }),
        }
    }
}

impl IExceptionHook for PanicHookBridge {
    fn current_handler(&self) -> Option<Arc<dyn IFaultHandler>> {
        Some(Arc::new(ForwardToPreviousHook {
            state: Arc::clone(&self.state),
        }))
    }

    fn set_current_handler(&self, handler: Arc<dyn IFaultHandler>) {
        let previous = std::panic::take_hook();
        let state = Arc::clone(&self.state);

        std::panic::set_hook(Box::new(move |info| {
            let thread = ThreadIdentity::current();
            let error = capture_panic(info);

            if !waits_for_forward(std::thread::current().name()) {
                // Delivery callbacks run on this thread, nothing would release it
                handler.uncaught(&thread, &error);
                previous(info);
                return;
            }

            let released = state.register(&thread);
            handler.uncaught(&thread, &error);

            if released.recv_timeout(state.forward_wait).is_err() {
                state.release(&thread);
                warn!(thread = %thread, "Crash handling did not finish in time, continuing with the previous panic hook");
            }

            previous(info);
        }));
    }
}

/// Whether a panicking thread named `thread_name` should wait to be forwarded.
fn waits_for_forward(thread_name: Option<&str>) -> bool {
    thread_name != Some(WORKER_THREAD_NAME)
}

/// Stand-in for the panic hook that was active before installation.
struct ForwardToPreviousHook {
    state: Arc<BridgeState>,
}

impl IFaultHandler for ForwardToPreviousHook {
    fn uncaught(&self, thread: &ThreadIdentity, _error: &CapturedError) {
        if !self.state.release(thread) {
            debug!(thread = %thread, "No panicking thread waiting for this fault");
        }
    }
}

// ============================================================================
// Panic capture
// ============================================================================

/// Converts panic information into a [`CapturedError`].
///
/// Frames come from a resolved backtrace with the panic machinery trimmed
/// off the top. Without symbols, the panic location becomes the only frame.
pub fn capture_panic(info: &PanicHookInfo<'_>) -> CapturedError {
    let message = panic_message(info.payload());

    let raw = collect_raw_frames(&backtrace::Backtrace::new());
    let mut frames = trim_machinery(raw);

    if frames.is_empty() {
        if let Some(location) = info.location() {
            frames.push(StackFrame::new(
                UNKNOWN,
                UNKNOWN,
                base_name(Path::new(location.file())),
                location.line(),
            ));
        }
    }

    CapturedError::new(PANIC_TYPE_NAME, message).with_frames(frames)
}

/// Extract the message of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// One resolved symbol, before classification
#[derive(Debug, Clone, Default)]
struct RawFrame {
    name: Option<String>,
    file: Option<String>,
    line: Option<u32>,
}

fn collect_raw_frames(trace: &backtrace::Backtrace) -> Vec<RawFrame> {
    trace
        .frames()
        .iter()
        .flat_map(|frame| frame.symbols())
        .map(|symbol| RawFrame {
            name: symbol.name().map(|n| format!("{n:#}")),
            file: symbol.filename().map(base_name),
            line: symbol.lineno(),
        })
        .collect()
}

fn is_machinery(frame: &RawFrame) -> bool {
    match &frame.name {
        Some(name) => MACHINERY_PREFIXES.iter().any(|p| name.starts_with(p)),
        None => true,
    }
}

/// Drops the panic machinery above the faulting frame and converts the
/// rest, innermost first.
fn trim_machinery(raw: Vec<RawFrame>) -> Vec<StackFrame> {
    raw.into_iter()
        .skip_while(is_machinery)
        .filter_map(|frame| {
            let name = frame.name?;
            let (class_name, method_name) = split_symbol(&name);
            Some(StackFrame::new(
                class_name,
                method_name,
                frame.file.unwrap_or_else(|| UNKNOWN.to_string()),
                frame.line.unwrap_or(0),
            ))
        })
        .take(MAX_FRAMES)
        .collect()
}

/// Splits `a::b::func` into (`a::b`, `func`).
fn split_symbol(name: &str) -> (String, String) {
    match name.rsplit_once("::") {
        Some((owner, method)) if !owner.is_empty() => (owner.to_string(), method.to_string()),
        _ => ("<root>".to_string(), name.to_string()),
    }
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: &str, file: &str, line: u32) -> RawFrame {
        RawFrame {
            name: Some(name.to_string()),
            file: Some(file.to_string()),
            line: Some(line),
        }
    }

    #[test]
    fn test_panic_message_variants() {
        let s: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(s.as_ref()), "static message");

        let s: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(s.as_ref()), "owned message");

        let s: Box<dyn Any + Send> = Box::new(42_u32);
        assert_eq!(panic_message(s.as_ref()), "Unknown panic");
    }

    #[test]
    fn test_split_symbol() {
        assert_eq!(
            split_symbol("game::world::Grid::cell"),
            ("game::world::Grid".to_string(), "cell".to_string())
        );
        assert_eq!(
            split_symbol("main"),
            ("<root>".to_string(), "main".to_string())
        );
    }

    #[test]
    fn test_trim_machinery() {
        let frames = vec![
            RawFrame::default(),
            raw("backtrace::backtrace::trace", "mod.rs", 66),
            raw("tracepost_reporter::panic_hook::capture_panic", "panic_hook.rs", 150),
            raw("std::panicking::rust_panic_with_hook", "panicking.rs", 817),
            raw("core::panicking::panic_fmt", "panicking.rs", 72),
            raw("game::world::Grid::cell", "world.rs", 42),
            RawFrame::default(),
            raw("game::main", "main.rs", 7),
            raw("std::panicking::try", "panicking.rs", 552),
        ];

        let trimmed = trim_machinery(frames);
        assert_eq!(trimmed.len(), 3);
        assert_eq!(trimmed[0], StackFrame::new("game::world::Grid", "cell", "world.rs", 42));
        assert_eq!(trimmed[1], StackFrame::new("game", "main", "main.rs", 7));
        assert_eq!(trimmed[2].method_name, "try");
    }

    #[test]
    fn test_trim_machinery_fills_unknown_parts() {
        let frames = vec![RawFrame {
            name: Some("app::run".to_string()),
            file: None,
            line: None,
        }];
        let trimmed = trim_machinery(frames);
        assert_eq!(trimmed[0].to_string(), "at app.run(<unknown>:0)");
    }

    #[test]
    fn test_trim_machinery_caps_frames() {
        let frames = (0..500).map(|i| raw("app::deep", "deep.rs", i)).collect();
        assert_eq!(trim_machinery(frames).len(), MAX_FRAMES);
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name(Path::new("/src/game/world.rs")), "world.rs");
        assert_eq!(base_name(Path::new("lib.rs")), "lib.rs");
    }

    #[test]
    fn test_delivery_worker_does_not_wait() {
        assert!(!waits_for_forward(Some(WORKER_THREAD_NAME)));
        assert!(waits_for_forward(Some("main")));
        assert!(waits_for_forward(None));
    }

    #[test]
    fn test_release_without_waiter() {
        let bridge = PanicHookBridge::new(Duration::from_millis(10));
        let thread = ThreadIdentity::new("ThreadId(99)", None);
        assert!(!bridge.state.release(&thread));

        let rx = bridge.state.register(&thread);
        assert!(bridge.state.release(&thread));
        assert!(rx.recv_timeout(Duration::from_millis(10)).is_ok());
    }
}
