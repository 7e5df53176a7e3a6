//! Crash record domain types
//!
//! A crash is captured as the faulting thread plus a [`CapturedError`]
//! (type name, message, frames). The [`CrashRecord`] adds the textual
//! rendering that is persisted to the storage slot and delivered to the
//! collection endpoint.
//!
//! ## Rendered format
//!
//! ```text
//! <TypeName> <Message>
//! at <Class>.<Method>(<File>:<Line>)
//! at <Class>.<Method>(<File>:<Line>)
//! ```
//!
//! One `at` line per frame, innermost frame first, each line terminated by
//! `\n`. Rendering is a pure function of the error, so rendering the same
//! error twice yields the same text.

use std::fmt::{self, Display, Formatter, Write};

use serde::{Deserialize, Serialize};

// ============================================================================
// StackFrame
// ============================================================================

/// One frame of a captured stack trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Owning type or module path of the function
    pub class_name: String,
    /// Function name
    pub method_name: String,
    /// Source file name (without directories)
    pub file_name: String,
    /// Line in the source file
    pub line_number: u32,
}

impl StackFrame {
    pub fn new(
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        file_name: impl Into<String>,
        line_number: u32,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
            file_name: file_name.into(),
            line_number,
        }
    }
}

impl Display for StackFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "at {}.{}({}:{})",
            self.class_name, self.method_name, self.file_name, self.line_number
        )
    }
}

// ============================================================================
// CapturedError
// ============================================================================

/// The fault object handed to a fault handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedError {
    /// Name of the error type, e.g. `Panic`
    pub type_name: String,
    /// Error message
    pub message: String,
    /// Stack frames, innermost first
    pub frames: Vec<StackFrame>,
}

impl CapturedError {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            frames: Vec::new(),
        }
    }

    /// Replace the frame list (innermost first).
    #[must_use]
    pub fn with_frames(mut self, frames: Vec<StackFrame>) -> Self {
        self.frames = frames;
        self
    }

    /// Render the error as crash text.
    pub fn render(&self) -> String {
        let mut text = String::with_capacity(64 + self.frames.len() * 64);
        // Writing into a String cannot fail.
        let _ = writeln!(text, "{} {}", self.type_name, self.message);
        for frame in &self.frames {
            let _ = writeln!(text, "{frame}");
        }
        text
    }
}

// ============================================================================
// ThreadIdentity
// ============================================================================

/// Identity of the thread a fault occurred on
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadIdentity {
    /// Opaque, process-unique thread id
    pub id: String,
    /// Thread name, if the thread was named
    pub name: Option<String>,
}

impl ThreadIdentity {
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
        }
    }

    /// Identity of the calling thread
    pub fn current() -> Self {
        let thread = std::thread::current();
        Self {
            id: format!("{:?}", thread.id()),
            name: thread.name().map(String::from),
        }
    }
}

impl Display for ThreadIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", name, self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

// ============================================================================
// CrashRecord
// ============================================================================

/// A captured crash: the faulting thread, the error and its rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashRecord {
    rendered_text: String,
    thread: ThreadIdentity,
    error: CapturedError,
}

impl CrashRecord {
    /// Capture a crash, rendering the error to text.
    pub fn capture(thread: ThreadIdentity, error: CapturedError) -> Self {
        Self {
            rendered_text: error.render(),
            thread,
            error,
        }
    }

    pub fn rendered_text(&self) -> &str {
        &self.rendered_text
    }

    pub fn thread(&self) -> &ThreadIdentity {
        &self.thread
    }

    pub fn error(&self) -> &CapturedError {
        &self.error
    }

    /// Split into the parts needed to forward the crash.
    pub fn into_parts(self) -> (String, ThreadIdentity, CapturedError) {
        (self.rendered_text, self.thread, self.error)
    }
}
