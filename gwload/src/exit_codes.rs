#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Summary written, regardless of how many requests failed.
    Success = 0,

    /// Invalid CLI/config input (missing gateway URL, bad flags, bad prompt file, etc.).
    /// Reported before any request is sent.
    InvalidInput = 1,

    /// Internal/runtime error (log directory IO, task join failures).
    RuntimeError = 2,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
