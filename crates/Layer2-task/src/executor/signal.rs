//! Process signals understood by the runner

use procq_foundation::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Signals a caller may request when stopping a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Term,
    Kill,
    Int,
    Hup,
    Quit,
    Usr1,
    Usr2,
}

impl Signal {
    pub const ALL: [Signal; 7] = [
        Signal::Term,
        Signal::Kill,
        Signal::Int,
        Signal::Hup,
        Signal::Quit,
        Signal::Usr1,
        Signal::Usr2,
    ];

    /// Conventional `SIG*` name
    pub fn name(&self) -> &'static str {
        match self {
            Signal::Term => "SIGTERM",
            Signal::Kill => "SIGKILL",
            Signal::Int => "SIGINT",
            Signal::Hup => "SIGHUP",
            Signal::Quit => "SIGQUIT",
            Signal::Usr1 => "SIGUSR1",
            Signal::Usr2 => "SIGUSR2",
        }
    }

    #[cfg(unix)]
    pub fn as_raw(&self) -> libc::c_int {
        match self {
            Signal::Term => libc::SIGTERM,
            Signal::Kill => libc::SIGKILL,
            Signal::Int => libc::SIGINT,
            Signal::Hup => libc::SIGHUP,
            Signal::Quit => libc::SIGQUIT,
            Signal::Usr1 => libc::SIGUSR1,
            Signal::Usr2 => libc::SIGUSR2,
        }
    }

    #[cfg(unix)]
    pub fn from_raw(raw: libc::c_int) -> Option<Signal> {
        Signal::ALL.iter().copied().find(|s| s.as_raw() == raw)
    }
}

/// Name for a raw signal number reported by the OS
#[cfg(unix)]
pub fn raw_signal_name(raw: i32) -> String {
    match Signal::from_raw(raw) {
        Some(signal) => signal.name().to_string(),
        None => format!("SIG{}", raw),
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Signal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        let name = upper.strip_prefix("SIG").unwrap_or(&upper);
        Signal::ALL
            .iter()
            .copied()
            .find(|signal| &signal.name()[3..] == name)
            .ok_or_else(|| Error::validation(format!("Unsupported signal '{}'", s)))
    }
}
