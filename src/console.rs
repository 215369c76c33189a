//! Console output: the `log_info!`/`log_warn!`/`log_error!` macro family
//! and the lifecycle-statistics printer, generalized from a hardwired
//! UART into a pluggable sink — this crate has no concrete UART of its
//! own, so output goes through whatever `ConsoleSink` the platform
//! integration installs.

use core::fmt::Write;
use spin::Mutex;

/// Anything that can receive kernel console output.
pub trait ConsoleSink: Send + Sync {
    fn write_str(&self, s: &str);
}

struct NullSink;
impl ConsoleSink for NullSink {
    fn write_str(&self, _s: &str) {}
}

static SINK: Mutex<&'static dyn ConsoleSink> = Mutex::new(&NullSink);

/// Installs the console sink traps and statistics are printed through.
/// Call once during platform bring-up, analogous to `atomic_os::serial::init`.
pub fn set_sink(sink: &'static dyn ConsoleSink) {
    *SINK.lock() = sink;
}

#[doc(hidden)]
pub fn _print(args: core::fmt::Arguments) {
    struct Adapter<'a>(&'a dyn ConsoleSink);
    impl Write for Adapter<'_> {
        fn write_str(&mut self, s: &str) -> core::fmt::Result {
            self.0.write_str(s);
            Ok(())
        }
    }
    let sink = *SINK.lock();
    let _ = Adapter(sink).write_fmt(args);
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::console::_print(format_args!("[INFO] "));
        $crate::console::_print(format_args!($($arg)*));
        $crate::console::_print(format_args!("\n"));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::console::_print(format_args!("[WARN] "));
        $crate::console::_print(format_args!($($arg)*));
        $crate::console::_print(format_args!("\n"));
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::console::_print(format_args!("[ERROR] "));
        $crate::console::_print(format_args!($($arg)*));
        $crate::console::_print(format_args!("\n"));
    };
}

#[macro_export]
macro_rules! kprintln {
    () => { $crate::console::_print(format_args!("\n")) };
    ($($arg:tt)*) => {
        $crate::console::_print(format_args!($($arg)*));
        $crate::console::_print(format_args!("\n"));
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    struct CapturingSink(StdMutex<String>);
    impl ConsoleSink for CapturingSink {
        fn write_str(&self, s: &str) {
            self.0.lock().unwrap().push_str(s);
        }
    }

    #[test]
    fn log_info_prefixes_and_newlines() {
        static SINK: CapturingSink = CapturingSink(StdMutex::new(String::new()));
        set_sink(&SINK);
        log_info!("hello {}", 42);
        assert_eq!(SINK.0.lock().unwrap().as_str(), "[INFO] hello 42\n");
    }
}
