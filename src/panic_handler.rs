use std::io::{self, Write};
use std::panic;

/// Pretty backtraces on stderr, plus a log entry so panics on the render
/// worker thread show up next to the rest of the session.
pub fn initialize_panic_handler() {
    better_panic::install();

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let thread = std::thread::current();
        let name = thread.name().unwrap_or("<unnamed>");
        log::error!("Thread '{name}' panicked: {panic_info}");
        log::logger().flush();

        default_hook(panic_info);
        let _ = io::stderr().flush();
    }));
}
