use std::panic;

/// Install better-panic on top of the default hook so the process still
/// exits with a failure code after printing the backtrace
pub fn initialize_panic_handler() {
    better_panic::install();

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        std::process::exit(1);
    }));
}
