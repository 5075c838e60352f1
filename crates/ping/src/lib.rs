mod app;

pub use app::{run_console, start_ping, ConsoleWorld};
