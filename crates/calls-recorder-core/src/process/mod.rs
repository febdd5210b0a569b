mod display;
pub(crate) mod runner;
mod terminator;

pub(crate) use runner::shutdown_process;

#[cfg(test)]
pub(crate) use {display::display_server_args, runner::split_args};

pub use {
    display::DisplayServer,
    runner::{CommandRunner, ProcessHandle, SystemRunner},
    terminator::{SignalTerminator, Terminator},
};
