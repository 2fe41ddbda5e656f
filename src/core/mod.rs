pub mod command;

pub use command::{parse_command, Command};
