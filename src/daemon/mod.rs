// Daemon lifecycle support

pub mod pid;

pub use pid::PidFile;
