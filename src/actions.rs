use log::info;
use std::{
    io,
    os::unix::process::CommandExt,
    process::{Command, Stdio},
};

/// Starts the command bound to a recognized gesture.
pub trait Launcher {
    fn launch(&mut self, command: &str) -> io::Result<()>;
}

/// Runs commands through `sh -c`, detached from this process: own process
/// group, no stdio. The child is never waited on.
pub struct ShellLauncher;

impl Launcher for ShellLauncher {
    fn launch(&mut self, command: &str) -> io::Result<()> {
        if command.trim().is_empty() {
            return Ok(());
        }
        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn()?;
        info!("executed: {command} (pid={})", child.id());
        Ok(())
    }
}

/// Prints instead of executing (`--dry-run`).
pub struct PrintLauncher;

impl Launcher for PrintLauncher {
    fn launch(&mut self, command: &str) -> io::Result<()> {
        println!("would run: {command}");
        Ok(())
    }
}
