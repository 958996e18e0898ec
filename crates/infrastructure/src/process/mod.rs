pub mod launcher;
pub mod memory;
pub mod probe;

pub use launcher::{worker_args, CommandProcessLauncher};
pub use memory::ProcessMemoryProbe;
pub use probe::PlatformProcessProbe;
#[cfg(unix)]
pub use probe::UnixProcessProbe;
#[cfg(windows)]
pub use probe::WindowsProcessProbe;
