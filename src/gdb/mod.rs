//! GDB remote serial protocol stub: packet framing plus a TCP server that
//! lets a debugger attach to a running [`crate::emulator::Emulator`].

pub mod packet;
pub mod server;

pub use server::GdbServer;
