use std::path::PathBuf;

/// Conditions that must surface as a process exit code rather than being
/// absorbed as a logged, zero-valued bus access.
#[derive(Debug, thiserror::Error)]
pub enum EmulatorError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image of {size} bytes does not fit in a {region_size}-byte region at offset {offset:#x}")]
    ImageTooLarge {
        size: usize,
        region_size: usize,
        offset: u32,
    },

    #[error("failed to bind GDB listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, EmulatorError>;
