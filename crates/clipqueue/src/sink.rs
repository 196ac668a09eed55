use std::fs;
use std::io;
use std::path::Path;

/// Where downloaded audio lands. The store calls this exactly once per job,
/// when the transfer finishes; a host can hook asset re-import here.
pub trait ArtifactSink: Send + Sync + 'static {
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
}

/// Plain filesystem sink, creating parent directories as needed.
pub struct FsSink;

impl ArtifactSink for FsSink {
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)
    }
}
