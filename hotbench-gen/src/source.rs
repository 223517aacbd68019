use std::path::Path;

/// A benchmark class: a named unit of Rust source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkClass {
    name: String,
    source: String,
}

impl BenchmarkClass {
    /// Class from in-memory source text
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Class read from a source file, named after the file stem
    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("{} has no file name", path.display()),
                )
            })?;
        let source = std::fs::read_to_string(path)?;
        Ok(Self { name, source })
    }

    /// Class name; becomes the module name and the benchmark id prefix
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source text
    pub fn source(&self) -> &str {
        &self.source
    }
}
