//! Archive backends
//!
//! A [`Compressor`] turns one save directory into one archive file inside a
//! destination directory. Two backends exist: [`ExternalArchiver`] drives a
//! RAR-compatible command line tool, [`ZipArchiver`] writes the zip itself.

use super::command::CommandError;
use super::executor::CommandExecutor;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Archive produced for one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveArtifact {
    pub name: String,
    pub file_path: PathBuf,
    pub destination_directory: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum CompressError {
    #[error("Archiver executable not found: {program}")]
    ArchiverNotFound { program: String },

    #[error("Archiver exited with code {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("Failed to start archiver: {0}")]
    Spawn(#[source] io::Error),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl From<CommandError> for CompressError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::NotFound { program } => CompressError::ArchiverNotFound { program },
            CommandError::Spawn { source, .. } => CompressError::Spawn(source),
            CommandError::Failed { code, stderr, .. } => CompressError::Failed { code, stderr },
        }
    }
}

/// Compression capability used by the backup manager
pub trait Compressor {
    /// Archive the contents of `source_path` as `<destination_directory>/<name>.<ext>`
    fn compress(
        &self,
        source_path: &Path,
        name: &str,
        destination_directory: &Path,
    ) -> Result<ArchiveArtifact, CompressError>;

    /// Extension of produced archives, without the dot
    fn extension(&self) -> &str;
}

/// Path of the archive a compressor writes for `name`
pub fn archive_path(destination_directory: &Path, name: &str, extension: &str) -> PathBuf {
    destination_directory.join(format!("{}.{}", name, extension))
}

fn ensure_destination(destination_directory: &Path) -> Result<(), CompressError> {
    fs::create_dir_all(destination_directory).map_err(|source| CompressError::Io {
        path: destination_directory.to_path_buf(),
        source,
    })
}

/// Locate the archiver: an existing path is used as-is, otherwise PATH is searched
///
/// Unresolvable names are returned unchanged so the spawn reports them as missing.
pub fn resolve_program(program: &str) -> PathBuf {
    let path = PathBuf::from(program);
    if path.exists() {
        return path;
    }

    match which::which(program) {
        Ok(found) => {
            debug!("Resolved archiver {} to {:?}", program, found);
            found
        }
        Err(_) => path,
    }
}

/// RAR-compatible command line archiver (WinRAR, rar)
pub struct ExternalArchiver<E: CommandExecutor> {
    program: PathBuf,
    extension: String,
    executor: E,
}

impl<E: CommandExecutor> ExternalArchiver<E> {
    pub fn new(program: PathBuf, extension: impl Into<String>, executor: E) -> Self {
        Self {
            program,
            extension: extension.into(),
            executor,
        }
    }

    /// Arguments for one archive: add, solid, strip base path, recursive,
    /// background, quiet, output path, then everything in the working directory
    fn build_args(output: &str) -> Vec<&str> {
        vec!["a", "-s", "-ep1", "-r", "-iback", "-idq", output, "*"]
    }
}

impl<E: CommandExecutor> Compressor for ExternalArchiver<E> {
    fn compress(
        &self,
        source_path: &Path,
        name: &str,
        destination_directory: &Path,
    ) -> Result<ArchiveArtifact, CompressError> {
        ensure_destination(destination_directory)?;

        let file_path = archive_path(destination_directory, name, &self.extension);
        let output = file_path.display().to_string();

        // Working directory must be the save itself so entries are rooted at its contents
        self.executor
            .run_command(&self.program, &Self::build_args(&output), Some(source_path))?;

        info!("Compressed '{}' to {:?}", name, file_path);

        Ok(ArchiveArtifact {
            name: name.to_string(),
            file_path,
            destination_directory: destination_directory.to_path_buf(),
        })
    }

    fn extension(&self) -> &str {
        &self.extension
    }
}

/// Built-in deflate zip writer
#[derive(Debug, Clone)]
pub struct ZipArchiver {
    extension: String,
}

impl ZipArchiver {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }
}

impl Default for ZipArchiver {
    fn default() -> Self {
        Self::new("zip")
    }
}

impl Compressor for ZipArchiver {
    fn compress(
        &self,
        source_path: &Path,
        name: &str,
        destination_directory: &Path,
    ) -> Result<ArchiveArtifact, CompressError> {
        if !source_path.is_dir() {
            return Err(CompressError::Io {
                path: source_path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "source is not a directory"),
            });
        }

        ensure_destination(destination_directory)?;

        let file_path = archive_path(destination_directory, name, &self.extension);
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| CompressError::Io { path, source }
        };

        let dest_file = File::create(&file_path).map_err(io_err(&file_path))?;
        let mut zip = ZipWriter::new(BufWriter::new(dest_file));

        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .compression_level(Some(6));

        let mut files = 0usize;
        for entry in WalkDir::new(source_path).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| CompressError::Io {
                path: e.path().map(Path::to_path_buf).unwrap_or_else(|| source_path.to_path_buf()),
                source: e.into(),
            })?;

            let relative = entry
                .path()
                .strip_prefix(source_path)
                .unwrap_or(entry.path());
            let entry_name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            if entry.file_type().is_dir() {
                zip.add_directory(entry_name, options)?;
            } else if entry.file_type().is_file() {
                zip.start_file(entry_name, options)?;
                let mut source = File::open(entry.path()).map_err(io_err(entry.path()))?;
                io::copy(&mut source, &mut zip).map_err(io_err(entry.path()))?;
                files += 1;
            }
        }

        zip.finish()?;
        info!("Compressed '{}' ({} files) to {:?}", name, files, file_path);

        Ok(ArchiveArtifact {
            name: name.to_string(),
            file_path,
            destination_directory: destination_directory.to_path_buf(),
        })
    }

    fn extension(&self) -> &str {
        &self.extension
    }
}

/// Mock compressor for testing
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    /// Mock compressor that writes placeholder archives
    #[derive(Clone)]
    pub struct MockCompressor {
        extension: String,
        /// Names passed to `compress`, in call order
        pub calls: Arc<Mutex<Vec<String>>>,
        failing: Arc<Mutex<HashSet<String>>>,
        missing_output: Arc<Mutex<HashSet<String>>>,
        leave_partial: Arc<Mutex<bool>>,
    }

    impl Default for MockCompressor {
        fn default() -> Self {
            Self {
                extension: "zip".to_string(),
                calls: Arc::default(),
                failing: Arc::default(),
                missing_output: Arc::default(),
                leave_partial: Arc::default(),
            }
        }
    }

    impl MockCompressor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure compression of `name` to fail with a nonzero exit
        pub fn with_failing_target(self, name: &str) -> Self {
            self.failing.lock().unwrap().insert(name.to_string());
            self
        }

        /// Configure `name` to report success without writing a file
        pub fn with_missing_output(self, name: &str) -> Self {
            self.missing_output.lock().unwrap().insert(name.to_string());
            self
        }

        /// Failed compressions leave a truncated archive behind
        pub fn with_partial_output(self) -> Self {
            *self.leave_partial.lock().unwrap() = true;
            self
        }

        /// Get all compressed target names
        pub fn get_calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl Compressor for MockCompressor {
        fn compress(
            &self,
            _source_path: &Path,
            name: &str,
            destination_directory: &Path,
        ) -> Result<ArchiveArtifact, CompressError> {
            self.calls.lock().unwrap().push(name.to_string());
            ensure_destination(destination_directory)?;

            let file_path = archive_path(destination_directory, name, &self.extension);

            if self.failing.lock().unwrap().contains(name) {
                if *self.leave_partial.lock().unwrap() {
                    let _ = fs::write(&file_path, b"partial");
                }
                return Err(CompressError::Failed {
                    code: Some(1),
                    stderr: format!("mock failure for {}", name),
                });
            }

            if !self.missing_output.lock().unwrap().contains(name) {
                fs::write(&file_path, format!("archive of {}", name)).map_err(|source| {
                    CompressError::Io {
                        path: file_path.clone(),
                        source,
                    }
                })?;
            }

            Ok(ArchiveArtifact {
                name: name.to_string(),
                file_path,
                destination_directory: destination_directory.to_path_buf(),
            })
        }

        fn extension(&self) -> &str {
            &self.extension
        }
    }
}
