//! Loading file and directory contents as conversation context.
//!
//! A loaded [`ContextAttachment`] is held by the chat session and merged into
//! the next outgoing user message. Loading runs on the blocking pool so large
//! directories never stall the event loop.

use std::error::Error as StdError;
use std::fmt;
use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use tracing::debug;

pub const DEFAULT_MAX_CONTEXT_BYTES: usize = 256 * 1024;

const MAX_DIRECTORY_DEPTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextAttachment {
    pub source: PathBuf,
    pub text: String,
    pub files: usize,
}

impl ContextAttachment {
    /// Prefix `message` with the attachment text.
    pub fn merge_into(&self, message: &str) -> String {
        format!("{}\n\n{}", self.text.trim_end(), message)
    }

    pub fn label(&self) -> String {
        let name = self
            .source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string());
        if self.files == 1 {
            name
        } else {
            format!("{name} ({} files)", self.files)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextLoadError {
    NotFound(PathBuf),
    Unreadable { path: PathBuf, reason: String },
    TooLarge { path: PathBuf, limit: usize },
    NotText(PathBuf),
    Empty(PathBuf),
}

impl fmt::Display for ContextLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextLoadError::NotFound(path) => write!(f, "No such file or directory: {}", path.display()),
            ContextLoadError::Unreadable { path, reason } => {
                write!(f, "Could not read {}: {}", path.display(), reason)
            }
            ContextLoadError::TooLarge { path, limit } => write!(
                f,
                "{} exceeds the context limit of {} KiB",
                path.display(),
                limit / 1024
            ),
            ContextLoadError::NotText(path) => {
                write!(f, "{} is not a UTF-8 text file", path.display())
            }
            ContextLoadError::Empty(path) => {
                write!(f, "{} contains no readable text files", path.display())
            }
        }
    }
}

impl StdError for ContextLoadError {}

#[derive(Debug, Clone, Copy)]
pub struct ContextLoader {
    max_bytes: usize,
}

impl Default for ContextLoader {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONTEXT_BYTES)
    }
}

impl ContextLoader {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub async fn load(&self, path: PathBuf) -> Result<ContextAttachment, ContextLoadError> {
        let loader = *self;
        let display_path = path.clone();
        tokio::task::spawn_blocking(move || loader.load_blocking(&path))
            .await
            .unwrap_or_else(|join_err| {
                Err(ContextLoadError::Unreadable {
                    path: display_path,
                    reason: join_err.to_string(),
                })
            })
    }

    pub fn load_blocking(&self, path: &Path) -> Result<ContextAttachment, ContextLoadError> {
        let path = expand_home(path);
        let metadata = fs::metadata(&path).map_err(|err| io_error(&path, err))?;

        if metadata.is_dir() {
            self.load_directory(&path)
        } else {
            if metadata.len() as usize > self.max_bytes {
                return Err(ContextLoadError::TooLarge {
                    path,
                    limit: self.max_bytes,
                });
            }
            let text = match read_text(&path, self.max_bytes)? {
                FileText::Text(text) => text,
                FileText::Binary => return Err(ContextLoadError::NotText(path)),
                FileText::Oversized => {
                    return Err(ContextLoadError::TooLarge {
                        path,
                        limit: self.max_bytes,
                    })
                }
            };
            Ok(ContextAttachment {
                text: frame(&display_name(&path), &text),
                source: path,
                files: 1,
            })
        }
    }

    fn load_directory(&self, root: &Path) -> Result<ContextAttachment, ContextLoadError> {
        let mut files = Vec::new();
        collect_files(root, 0, &mut files)?;

        let mut text = String::new();
        let mut included = 0;
        for file in files {
            let remaining = self.max_bytes.saturating_sub(text.len());
            let content = match read_text(&file, remaining)? {
                FileText::Text(content) => content,
                FileText::Binary => {
                    debug!(path = %file.display(), "Skipping binary file in context directory");
                    continue;
                }
                FileText::Oversized => {
                    return Err(ContextLoadError::TooLarge {
                        path: root.to_path_buf(),
                        limit: self.max_bytes,
                    })
                }
            };
            let relative = file.strip_prefix(root).unwrap_or(&file);
            let block = frame(&relative.display().to_string(), &content);
            if text.len() + block.len() > self.max_bytes {
                return Err(ContextLoadError::TooLarge {
                    path: root.to_path_buf(),
                    limit: self.max_bytes,
                });
            }
            text.push_str(&block);
            included += 1;
        }

        if included == 0 {
            return Err(ContextLoadError::Empty(root.to_path_buf()));
        }

        Ok(ContextAttachment {
            source: root.to_path_buf(),
            text,
            files: included,
        })
    }
}

fn collect_files(dir: &Path, depth: usize, out: &mut Vec<PathBuf>) -> Result<(), ContextLoadError> {
    if depth > MAX_DIRECTORY_DEPTH {
        return Ok(());
    }

    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|err| io_error(dir, err))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| !is_hidden(path))
        .collect();
    entries.sort();

    for entry in entries {
        if entry.is_dir() {
            collect_files(&entry, depth + 1, out)?;
        } else if entry.is_file() {
            out.push(entry);
        }
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum FileText {
    Text(String),
    Binary,
    Oversized,
}

/// Read at most `limit + 1` bytes, so an oversized file is never loaded whole.
fn read_text(path: &Path, limit: usize) -> Result<FileText, ContextLoadError> {
    let file = File::open(path).map_err(|err| io_error(path, err))?;
    let mut bytes = Vec::new();
    file.take(limit as u64 + 1)
        .read_to_end(&mut bytes)
        .map_err(|err| io_error(path, err))?;

    if memchr::memchr(0, &bytes).is_some() {
        return Ok(FileText::Binary);
    }
    if bytes.len() > limit {
        return Ok(FileText::Oversized);
    }
    Ok(String::from_utf8(bytes).map_or(FileText::Binary, FileText::Text))
}

fn frame(name: &str, content: &str) -> String {
    let mut block = format!("--- {name} ---\n{content}");
    if !block.ends_with('\n') {
        block.push('\n');
    }
    block
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

fn io_error(path: &Path, err: std::io::Error) -> ContextLoadError {
    if err.kind() == ErrorKind::NotFound {
        ContextLoadError::NotFound(path.to_path_buf())
    } else {
        ContextLoadError::Unreadable {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(rest),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn loads_single_file_with_header() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("notes.md");
        fs::write(&file, "remember the milk").expect("write");

        let attachment = ContextLoader::default().load_blocking(&file).expect("load");
        assert_eq!(attachment.files, 1);
        assert_eq!(attachment.text, "--- notes.md ---\nremember the milk\n");
        assert_eq!(attachment.label(), "notes.md");
    }

    #[test]
    fn directory_walk_is_sorted_and_skips_hidden_and_binary() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("b.txt"), "second").expect("write");
        fs::write(dir.path().join("a.txt"), "first").expect("write");
        fs::write(dir.path().join(".secret"), "hidden").expect("write");
        fs::write(dir.path().join("blob.bin"), [0u8, 159, 146, 150]).expect("write");
        fs::create_dir(dir.path().join("src")).expect("mkdir");
        fs::write(dir.path().join("src").join("main.rs"), "fn main() {}").expect("write");

        let attachment = ContextLoader::default()
            .load_blocking(dir.path())
            .expect("load");

        assert_eq!(attachment.files, 3);
        let a = attachment.text.find("--- a.txt ---").expect("a");
        let b = attachment.text.find("--- b.txt ---").expect("b");
        assert!(a < b);
        assert!(attachment.text.contains("fn main() {}"));
        assert!(!attachment.text.contains("hidden"));
        assert!(!attachment.text.contains("blob.bin"));
    }

    #[test]
    fn missing_path_is_not_found() {
        let dir = tempdir().expect("tempdir");
        let missing = dir.path().join("nope.txt");
        let err = ContextLoader::default()
            .load_blocking(&missing)
            .expect_err("missing");
        assert_eq!(err, ContextLoadError::NotFound(missing));
    }

    #[test]
    fn oversized_inputs_are_rejected() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("big.txt");
        fs::write(&file, "x".repeat(64)).expect("write");

        let err = ContextLoader::new(32).load_blocking(&file).expect_err("too large");
        assert!(matches!(err, ContextLoadError::TooLarge { limit: 32, .. }));

        let err = ContextLoader::new(32)
            .load_blocking(dir.path())
            .expect_err("too large");
        assert!(matches!(err, ContextLoadError::TooLarge { .. }));
    }

    #[test]
    fn directory_files_are_read_against_remaining_budget() {
        let dir = tempdir().expect("tempdir");
        let big = dir.path().join("big.log");
        fs::write(&big, "y".repeat(1024 * 1024)).expect("write");
        assert_eq!(read_text(&big, 16).expect("read"), FileText::Oversized);

        fs::write(dir.path().join("a.txt"), "small").expect("write");
        let err = ContextLoader::new(64)
            .load_blocking(dir.path())
            .expect_err("too large");
        assert!(matches!(err, ContextLoadError::TooLarge { limit: 64, .. }));
    }

    #[test]
    fn large_binary_files_in_directories_are_still_skipped() {
        let dir = tempdir().expect("tempdir");
        let mut blob = vec![0u8; 4];
        blob.extend(std::iter::repeat(b'z').take(1024 * 1024));
        fs::write(dir.path().join("blob.bin"), blob).expect("write");
        fs::write(dir.path().join("notes.txt"), "keep").expect("write");

        let attachment = ContextLoader::new(64)
            .load_blocking(dir.path())
            .expect("load");
        assert_eq!(attachment.files, 1);
        assert_eq!(attachment.text, "--- notes.txt ---\nkeep\n");
    }

    #[test]
    fn empty_directory_and_binary_file_fail() {
        let dir = tempdir().expect("tempdir");
        let err = ContextLoader::default()
            .load_blocking(dir.path())
            .expect_err("empty");
        assert!(matches!(err, ContextLoadError::Empty(_)));

        let file = dir.path().join("image.png");
        fs::write(&file, [0x89u8, 0x50, 0x4e, 0x47, 0x00]).expect("write");
        let err = ContextLoader::default().load_blocking(&file).expect_err("binary");
        assert_eq!(err, ContextLoadError::NotText(file));
    }

    #[test]
    fn merge_places_context_before_message() {
        let attachment = ContextAttachment {
            source: PathBuf::from("notes.md"),
            text: "--- notes.md ---\nctx\n".into(),
            files: 1,
        };
        assert_eq!(
            attachment.merge_into("question"),
            "--- notes.md ---\nctx\n\nquestion"
        );
    }

    #[tokio::test]
    async fn async_load_runs_on_blocking_pool() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("a.txt");
        fs::write(&file, "hello").expect("write");
        let attachment = ContextLoader::default().load(file).await.expect("load");
        assert!(attachment.text.ends_with("hello\n"));
    }
}
