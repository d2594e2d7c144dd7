//! Confined file access tools: `file_read`, `file_write` and `list_files`.
//!
//! Every path is interpreted relative to a root directory (by default the working directory
//! at registration time).  Paths containing a `..` segment or an absolute prefix are rejected
//! before any filesystem call is made.
//!
//! ```rust,no_run
//! use agentlab::tools::filesystem::FileTools;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let tools = FileTools::new(std::env::temp_dir());
//! tools
//!     .file_write(json!({"file_path": "notes/todo.txt", "content": "one\ntwo\n"}))
//!     .await?;
//! let read = tools.file_read(json!({"file_path": "notes/todo.txt"})).await?;
//! assert_eq!(read["lines"], 2);
//! # Ok(())
//! # }
//! ```

use crate::agentlab::tool_protocol::{
    parse_params, ToolError, ToolMetadata, ToolParameter, ToolParameterType, TIMESTAMP_FORMAT,
};
use chrono::{DateTime, Local};
use glob::{MatchOptions, Pattern};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::error::Error;
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

pub const FILE_READ: &str = "file_read";
pub const FILE_WRITE: &str = "file_write";
pub const LIST_FILES: &str = "list_files";

/// Error types for confined file operations
#[derive(Debug, Clone, PartialEq)]
pub enum FileSystemError {
    /// Path escapes the root directory
    PathTraversal(String),
    /// Path does not exist
    NotFound(String),
    /// Only UTF-8 text is supported
    UnsupportedEncoding(String),
    /// Glob pattern could not be compiled
    InvalidPattern(String),
    /// Path cannot be expressed as a glob
    InvalidPath(String),
    /// IO error with context
    IOError(String),
}

impl fmt::Display for FileSystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSystemError::PathTraversal(path) => {
                write!(f, "Access to path '{}' is not allowed", path)
            }
            FileSystemError::NotFound(path) => write!(f, "File not found: {}", path),
            FileSystemError::UnsupportedEncoding(enc) => {
                write!(f, "Unsupported encoding: {}", enc)
            }
            FileSystemError::InvalidPattern(msg) => write!(f, "Invalid pattern: {}", msg),
            FileSystemError::InvalidPath(msg) => write!(f, "Invalid path: {}", msg),
            FileSystemError::IOError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl Error for FileSystemError {}

impl From<FileSystemError> for ToolError {
    fn from(err: FileSystemError) -> Self {
        match err {
            FileSystemError::UnsupportedEncoding(_) => {
                ToolError::InvalidParameters(err.to_string())
            }
            other => ToolError::ExecutionFailed(other.to_string()),
        }
    }
}

fn io_error(path: &str, err: io::Error) -> FileSystemError {
    if err.kind() == io::ErrorKind::NotFound {
        FileSystemError::NotFound(path.to_string())
    } else {
        FileSystemError::IOError(format!("{}: {}", path, err))
    }
}

fn check_encoding(encoding: &str) -> Result<(), FileSystemError> {
    match encoding.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => Ok(()),
        _ => Err(FileSystemError::UnsupportedEncoding(encoding.to_string())),
    }
}

/// Reject `..` segments and absolute or prefixed paths.
pub fn confine(path: &str) -> Result<PathBuf, FileSystemError> {
    let mut relative = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(FileSystemError::PathTraversal(path.to_string()));
            }
        }
    }
    Ok(relative)
}

fn modified_timestamp(metadata: &std::fs::Metadata) -> Option<String> {
    metadata
        .modified()
        .ok()
        .map(|t| DateTime::<Local>::from(t).format(TIMESTAMP_FORMAT).to_string())
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

fn default_directory() -> String {
    ".".to_string()
}

fn default_pattern() -> String {
    "*".to_string()
}

#[derive(Deserialize)]
struct ReadParams {
    file_path: String,
    #[serde(default = "default_encoding")]
    encoding: String,
}

#[derive(Deserialize)]
struct WriteParams {
    file_path: String,
    content: String,
    #[serde(default = "default_encoding")]
    encoding: String,
}

#[derive(Deserialize)]
struct ListParams {
    #[serde(default = "default_directory")]
    directory: String,
    #[serde(default = "default_pattern")]
    pattern: String,
}

/// File tools bound to one root directory.
#[derive(Debug, Clone)]
pub struct FileTools {
    root: PathBuf,
}

impl FileTools {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileTools { root: root.into() }
    }

    /// Root at the process working directory.
    pub fn current_dir() -> io::Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Tool body: `{file_path, encoding?}` → `{file_path, content, size, lines}`.
    pub async fn file_read(&self, parameters: JsonValue) -> Result<JsonValue, ToolError> {
        let params: ReadParams = parse_params(parameters)?;
        check_encoding(&params.encoding)?;
        let path = self.root.join(confine(&params.file_path)?);

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| io_error(&params.file_path, e))?;

        Ok(json!({
            "file_path": params.file_path,
            "size": content.chars().count(),
            "lines": content.lines().count(),
            "content": content,
        }))
    }

    /// Tool body: `{file_path, content, encoding?}` → `{file_path, bytes_written, lines_written}`.
    ///
    /// Missing parent directories are created.
    pub async fn file_write(&self, parameters: JsonValue) -> Result<JsonValue, ToolError> {
        let params: WriteParams = parse_params(parameters)?;
        check_encoding(&params.encoding)?;
        let relative = confine(&params.file_path)?;
        if relative.as_os_str().is_empty() {
            return Err(FileSystemError::InvalidPath(params.file_path).into());
        }
        let path = self.root.join(relative);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(&params.file_path, e))?;
        }
        tokio::fs::write(&path, params.content.as_bytes())
            .await
            .map_err(|e| io_error(&params.file_path, e))?;

        log::debug!(
            "file_write: {} bytes to {}",
            params.content.len(),
            path.display()
        );
        Ok(json!({
            "file_path": params.file_path,
            "bytes_written": params.content.len(),
            "lines_written": params.content.lines().count(),
        }))
    }

    /// Tool body: `{directory?, pattern?}` → `{directory, pattern, files, count}`.
    ///
    /// Entries that vanish or cannot be stat'ed while listing are skipped.
    pub fn list_files(&self, parameters: JsonValue) -> Result<JsonValue, ToolError> {
        let params: ListParams = parse_params(parameters)?;
        let directory = confine(&params.directory)?;
        confine(&params.pattern)?;

        let search_dir = self.root.join(&directory);
        let search_dir_text = search_dir.to_str().ok_or_else(|| {
            FileSystemError::InvalidPath(format!("{} is not valid UTF-8", search_dir.display()))
        })?;
        let full_pattern = format!(
            "{}/{}",
            Pattern::escape(search_dir_text.trim_end_matches('/')),
            params.pattern
        );

        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: true,
        };
        let matches = glob::glob_with(&full_pattern, options)
            .map_err(|e| FileSystemError::InvalidPattern(e.to_string()))?;

        let mut files = Vec::new();
        for entry in matches.flatten() {
            let metadata = match std::fs::metadata(&entry) {
                Ok(m) => m,
                Err(err) => {
                    log::debug!("list_files: skipping {}: {}", entry.display(), err);
                    continue;
                }
            };
            let name = entry
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let relative = entry.strip_prefix(&search_dir).unwrap_or(&entry);
            let display_path = Path::new(&params.directory).join(relative);

            files.push(json!({
                "name": name,
                "path": display_path.to_string_lossy(),
                "size": metadata.len(),
                "modified": modified_timestamp(&metadata),
                "is_directory": metadata.is_dir(),
            }));
        }
        files.sort_by(|a, b| {
            a["path"]
                .as_str()
                .unwrap_or_default()
                .cmp(b["path"].as_str().unwrap_or_default())
        });

        Ok(json!({
            "directory": params.directory,
            "pattern": params.pattern,
            "count": files.len(),
            "files": files,
        }))
    }
}

pub fn file_read_metadata() -> ToolMetadata {
    ToolMetadata::new(FILE_READ, "Read the contents of a text file")
        .with_parameter(
            ToolParameter::new("file_path", ToolParameterType::String)
                .with_description("Path of the file to read, relative to the working directory")
                .required(),
        )
        .with_parameter(
            ToolParameter::new("encoding", ToolParameterType::String)
                .with_description("File encoding, utf-8 by default")
                .with_default(json!("utf-8")),
        )
}

pub fn file_write_metadata() -> ToolMetadata {
    ToolMetadata::new(FILE_WRITE, "Write text content to a file")
        .with_parameter(
            ToolParameter::new("file_path", ToolParameterType::String)
                .with_description("Path of the file to write, relative to the working directory")
                .required(),
        )
        .with_parameter(
            ToolParameter::new("content", ToolParameterType::String)
                .with_description("Content to write")
                .required(),
        )
        .with_parameter(
            ToolParameter::new("encoding", ToolParameterType::String)
                .with_description("File encoding, utf-8 by default")
                .with_default(json!("utf-8")),
        )
}

pub fn list_files_metadata() -> ToolMetadata {
    ToolMetadata::new(LIST_FILES, "List files in a directory")
        .with_parameter(
            ToolParameter::new("directory", ToolParameterType::String)
                .with_description("Directory to list, the working directory by default")
                .with_default(json!(".")),
        )
        .with_parameter(
            ToolParameter::new("pattern", ToolParameterType::String)
                .with_description("File name pattern, supports wildcards")
                .with_default(json!("*")),
        )
}
