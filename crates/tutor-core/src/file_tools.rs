//! Sandboxed File Tools
//!
//! `read_file`, `list_files` and `get_file_info`, all confined to the
//! [`PathGuard`] root. Outputs are plain text; failures come back as
//! [`TutorError::ToolExecution`] so the catalog can hand them to the model.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde_json::json;

use crate::error::{Result, TutorError};
use crate::sandbox::{MAX_FILE_SIZE, PathGuard};
use crate::tool::{ParameterSchema, Tool, ToolCallRequest, ToolCatalog, ToolDefinition};

fn refuse(msg: impl Into<String>) -> TutorError {
    TutorError::ToolExecution(msg.into())
}

/// File inspection operations bound to a sandbox root
#[derive(Clone, Debug)]
pub struct SandboxedFileTool {
    guard: PathGuard,
}

impl SandboxedFileTool {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            guard: PathGuard::new(root)?,
        })
    }

    pub const fn from_guard(guard: PathGuard) -> Self {
        Self { guard }
    }

    pub fn root(&self) -> &Path {
        self.guard.root()
    }

    /// Register the three file tools in a new catalog
    pub fn into_catalog(self) -> ToolCatalog {
        let shared = Arc::new(self);
        let mut catalog = ToolCatalog::new();
        catalog.register(ReadFileTool(shared.clone()));
        catalog.register(ListFilesTool(shared.clone()));
        catalog.register(FileInfoTool(shared));
        catalog
    }

    pub fn read_file(&self, file_path: &str, max_lines: Option<usize>) -> Result<String> {
        let path = self
            .guard
            .resolve(file_path)
            .map_err(|_| refuse("File path is outside the allowed directory"))?;

        if !path.exists() {
            return Err(refuse(format!("File '{file_path}' does not exist")));
        }
        if !path.is_file() {
            return Err(refuse(format!("'{file_path}' is not a file")));
        }

        let size = fs::metadata(&path)?.len();
        if size > MAX_FILE_SIZE {
            return Err(refuse(format!(
                "'{file_path}' is too large to read ({size} bytes)"
            )));
        }

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Err(refuse(format!("Permission denied reading '{file_path}'")));
            }
            Err(e) => return Err(e.into()),
        };

        let text = String::from_utf8(bytes)
            .map_err(|_| refuse(format!("'{file_path}' appears to be a binary file")))?;

        let content = match max_lines.filter(|n| *n > 0) {
            Some(limit) => {
                let lines: Vec<&str> = text.lines().collect();
                if lines.len() > limit {
                    format!(
                        "{}\n... (showing first {limit} lines)",
                        lines[..limit].join("\n")
                    )
                } else {
                    lines.join("\n")
                }
            }
            None => text,
        };

        Ok(format!("Contents of {file_path}:\n```\n{content}\n```"))
    }

    pub fn list_files(&self, directory: &str, pattern: &str, show_hidden: bool) -> Result<String> {
        let dir = self
            .guard
            .resolve(directory)
            .map_err(|_| refuse("Directory path is outside the allowed directory"))?;

        if !dir.exists() {
            return Err(refuse(format!("Directory '{directory}' does not exist")));
        }
        if !dir.is_dir() {
            return Err(refuse(format!("'{directory}' is not a directory")));
        }

        let matcher = if pattern == "*" {
            None
        } else {
            Some(glob::Pattern::new(pattern).map_err(|e| {
                TutorError::Validation(format!("invalid pattern '{pattern}': {e}"))
            })?)
        };

        let visible = |name: &str| show_hidden || !name.starts_with('.');

        let mut dirs = Vec::new();
        let mut files = Vec::new();

        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();

            if !visible(&name) {
                continue;
            }
            if matcher.as_ref().is_some_and(|m| !m.matches(&name)) {
                continue;
            }

            let path = entry.path();
            let rel = self.guard.relative(&path);

            // file_type() does not follow symlinks
            if entry.file_type()?.is_dir() {
                match fs::read_dir(&path) {
                    Ok(children) => {
                        let count = children
                            .filter_map(std::result::Result::ok)
                            .filter(|c| visible(&c.file_name().to_string_lossy()))
                            .count();
                        dirs.push(format!("{rel}/ ({count} items)"));
                    }
                    Err(_) => dirs.push(format!("{rel}/ (permission denied)")),
                }
            } else {
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                match path.extension() {
                    Some(ext) => files.push(format!(
                        "{rel} ({size} bytes, {} file)",
                        ext.to_string_lossy()
                    )),
                    None => files.push(format!("{rel} ({size} bytes)")),
                }
            }
        }

        dirs.sort();
        files.sort();

        let mut out = format!("Contents of {directory}:\n");
        if dirs.is_empty() && files.is_empty() {
            out.push_str("No items found");
            if pattern != "*" {
                out.push_str(&format!(" matching pattern '{pattern}'"));
            }
            return Ok(out);
        }

        if !dirs.is_empty() {
            out.push_str("\nDirectories:\n");
            out.push_str(&dirs.join("\n"));
            out.push('\n');
        }
        if !files.is_empty() {
            out.push_str("\nFiles:\n");
            out.push_str(&files.join("\n"));
            out.push('\n');
        }
        if !dirs.is_empty() && directory == "." {
            out.push_str(
                "\nUse list_files with the directory parameter to explore subdirectories (e.g., directory='src')\n",
            );
        }

        Ok(out.trim_end().to_string())
    }

    pub fn get_file_info(&self, file_path: &str) -> Result<String> {
        let path = self
            .guard
            .resolve(file_path)
            .map_err(|_| refuse("File path is outside the allowed directory"))?;

        if !path.exists() {
            return Err(refuse(format!("'{file_path}' does not exist")));
        }

        let meta = fs::metadata(&path)?;
        let kind = if meta.is_file() {
            "File"
        } else if meta.is_dir() {
            "Directory"
        } else {
            "Other"
        };
        let modified = meta.modified().map_or_else(
            |_| "unknown".to_string(),
            |t| DateTime::<Local>::from(t).format("%a %b %e %H:%M:%S %Y").to_string(),
        );

        let mut info = format!(
            "Information for {file_path}:\nType: {kind}\nSize: {} bytes\nModified: {modified}\n",
            meta.len()
        );
        if meta.is_file() {
            if let Some(ext) = path.extension() {
                info.push_str(&format!("Extension: .{}\n", ext.to_string_lossy()));
            }
        }

        Ok(info)
    }
}

// ============================================================================
// Tool adapters
// ============================================================================

pub struct ReadFileTool(Arc<SandboxedFileTool>);

#[async_trait]
impl Tool for ReadFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "read_file".into(),
            description: "Read the contents of a file in the current working directory".into(),
            parameters: vec![
                ParameterSchema::required(
                    "file_path",
                    "string",
                    "The path to the file to read (relative to current directory)",
                ),
                ParameterSchema::optional(
                    "max_lines",
                    "integer",
                    "Maximum number of lines to read (optional, default: all)",
                    None,
                ),
            ],
        }
    }

    async fn execute(&self, call: &ToolCallRequest) -> Result<String> {
        let file_path = call.str_argument("file_path").unwrap_or_default();
        self.0.read_file(file_path, call.usize_argument("max_lines"))
    }

    fn describe(&self, call: &ToolCallRequest) -> String {
        let file_path = call.str_argument("file_path").unwrap_or("unknown");
        match call.usize_argument("max_lines").filter(|n| *n > 0) {
            Some(n) => format!("Reading first {n} lines of {file_path}"),
            None => format!("Reading {file_path}"),
        }
    }
}

pub struct ListFilesTool(Arc<SandboxedFileTool>);

#[async_trait]
impl Tool for ListFilesTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "list_files".into(),
            description: "List files and directories in the current working directory".into(),
            parameters: vec![
                ParameterSchema::optional(
                    "directory",
                    "string",
                    "Directory to list (relative to current directory, default: current directory). Use subdirectory names to explore deeper (e.g., 'src', 'tests')",
                    Some(json!(".")),
                ),
                ParameterSchema::optional(
                    "pattern",
                    "string",
                    "File pattern to match (e.g., '*.py', '*.js', '*' for all files)",
                    Some(json!("*")),
                ),
                ParameterSchema::optional(
                    "show_hidden",
                    "boolean",
                    "Include hidden files/directories (starting with .)",
                    Some(json!(false)),
                ),
            ],
        }
    }

    async fn execute(&self, call: &ToolCallRequest) -> Result<String> {
        self.0.list_files(
            call.str_argument("directory").unwrap_or("."),
            call.str_argument("pattern").unwrap_or("*"),
            call.bool_argument("show_hidden").unwrap_or(false),
        )
    }

    fn describe(&self, call: &ToolCallRequest) -> String {
        format!(
            "Listing files in {} (pattern: {})",
            call.str_argument("directory").unwrap_or("."),
            call.str_argument("pattern").unwrap_or("*")
        )
    }
}

pub struct FileInfoTool(Arc<SandboxedFileTool>);

#[async_trait]
impl Tool for FileInfoTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_file_info".into(),
            description: "Get information about a file (size, modified time, type)".into(),
            parameters: vec![ParameterSchema::required(
                "file_path",
                "string",
                "The path to the file",
            )],
        }
    }

    async fn execute(&self, call: &ToolCallRequest) -> Result<String> {
        self.0
            .get_file_info(call.str_argument("file_path").unwrap_or_default())
    }

    fn describe(&self, call: &ToolCallRequest) -> String {
        format!(
            "Getting info for {}",
            call.str_argument("file_path").unwrap_or("unknown")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> (tempfile::TempDir, SandboxedFileTool) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("notes.txt"), "one\ntwo\nthree\nfour\n").unwrap();
        fs::write(root.join("Makefile"), "all:\n").unwrap();
        fs::write(root.join(".env"), "KEY=1\n").unwrap();
        fs::write(root.join("blob.bin"), [0xff_u8, 0xfe, 0x00, 0x9f]).unwrap();
        fs::create_dir(root.join("src")).unwrap();
        fs::write(root.join("src/lib.rs"), "pub fn f() {}\n").unwrap();
        fs::write(root.join("src/.hidden"), "").unwrap();
        let tool = SandboxedFileTool::new(root).unwrap();
        (dir, tool)
    }

    #[test]
    fn test_read_file_full_and_truncated() {
        let (_dir, tool) = workspace();

        let full = tool.read_file("notes.txt", None).unwrap();
        assert!(full.starts_with("Contents of notes.txt:\n```\none\ntwo"));

        let head = tool.read_file("notes.txt", Some(2)).unwrap();
        assert_eq!(
            head,
            "Contents of notes.txt:\n```\none\ntwo\n... (showing first 2 lines)\n```"
        );

        // Exactly the available number of lines is not a truncation
        let exact = tool.read_file("notes.txt", Some(4)).unwrap();
        assert!(!exact.contains("showing first"));
    }

    #[test]
    fn test_read_file_errors_are_descriptive() {
        let (_dir, tool) = workspace();

        let missing = tool.read_file("nope.txt", None).unwrap_err().to_string();
        assert_eq!(missing, "File 'nope.txt' does not exist");

        let not_file = tool.read_file("src", None).unwrap_err().to_string();
        assert_eq!(not_file, "'src' is not a file");

        let binary = tool.read_file("blob.bin", None).unwrap_err().to_string();
        assert_eq!(binary, "'blob.bin' appears to be a binary file");
    }

    #[test]
    fn test_escapes_are_refused() {
        let (_dir, tool) = workspace();

        for path in ["../../etc/passwd", "/etc/passwd"] {
            let err = tool.read_file(path, None).unwrap_err().to_string();
            assert_eq!(err, "File path is outside the allowed directory");

            let err = tool.get_file_info(path).unwrap_err().to_string();
            assert_eq!(err, "File path is outside the allowed directory");
        }

        let err = tool.list_files("..", "*", false).unwrap_err().to_string();
        assert_eq!(err, "Directory path is outside the allowed directory");
    }

    #[test]
    fn test_list_files_groups_and_filters() {
        let (_dir, tool) = workspace();

        let listing = tool.list_files(".", "*", false).unwrap();
        assert!(listing.starts_with("Contents of .:\n\nDirectories:\nsrc/ (1 items)"));
        assert!(listing.contains("\nFiles:\n"));
        assert!(listing.contains("notes.txt (19 bytes, txt file)"));
        assert!(listing.contains("Makefile (5 bytes)"));
        assert!(!listing.contains(".env"));

        let hidden = tool.list_files(".", "*", true).unwrap();
        assert!(hidden.contains(".env (6 bytes"));
        assert!(hidden.contains("src/ (2 items)"));

        let rust_only = tool.list_files("src", "*.rs", false).unwrap();
        assert_eq!(rust_only, "Contents of src:\n\nFiles:\nsrc/lib.rs (14 bytes, rs file)");

        let none = tool.list_files(".", "*.py", false).unwrap();
        assert_eq!(none, "Contents of .:\nNo items found matching pattern '*.py'");
    }

    #[test]
    fn test_list_files_errors() {
        let (_dir, tool) = workspace();
        assert_eq!(
            tool.list_files("missing", "*", false).unwrap_err().to_string(),
            "Directory 'missing' does not exist"
        );
        assert_eq!(
            tool.list_files("notes.txt", "*", false).unwrap_err().to_string(),
            "'notes.txt' is not a directory"
        );
    }

    #[test]
    fn test_file_info() {
        let (_dir, tool) = workspace();

        let info = tool.get_file_info("src/lib.rs").unwrap();
        assert!(info.starts_with("Information for src/lib.rs:\nType: File\nSize: 14 bytes\nModified: "));
        assert!(info.ends_with("Extension: .rs\n"));

        let dir_info = tool.get_file_info("src").unwrap();
        assert!(dir_info.contains("Type: Directory"));
        assert!(!dir_info.contains("Extension"));
    }

    #[tokio::test]
    async fn test_catalog_advertises_three_tools() {
        let (_dir, tool) = workspace();
        let catalog = tool.into_catalog();

        assert_eq!(catalog.names(), vec!["read_file", "list_files", "get_file_info"]);

        let call = ToolCallRequest::new("c1", "read_file", json!({"file_path": "../secret"}));
        let result = catalog.execute(&call).await;
        assert!(!result.success);
        assert_eq!(result.output, "Error: File path is outside the allowed directory");
        assert_eq!(catalog.describe(&call), "Reading ../secret");
    }
}
