//! Built-in tools.
//!
//! - [`calculator`]: whitelisted arithmetic
//! - [`filesystem`]: `file_read`, `file_write` and `list_files`, confined to a root directory
//! - [`clock`]: `current_time`
//!
//! [`register_builtin_tools`] installs all five into a [`ToolRegistry`].

pub mod calculator;
pub mod clock;
pub mod filesystem;

pub use calculator::{Calculator, CalculatorError, Number};
pub use filesystem::{FileSystemError, FileTools};

use crate::agentlab::tool_protocol::ToolRegistry;
use futures_util::FutureExt;
use std::path::PathBuf;
use std::sync::Arc;

/// Register calculator, file_read, file_write, current_time and list_files.
///
/// The file tools resolve every path against `root`.
pub async fn register_builtin_tools(registry: &ToolRegistry, root: PathBuf) {
    let files = Arc::new(FileTools::new(root));

    registry
        .register_tool(calculator::metadata(), Arc::new(calculator::calculator))
        .await;

    let reader = files.clone();
    registry
        .register_async_tool(
            filesystem::file_read_metadata(),
            Arc::new(move |params| {
                let reader = reader.clone();
                async move { reader.file_read(params).await }.boxed()
            }),
        )
        .await;

    let writer = files.clone();
    registry
        .register_async_tool(
            filesystem::file_write_metadata(),
            Arc::new(move |params| {
                let writer = writer.clone();
                async move { writer.file_write(params).await }.boxed()
            }),
        )
        .await;

    registry
        .register_tool(clock::metadata(), Arc::new(clock::current_time))
        .await;

    registry
        .register_tool(
            filesystem::list_files_metadata(),
            Arc::new(move |params| files.list_files(params)),
        )
        .await;

    log::info!(
        "Registered {} built-in tools",
        registry.tool_count().await
    );
}
