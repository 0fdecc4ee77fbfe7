//! Tool dispatcher.
//!
//! [`ToolExecutor`] owns the sandbox root, the todo store, and the
//! registry; it takes a named call with a raw JSON argument blob,
//! normalizes argument aliases, validates against the declared schema,
//! and dispatches to the tool implementation. Every error is converted
//! into a human-readable payload the model can act on.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tracing::{debug, info, trace};

use crate::agent::ui::UiPort;
use crate::cancel::CancelFlag;
use crate::todo::{TodoStatus, TodoStore};
use crate::tools::registry::{ToolRegistry, normalize_aliases};
use crate::tools::{fsops, patch, replace, shell, web};
use crate::workspace::WorkspaceRoot;
use crate::{AgentError, ToolInvocation, ToolResult, ToolStatus};

use crate::tools::registry::{
    ApplyPatchArgs, BashArgs, ListFilesArgs, OutlineArgs, ReadFileArgs, ReplaceArgs,
    RespondTextArgs, SetStatusArgs, TodoAddArgs, TodoRemoveArgs, TodoUpdateArgs, WebFetchArgs,
    WriteFileArgs,
};

/// Dispatches tool calls against one workspace.
pub struct ToolExecutor {
    root: WorkspaceRoot,
    registry: ToolRegistry,
    todos: Mutex<TodoStore>,
    cancel: CancelFlag,
    ui: Arc<dyn UiPort>,
}

impl ToolExecutor {
    pub fn new(root: WorkspaceRoot, cancel: CancelFlag, ui: Arc<dyn UiPort>) -> Self {
        Self {
            root,
            registry: ToolRegistry::standard(),
            todos: Mutex::new(TodoStore::new()),
            cancel,
            ui,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn root(&self) -> &WorkspaceRoot {
        &self.root
    }

    fn todos_guard(&self) -> MutexGuard<'_, TodoStore> {
        self.todos.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// One-line todo summary for the soft-budget continuation note.
    pub fn todo_summary(&self) -> String {
        self.todos_guard().summary()
    }

    /// Load todos from a persisted file; missing files are fine.
    pub fn load_todos(&self, path: &std::path::Path) {
        if path.exists()
            && let Err(e) = self.todos_guard().load(path)
        {
            debug!("could not load todos: {e}");
        }
    }

    /// Persist the todo list.
    pub fn save_todos(&self, path: &std::path::Path) -> Result<(), String> {
        self.todos_guard().save(path)
    }

    /// Execute a tool call. Errors never escape as `Err` — they become a
    /// [`ToolResult`] with `status = error` and an explanatory payload.
    pub async fn execute(&self, call: &ToolInvocation) -> ToolResult {
        let start = Instant::now();
        let outcome = self.dispatch(call).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok((payload, file_path)) => ToolResult {
                status: ToolStatus::Ok,
                bytes: payload.len(),
                duration_ms,
                file_path,
                payload,
            },
            Err(AgentError::Cancelled) => ToolResult {
                status: ToolStatus::Cancelled,
                bytes: 0,
                duration_ms,
                file_path: None,
                payload: "Operation cancelled by user.".into(),
            },
            Err(e) => {
                let payload = e.to_string();
                ToolResult {
                    status: ToolStatus::Error,
                    bytes: payload.len(),
                    duration_ms,
                    file_path: None,
                    payload,
                }
            }
        };
        debug!(
            "[tool] {} -> {} in {}ms ({} bytes)",
            call.name, result.status, result.duration_ms, result.bytes
        );
        result
    }

    async fn dispatch(&self, call: &ToolInvocation) -> Result<(String, Option<String>), AgentError> {
        let descriptor = self
            .registry
            .get(&call.name)
            .ok_or_else(|| AgentError::InvalidToolName(call.name.clone()))?;

        if self.cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        info!("[tool] {}({})", descriptor.name, preview(&call.arguments));
        trace!("[tool] {} raw arguments: {}", descriptor.name, call.arguments);

        // Parse, fold aliases into canonical keys, then validate.
        let raw = if call.arguments.trim().is_empty() {
            "{}"
        } else {
            call.arguments.as_str()
        };
        let parsed: serde_json::Value = serde_json::from_str(raw).map_err(|e| {
            AgentError::InvalidArgument(format!(
                "arguments for '{}' are not valid JSON: {e}",
                descriptor.name
            ))
        })?;
        let mut args = match parsed {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(AgentError::InvalidArgument(format!(
                    "arguments for '{}' must be a JSON object, got {other}",
                    descriptor.name
                )));
            }
        };
        normalize_aliases(&mut args, descriptor.arg_aliases);
        let args = serde_json::Value::Object(args);
        validate_against_schema(&descriptor.name, &descriptor.parameters, &args)?;

        let file_path = args.get("path").and_then(|v| v.as_str()).map(String::from);

        let payload = match descriptor.name.as_str() {
            "bash" => {
                let parsed: BashArgs = typed_args(&descriptor.name, args)?;
                shell::run_shell(&parsed.command, self.root.root(), &self.cancel).await?
            }
            "read_file" => {
                let parsed: ReadFileArgs = typed_args(&descriptor.name, args)?;
                fsops::read_window(
                    &self.root,
                    &parsed.path,
                    parsed.offset.unwrap_or(0),
                    parsed.limit.unwrap_or(0),
                )
                .await?
            }
            "list_files" => {
                let parsed: ListFilesArgs = typed_args(&descriptor.name, args)?;
                let target = parsed.path.unwrap_or_else(|| ".".into());
                let resolved = self.root.resolve_existing(&target)?;
                let command = format!("ls -la {}", shell_quote(&resolved.to_string_lossy()));
                shell::run_shell(&command, self.root.root(), &self.cancel).await?
            }
            "write_file" => {
                let parsed: WriteFileArgs = typed_args(&descriptor.name, args)?;
                fsops::write_file(&self.root, &parsed.path, &parsed.content).await?
            }
            "replace_in_file" => {
                let parsed: ReplaceArgs = typed_args(&descriptor.name, args)?;
                replace::replace_in_file(
                    &self.root,
                    &parsed.path,
                    &parsed.find,
                    &parsed.replace,
                    parsed.replace_all.unwrap_or(false),
                    parsed.confirm.unwrap_or(false),
                )
                .await?
            }
            "apply_patch" => {
                let parsed: ApplyPatchArgs = typed_args(&descriptor.name, args)?;
                patch::apply_patch(&self.root, &parsed.patch_text).await?
            }
            "respond_text" => {
                let parsed: RespondTextArgs = typed_args(&descriptor.name, args)?;
                parsed.text
            }
            "todo_add" => {
                let parsed: TodoAddArgs = typed_args(&descriptor.name, args)?;
                let mut todos = self.todos_guard();
                let id = todos.add(parsed.description);
                format!("Added todo {id}.\n{}", todos.render())
            }
            "todo_update" => {
                let parsed: TodoUpdateArgs = typed_args(&descriptor.name, args)?;
                let status = TodoStatus::parse(&parsed.status).ok_or_else(|| {
                    AgentError::InvalidArgument(format!(
                        "unknown todo status '{}'; use pending, in_progress, or done",
                        parsed.status
                    ))
                })?;
                let mut todos = self.todos_guard();
                if !todos.update(&parsed.id, status) {
                    return Err(AgentError::InvalidArgument(format!(
                        "no todo with id '{}'",
                        parsed.id
                    )));
                }
                todos.render()
            }
            "todo_list" => self.todos_guard().render(),
            "todo_remove" => {
                let parsed: TodoRemoveArgs = typed_args(&descriptor.name, args)?;
                let mut todos = self.todos_guard();
                if !todos.remove(&parsed.id) {
                    return Err(AgentError::InvalidArgument(format!(
                        "no todo with id '{}'",
                        parsed.id
                    )));
                }
                todos.render()
            }
            "todo_clear_done" => {
                let mut todos = self.todos_guard();
                todos.clear_done();
                format!("Cleared completed todos.\n{}", todos.render())
            }
            "set_status" => {
                let parsed: SetStatusArgs = typed_args(&descriptor.name, args)?;
                self.ui.publish_status(&parsed.status);
                format!("Status set: {}", parsed.status)
            }
            "get_file_outline" => {
                let parsed: OutlineArgs = typed_args(&descriptor.name, args)?;
                fsops::file_outline(&self.root, &parsed.path).await?
            }
            "web_fetch" => {
                let parsed: WebFetchArgs = typed_args(&descriptor.name, args)?;
                web::web_fetch(&parsed.url, &self.cancel).await?
            }
            other => return Err(AgentError::InvalidToolName(other.to_string())),
        };

        Ok((payload, file_path))
    }
}

/// Deserialize canonical arguments into the tool's typed struct.
fn typed_args<T: serde::de::DeserializeOwned>(
    tool: &str,
    args: serde_json::Value,
) -> Result<T, AgentError> {
    serde_json::from_value(args).map_err(|e| {
        AgentError::InvalidArgument(format!(
            "invalid arguments for '{tool}': {e}. Provide JSON matching the tool's schema."
        ))
    })
}

/// Strict schema validation; unknown fields pass, missing required fields
/// and type errors fail.
fn validate_against_schema(
    tool: &str,
    schema: &serde_json::Value,
    args: &serde_json::Value,
) -> Result<(), AgentError> {
    let validator = match jsonschema::validator_for(schema) {
        Ok(v) => v,
        // A descriptor with an uncompilable schema is a registry bug, not
        // the model's fault; skip validation rather than block the tool.
        Err(_) => return Ok(()),
    };
    let errors: Vec<String> = validator
        .iter_errors(args)
        .map(|e| format!("  - {}: {e}", e.instance_path()))
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AgentError::InvalidArgument(format!(
            "argument validation failed for '{tool}':\n{}",
            errors.join("\n")
        )))
    }
}

/// Single-quote a path for `/bin/sh`.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

fn preview(arguments: &str) -> String {
    let head: String = arguments.chars().take(120).collect();
    if arguments.len() > 120 {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ui::NoopPort;

    fn fixture() -> (tempfile::TempDir, ToolExecutor) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.txt"), "hello world").unwrap();
        let root = WorkspaceRoot::new(dir.path()).unwrap();
        let executor = ToolExecutor::new(root, CancelFlag::new(), Arc::new(NoopPort));
        (dir, executor)
    }

    fn call(name: &str, args: &str) -> ToolInvocation {
        ToolInvocation::new(name, args)
    }

    #[tokio::test]
    async fn bounded_read_first_window() {
        let (_dir, executor) = fixture();
        let result = executor
            .execute(&call("read_file", r#"{"path": "x.txt", "offset": 0, "limit": 5}"#))
            .await;
        assert_eq!(result.status, ToolStatus::Ok);
        assert_eq!(result.payload, "hello\n\n[...truncated, more content available]");
        assert_eq!(result.file_path.as_deref(), Some("x.txt"));
    }

    #[tokio::test]
    async fn read_accepts_file_path_alias() {
        let (_dir, executor) = fixture();
        let result = executor
            .execute(&call("read", r#"{"filePath": "x.txt"}"#))
            .await;
        assert_eq!(result.status, ToolStatus::Ok);
        assert_eq!(result.payload, "hello world");
        assert_eq!(result.file_path.as_deref(), Some("x.txt"));
    }

    #[tokio::test]
    async fn sandbox_escape_is_refused() {
        let (_dir, executor) = fixture();
        let result = executor
            .execute(&call("read_file", r#"{"path": "../etc/passwd"}"#))
            .await;
        assert_eq!(result.status, ToolStatus::Error);
        assert!(result.payload.starts_with("WTF? '../etc/passwd' is outside the workspace!"));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_result() {
        let (_dir, executor) = fixture();
        let result = executor.execute(&call("frobnicate", "{}")).await;
        assert_eq!(result.status, ToolStatus::Error);
        assert!(result.payload.contains("unknown tool 'frobnicate'"));
    }

    #[tokio::test]
    async fn missing_required_argument_is_invalid() {
        let (_dir, executor) = fixture();
        let result = executor.execute(&call("read_file", "{}")).await;
        assert_eq!(result.status, ToolStatus::Error);
        assert!(result.payload.contains("argument validation failed"));
    }

    #[tokio::test]
    async fn type_error_is_invalid() {
        let (_dir, executor) = fixture();
        let result = executor
            .execute(&call("read_file", r#"{"path": "x.txt", "offset": "zero"}"#))
            .await;
        assert_eq!(result.status, ToolStatus::Error);
    }

    #[tokio::test]
    async fn unknown_fields_are_ignored() {
        let (_dir, executor) = fixture();
        let result = executor
            .execute(&call("read_file", r#"{"path": "x.txt", "mystery": 42}"#))
            .await;
        assert_eq!(result.status, ToolStatus::Ok);
    }

    #[tokio::test]
    async fn non_object_arguments_are_invalid() {
        let (_dir, executor) = fixture();
        let result = executor.execute(&call("bash", r#""ls""#)).await;
        assert_eq!(result.status, ToolStatus::Error);
        assert!(result.payload.contains("must be a JSON object"));
    }

    #[tokio::test]
    async fn bash_runs_in_workspace() {
        let (_dir, executor) = fixture();
        let result = executor.execute(&call("bash", r#"{"command": "ls"}"#)).await;
        assert_eq!(result.status, ToolStatus::Ok);
        assert!(result.payload.contains("x.txt"));
    }

    #[tokio::test]
    async fn list_files_defaults_to_root() {
        let (_dir, executor) = fixture();
        let result = executor.execute(&call("list_files", "{}")).await;
        assert_eq!(result.status, ToolStatus::Ok);
        assert!(result.payload.contains("x.txt"));
    }

    #[tokio::test]
    async fn edit_alias_with_old_new_spellings() {
        let (dir, executor) = fixture();
        let result = executor
            .execute(&call(
                "edit",
                r#"{"path": "x.txt", "oldString": "hello", "newString": "goodbye"}"#,
            ))
            .await;
        assert_eq!(result.status, ToolStatus::Ok, "payload: {}", result.payload);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("x.txt")).unwrap(),
            "goodbye world"
        );
    }

    #[tokio::test]
    async fn ambiguous_edit_reports_locations() {
        let (dir, executor) = fixture();
        std::fs::write(dir.path().join("dup.txt"), "const x\nconst x\n").unwrap();
        let result = executor
            .execute(&call(
                "edit",
                r#"{"path": "dup.txt", "find": "const x", "replace": "const y", "replaceAll": false}"#,
            ))
            .await;
        assert_eq!(result.status, ToolStatus::Error);
        assert!(result.payload.starts_with("Replace failed: pattern matched 2 locations in dup.txt"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("dup.txt")).unwrap(),
            "const x\nconst x\n"
        );
    }

    #[tokio::test]
    async fn todo_lifecycle_through_tools() {
        let (_dir, executor) = fixture();
        let added = executor
            .execute(&call("todo_add", r#"{"description": "write docs"}"#))
            .await;
        assert_eq!(added.status, ToolStatus::Ok);
        let id = added
            .payload
            .strip_prefix("Added todo ")
            .and_then(|s| s.split('.').next())
            .unwrap()
            .to_string();

        let updated = executor
            .execute(&call(
                "todo_update",
                &format!(r#"{{"id": "{id}", "status": "done"}}"#),
            ))
            .await;
        assert_eq!(updated.status, ToolStatus::Ok);
        assert!(updated.payload.contains("[x] write docs"));
        assert_eq!(executor.todo_summary(), "1/1 done, 0 in progress");

        let cleared = executor.execute(&call("todo_clear_done", "{}")).await;
        assert!(cleared.payload.contains("Todo list is empty."));
    }

    #[tokio::test]
    async fn respond_text_returns_payload_verbatim() {
        let (_dir, executor) = fixture();
        let result = executor
            .execute(&call("respond_text", r#"{"text": "All done."}"#))
            .await;
        assert_eq!(result.status, ToolStatus::Ok);
        assert_eq!(result.payload, "All done.");
    }

    #[tokio::test]
    async fn respond_text_accepts_message_alias() {
        let (_dir, executor) = fixture();
        let result = executor
            .execute(&call("respond_text", r#"{"message": "Done via alias."}"#))
            .await;
        assert_eq!(result.status, ToolStatus::Ok);
        assert_eq!(result.payload, "Done via alias.");
    }

    #[tokio::test]
    async fn cancelled_flag_short_circuits() {
        let (_dir, executor) = fixture();
        executor.cancel.trigger();
        let result = executor.execute(&call("bash", r#"{"command": "echo hi"}"#)).await;
        assert_eq!(result.status, ToolStatus::Cancelled);
        assert_eq!(result.payload, "Operation cancelled by user.");
    }

    #[tokio::test]
    async fn apply_patch_scenario() {
        let (dir, executor) = fixture();
        let result = executor
            .execute(&call(
                "apply_patch",
                r#"{"patchText": "*** Begin Patch\n*** Add File: a.txt\n+hi\n*** End Patch"}"#,
            ))
            .await;
        assert_eq!(result.status, ToolStatus::Ok, "payload: {}", result.payload);
        assert_eq!(result.payload, "Success. Updated the following files:\nA a.txt\n");
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "hi\n");
    }

    #[tokio::test]
    async fn set_status_flows_to_port() {
        use std::sync::Mutex as StdMutex;
        struct Capture(StdMutex<Vec<String>>);
        impl UiPort for Capture {
            fn publish_status(&self, status: &str) {
                self.0.lock().unwrap().push(status.to_string());
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let root = WorkspaceRoot::new(dir.path()).unwrap();
        let port = Arc::new(Capture(StdMutex::new(Vec::new())));
        let executor = ToolExecutor::new(root, CancelFlag::new(), port.clone());

        let result = executor
            .execute(&call("set_status", r#"{"status": "reading files"}"#))
            .await;
        assert_eq!(result.status, ToolStatus::Ok);
        assert_eq!(*port.0.lock().unwrap(), ["reading files"]);
    }

    #[tokio::test]
    async fn outline_through_executor() {
        let (dir, executor) = fixture();
        std::fs::write(
            dir.path().join("m.zig"),
            "pub fn main() !void {}\nfn helper() void {}\n",
        )
        .unwrap();
        let result = executor
            .execute(&call("get_file_outline", r#"{"path": "m.zig"}"#))
            .await;
        assert_eq!(result.status, ToolStatus::Ok);
        assert!(result.payload.contains("L1: pub fn main"));
        assert!(result.payload.contains("L2: fn helper"));
    }
}
