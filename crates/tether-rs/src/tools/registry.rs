//! Static tool catalog.
//!
//! Each tool is an immutable descriptor: unique name, structured
//! description (built with [`ToolSpec`](crate::tools::spec::ToolSpec)),
//! and a JSON Schema generated from the typed argument struct the
//! executor deserializes into. Several tools accept legacy argument
//! spellings; those are declared per-descriptor as `(canonical, aliases…)`
//! pairs and folded into the canonical key before validation, first match
//! wins.

use schemars::JsonSchema;
use serde::Deserialize;

use crate::tools::spec::ToolSpec;

// ── Typed argument structs ──────────────────────────────────────────

/// Arguments for `bash`.
#[derive(Deserialize, JsonSchema)]
pub struct BashArgs {
    /// Shell command, run via `/bin/sh -c`.
    pub command: String,
}

/// Arguments for `read_file`.
#[derive(Deserialize, JsonSchema)]
pub struct ReadFileArgs {
    /// File path relative to the workspace root.
    pub path: String,
    /// Bytes to skip from the start of the file. Default: 0.
    #[serde(default)]
    pub offset: Option<u64>,
    /// Maximum bytes to return; clamped to 16384, 0 means default.
    #[serde(default)]
    pub limit: Option<u64>,
}

/// Arguments for `list_files`.
#[derive(Deserialize, JsonSchema)]
pub struct ListFilesArgs {
    /// Directory to list. Default: the workspace root.
    #[serde(default)]
    pub path: Option<String>,
}

/// Arguments for `write_file`.
#[derive(Deserialize, JsonSchema)]
pub struct WriteFileArgs {
    /// File path relative to the workspace root.
    pub path: String,
    /// Full replacement content.
    pub content: String,
}

/// Arguments for `replace_in_file`.
#[derive(Deserialize, JsonSchema)]
pub struct ReplaceArgs {
    /// File path relative to the workspace root.
    pub path: String,
    /// Exact text to find.
    pub find: String,
    /// Replacement text.
    pub replace: String,
    /// Replace every occurrence instead of requiring uniqueness.
    #[serde(default)]
    pub replace_all: Option<bool>,
    /// Acknowledge a large edit flagged by the size gate.
    #[serde(default)]
    pub confirm: Option<bool>,
}

/// Arguments for `apply_patch`.
#[derive(Deserialize, JsonSchema)]
pub struct ApplyPatchArgs {
    /// Patch envelope text (`*** Begin Patch` … `*** End Patch`).
    #[serde(rename = "patchText")]
    pub patch_text: String,
}

/// Arguments for `respond_text`.
#[derive(Deserialize, JsonSchema)]
pub struct RespondTextArgs {
    /// The final user-facing answer.
    pub text: String,
}

/// Arguments for `todo_add`.
#[derive(Deserialize, JsonSchema)]
pub struct TodoAddArgs {
    /// What needs to be done.
    pub description: String,
}

/// Arguments for `todo_update`.
#[derive(Deserialize, JsonSchema)]
pub struct TodoUpdateArgs {
    /// Item id as returned by `todo_add`.
    pub id: String,
    /// New status: pending, in_progress, or done.
    pub status: String,
}

/// Arguments for `todo_remove`.
#[derive(Deserialize, JsonSchema)]
pub struct TodoRemoveArgs {
    /// Item id as returned by `todo_add`.
    pub id: String,
}

/// Arguments for tools that take none (`todo_list`, `todo_clear_done`).
#[derive(Deserialize, JsonSchema)]
pub struct NoArgs {}

/// Arguments for `set_status`.
#[derive(Deserialize, JsonSchema)]
pub struct SetStatusArgs {
    /// Human-readable current-activity line for the UI.
    pub status: String,
}

/// Arguments for `get_file_outline`.
#[derive(Deserialize, JsonSchema)]
pub struct OutlineArgs {
    /// File path relative to the workspace root.
    pub path: String,
}

/// Arguments for `web_fetch`.
#[derive(Deserialize, JsonSchema)]
pub struct WebFetchArgs {
    /// URL to fetch over HTTP GET.
    pub url: String,
}

// ── Descriptors ─────────────────────────────────────────────────────

/// `(canonical key, alias spellings…)` table for one tool.
pub type ArgAliases = &'static [(&'static str, &'static [&'static str])];

/// Alias spellings for path-like arguments.
const PATH_ALIASES: &[&str] = &["filePath", "file_path"];

/// Immutable tool descriptor.
#[derive(Clone, Debug)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema for the parameters, accepted by a strict validator.
    pub parameters: serde_json::Value,
    /// Aliases are folded into the canonical key before validation,
    /// first match wins.
    pub arg_aliases: ArgAliases,
}

/// Map a tool-name alias to its canonical registry name.
pub fn canonical_tool_name(name: &str) -> &str {
    match name {
        "read" => "read_file",
        "list" => "list_files",
        "write" => "write_file",
        "edit" => "replace_in_file",
        other => other,
    }
}

/// The static ordered tool catalog.
#[derive(Debug)]
pub struct ToolRegistry {
    descriptors: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    /// Build the standard catalog in its canonical order.
    pub fn standard() -> Self {
        let descriptors = vec![
            ToolSpec::builder("bash")
                .purpose("Run a shell command in the workspace via /bin/sh -c")
                .when_to_use(
                    "For builds, test runs, git queries, and anything with a real CLI. \
                     Output is capped at 512 KiB",
                )
                .when_not_to_use(
                    "For reading or editing files — the dedicated tools return \
                     structured windows and diffs",
                )
                .parameters_for::<BashArgs>()
                .example("bash(command='zig build test')", "build output, [exit N] on failure")
                .output_format(
                    "stdout, prefixed with [exit N] on non-zero exit, with a [stderr] \
                     block appended when stderr was non-empty",
                )
                .to_descriptor(&[]),
            ToolSpec::builder("read_file")
                .purpose("Read a bounded byte window of a file")
                .when_to_use(
                    "When you know the path. Page through large files with offset/limit \
                     (limit is clamped to 16384; 0 means default)",
                )
                .when_not_to_use(
                    "When you only need the shape of a file — use get_file_outline. \
                     When you don't know the path — use list_files or bash",
                )
                .parameters_for::<ReadFileArgs>()
                .example(
                    "read_file(path='x.txt', offset=5, limit=5)",
                    "'[showing bytes 5 to 10 of 11 total]' plus the window",
                )
                .output_format(
                    "Raw text; a window note is prepended when offset > 0 and a \
                     truncation note appended when the window stops before EOF",
                )
                .to_descriptor(&[("path", PATH_ALIASES)]),
            ToolSpec::builder("list_files")
                .purpose("List a directory with ls -la")
                .when_to_use("To discover what exists before reading or editing")
                .when_not_to_use("When you already know the exact path — use read_file")
                .parameters_for::<ListFilesArgs>()
                .example("list_files(path='src')", "ls -la output for src/")
                .output_format("ls -la output")
                .to_descriptor(&[("path", PATH_ALIASES)]),
            ToolSpec::builder("write_file")
                .purpose("Replace a file's contents, creating parent directories")
                .when_to_use("For new files, or when replacing most of an existing file")
                .when_not_to_use(
                    "For small edits to an existing file — use replace_in_file so \
                     unmodified content cannot be lost",
                )
                .parameters_for::<WriteFileArgs>()
                .example("write_file(path='src/new.zig', content='...')", "mini diff of the write")
                .output_format(
                    "A summary line plus a mini unified diff; zig fmt --check \
                     diagnostics are appended for .zig files",
                )
                .to_descriptor(&[("path", PATH_ALIASES)]),
            ToolSpec::builder("replace_in_file")
                .purpose("Strict text replacement inside one file")
                .when_to_use(
                    "For targeted edits. `find` must match exactly once unless \
                     replace_all is set; a line-trimmed fallback covers whitespace \
                     drift. Edits over 100 changed lines need confirm=true",
                )
                .when_not_to_use(
                    "For whole-file rewrites — use write_file. For coordinated \
                     multi-file changes — use apply_patch",
                )
                .parameters_for::<ReplaceArgs>()
                .example(
                    "replace_in_file(path='a.zig', find='const x', replace='const y')",
                    "mini diff, or 'Replace failed: pattern matched 2 locations …'",
                )
                .output_format("A mini unified diff, or a 'Replace failed:'/'CONFIRM_REQUIRED:' line")
                .to_descriptor(&[
                    ("path", PATH_ALIASES),
                    ("find", &["oldString", "old_string", "old"]),
                    ("replace", &["newString", "new_string", "new"]),
                    ("replace_all", &["replaceAll", "all"]),
                ]),
            ToolSpec::builder("apply_patch")
                .purpose("Apply a multi-file patch envelope atomically")
                .when_to_use(
                    "For coordinated changes across files: Add/Delete/Update blocks \
                     between '*** Begin Patch' and '*** End Patch', with @@ hunks of \
                     ' '/'+'/'-' prefixed lines",
                )
                .when_not_to_use("For a single small edit — replace_in_file is simpler")
                .parameters_for::<ApplyPatchArgs>()
                .example(
                    "apply_patch(patchText='*** Begin Patch\\n*** Add File: a.txt\\n+hi\\n*** End Patch')",
                    "'Success. Updated the following files:\\nA a.txt'",
                )
                .output_format("A|D|M summary per path; any failing block aborts the whole patch")
                .to_descriptor(&[("patchText", &["patch_text", "patch"])]),
            ToolSpec::builder("respond_text")
                .purpose("Return the final plain-text answer and end the loop")
                .when_to_use("When the request is fully handled and you have the answer")
                .when_not_to_use("While work remains — keep using tools instead")
                .parameters_for::<RespondTextArgs>()
                .example("respond_text(text='Renamed the function in both files.')", "ends the request")
                .output_format("The text is shown to the user verbatim")
                .to_descriptor(&[("text", &["message", "summary", "content"])]),
            ToolSpec::builder("todo_add")
                .purpose("Add a pending work item to the todo list")
                .when_to_use("At the start of multi-step work, one item per step")
                .when_not_to_use("For single-step requests")
                .parameters_for::<TodoAddArgs>()
                .example("todo_add(description='update call sites')", "item id plus the list")
                .output_format("The new item's id and the rendered checklist")
                .to_descriptor(&[("description", &["task", "text"])]),
            ToolSpec::builder("todo_update")
                .purpose("Set a todo item's status")
                .when_to_use("Mark items in_progress when started and done when finished")
                .when_not_to_use("To delete an item — use todo_remove")
                .parameters_for::<TodoUpdateArgs>()
                .example("todo_update(id='...', status='done')", "the updated checklist")
                .output_format("The rendered checklist")
                .to_descriptor(&[]),
            ToolSpec::builder("todo_list")
                .purpose("Show the todo list")
                .when_to_use("To recall what remains before deciding the next step")
                .when_not_to_use("After every single call — the list is echoed on changes")
                .parameters_for::<NoArgs>()
                .output_format("The rendered checklist")
                .to_descriptor(&[]),
            ToolSpec::builder("todo_remove")
                .purpose("Remove a todo item by id")
                .when_to_use("When an item became irrelevant")
                .when_not_to_use("When it was completed — mark it done instead")
                .parameters_for::<TodoRemoveArgs>()
                .output_format("The rendered checklist")
                .to_descriptor(&[]),
            ToolSpec::builder("todo_clear_done")
                .purpose("Drop all completed todo items")
                .when_to_use("To declutter after a batch of work")
                .when_not_to_use("To wipe pending items — remove them individually")
                .parameters_for::<NoArgs>()
                .output_format("The rendered checklist")
                .to_descriptor(&[]),
            ToolSpec::builder("set_status")
                .purpose("Publish a short current-activity line for the UI")
                .when_to_use("Before long operations, so the user sees what is happening")
                .when_not_to_use("As a substitute for the final answer — use respond_text")
                .parameters_for::<SetStatusArgs>()
                .example("set_status(status='running the test suite')", "acknowledged")
                .output_format("An acknowledgement")
                .to_descriptor(&[]),
            ToolSpec::builder("get_file_outline")
                .purpose("Return the structural outline of a source file")
                .when_to_use(
                    "To orient in an unfamiliar file: function, struct, and type \
                     declaration lines with their line numbers",
                )
                .when_not_to_use("When you need the actual code — use read_file")
                .parameters_for::<OutlineArgs>()
                .example("get_file_outline(path='src/main.zig')", "'L5: pub fn main() !void {'")
                .output_format("One 'L{n}: {declaration}' line per hit")
                .to_descriptor(&[("path", PATH_ALIASES)]),
            ToolSpec::builder("web_fetch")
                .purpose("Fetch a URL and return its text with markup stripped")
                .when_to_use("For documentation or references the user pointed at")
                .when_not_to_use("For local files — the filesystem tools are sandboxed for that")
                .parameters_for::<WebFetchArgs>()
                .example("web_fetch(url='https://example.com')", "page text, whitespace collapsed")
                .output_format("Plain text, capped at 10 MiB before stripping")
                .to_descriptor(&[]),
        ];
        Self { descriptors }
    }

    /// Descriptors in catalog order.
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    /// Look up a descriptor, resolving name aliases.
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        let canonical = canonical_tool_name(name);
        self.descriptors.iter().find(|d| d.name == canonical)
    }

    /// Whether `name` (or an alias of it) is in the catalog.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Fold alias keys into their canonical spelling on a parsed argument
/// object: every alias spelling is removed, and the first one present is
/// renamed to the canonical key unless that key was already given.
/// Unrelated unknown keys are left alone (and ignored downstream).
pub fn normalize_aliases(
    args: &mut serde_json::Map<String, serde_json::Value>,
    aliases: &[(&str, &[&str])],
) {
    for (canonical, spellings) in aliases {
        let mut first_present: Option<serde_json::Value> = None;
        for alias in *spellings {
            if let Some(value) = args.remove(*alias)
                && first_present.is_none()
            {
                first_present = Some(value);
            }
        }
        if !args.contains_key(*canonical)
            && let Some(value) = first_present
        {
            args.insert((*canonical).to_string(), value);
        }
    }
}
