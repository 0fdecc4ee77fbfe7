//! Per-iteration tool routing.
//!
//! Routing runs in stages until one yields a call or all give up:
//! standard inference, a strict repo-inspection re-ask on the first step
//! of repo-specific questions, a strict write re-ask on the first step of
//! mutation requests, a single-line `TOOL_CALL` text fallback for
//! mutations, and a completion probe that re-enumerates unsatisfied edit
//! targets of multi-step requests. Classification is deliberately dumb
//! (case-insensitive substring tests): it only picks prompts, never
//! semantics.

use tracing::debug;

use crate::ToolInvocation;
use crate::llm::{LlmClient, LlmError};
use crate::tools::registry::ToolRegistry;

// ── Prompts ─────────────────────────────────────────────────────────

const STANDARD_GUIDANCE: &str = "\
You are a coding agent working inside a sandboxed project. Use tools when \
they improve correctness: inspect files before describing them, run \
commands instead of guessing their output, and edit files with the \
editing tools rather than dictating changes.";

const STRICT_REPO_PROMPT: &str = "\
This question is about the repository you are working in. You must call at \
least one inspection tool (list_files or read_file) before answering. \
Select the inspection tool call to make now.";

const STRICT_MUTATION_PROMPT: &str = "\
This request asks for file changes. You must use a write-capable tool \
(write_file, replace_in_file, apply_patch, or bash) to make them. Select \
the tool call to make now.";

const TEXT_FALLBACK_PROMPT: &str = "\
Reply with exactly one line of the form:\n\
TOOL_CALL <tool_name> <json_arguments>\n\
and nothing else. No prose, no markdown, no 'Tool:' prefix.";

const COMPLETION_PROMPT: &str = "\
The request names edit targets that have not been touched yet. Make \
another tool call that addresses one of the unsatisfied targets.";

// ── Classification ──────────────────────────────────────────────────

const REPO_HINTS: &[&str] = &[
    "repo", "codebase", "src/", ".zig", "function", "file", "harness", "how does", "where is",
    "explain",
];

const MUTATION_SUBJECTS: &[&str] = &["file", "src/", ".zig"];

const MUTATION_VERBS: &[&str] = &[
    "create", "edit", "write", "modify", "update", "replace", "refactor", "add line",
];

/// Verbs whose following token names an edit target.
const TARGET_VERBS: &[&str] = &[
    "create", "edit", "write", "modify", "update", "replace", "add", "refactor",
];

/// Words that never name a target by themselves.
const GENERIC_WORDS: &[&str] = &[
    "file", "folder", "directory", "named", "name", "this", "that", "it", "the", "a", "an", "to",
    "then", "and", "with",
];

/// How a user request classifies for routing purposes.
#[derive(Clone, Debug, Default)]
pub struct RequestProfile {
    pub repo_specific: bool,
    pub mutation: bool,
    pub multi_step: bool,
    /// Lowercased tokens that must appear among touched paths before a
    /// multi-step mutation counts as complete.
    pub required_targets: Vec<String>,
}

impl RequestProfile {
    pub fn classify(user_text: &str) -> Self {
        let lower = user_text.to_lowercase();
        let repo_specific =
            lower.contains('/') || REPO_HINTS.iter().any(|hint| lower.contains(hint));
        let mutation = MUTATION_SUBJECTS.iter().any(|s| lower.contains(s))
            && MUTATION_VERBS.iter().any(|v| lower.contains(v));
        let multi_step = mutation && (lower.contains(" then ") || lower.contains(" and "));
        let required_targets = if mutation {
            required_targets(user_text)
        } else {
            Vec::new()
        };
        Self {
            repo_specific,
            mutation,
            multi_step,
            required_targets,
        }
    }
}

/// Extract required edit targets: tokens following a mutation verb (minus
/// generic words) and tokens that look like paths.
pub fn required_targets(text: &str) -> Vec<String> {
    let mut targets: Vec<String> = Vec::new();
    let mut previous = String::new();
    for raw in text.split_whitespace() {
        let token = raw.trim_matches(|c: char| c.is_ascii_punctuation());
        if token.is_empty() {
            continue;
        }
        let lower = token.to_lowercase();
        let follows_verb = TARGET_VERBS.contains(&previous.as_str());
        let generic = GENERIC_WORDS.contains(&lower.as_str());
        let path_like = token.contains('/') || token.contains('.');
        if ((follows_verb && !generic) || path_like) && !targets.contains(&lower) {
            targets.push(lower.clone());
        }
        previous = lower;
    }
    targets
}

/// Whether one touched path satisfies a target: either contains the other
/// case-insensitively, or the path's basename equals the target (with the
/// dotfile convention `.target` accepted).
pub fn target_satisfied(target: &str, touched_path: &str) -> bool {
    let path = touched_path.to_lowercase();
    let target = target.to_lowercase();
    if path.contains(&target) || target.contains(&path) {
        return true;
    }
    let basename = path.rsplit('/').next().unwrap_or(&path);
    basename == target || basename == format!(".{target}")
}

/// Targets not satisfied by any touched path.
pub fn unmet_targets(targets: &[String], touched_paths: &[String]) -> Vec<String> {
    targets
        .iter()
        .filter(|target| !touched_paths.iter().any(|p| target_satisfied(target, p)))
        .cloned()
        .collect()
}

// ── TOOL_CALL line parsing ──────────────────────────────────────────

/// Parse the single-line text-fallback protocol: accept only if the first
/// non-blank line starts with the literal `TOOL_CALL `. A `Tool:` prefix
/// is prose, not a call.
pub fn parse_tool_call_line(text: &str) -> Option<ToolInvocation> {
    let line = text.lines().find(|l| !l.trim().is_empty())?.trim();
    if line.starts_with("Tool:") || line.starts_with("tool:") {
        return None;
    }
    split_name_and_json(line.strip_prefix("TOOL_CALL ")?)
}

/// Parse every `TOOL_CALL` line of a free-text response (inline-call
/// protocol). Unknown names are filtered by the caller.
pub fn parse_inline_tool_calls(text: &str) -> Vec<ToolInvocation> {
    text.lines()
        .filter_map(|line| split_name_and_json(line.trim().strip_prefix("TOOL_CALL ")?))
        .collect()
}

/// Split `<name> <json>` on the first `{`.
fn split_name_and_json(rest: &str) -> Option<ToolInvocation> {
    let brace = rest.find('{')?;
    #[allow(clippy::string_slice)] // brace comes from find() on the same text
    let (name, json) = (rest[..brace].trim(), rest[brace..].trim());
    if name.is_empty() {
        return None;
    }
    Some(ToolInvocation::new(name, json))
}

// ── Router ──────────────────────────────────────────────────────────

/// One-shot probe flags, owned by the loop and threaded through routing.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProbeFlags {
    pub repo_probe_done: bool,
    pub mutation_probe_done: bool,
    pub completion_probe_done: bool,
}

/// Stage-based tool selection over an [`LlmClient`].
pub struct ToolRouter<'a> {
    llm: &'a dyn LlmClient,
    registry: &'a ToolRegistry,
}

impl<'a> ToolRouter<'a> {
    pub fn new(llm: &'a dyn LlmClient, registry: &'a ToolRegistry) -> Self {
        Self { llm, registry }
    }

    /// Run the routing stages for one iteration. Returns the selected call
    /// or `None` when every applicable stage declined.
    pub async fn route(
        &self,
        working_prompt: &str,
        profile: &RequestProfile,
        step: u32,
        tool_call_count: u32,
        touched_paths: &[String],
        flags: &mut ProbeFlags,
    ) -> Result<Option<ToolInvocation>, LlmError> {
        let descriptors = self.registry.descriptors();

        // Stage 1: standard routing.
        let prompt = format!("{STANDARD_GUIDANCE}\n\n{working_prompt}");
        let choice = self.llm.infer_tool_call(&prompt, descriptors, false).await?;
        if choice.call.is_some() {
            return Ok(choice.call);
        }

        // Stage 2: strict repo-inspection re-ask, first step only.
        if step == 0 && profile.repo_specific && !flags.repo_probe_done {
            flags.repo_probe_done = true;
            debug!("router: forcing repo inspection probe");
            let prompt = format!("{STRICT_REPO_PROMPT}\n\n{working_prompt}");
            let choice = self.llm.infer_tool_call(&prompt, descriptors, true).await?;
            if choice.call.is_some() {
                return Ok(choice.call);
            }
        }

        // Stage 3: strict mutation re-ask, first step only.
        if step == 0 && profile.mutation && !flags.mutation_probe_done {
            flags.mutation_probe_done = true;
            debug!("router: forcing mutation probe");
            let prompt = format!("{STRICT_MUTATION_PROMPT}\n\n{working_prompt}");
            let choice = self.llm.infer_tool_call(&prompt, descriptors, true).await?;
            if choice.call.is_some() {
                return Ok(choice.call);
            }
        }

        // Stage 4: single-line text fallback for mutations.
        if profile.mutation
            && let Some(call) = self.text_fallback(working_prompt).await?
        {
            return Ok(Some(call));
        }

        // Stage 5: completion probe for multi-step mutations with unmet
        // targets.
        if profile.multi_step && tool_call_count > 0 && !flags.completion_probe_done {
            let unmet = unmet_targets(&profile.required_targets, touched_paths);
            if !unmet.is_empty() {
                flags.completion_probe_done = true;
                debug!("router: completion probe for unmet targets {unmet:?}");
                let prompt = format!(
                    "{COMPLETION_PROMPT}\nUnsatisfied targets: {}\n\n{working_prompt}",
                    unmet.join(", ")
                );
                let choice = self.llm.infer_tool_call(&prompt, descriptors, true).await?;
                if choice.call.is_some() {
                    return Ok(choice.call);
                }
                if let Some(call) = self.text_fallback(&prompt).await? {
                    return Ok(Some(call));
                }
            }
        }

        Ok(None)
    }

    async fn text_fallback(&self, context: &str) -> Result<Option<ToolInvocation>, LlmError> {
        let prompt = format!("{TEXT_FALLBACK_PROMPT}\n\n{context}");
        let text = self.llm.query(&prompt, self.registry.descriptors()).await?;
        match parse_tool_call_line(&text) {
            Some(call) if self.registry.contains(&call.name) => Ok(Some(call)),
            Some(call) => {
                debug!("text fallback named unknown tool '{}'", call.name);
                Ok(None)
            }
            None => Ok(None),
        }
    }
}
