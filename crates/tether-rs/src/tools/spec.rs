//! Structured tool descriptions with usage guidance.
//!
//! `ToolSpec` composes a registry description from structured metadata
//! (purpose, when to use, when not to use, usage examples, output format)
//! instead of one free-form string. The `when_not_to_use` guidance is
//! what keeps the model from confusing semantically similar tools
//! (`read_file` vs `get_file_outline`, `replace_in_file` vs `write_file`).

use crate::tools::registry::{ArgAliases, ToolDescriptor};

/// A structured tool specification.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    /// One-sentence imperative purpose.
    pub purpose: String,
    pub when_to_use: String,
    pub when_not_to_use: String,
    /// JSON Schema for the parameters.
    pub parameters: serde_json::Value,
    /// (input, expected behavior) pairs.
    pub examples: Vec<UsageExample>,
    pub output_format: String,
}

/// A usage example for a tool.
#[derive(Debug, Clone)]
pub struct UsageExample {
    pub input: String,
    pub output: String,
}

impl ToolSpec {
    pub fn builder(name: impl Into<String>) -> ToolSpecBuilder {
        ToolSpecBuilder {
            name: name.into(),
            purpose: None,
            when_to_use: None,
            when_not_to_use: None,
            parameters: None,
            examples: Vec::new(),
            output_format: None,
        }
    }

    /// Render the rich description string for the model.
    pub fn to_description(&self) -> String {
        let mut desc = format!("{}.", self.purpose);
        desc.push_str(&format!("\nWhen to use: {}", self.when_to_use));
        desc.push_str(&format!("\nWhen NOT to use: {}", self.when_not_to_use));
        if !self.examples.is_empty() {
            desc.push_str("\nExamples:");
            for example in &self.examples {
                desc.push_str(&format!("\n  - {} -> {}", example.input, example.output));
            }
        }
        if !self.output_format.is_empty() {
            desc.push_str(&format!("\nOutput format: {}", self.output_format));
        }
        desc
    }

    /// Convert to a registry descriptor with the given argument aliases.
    pub fn to_descriptor(&self, arg_aliases: ArgAliases) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: self.to_description(),
            parameters: self.parameters.clone(),
            arg_aliases,
        }
    }
}

/// Builder for [`ToolSpec`]. `build()` panics on missing required fields —
/// descriptor completeness is checked at registration time, not at call
/// time.
pub struct ToolSpecBuilder {
    name: String,
    purpose: Option<String>,
    when_to_use: Option<String>,
    when_not_to_use: Option<String>,
    parameters: Option<serde_json::Value>,
    examples: Vec<UsageExample>,
    output_format: Option<String>,
}

impl ToolSpecBuilder {
    pub fn purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    pub fn when_to_use(mut self, when: impl Into<String>) -> Self {
        self.when_to_use = Some(when.into());
        self
    }

    pub fn when_not_to_use(mut self, when_not: impl Into<String>) -> Self {
        self.when_not_to_use = Some(when_not.into());
        self
    }

    pub fn parameters(mut self, params: serde_json::Value) -> Self {
        self.parameters = Some(params);
        self
    }

    /// Derive the parameter schema from a type implementing
    /// `schemars::JsonSchema`, so the schema and the deserialization
    /// struct can never diverge.
    pub fn parameters_for<T: schemars::JsonSchema>(self) -> Self {
        self.parameters(crate::json_schema_for::<T>())
    }

    pub fn example(mut self, input: impl Into<String>, output: impl Into<String>) -> Self {
        self.examples.push(UsageExample {
            input: input.into(),
            output: output.into(),
        });
        self
    }

    pub fn output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = Some(format.into());
        self
    }

    /// Shortcut: build and convert to a descriptor in one step.
    pub fn to_descriptor(self, arg_aliases: ArgAliases) -> ToolDescriptor {
        self.build().to_descriptor(arg_aliases)
    }

    /// Build the spec. Panics if a required field is missing.
    pub fn build(self) -> ToolSpec {
        ToolSpec {
            name: self.name,
            purpose: self.purpose.expect("ToolSpec requires 'purpose'"),
            when_to_use: self.when_to_use.expect("ToolSpec requires 'when_to_use'"),
            when_not_to_use: self
                .when_not_to_use
                .expect("ToolSpec requires 'when_not_to_use'"),
            parameters: self.parameters.expect("ToolSpec requires 'parameters'"),
            examples: self.examples,
            output_format: self.output_format.unwrap_or_else(|| "Plain text".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_includes_guidance_sections() {
        let spec = ToolSpec::builder("read_file")
            .purpose("Read a bounded byte window of a file")
            .when_to_use("When you know the path and need its contents")
            .when_not_to_use("When you only need declarations — use get_file_outline")
            .parameters(serde_json::json!({"type": "object", "properties": {}}))
            .example("read_file(path='a.txt', limit=5)", "first five bytes")
            .output_format("Raw text with window notes")
            .build();

        let desc = spec.to_description();
        assert!(desc.starts_with("Read a bounded byte window of a file."));
        assert!(desc.contains("When NOT to use:"));
        assert!(desc.contains("get_file_outline"));
        assert!(desc.contains("first five bytes"));
    }

    #[test]
    fn to_descriptor_carries_schema_and_aliases() {
        let descriptor = ToolSpec::builder("demo")
            .purpose("Demonstrate")
            .when_to_use("In tests")
            .when_not_to_use("Elsewhere")
            .parameters(serde_json::json!({"type": "object", "properties": {}}))
            .to_descriptor(&[("path", &["filePath"])]);
        assert_eq!(descriptor.name, "demo");
        assert_eq!(descriptor.arg_aliases.len(), 1);
    }

    #[test]
    #[should_panic(expected = "ToolSpec requires 'purpose'")]
    fn build_panics_without_purpose() {
        ToolSpec::builder("incomplete")
            .when_to_use("t")
            .when_not_to_use("t")
            .parameters(serde_json::json!({}))
            .build();
    }
}
