//! Project scaffolding: one prompt template and one output schema per
//! built-in task family.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};

use crate::constants::layout;
use crate::types::{Result, TaskFamily};

/// Write templates under `<project>/prompts` and schemas under
/// `<project>/schemas`. Existing files are kept unless `force` is set.
pub fn write_defaults(project_dir: &Path, force: bool) -> Result<Vec<PathBuf>> {
    let prompt_dir = project_dir.join("prompts");
    let schema_dir = project_dir.join("schemas");
    fs::create_dir_all(&prompt_dir)?;
    fs::create_dir_all(&schema_dir)?;

    let mut written = Vec::new();
    for family in TaskFamily::BUILTIN {
        let template_path = prompt_dir.join(format!(
            "{}_{}.{}",
            family,
            layout::TEMPLATE_VERSION,
            layout::TEMPLATE_EXT
        ));
        if force || !template_path.exists() {
            fs::write(&template_path, default_template(family))?;
            written.push(template_path);
        }

        let schema_path = schema_dir.join(format!("{}{}", family, layout::SCHEMA_SUFFIX));
        if force || !schema_path.exists() {
            fs::write(
                &schema_path,
                serde_json::to_string_pretty(&default_schema(family))?,
            )?;
            written.push(schema_path);
        }
    }
    Ok(written)
}

/// Prompt template for a built-in family
pub fn default_template(family: &str) -> String {
    let (role, shape) = match family {
        TaskFamily::BUG_TRIAGE => (
            "You triage software defects from reports, logs and stack traces.",
            r#"{"summary": str, "severity": "low"|"medium"|"high"|"critical", "suspected_cause": str, "next_steps": [str]}"#,
        ),
        TaskFamily::CODE_ASSIST => (
            "You write and modify source code.",
            r#"{"summary": str, "language": str, "code": str, "notes": [str]}"#,
        ),
        TaskFamily::DESIGN_RFC => (
            "You draft concise design documents and weigh trade-offs.",
            r#"{"title": str, "problem": str, "options": [{"name": str, "pros": [str], "cons": [str]}], "recommendation": str}"#,
        ),
        TaskFamily::EXTRACTION => (
            "You extract structured fields from unstructured text.",
            r#"{"fields": {name: value}}"#,
        ),
        TaskFamily::CREATIVE => (
            "You write engaging prose.",
            r#"{"title": str, "body": str}"#,
        ),
        _ => (
            "You answer analytical questions carefully.",
            r#"{"answer": str, "reasoning": [str], "confidence": number between 0 and 1}"#,
        ),
    };

    format!(
        "# {family} prompt, version 1\n\
         system: |\n  {role}\n\
         instructions: |\n  Respond with a single JSON object shaped as {shape}.\n  Do not wrap it in code fences or add commentary.\n\
         user: |\n  {{{{input}}}}\n"
    )
}

/// JSON Schema (draft 2020-12) for a built-in family
pub fn default_schema(family: &str) -> Value {
    let strings = json!({"type": "array", "items": {"type": "string"}});
    match family {
        TaskFamily::BUG_TRIAGE => json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "required": ["summary", "severity", "next_steps"],
            "properties": {
                "summary": {"type": "string", "minLength": 1},
                "severity": {"enum": ["low", "medium", "high", "critical"]},
                "suspected_cause": {"type": "string"},
                "next_steps": strings
            }
        }),
        TaskFamily::CODE_ASSIST => json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "required": ["summary", "code"],
            "properties": {
                "summary": {"type": "string"},
                "language": {"type": "string"},
                "code": {"type": "string", "minLength": 1},
                "notes": strings
            }
        }),
        TaskFamily::DESIGN_RFC => json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "required": ["title", "problem", "recommendation"],
            "properties": {
                "title": {"type": "string"},
                "problem": {"type": "string"},
                "options": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["name"],
                        "properties": {
                            "name": {"type": "string"},
                            "pros": strings,
                            "cons": strings
                        }
                    }
                },
                "recommendation": {"type": "string"}
            }
        }),
        TaskFamily::EXTRACTION => json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "required": ["fields"],
            "properties": {
                "fields": {"type": "object"}
            }
        }),
        TaskFamily::CREATIVE => json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "required": ["body"],
            "properties": {
                "title": {"type": "string"},
                "body": {"type": "string", "minLength": 1}
            }
        }),
        _ => json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "required": ["answer"],
            "properties": {
                "answer": {"type": "string", "minLength": 1},
                "reasoning": strings,
                "confidence": {"type": "number", "minimum": 0, "maximum": 1}
            }
        }),
    }
}
