//! Review Command
//!
//! Ask one provider for a code review of a source file.
//!
//! Usage:
//!   crosscheck review <file> -p <provider> [--language rust] [--focus security]...

use std::path::Path;

use crate::ai::manager::CodeReviewRequest;
use crate::cli::util::{CommandContext, OutputFormat, print_json, runtime};
use crate::types::{CrossCheckError, Result};

pub struct ReviewOptions<'a> {
    pub file: &'a Path,
    pub provider: &'a str,
    pub language: Option<String>,
    pub focus: Vec<String>,
    pub severity: Option<String>,
    pub no_suggestions: bool,
    pub format: OutputFormat,
}

pub fn run(ctx: &CommandContext, options: ReviewOptions<'_>) -> Result<()> {
    let code = std::fs::read_to_string(options.file)?;
    let language = match options.language {
        Some(language) => language,
        None => language_for(options.file).ok_or_else(|| {
            CrossCheckError::InvalidInput(format!(
                "Cannot infer language of {}, pass --language",
                options.file.display()
            ))
        })?,
    };

    let mut request = CodeReviewRequest::new(code, language)
        .with_focus_areas(options.focus)
        .with_suggestions(!options.no_suggestions);
    if let Some(severity) = options.severity {
        request = request.with_severity_threshold(severity);
    }

    let rt = runtime()?;
    let response = rt.block_on(ctx.manager.code_review(&request, options.provider))?;

    if options.format.is_json() {
        print_json(&response)?;
    } else {
        println!("{}", response.content);
    }
    Ok(())
}

/// Language name from a file extension
fn language_for(path: &Path) -> Option<String> {
    let language = match path.extension()?.to_str()? {
        "rs" => "rust",
        "py" => "python",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" => "javascript",
        "go" => "go",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "rb" => "ruby",
        "c" | "h" => "c",
        "cc" | "cpp" | "hpp" | "cxx" => "cpp",
        "sh" | "bash" => "bash",
        "swift" => "swift",
        other => return Some(other.to_string()),
    };
    Some(language.to_string())
}
