//! Build step: staging source into a workspace and compiling it
//!
//! Compiler output is captured in full rather than streamed, so the client
//! receives diagnostics as one batch before the program starts.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use crate::config::{Language, LanguageId, Placeholders};
use crate::process::{ProcessCommand, run_to_completion};
use crate::runner::CompileError;
use crate::workspace::Workspace;

/// Entry point used when the source declares no class
pub const DEFAULT_ENTRY: &str = "Main";

static PACKAGE_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*package\s+[\w.]+;").expect("valid regex"));
static PUBLIC_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"public\s+class\s+(\w+)").expect("valid regex"));
static ANY_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"class\s+(\w+)").expect("valid regex"));

/// Source code ready to be written into a workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedSource {
    /// File name inside a directory workspace; `None` when the workspace
    /// already fixes the source path
    pub file_name: Option<String>,
    /// Entry point name derived from the source
    pub entry: Option<String>,
    /// Code to write, possibly rewritten
    pub code: String,
}

/// Result of a build step
#[derive(Debug, Clone)]
pub struct CompileResult {
    /// Whether the program can be run
    pub success: bool,

    /// Compiler exit code; `None` if no compiler ran or it was killed by a signal
    pub exit_code: Option<i32>,

    /// Merged compiler output (diagnostics and warnings)
    pub output: String,

    /// The command that runs the program, when the build succeeded
    pub runnable: Option<ProcessCommand>,
}

impl CompileResult {
    /// Text to show the client for this build, if any
    ///
    /// A failed build always yields something, even when the compiler was silent.
    pub fn diagnostics(&self) -> Option<String> {
        if !self.output.is_empty() {
            return Some(self.output.clone());
        }
        if self.success {
            return None;
        }
        Some(match self.exit_code {
            Some(code) => format!("compilation failed with exit code {code}"),
            None => "compilation failed".to_owned(),
        })
    }
}

/// Prepare source code for a language's toolchain
///
/// Java requires the file to be named after its public class and cannot run
/// a single file that declares a package, so package declarations are
/// removed and the class name is extracted.
pub fn stage_source(language: LanguageId, code: &str) -> StagedSource {
    if !language.derives_entry_point() {
        return StagedSource {
            file_name: None,
            entry: None,
            code: code.to_owned(),
        };
    }

    let code = PACKAGE_DECL.replace_all(code, "").into_owned();
    let entry = java_entry_point(&code);
    StagedSource {
        file_name: Some(format!("{entry}.java")),
        entry: Some(entry),
        code,
    }
}

/// Name of the class a Java source file must be named after
fn java_entry_point(code: &str) -> String {
    PUBLIC_CLASS
        .captures(code)
        .or_else(|| ANY_CLASS.captures(code))
        .and_then(|caps| caps.get(1))
        .map_or_else(|| DEFAULT_ENTRY.to_owned(), |m| m.as_str().to_owned())
}

/// Write the staged source and build it
///
/// Interpreted languages only have their source written; the result is
/// always successful and carries the run command.
#[instrument(skip_all, fields(id = %workspace.id(), language = %workspace.language()))]
pub async fn compile(
    workspace: &mut Workspace,
    language: &Language,
    staged: &StagedSource,
) -> Result<CompileResult, CompileError> {
    let source = match &staged.file_name {
        Some(name) => workspace.file_path(name)?,
        None => workspace
            .source_path()
            .ok_or(CompileError::MissingSourcePath)?
            .to_path_buf(),
    };
    workspace.write_file(&source, staged.code.as_bytes()).await?;

    // Inside a dedicated directory, tools run there and see bare file names
    let source_arg = match (&staged.file_name, workspace.directory()) {
        (Some(name), Some(_)) => name.clone(),
        _ => path_str(&source)?.to_owned(),
    };
    let binary_arg = match workspace.binary_path() {
        Some(binary) => path_str(binary)?.to_owned(),
        None => String::new(),
    };
    let placeholders = Placeholders {
        source: &source_arg,
        binary: &binary_arg,
        entry: staged.entry.as_deref().unwrap_or(DEFAULT_ENTRY),
    };
    let working_dir = workspace.directory().map(Path::to_path_buf);

    let runnable = {
        let argv = Language::expand_command(&language.run.command, &placeholders);
        let mut command = ProcessCommand::from_argv(argv)?.envs(&language.run.env);
        if let Some(ref dir) = working_dir {
            command = command.working_dir(dir);
        }
        command
    };

    let Some(ref compile_config) = language.compile else {
        return Ok(CompileResult {
            success: true,
            exit_code: None,
            output: String::new(),
            runnable: Some(runnable),
        });
    };

    let argv = Language::expand_command(&compile_config.command, &placeholders);
    let mut command = ProcessCommand::from_argv(argv)?.envs(&compile_config.env);
    if let Some(ref dir) = working_dir {
        command = command.working_dir(dir);
    }

    let captured = run_to_completion(&command).await?;
    let success = captured.success();

    debug!(
        success,
        exit_code = ?captured.exit_code(),
        output_len = captured.output.len(),
        "compilation complete"
    );

    Ok(CompileResult {
        success,
        exit_code: captured.exit_code(),
        output: captured.output,
        runnable: success.then_some(runnable),
    })
}

fn path_str(path: &Path) -> Result<&str, CompileError> {
    path.to_str()
        .ok_or_else(|| CompileError::NonUtf8Path(path.to_path_buf()))
}
