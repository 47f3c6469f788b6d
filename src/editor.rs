use std::path::Path;
use std::process::Command;

use anyhow::{Context, anyhow};

use crate::git::describe_code;

pub const DEFAULT_EDITOR: &str = "vim";

/// Program and leading arguments for the editor, from `$EDITOR` or the default.
pub fn editor_command(editor_var: Option<&str>) -> (String, Vec<String>) {
    let mut parts = editor_var
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string);

    match parts.next() {
        Some(program) => (program, parts.collect()),
        None => (DEFAULT_EDITOR.to_string(), Vec::new()),
    }
}

pub fn open_in_editor(file: &Path) -> anyhow::Result<()> {
    let editor_var = std::env::var("EDITOR").ok();
    let (program, args) = editor_command(editor_var.as_deref());
    tracing::debug!(%program, ?args, file = %file.display(), "launching editor");

    let status = Command::new(&program)
        .args(&args)
        .arg(file)
        .status()
        .with_context(|| format!("couldn't launch editor {program}"))?;

    if !status.success() {
        return Err(anyhow!("editor {program} exited with {}", describe_code(&status.code())));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_EDITOR, editor_command};

    #[test]
    fn falls_back_to_default_editor() {
        assert_eq!(editor_command(None), (DEFAULT_EDITOR.to_string(), Vec::new()));
        assert_eq!(editor_command(Some("  ")).0, DEFAULT_EDITOR);
    }

    #[test]
    fn splits_editor_arguments() {
        let (program, args) = editor_command(Some("code --wait"));
        assert_eq!(program, "code");
        assert_eq!(args, vec!["--wait".to_string()]);
    }
}
