//! Workspace file tools
//!
//! Each operation resolves its path through the [`Sandbox`] before touching
//! the filesystem. Failures come back as error text, never as `Err`.

use super::edit::apply_edit;
use super::input::{EditFileInput, GrepInput, ReadFileInput, WriteInput};
use super::sandbox::Sandbox;
use super::ToolOutput;
use chrono::{DateTime, Local};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

fn resolve(sandbox: &Sandbox, path: &str) -> Result<PathBuf, ToolOutput> {
    sandbox
        .resolve(path)
        .map_err(|violation| ToolOutput::error(violation.to_string()))
}

fn io_error(e: &std::io::Error) -> ToolOutput {
    ToolOutput::error(format!("Error: {e}"))
}

/// Resolve a path that must name an existing regular file
async fn existing_file(sandbox: &Sandbox, path: &str) -> Result<PathBuf, ToolOutput> {
    let resolved = resolve(sandbox, path)?;
    match fs::metadata(&resolved).await {
        Err(_) => Err(ToolOutput::error(format!("Error: file does not exist: {path}"))),
        Ok(meta) if !meta.is_file() => {
            Err(ToolOutput::error(format!("Error: not a file: {path}")))
        }
        Ok(_) => Ok(resolved),
    }
}

pub async fn read_file(sandbox: &Sandbox, input: ReadFileInput) -> ToolOutput {
    let resolved = match existing_file(sandbox, &input.path).await {
        Ok(p) => p,
        Err(out) => return out,
    };
    let content = match fs::read_to_string(&resolved).await {
        Ok(c) => c,
        Err(e) => return io_error(&e),
    };

    if input.offset.is_none() && input.limit.is_none() {
        return ToolOutput::success(content);
    }

    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let total = lines.len();
    let start = input.offset.unwrap_or(0);
    let end = match input.limit {
        Some(limit) if limit > 0 => start.saturating_add(limit),
        _ => total,
    };
    let window: String = lines
        .iter()
        .skip(start)
        .take(end.saturating_sub(start))
        .copied()
        .collect();

    ToolOutput::success(format!(
        "[{}: lines {}-{} / {total}]\n{window}",
        input.path,
        start + 1,
        end.min(total)
    ))
}

pub async fn write_file(sandbox: &Sandbox, input: WriteInput) -> ToolOutput {
    let resolved = match resolve(sandbox, &input.path) {
        Ok(p) => p,
        Err(out) => return out,
    };
    if let Some(parent) = resolved.parent() {
        if let Err(e) = fs::create_dir_all(parent).await {
            return io_error(&e);
        }
    }
    match fs::write(&resolved, input.content.as_bytes()).await {
        Ok(()) => ToolOutput::success(format!("Wrote {}", input.path)),
        Err(e) => io_error(&e),
    }
}

pub async fn append_file(sandbox: &Sandbox, input: WriteInput) -> ToolOutput {
    let resolved = match resolve(sandbox, &input.path) {
        Ok(p) => p,
        Err(out) => return out,
    };
    if let Some(parent) = resolved.parent() {
        if let Err(e) = fs::create_dir_all(parent).await {
            return io_error(&e);
        }
    }
    let result = async {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&resolved)
            .await?;
        file.write_all(input.content.as_bytes()).await?;
        file.flush().await
    }
    .await;
    match result {
        Ok(()) => ToolOutput::success(format!("Appended to {}", input.path)),
        Err(e) => io_error(&e),
    }
}

pub async fn edit_file(sandbox: &Sandbox, input: EditFileInput) -> ToolOutput {
    let resolved = match existing_file(sandbox, &input.path).await {
        Ok(p) => p,
        Err(out) => return out,
    };
    let content = match fs::read_to_string(&resolved).await {
        Ok(c) => c,
        Err(e) => return io_error(&e),
    };
    let edited = match apply_edit(&content, &input.search, &input.replace) {
        Ok(edited) => edited,
        Err(e) => return ToolOutput::error(e.to_string()),
    };
    match fs::write(&resolved, edited.as_bytes()).await {
        Ok(()) => ToolOutput::success(format!("Edited {}", input.path)),
        Err(e) => io_error(&e),
    }
}

pub async fn delete_file(sandbox: &Sandbox, path: &str) -> ToolOutput {
    let resolved = match resolve(sandbox, path) {
        Ok(p) => p,
        Err(out) => return out,
    };
    if resolved == sandbox.root() {
        return ToolOutput::error("Error: the workspace root cannot be deleted");
    }
    let meta = match fs::symlink_metadata(&resolved).await {
        Ok(meta) => meta,
        Err(_) => return ToolOutput::error(format!("Error: file does not exist: {path}")),
    };
    if meta.is_dir() {
        match fs::remove_dir(&resolved).await {
            Ok(()) => ToolOutput::success(format!("Deleted directory {path}")),
            Err(e) => io_error(&e),
        }
    } else {
        match fs::remove_file(&resolved).await {
            Ok(()) => ToolOutput::success(format!("Deleted {path}")),
            Err(e) => io_error(&e),
        }
    }
}

pub async fn list_files(sandbox: &Sandbox, path: &str) -> ToolOutput {
    let resolved = match resolve(sandbox, path) {
        Ok(p) => p,
        Err(out) => return out,
    };
    match fs::metadata(&resolved).await {
        Err(_) => return ToolOutput::error(format!("Error: directory does not exist: {path}")),
        Ok(meta) if !meta.is_dir() => {
            return ToolOutput::error(format!("Error: not a directory: {path}"))
        }
        Ok(_) => {}
    }

    let mut entries = Vec::new();
    let mut reader = match fs::read_dir(&resolved).await {
        Ok(r) => r,
        Err(e) => return io_error(&e),
    };
    loop {
        match reader.next_entry().await {
            Ok(Some(entry)) => {
                let mut name = entry.file_name().to_string_lossy().into_owned();
                if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                    name.push('/');
                }
                entries.push(name);
            }
            Ok(None) => break,
            Err(e) => return io_error(&e),
        }
    }

    if entries.is_empty() {
        return ToolOutput::success("(empty directory)");
    }
    entries.sort();
    ToolOutput::success(entries.join("\n"))
}

pub async fn mkdir(sandbox: &Sandbox, path: &str) -> ToolOutput {
    let resolved = match resolve(sandbox, path) {
        Ok(p) => p,
        Err(out) => return out,
    };
    match fs::create_dir_all(&resolved).await {
        Ok(()) => ToolOutput::success(format!("Created directory {path}")),
        Err(e) => io_error(&e),
    }
}

pub async fn grep_file(sandbox: &Sandbox, input: GrepInput) -> ToolOutput {
    let resolved = match existing_file(sandbox, &input.path).await {
        Ok(p) => p,
        Err(out) => return out,
    };
    let content = match fs::read_to_string(&resolved).await {
        Ok(c) => c,
        Err(e) => return io_error(&e),
    };

    let matches: Vec<String> = content
        .lines()
        .enumerate()
        .filter(|(_, line)| line.contains(input.pattern.as_str()))
        .map(|(i, line)| format!("{}: {line}", i + 1))
        .collect();

    if matches.is_empty() {
        ToolOutput::success(format!("Pattern '{}' not found", input.pattern))
    } else {
        ToolOutput::success(matches.join("\n"))
    }
}

pub async fn file_info(sandbox: &Sandbox, path: &str) -> ToolOutput {
    let resolved = match resolve(sandbox, path) {
        Ok(p) => p,
        Err(out) => return out,
    };
    let Ok(meta) = fs::metadata(&resolved).await else {
        return ToolOutput::error(format!("Error: file does not exist: {path}"));
    };
    let modified = meta.modified().map_or_else(
        |_| "unknown".to_string(),
        |time| {
            DateTime::<Local>::from(time)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        },
    );

    if meta.is_dir() {
        return ToolOutput::success(format!(
            "Path: {path}\nType: directory\nModified: {modified}"
        ));
    }

    let lines = match fs::read_to_string(&resolved).await {
        Ok(content) => content.lines().count().to_string(),
        // Binary files have a size but no meaningful line count
        Err(_) => "n/a".to_string(),
    };
    ToolOutput::success(format!(
        "Path: {path}\nSize: {} bytes\nLines: {lines}\nModified: {modified}",
        meta.len()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::sandbox::SandboxViolation;

    fn setup() -> (tempfile::TempDir, Sandbox) {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(dir.path().join("workspace")).unwrap();
        (dir, sandbox)
    }

    fn write_input(path: &str, content: &str) -> WriteInput {
        WriteInput {
            path: path.into(),
            content: content.into(),
        }
    }

    fn edit_input(search: &str, replace: &str) -> EditFileInput {
        EditFileInput {
            path: "doc.txt".into(),
            search: search.into(),
            replace: replace.into(),
        }
    }

    #[tokio::test]
    async fn test_write_then_read_window() {
        let (_dir, sandbox) = setup();
        let out = write_file(&sandbox, write_input("notes/a.txt", "l1\nl2\nl3\nl4\n")).await;
        assert!(out.success, "{}", out.output);

        let out = read_file(
            &sandbox,
            ReadFileInput {
                path: "notes/a.txt".into(),
                offset: Some(1),
                limit: Some(2),
            },
        )
        .await;
        assert_eq!(out.output, "[notes/a.txt: lines 2-3 / 4]\nl2\nl3\n");

        let out = read_file(
            &sandbox,
            ReadFileInput {
                path: "notes/a.txt".into(),
                offset: None,
                limit: None,
            },
        )
        .await;
        assert_eq!(out.output, "l1\nl2\nl3\nl4\n");
    }

    #[tokio::test]
    async fn test_append_creates_and_extends() {
        let (_dir, sandbox) = setup();
        append_file(&sandbox, write_input("log.txt", "a")).await;
        append_file(&sandbox, write_input("log.txt", "b")).await;
        let content = std::fs::read_to_string(sandbox.root().join("log.txt")).unwrap();
        assert_eq!(content, "ab");
    }

    #[tokio::test]
    async fn test_edit_occurrence_counts() {
        let (_dir, sandbox) = setup();
        let path = sandbox.root().join("doc.txt");
        std::fs::write(&path, "alpha beta beta").unwrap();

        let out = edit_file(&sandbox, edit_input("gamma", "x")).await;
        assert!(!out.success);
        assert_eq!(std::fs::read(&path).unwrap(), b"alpha beta beta");

        let out = edit_file(&sandbox, edit_input("beta", "x")).await;
        assert!(!out.success);
        assert!(out.output.contains("2 times"));
        assert_eq!(std::fs::read(&path).unwrap(), b"alpha beta beta");

        let out = edit_file(&sandbox, edit_input("alpha", "omega")).await;
        assert!(out.success, "{}", out.output);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "omega beta beta");
    }

    #[tokio::test]
    async fn test_escape_attempts_leave_filesystem_unchanged() {
        let (dir, sandbox) = setup();
        let victim = dir.path().join("victim.txt");
        std::fs::write(&victim, "keep").unwrap();
        let violation = SandboxViolation.to_string();

        let outputs = vec![
            write_file(&sandbox, write_input("../victim.txt", "pwned")).await,
            append_file(&sandbox, write_input("../victim.txt", "pwned")).await,
            delete_file(&sandbox, "../victim.txt").await,
            mkdir(&sandbox, "../escape_dir").await,
            list_files(&sandbox, "..").await,
            file_info(&sandbox, "../victim.txt").await,
            edit_file(
                &sandbox,
                EditFileInput {
                    path: "../victim.txt".into(),
                    search: "keep".into(),
                    replace: "pwned".into(),
                },
            )
            .await,
            grep_file(
                &sandbox,
                GrepInput {
                    path: "../victim.txt".into(),
                    pattern: "keep".into(),
                },
            )
            .await,
            read_file(
                &sandbox,
                ReadFileInput {
                    path: "../../etc/passwd".into(),
                    offset: None,
                    limit: None,
                },
            )
            .await,
        ];
        for out in outputs {
            assert!(!out.success);
            assert_eq!(out.output, violation);
        }
        assert_eq!(std::fs::read_to_string(&victim).unwrap(), "keep");
        assert!(!dir.path().join("escape_dir").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_escape_leaves_target_unchanged() {
        let (dir, sandbox) = setup();
        let outside = dir.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        std::fs::write(outside.join("secret.txt"), "secret").unwrap();
        std::os::unix::fs::symlink(&outside, sandbox.root().join("link")).unwrap();

        let out = write_file(&sandbox, write_input("link/secret.txt", "pwned")).await;
        assert_eq!(out.output, SandboxViolation.to_string());
        let out = edit_file(
            &sandbox,
            EditFileInput {
                path: "link/secret.txt".into(),
                search: "secret".into(),
                replace: "pwned".into(),
            },
        )
        .await;
        assert_eq!(out.output, SandboxViolation.to_string());
        assert_eq!(
            std::fs::read_to_string(outside.join("secret.txt")).unwrap(),
            "secret"
        );
    }

    #[tokio::test]
    async fn test_list_grep_info_delete() {
        let (_dir, sandbox) = setup();
        assert_eq!(list_files(&sandbox, ".").await.output, "(empty directory)");

        mkdir(&sandbox, "sub/inner").await;
        write_file(&sandbox, write_input("b.txt", "one\ntwo needle\nthree needle")).await;

        assert_eq!(list_files(&sandbox, ".").await.output, "b.txt\nsub/");

        let grep = grep_file(
            &sandbox,
            GrepInput {
                path: "b.txt".into(),
                pattern: "needle".into(),
            },
        )
        .await;
        assert_eq!(grep.output, "2: two needle\n3: three needle");

        let info = file_info(&sandbox, "b.txt").await;
        assert!(info.output.contains("Lines: 3"));
        assert!(file_info(&sandbox, "sub").await.output.contains("Type: directory"));

        let out = delete_file(&sandbox, "sub").await;
        assert!(!out.success, "non-empty directory must not be deleted");
        assert!(delete_file(&sandbox, "sub/inner").await.success);
        assert!(delete_file(&sandbox, "b.txt").await.success);
        assert!(!delete_file(&sandbox, ".").await.success);
        assert!(sandbox.root().exists());
    }
}
