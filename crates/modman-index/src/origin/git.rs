//! Git access for tree-based index origins.
//!
//! [`GitBackend`] is the seam between the index and the version-control
//! transport. [`GitCli`] implements it by running the `git` executable.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use crate::error::{IndexError, Result};

/// Result of pulling from a remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullOutcome {
    /// URL of the remote that was fetched.
    pub fetched_from: String,
    /// HEAD before the pull.
    pub previous_head: Option<String>,
    /// HEAD after the pull.
    pub head: Option<String>,
    /// Paths left unmerged by the pull. Empty on success.
    pub conflicts: Vec<String>,
}

impl PullOutcome {
    /// Whether the merge completed without conflicts.
    pub fn is_successful(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Whether HEAD moved.
    pub fn changed(&self) -> bool {
        self.previous_head != self.head
    }
}

/// Version-control operations needed by a tree origin.
pub trait GitBackend: Send + Sync {
    /// Whether `dir` already holds a repository.
    fn is_repository(&self, dir: &Path) -> bool;

    /// Create an empty repository in `dir`.
    fn init(&self, dir: &Path) -> Result<()>;

    /// Register a remote with the default fetch refspec.
    fn add_remote(&self, dir: &Path, name: &str, url: &str) -> Result<()>;

    /// URL of a registered remote, if any.
    fn remote_url(&self, dir: &Path, name: &str) -> Result<Option<String>>;

    /// Fetch `branch` from `remote` and merge it into the current branch.
    fn pull(&self, dir: &Path, remote: &str, branch: &str) -> Result<PullOutcome>;

    /// Current HEAD commit, or `None` for an empty repository.
    fn head(&self, dir: &Path) -> Result<Option<String>>;

    /// All file paths in the tree of `rev`, `/`-separated.
    fn list_files(&self, dir: &Path, rev: &str) -> Result<Vec<String>>;

    /// Content of `path` as of `rev`, or `None` if it does not exist there.
    fn read_file(&self, dir: &Path, rev: &str, path: &str) -> Result<Option<Vec<u8>>>;

    /// Content of each of `paths` as of `rev`, in the same order.
    fn read_files(&self, dir: &Path, rev: &str, paths: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        paths.iter().map(|path| self.read_file(dir, rev, path)).collect()
    }
}

/// [`GitBackend`] that shells out to the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCli {
    /// Use `git` from `PATH`.
    pub fn new() -> Self {
        Self::with_program("git")
    }

    /// Use a specific git executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, dir: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-C")
            .arg(dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C");
        cmd
    }

    fn output(&self, dir: &Path, args: &[&str]) -> Result<Output> {
        self.command(dir)
            .args(args)
            .output()
            .map_err(|e| IndexError::Git {
                command: args.first().copied().unwrap_or_default().to_string(),
                detail: format!("could not run {}: {e}", self.program.display()),
            })
    }

    /// Run a command and fail on a non-zero exit status.
    fn run(&self, dir: &Path, args: &[&str]) -> Result<Output> {
        let output = self.output(dir, args)?;
        if !output.status.success() {
            return Err(IndexError::Git {
                command: args.join(" "),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }

    /// Feed `request` to `git cat-file --batch` and collect its output.
    fn cat_file_batch(&self, dir: &Path, request: String) -> Result<Vec<u8>> {
        let mut child = self
            .command(dir)
            .args(["cat-file", "--batch"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| batch_error(format!("could not run {}: {e}", self.program.display())))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| batch_error("stdin is not piped".to_string()))?;
        // Written from another thread so a full stdout pipe cannot stall us.
        let writer = std::thread::spawn(move || stdin.write_all(request.as_bytes()));

        let output = child
            .wait_with_output()
            .map_err(|e| batch_error(format!("waiting for git: {e}")))?;
        if !output.status.success() {
            return Err(batch_error(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        match writer.join() {
            Ok(Ok(())) => Ok(output.stdout),
            Ok(Err(e)) => Err(batch_error(format!("writing request: {e}"))),
            Err(_) => Err(batch_error("request writer panicked".to_string())),
        }
    }

    fn unmerged_paths(&self, dir: &Path) -> Result<Vec<String>> {
        let output = self.run(dir, &["diff", "--name-only", "--diff-filter=U", "-z"])?;
        Ok(split_nul(&output.stdout))
    }
}

impl GitBackend for GitCli {
    fn is_repository(&self, dir: &Path) -> bool {
        dir.join(".git").join("objects").is_dir()
    }

    fn init(&self, dir: &Path) -> Result<()> {
        self.run(dir, &["init", "--quiet"])?;
        Ok(())
    }

    fn add_remote(&self, dir: &Path, name: &str, url: &str) -> Result<()> {
        self.run(dir, &["remote", "add", name, url])?;
        Ok(())
    }

    fn remote_url(&self, dir: &Path, name: &str) -> Result<Option<String>> {
        let output = self.output(dir, &["remote", "get-url", name])?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
    }

    fn pull(&self, dir: &Path, remote: &str, branch: &str) -> Result<PullOutcome> {
        let previous_head = self.head(dir)?;
        let fetched_from = self
            .remote_url(dir, remote)?
            .unwrap_or_else(|| remote.to_string());

        let output = self.output(
            dir,
            &[
                "-c",
                "user.name=modman",
                "-c",
                "user.email=modman@localhost",
                "pull",
                "--no-rebase",
                "--no-edit",
                "--quiet",
                remote,
                branch,
            ],
        )?;

        if output.status.success() {
            return Ok(PullOutcome {
                fetched_from,
                previous_head,
                head: self.head(dir)?,
                conflicts: Vec::new(),
            });
        }

        let conflicts = self.unmerged_paths(dir)?;
        if conflicts.is_empty() {
            return Err(IndexError::Git {
                command: format!("pull {remote} {branch}"),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        // Leave the mirror at its previous HEAD so the next pull can retry.
        if let Err(e) = self.run(dir, &["merge", "--abort"]) {
            tracing::warn!(error = %e, "Could not abort conflicting merge");
        }

        Ok(PullOutcome {
            fetched_from,
            previous_head: previous_head.clone(),
            head: previous_head,
            conflicts,
        })
    }

    fn head(&self, dir: &Path) -> Result<Option<String>> {
        let output = self.output(dir, &["rev-parse", "--verify", "--quiet", "HEAD^{commit}"])?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
    }

    fn list_files(&self, dir: &Path, rev: &str) -> Result<Vec<String>> {
        let output = self.run(dir, &["ls-tree", "-r", "--name-only", "-z", rev])?;
        Ok(split_nul(&output.stdout))
    }

    fn read_file(&self, dir: &Path, rev: &str, path: &str) -> Result<Option<Vec<u8>>> {
        let listing = self.run(dir, &["ls-tree", "-z", rev, "--", path])?;
        let is_blob = split_nul(&listing.stdout)
            .iter()
            .any(|line| line.split_whitespace().nth(1) == Some("blob"));
        if !is_blob {
            return Ok(None);
        }

        let object = format!("{rev}:{path}");
        let output = self.run(dir, &["cat-file", "blob", &object])?;
        Ok(Some(output.stdout))
    }

    fn read_files(&self, dir: &Path, rev: &str, paths: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        // The batch protocol is line based.
        if paths.iter().any(|path| path.contains('\n')) {
            return paths.iter().map(|path| self.read_file(dir, rev, path)).collect();
        }

        let request: String = paths.iter().map(|path| format!("{rev}:{path}\n")).collect();
        let output = self.cat_file_batch(dir, request)?;
        parse_batch(&output, paths.len())
    }
}

fn batch_error(detail: String) -> IndexError {
    IndexError::Git {
        command: "cat-file --batch".to_string(),
        detail,
    }
}

/// Split `cat-file --batch` output into `count` answers.
///
/// Each answer is either `<object> missing` or `<sha> <type> <size>`
/// followed by the content and a newline. Only blobs count as files.
fn parse_batch(mut output: &[u8], count: usize) -> Result<Vec<Option<Vec<u8>>>> {
    let mut files = Vec::with_capacity(count);
    for _ in 0..count {
        let end = output
            .iter()
            .position(|b| *b == b'\n')
            .ok_or_else(|| batch_error("truncated output".to_string()))?;
        let header = String::from_utf8_lossy(&output[..end]).into_owned();
        output = &output[end + 1..];

        if header.ends_with(" missing") || header.ends_with(" ambiguous") {
            files.push(None);
            continue;
        }

        let mut fields = header.split(' ');
        let (Some(_), Some(kind), Some(size)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(batch_error(format!("malformed header {header:?}")));
        };
        let size: usize = size
            .parse()
            .map_err(|_| batch_error(format!("malformed header {header:?}")))?;
        if output.len() < size + 1 {
            return Err(batch_error("truncated output".to_string()));
        }

        let content = &output[..size];
        output = &output[size + 1..];
        files.push((kind == "blob").then(|| content.to_vec()));
    }
    Ok(files)
}

fn split_nul(bytes: &[u8]) -> Vec<String> {
    bytes
        .split(|b| *b == 0)
        .filter(|s| !s.is_empty())
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect()
}
