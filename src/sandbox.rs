//! Sandboxed execution engine.
//!
//! Every run gets a fresh disposable workspace (cleaned up by RAII on all
//! exit paths), a wall-clock timeout that force-kills the whole process
//! group, and an address-space ceiling applied in the child before exec.
//! Compiled languages compile first; a failed compile returns a compile-time
//! outcome and the artifact is never run. Network access is simply never
//! granted: the engine only spawns the language toolchain against files in
//! the workspace.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::config::SandboxConfig;
use crate::error::RepairError;
use crate::language::Language;

/// Observable result of one sandboxed run. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process died from a signal or was killed on timeout.
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
    pub timed_out: bool,
    pub out_of_memory: bool,
}

impl ExecutionOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out && !self.out_of_memory
    }
}

/// Seam for executing a source unit. The production implementation is
/// [`ProcessSandbox`]; tests script outcomes through this trait to exercise
/// the scorer and controller without real interpreters.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run `source` as `language`. `stdin` is fed to the process when given,
    /// otherwise the child's stdin is closed.
    async fn execute(
        &self,
        source: &str,
        language: Language,
        stdin: Option<&str>,
    ) -> Result<ExecutionOutcome, RepairError>;
}

/// Subprocess-based sandbox with per-session toolchain probing.
pub struct ProcessSandbox {
    config: SandboxConfig,
    probed: Mutex<HashMap<Language, bool>>,
}

impl ProcessSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            probed: Mutex::new(HashMap::new()),
        }
    }

    /// Whether the language's toolchain binary can be spawned at all. The
    /// result is cached for the session; exit status is ignored on purpose
    /// (`go --version` exits nonzero yet proves the toolchain exists).
    pub async fn toolchain_available(&self, language: Language) -> bool {
        if let Some(&known) = self.probed.lock().expect("probe cache").get(&language) {
            return known;
        }
        let spawned = Command::new(language.toolchain())
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();
        let available = match spawned {
            Ok(mut child) => {
                let _ = tokio::time::timeout(Duration::from_secs(2), child.wait()).await;
                true
            }
            Err(_) => false,
        };
        self.probed
            .lock()
            .expect("probe cache")
            .insert(language, available);
        available
    }
}

#[async_trait]
impl Executor for ProcessSandbox {
    async fn execute(
        &self,
        source: &str,
        language: Language,
        stdin: Option<&str>,
    ) -> Result<ExecutionOutcome, RepairError> {
        if !self.toolchain_available(language).await {
            return Err(RepairError::Configuration {
                language: language.name().to_string(),
                detail: format!("toolchain not found: {}", language.toolchain()),
            });
        }

        // TempDir cleans the workspace on every exit path, including errors.
        let workspace = tempfile::tempdir()?;
        let source_path = workspace.path().join(language.source_file_name(source));
        tokio::fs::write(&source_path, source).await?;

        let artifact = workspace.path().join("program");
        if let Some(compile_argv) = language.compile_command(&source_path, &artifact) {
            debug!(language = %language, "compiling in sandbox");
            let compile_outcome = run_bounded(
                &compile_argv,
                workspace.path(),
                None,
                self.config.compile_time_limit,
                None,
            )
            .await?;
            if !compile_outcome.success() {
                // Compile-time outcome: the artifact is never run.
                return Ok(compile_outcome);
            }
        }

        let run_target = if language.is_compiled() {
            artifact
        } else {
            source_path
        };
        let argv = language.run_command(&run_target, source);
        debug!(language = %language, "running in sandbox");
        run_bounded(
            &argv,
            workspace.path(),
            stdin,
            self.config.time_limit,
            Some(self.config.memory_limit),
        )
        .await
    }
}

/// Spawn `argv` in `cwd` with the given bounds and wait for it.
///
/// The child is placed in its own process group so a timeout can kill the
/// whole tree, not just the direct child. The memory ceiling is installed
/// via `setrlimit` between fork and exec, matching the per-run isolation the
/// rest of the pipeline assumes.
async fn run_bounded(
    argv: &[String],
    cwd: &Path,
    stdin_data: Option<&str>,
    time_limit: Duration,
    memory_limit: Option<u64>,
) -> Result<ExecutionOutcome, RepairError> {
    let start = Instant::now();
    let mut cmd = Command::new(&argv[0]);
    cmd.args(&argv[1..])
        .current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd.stdin(if stdin_data.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });

    #[cfg(unix)]
    {
        cmd.process_group(0);
        if let Some(limit) = memory_limit {
            let limit = limit as libc::rlim_t;
            unsafe {
                cmd.pre_exec(move || {
                    let mem = libc::rlimit {
                        rlim_cur: limit,
                        rlim_max: limit,
                    };
                    libc::setrlimit(libc::RLIMIT_AS, &mem);
                    let core = libc::rlimit {
                        rlim_cur: 0,
                        rlim_max: 0,
                    };
                    libc::setrlimit(libc::RLIMIT_CORE, &core);
                    Ok(())
                });
            }
        }
    }

    let mut child = cmd.spawn()?;
    let pid = child.id();

    if let Some(data) = stdin_data {
        if let Some(mut pipe) = child.stdin.take() {
            use tokio::io::AsyncWriteExt;
            let bytes = data.as_bytes().to_vec();
            // Feed input and close the pipe; a program that never reads it
            // must not block us.
            tokio::spawn(async move {
                let _ = pipe.write_all(&bytes).await;
                let _ = pipe.shutdown().await;
            });
        }
    }

    match tokio::time::timeout(time_limit, child.wait_with_output()).await {
        Ok(output) => {
            let output = output?;
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            let out_of_memory = memory_limit.is_some() && detect_oom(&stderr, &output.status);
            Ok(ExecutionOutcome {
                stdout,
                stderr,
                exit_code: output.status.code(),
                elapsed: start.elapsed(),
                timed_out: false,
                out_of_memory,
            })
        }
        Err(_) => {
            // Dropping the wait future reaps the direct child via
            // kill_on_drop; killing the group takes any grandchildren too.
            kill_process_group(pid);
            Ok(ExecutionOutcome {
                stdout: String::new(),
                stderr: format!("execution timed out after {:.1}s", time_limit.as_secs_f64()),
                exit_code: None,
                elapsed: start.elapsed(),
                timed_out: true,
                out_of_memory: false,
            })
        }
    }
}

fn kill_process_group(pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        unsafe {
            libc::killpg(pid as libc::pid_t, libc::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    let _ = pid;
}

/// Whether an execution died of the memory ceiling. RLIMIT_AS surfaces
/// differently per runtime (Python raises MemoryError, C++ throws
/// std::bad_alloc, the JVM reports OutOfMemoryError, raw allocators abort),
/// so this checks the known stderr markers plus a SIGKILL exit.
fn detect_oom(stderr: &str, status: &std::process::ExitStatus) -> bool {
    const MARKERS: [&str; 5] = [
        "MemoryError",
        "std::bad_alloc",
        "OutOfMemoryError",
        "cannot allocate memory",
        "out of memory",
    ];
    if MARKERS.iter().any(|marker| stderr.contains(marker)) {
        return true;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if status.signal() == Some(libc::SIGKILL) {
            return true;
        }
    }
    #[cfg(not(unix))]
    let _ = status;
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> ProcessSandbox {
        ProcessSandbox::new(SandboxConfig::default())
    }

    #[test]
    fn success_requires_clean_exit_and_no_flags() {
        let mut outcome = ExecutionOutcome {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: Some(0),
            elapsed: Duration::from_millis(1),
            timed_out: false,
            out_of_memory: false,
        };
        assert!(outcome.success());
        outcome.timed_out = true;
        assert!(!outcome.success());
        outcome.timed_out = false;
        outcome.exit_code = Some(1);
        assert!(!outcome.success());
        outcome.exit_code = None;
        assert!(!outcome.success());
    }

    #[test]
    fn oom_markers_recognized() {
        let clean = std::process::Command::new("true").status();
        if let Ok(status) = clean {
            assert!(detect_oom("MemoryError: out of it", &status));
            assert!(detect_oom("terminate called after throwing an instance of 'std::bad_alloc'", &status));
            assert!(!detect_oom("IndexError: list index out of range", &status));
        }
    }

    #[tokio::test]
    async fn python_success_captures_stdout() {
        let sandbox = sandbox();
        if !sandbox.toolchain_available(Language::Python).await {
            return; // toolchain not present in this environment
        }
        let outcome = sandbox
            .execute("print('hello sandbox')", Language::Python, None)
            .await
            .unwrap();
        assert!(outcome.success());
        assert!(outcome.stdout.contains("hello sandbox"));
        assert!(outcome.stderr.is_empty());
    }

    #[tokio::test]
    async fn python_failure_captures_traceback() {
        let sandbox = sandbox();
        if !sandbox.toolchain_available(Language::Python).await {
            return;
        }
        let outcome = sandbox
            .execute("xs = [1]\nprint(xs[5])", Language::Python, None)
            .await
            .unwrap();
        assert!(!outcome.success());
        assert!(outcome.stderr.contains("IndexError"));
        assert!(!outcome.timed_out);
    }

    #[tokio::test]
    async fn infinite_loop_is_force_killed() {
        let sandbox = ProcessSandbox::new(SandboxConfig {
            time_limit: Duration::from_millis(400),
            ..SandboxConfig::default()
        });
        if !sandbox.toolchain_available(Language::Python).await {
            return;
        }
        let started = Instant::now();
        let outcome = sandbox
            .execute("while True:\n    pass", Language::Python, None)
            .await
            .unwrap();
        assert!(outcome.timed_out);
        assert!(!outcome.success());
        // Killed promptly, not left hanging
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn stdin_is_fed_to_the_program() {
        let sandbox = sandbox();
        if !sandbox.toolchain_available(Language::Python).await {
            return;
        }
        let outcome = sandbox
            .execute(
                "import sys\nprint(sys.stdin.read().strip().upper())",
                Language::Python,
                Some("quiet\n"),
            )
            .await
            .unwrap();
        assert!(outcome.success());
        assert!(outcome.stdout.contains("QUIET"));
    }
}
