use anyhow::{Context, Result};
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// `None` when the process was killed (timeout or signal).
    pub status_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == Some(0)
    }

    /// stderr, else stdout, else `fallback`, trimmed.
    pub fn error_text(&self, fallback: &str) -> String {
        [self.stderr.trim(), self.stdout.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or(fallback)
            .to_string()
    }
}

/// Subprocess seam. Sources never spawn processes directly.
pub trait CommandRunner {
    /// Err only when the process could not be run at all; a non-zero exit is
    /// an `Ok` output with a failing status.
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;

    /// Whether `program` resolves on PATH.
    fn exists(&self, program: &str) -> bool;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        (**self).run(program, args)
    }

    fn exists(&self, program: &str) -> bool {
        (**self).exists(program)
    }
}

/// Runs real processes with a wall-clock limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        debug!(program, ?args, "spawn");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        // Drain both pipes on their own threads; a full pipe would otherwise
        // block the child and turn every large listing into a timeout.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let start = Instant::now();
        let status = loop {
            match child.try_wait().with_context(|| format!("wait on {program} failed"))? {
                Some(status) => break Some(status),
                None if start.elapsed() >= self.timeout => {
                    warn!(program, timeout_secs = self.timeout.as_secs(), "subprocess timed out; killing");
                    // The child may exit between try_wait and kill.
                    let _ = child.kill();
                    let _ = child.wait();
                    break None;
                }
                None => thread::sleep(Duration::from_millis(25)),
            }
        };

        let join = |h: Option<thread::JoinHandle<String>>| h.and_then(|h| h.join().ok()).unwrap_or_default();
        let mut out = CommandOutput {
            status_code: status.and_then(|s| s.code()),
            stdout: join(stdout),
            stderr: join(stderr),
        };
        if status.is_none() {
            out.stderr = format!("{program} timed out after {}s", self.timeout.as_secs());
        }
        Ok(out)
    }

    fn exists(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

fn drain<T: Read + Send + 'static>(mut pipe: T) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Replays canned outputs keyed by the full command line and records calls.
#[cfg(test)]
pub(crate) struct ScriptedRunner {
    pub present: Vec<&'static str>,
    pub responses: std::collections::HashMap<String, CommandOutput>,
    pub calls: std::cell::RefCell<Vec<String>>,
}

#[cfg(test)]
impl ScriptedRunner {
    pub fn new(present: &[&'static str]) -> Self {
        Self {
            present: present.to_vec(),
            responses: std::collections::HashMap::new(),
            calls: std::cell::RefCell::new(Vec::new()),
        }
    }

    pub fn respond(mut self, cmdline: &str, code: i32, stdout: &str, stderr: &str) -> Self {
        self.responses.insert(
            cmdline.to_string(),
            CommandOutput {
                status_code: Some(code),
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
        );
        self
    }
}

#[cfg(test)]
impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let line = std::iter::once(program.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.borrow_mut().push(line.clone());
        self.responses
            .get(&line)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unscripted command: {line}"))
    }

    fn exists(&self, program: &str) -> bool {
        self.present.contains(&program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_text_prefers_stderr_then_stdout() {
        let mut o = CommandOutput {
            status_code: Some(1),
            stdout: " out \n".into(),
            stderr: String::new(),
        };
        assert_eq!(o.error_text("failed"), "out");
        o.stderr = "E: Unable to locate package foo\n".into();
        assert_eq!(o.error_text("failed"), "E: Unable to locate package foo");
        assert_eq!(CommandOutput::default().error_text("failed"), "failed");
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_captures_exit_status() {
        let r = SystemRunner::new(Duration::from_secs(10));
        let ok = r.run("sh", &["-c".into(), "echo hi; echo err >&2".into()]).unwrap();
        assert!(ok.success());
        assert_eq!(ok.stdout.trim(), "hi");
        assert_eq!(ok.stderr.trim(), "err");

        let bad = r.run("sh", &["-c".into(), "exit 3".into()]).unwrap();
        assert_eq!(bad.status_code, Some(3));
    }

    #[test]
    fn missing_program_is_an_error_not_a_panic() {
        let r = SystemRunner::default();
        assert!(r.run("pkc-definitely-not-a-real-binary", &[]).is_err());
        assert!(!r.exists("pkc-definitely-not-a-real-binary"));
    }
}
