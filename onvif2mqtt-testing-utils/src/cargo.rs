use nix::{
    sys::signal::{self, Signal},
    unistd::{self, Pid},
};
use std::{
    path::PathBuf,
    process::Stdio,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::Command,
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, info, warn};

type SharedPid = Arc<Mutex<Option<Pid>>>;
type SharedOutput = Arc<Mutex<Vec<String>>>;

/// Runs a workspace binary via `cargo run`, capturing its output.
pub struct CargoBinaryRunner {
    pid: SharedPid,
    output: SharedOutput,
    handle: Option<JoinHandle<()>>,
}

impl CargoBinaryRunner {
    pub fn new(binary: String, args: Vec<String>, env: Vec<(String, String)>) -> Self {
        let pid = SharedPid::default();
        let output = SharedOutput::default();

        let mut workspace_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        workspace_dir.pop();

        let handle = {
            let name = binary.clone();
            let pid = pid.clone();
            let output = output.clone();

            Some(tokio::spawn(async move {
                let mut process = unsafe {
                    Command::new("cargo")
                        .current_dir(workspace_dir)
                        .envs(env)
                        .arg("run")
                        .arg("--bin")
                        .arg(binary)
                        .arg("--")
                        .args(args)
                        .stdin(Stdio::null())
                        .stdout(Stdio::piped())
                        .stderr(Stdio::piped())
                        // New session so SIGINT reaches the binary, not just cargo
                        .pre_exec(|| {
                            let _ = unistd::setsid()?;
                            Ok(())
                        })
                        .spawn()
                        .expect("process should be started")
                };

                *pid.lock().unwrap() = Some(Pid::from_raw(
                    process.id().expect("process should have a PID") as i32,
                ));

                let mut stdout = BufReader::new(process.stdout.take().unwrap()).lines();
                let mut stderr = BufReader::new(process.stderr.take().unwrap()).lines();

                loop {
                    let line = tokio::select! {
                        line = stdout.next_line() => line,
                        line = stderr.next_line() => line,
                        result = process.wait() => {
                            info!("{name} exited, ok={}", result.is_ok());
                            *pid.lock().unwrap() = None;
                            break;
                        }
                    };

                    match line {
                        Ok(Some(line)) => {
                            debug!("{name}: {line}");
                            output.lock().unwrap().push(line);
                        }
                        Ok(None) => {}
                        Err(_) => break,
                    }
                }
            }))
        };

        Self {
            pid,
            output,
            handle,
        }
    }

    /// All output lines captured so far, stdout and stderr interleaved.
    pub fn output(&self) -> Vec<String> {
        self.output.lock().unwrap().clone()
    }

    /// Waits until a line containing `needle` has been printed.
    pub async fn wait_for_output(&self, needle: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        while Instant::now() < deadline {
            if self
                .output
                .lock()
                .unwrap()
                .iter()
                .any(|line| line.contains(needle))
            {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        warn!("Timeout waiting for output containing \"{needle}\"");
        false
    }

    pub fn stop(&self) {
        const EXIT_SIGNAL: Signal = Signal::SIGINT;

        if let Some(pid) = *self.pid.lock().unwrap() {
            info!("Sending {EXIT_SIGNAL} to {pid}");
            let _ = signal::kill(pid, EXIT_SIGNAL);
        }
    }

    pub async fn wait(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for CargoBinaryRunner {
    fn drop(&mut self) {
        self.stop();
    }
}
