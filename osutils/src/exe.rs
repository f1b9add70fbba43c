use std::{
    io::Read,
    os::unix::process::ExitStatusExt,
    process::{Child, Command, ExitStatus, Output, Stdio},
    thread,
    time::{Duration, Instant},
};

use anyhow::{bail, Context, Error};
use log::trace;

use crate::crate_private::Sealed;

/// How often a running child is polled while waiting on its deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Extension for `std::process::Command`: run to completion under a
/// deadline and turn unsuccessful exits into errors carrying the captured
/// output. This is a sealed trait, so it cannot be implemented outside of
/// this crate.
pub trait RunWithDeadline: Sealed {
    /// Run the command, killing it once `deadline` has elapsed. Returns
    /// stdout on a successful exit; a timeout, a failure to spawn, and a
    /// non-zero exit are all ordinary errors.
    fn output_within(&mut self, deadline: Duration) -> Result<String, Error>;

    /// Render the command line for diagnostics.
    fn render_command(&self) -> String;
}

impl Sealed for Command {}

impl RunWithDeadline for Command {
    fn output_within(&mut self, deadline: Duration) -> Result<String, Error> {
        let rendered = self.render_command();
        trace!("Executing '{rendered}' with deadline {deadline:?}");

        self.stdin(Stdio::null());
        self.stdout(Stdio::piped());
        self.stderr(Stdio::piped());

        let mut child = self
            .spawn()
            .with_context(|| format!("Failed to execute: {rendered}"))?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child
                .try_wait()
                .with_context(|| format!("Failed to wait for: {rendered}"))?
            {
                break status;
            }
            if started.elapsed() >= deadline {
                child.kill().ok();
                child.wait().ok();
                bail!("'{rendered}' timed out after {deadline:?}");
            }
            thread::sleep(POLL_INTERVAL);
        };

        // Outputs here are small (disk listings, DNS answers), so the
        // pipes can be drained after exit without filling up first
        let output = collect_output(&mut child, status);
        trace!(
            "Executed '{rendered}': {}. Report:\n{}",
            explain_exit(&output.status),
            output_report(&output),
        );

        check_output(&rendered, &output)
    }

    fn render_command(&self) -> String {
        if self.get_args().count() == 0 {
            self.get_program().to_string_lossy().into()
        } else {
            format!(
                "{} {}",
                self.get_program().to_string_lossy(),
                self.get_args()
                    .map(|arg| arg.to_string_lossy())
                    .map(|arg| if arg.contains(' ') {
                        format!("'{}'", arg)
                    } else {
                        arg.into()
                    })
                    .collect::<Vec<_>>()
                    .join(" "),
            )
        }
    }
}

/// Drain the piped stdout/stderr of an exited child.
fn collect_output(child: &mut Child, status: ExitStatus) -> Output {
    let mut stdout = Vec::new();
    if let Some(mut pipe) = child.stdout.take() {
        pipe.read_to_end(&mut stdout).ok();
    }

    let mut stderr = Vec::new();
    if let Some(mut pipe) = child.stderr.take() {
        pipe.read_to_end(&mut stderr).ok();
    }

    Output {
        status,
        stdout,
        stderr,
    }
}

fn check_output(rendered: &str, output: &Output) -> Result<String, Error> {
    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).into());
    }

    match output_report(output) {
        report if !report.is_empty() => bail!(
            "'{rendered}' {}. Process output:\n{report}",
            explain_exit(&output.status)
        ),
        _ => bail!(
            "'{rendered}' {}. (No output was captured)",
            explain_exit(&output.status)
        ),
    }
}

fn explain_exit(status: &ExitStatus) -> String {
    if let Some(code) = status.code() {
        format!("exited with status: {code}")
    } else if let Some(signal) = status.signal() {
        format!("was terminated by signal: {signal}")
    } else {
        "exited with unknown status".into()
    }
}

fn output_report(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    let mut report = String::with_capacity(stdout.len() + stderr.len() + 20);

    if !stdout.is_empty() {
        report += &format!("stdout:\n{}\n", stdout);
    }

    if !stderr.is_empty() {
        if !report.is_empty() {
            report += "\n";
        }
        report += &format!("stderr:\n{}\n", stderr);
    }

    report
}
