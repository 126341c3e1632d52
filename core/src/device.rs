use serde::{Deserialize, Serialize};
use std::process::{Command, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::CommandConfig;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Command failed: {0}")]
    CommandFailed(String),
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),
    #[error("No {0} command configured")]
    NotConfigured(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    On,
    Off,
    Unknown,
}

/// What [`apply`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Started,
    Stopped,
    Unchanged,
}

pub trait DeviceController {
    fn status(&self) -> Result<PowerState, DeviceError>;
    fn power_on(&mut self) -> Result<(), DeviceError>;
    fn power_off(&mut self) -> Result<(), DeviceError>;
    fn name(&self) -> &str;
}

/// Drives the device through user-supplied shell commands.
///
/// The status command reports ON by exiting with 1 and OFF by exiting with 0.
/// A command still running after `timeout` is killed.
#[derive(Debug, Clone)]
pub struct ShellController {
    start: String,
    stop: String,
    status: Option<String>,
    timeout: Duration,
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const POLL_INTERVAL: Duration = Duration::from_millis(20);

impl ShellController {
    pub fn new(start: impl Into<String>, stop: impl Into<String>, status: Option<String>) -> Self {
        Self {
            start: start.into(),
            stop: stop.into(),
            status,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_config(commands: &CommandConfig) -> Result<Self, DeviceError> {
        let start = commands.start.clone().ok_or(DeviceError::NotConfigured("start"))?;
        let stop = commands.stop.clone().ok_or(DeviceError::NotConfigured("stop"))?;
        Ok(Self::new(start, stop, commands.status.clone())
            .with_timeout(Duration::from_secs(commands.timeout_secs)))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn start_command(&self) -> &str {
        &self.start
    }

    pub fn stop_command(&self) -> &str {
        &self.stop
    }

    fn run(&self, cmd: &str) -> Result<ExitStatus, DeviceError> {
        debug!("Running: {}", cmd);
        let mut child = Command::new("sh").arg("-c").arg(cmd).spawn()?;
        let deadline = Instant::now().checked_add(self.timeout);

        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!("'{}' still running after {:?}, killing it", cmd, self.timeout);
                // May have exited since try_wait.
                if let Err(e) = child.kill() {
                    debug!("kill failed: {}", e);
                }
                child.wait()?;
                return Err(DeviceError::Timeout(self.timeout));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn run_checked(&self, cmd: &str) -> Result<(), DeviceError> {
        let status = self.run(cmd)?;
        if status.success() {
            Ok(())
        } else {
            Err(DeviceError::CommandFailed(format!("'{}' exited with {}", cmd, status)))
        }
    }
}

impl DeviceController for ShellController {
    fn status(&self) -> Result<PowerState, DeviceError> {
        let Some(cmd) = &self.status else {
            return Ok(PowerState::Unknown);
        };

        let state = match self.run(cmd)?.code() {
            Some(1) => PowerState::On,
            Some(0) => PowerState::Off,
            _ => PowerState::Unknown,
        };
        debug!("Status probe '{}' reports {:?}", cmd, state);
        Ok(state)
    }

    fn power_on(&mut self) -> Result<(), DeviceError> {
        info!("Turning system ON");
        self.run_checked(&self.start)
    }

    fn power_off(&mut self) -> Result<(), DeviceError> {
        info!("Turning system OFF");
        self.run_checked(&self.stop)
    }

    fn name(&self) -> &str {
        "Shell"
    }
}

/// Probes status for real but only logs the start/stop it would have run.
pub struct DryRunController {
    inner: ShellController,
    pub last_request: Option<PowerState>,
}

impl DryRunController {
    pub fn new(inner: ShellController) -> Self {
        Self {
            inner,
            last_request: None,
        }
    }
}

impl DeviceController for DryRunController {
    fn status(&self) -> Result<PowerState, DeviceError> {
        self.inner.status()
    }

    fn power_on(&mut self) -> Result<(), DeviceError> {
        info!("I would have run START command: {}", self.inner.start_command());
        self.last_request = Some(PowerState::On);
        Ok(())
    }

    fn power_off(&mut self) -> Result<(), DeviceError> {
        info!("I would have run STOP command: {}", self.inner.stop_command());
        self.last_request = Some(PowerState::Off);
        Ok(())
    }

    fn name(&self) -> &str {
        "Dry run"
    }
}

/// Brings the device to the desired state, skipping the command when the
/// status probe says it is already there.
pub fn apply(controller: &mut dyn DeviceController, should_be_on: bool) -> Result<Action, DeviceError> {
    let current = match controller.status() {
        Ok(state) => state,
        Err(e) => {
            warn!("Status probe via {} failed: {}", controller.name(), e);
            PowerState::Unknown
        }
    };

    if should_be_on {
        if current == PowerState::On {
            debug!("Already ON, nothing to do");
            return Ok(Action::Unchanged);
        }
        controller.power_on()?;
        Ok(Action::Started)
    } else {
        if current == PowerState::Off {
            debug!("Already OFF, nothing to do");
            return Ok(Action::Unchanged);
        }
        controller.power_off()?;
        Ok(Action::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &tempfile::TempDir, name: &str) -> String {
        format!("touch {}", dir.path().join(name).display())
    }

    #[test]
    fn test_status_exit_codes() {
        let status_of = |cmd: &str| ShellController::new("true", "true", Some(cmd.to_string())).status().unwrap();
        assert_eq!(status_of("exit 1"), PowerState::On);
        assert_eq!(status_of("exit 0"), PowerState::Off);
        assert_eq!(status_of("exit 3"), PowerState::Unknown);
        assert_eq!(ShellController::new("true", "true", None).status().unwrap(), PowerState::Unknown);
    }

    #[test]
    fn test_apply_starts_when_off() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = ShellController::new(touch(&dir, "started"), touch(&dir, "stopped"), Some("exit 0".into()));

        assert_eq!(apply(&mut shell, true).unwrap(), Action::Started);
        assert!(dir.path().join("started").exists());
        assert!(!dir.path().join("stopped").exists());
    }

    #[test]
    fn test_apply_skips_redundant_command() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = ShellController::new(touch(&dir, "started"), touch(&dir, "stopped"), Some("exit 1".into()));

        assert_eq!(apply(&mut shell, true).unwrap(), Action::Unchanged);
        assert!(!dir.path().join("started").exists());

        assert_eq!(apply(&mut shell, false).unwrap(), Action::Stopped);
        assert!(dir.path().join("stopped").exists());
    }

    #[test]
    fn test_apply_without_status_always_acts() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = ShellController::new(touch(&dir, "started"), touch(&dir, "stopped"), None);

        assert_eq!(apply(&mut shell, false).unwrap(), Action::Stopped);
        assert!(dir.path().join("stopped").exists());
    }

    #[test]
    fn test_failing_command_is_an_error() {
        let mut shell = ShellController::new("exit 2", "false", None);
        assert!(matches!(apply(&mut shell, true), Err(DeviceError::CommandFailed(_))));
        assert!(matches!(shell.power_off(), Err(DeviceError::CommandFailed(_))));
    }

    #[test]
    fn test_dry_run_never_invokes() {
        let dir = tempfile::tempdir().unwrap();
        let shell = ShellController::new(touch(&dir, "started"), touch(&dir, "stopped"), Some("exit 0".into()));
        let mut dry = DryRunController::new(shell);

        assert_eq!(apply(&mut dry, true).unwrap(), Action::Started);
        assert_eq!(dry.last_request, Some(PowerState::On));
        assert!(!dir.path().join("started").exists());

        assert_eq!(apply(&mut dry, false).unwrap(), Action::Unchanged);
    }

    #[test]
    fn test_hung_command_is_killed_at_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let started = Instant::now();
        let mut shell = ShellController::new(
            format!("sleep 4; {}", touch(&dir, "started")),
            "true",
            None,
        )
        .with_timeout(Duration::from_millis(100));

        let result = apply(&mut shell, true);
        assert!(matches!(result, Err(DeviceError::Timeout(_))), "{:?}", result);
        assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
        assert!(!dir.path().join("started").exists());
    }

    #[test]
    fn test_hung_status_check_counts_as_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = ShellController::new(touch(&dir, "started"), "true", Some("sleep 4".into()))
            .with_timeout(Duration::from_millis(100));

        assert_eq!(apply(&mut shell, true).unwrap(), Action::Started);
        assert!(dir.path().join("started").exists());
    }

    #[test]
    fn test_from_config_requires_start_and_stop() {
        let mut commands = CommandConfig::default();
        assert!(matches!(
            ShellController::from_config(&commands),
            Err(DeviceError::NotConfigured("start"))
        ));

        commands.start = Some("true".into());
        assert!(matches!(
            ShellController::from_config(&commands),
            Err(DeviceError::NotConfigured("stop"))
        ));

        commands.stop = Some("true".into());
        commands.timeout_secs = 5;
        let shell = ShellController::from_config(&commands).unwrap();
        assert_eq!(shell.timeout(), Duration::from_secs(5));
    }
}
