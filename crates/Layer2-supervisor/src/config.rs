//! Supervisor configuration

use juggle_foundation::MonitorConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings for launching and tearing down workers
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Worker executable, invoked as `<tool> agent run <session>`
    pub tool: PathBuf,

    /// Output channel capacity
    pub output_buffer: usize,

    /// Upper bound on waiting for the process to die during cancel
    pub cancel_timeout: Duration,

    /// Idle bound for one listen poll
    pub listen_poll: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self::from(&MonitorConfig::new())
    }
}

impl From<&MonitorConfig> for SupervisorConfig {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            tool: config.tool(),
            output_buffer: config.output_buffer().max(1),
            cancel_timeout: config.cancel_timeout(),
            listen_poll: config.listen_poll(),
        }
    }
}

impl SupervisorConfig {
    pub fn with_tool(mut self, tool: impl Into<PathBuf>) -> Self {
        self.tool = tool.into();
        self
    }

    pub fn with_output_buffer(mut self, capacity: usize) -> Self {
        self.output_buffer = capacity.max(1);
        self
    }

    pub fn with_cancel_timeout(mut self, timeout: Duration) -> Self {
        self.cancel_timeout = timeout;
        self
    }

    pub fn with_listen_poll(mut self, poll: Duration) -> Self {
        self.listen_poll = poll;
        self
    }
}
