//! iptables fault controller
//!
//! Rules target the database's return traffic: packets arriving on the
//! configured chain with the database port as their *source* port.
//!
//! | operation          | arguments                                                                  |
//! |--------------------|----------------------------------------------------------------------------|
//! | clear              | `-F`                                                                       |
//! | hard block         | `-A <chain> -p <proto> --sport <port> -j REJECT`                           |
//! | probabilistic drop | `-A <chain> -p <proto> --sport <port> -m statistic --mode random --probability <p> -j DROP` |
//!
//! Each command is awaited to completion before the call returns.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};
use txchaos_core::{FaultController, FaultError, FaultsConfig};

/// Drives an iptables-compatible binary
#[derive(Debug, Clone)]
pub struct IptablesFaultController {
    command: String,
    chain: String,
    protocol: String,
    port: u16,
}

impl IptablesFaultController {
    /// Create a controller from the `[faults]` config section.
    pub fn new(config: &FaultsConfig) -> Self {
        Self {
            command: config.command.clone(),
            chain: config.chain.clone(),
            protocol: config.protocol.clone(),
            port: config.port,
        }
    }

    /// Arguments that flush every rule.
    pub fn clear_args(&self) -> Vec<String> {
        vec!["-F".to_string()]
    }

    fn match_args(&self) -> Vec<String> {
        vec![
            "-A".to_string(),
            self.chain.clone(),
            "-p".to_string(),
            self.protocol.clone(),
            "--sport".to_string(),
            self.port.to_string(),
        ]
    }

    /// Arguments that reject all return traffic.
    pub fn hard_block_args(&self) -> Vec<String> {
        let mut args = self.match_args();
        args.extend(["-j", "REJECT"].map(String::from));
        args
    }

    /// Arguments that drop return traffic with the given probability.
    pub fn drop_args(&self, probability: f64) -> Result<Vec<String>, FaultError> {
        if !(probability > 0.0 && probability <= 1.0) {
            return Err(FaultError::InvalidRule(format!(
                "drop probability must be in (0, 1], got {}",
                probability
            )));
        }
        let mut args = self.match_args();
        args.extend(["-m", "statistic", "--mode", "random", "--probability"].map(String::from));
        args.push(probability.to_string());
        args.extend(["-j", "DROP"].map(String::from));
        Ok(args)
    }

    fn command_line(&self, args: &[String]) -> String {
        format!("{} {}", self.command, args.join(" "))
    }

    async fn run(&self, args: Vec<String>) -> Result<(), FaultError> {
        let command = self.command_line(&args);
        debug!(target: "txchaos::faults", %command, "running");

        let output = Command::new(&self.command)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| FaultError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(FaultError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        info!(target: "txchaos::faults", %command, "rule command applied");
        Ok(())
    }
}

#[async_trait]
impl FaultController for IptablesFaultController {
    async fn clear_rules(&self) -> Result<(), FaultError> {
        self.run(self.clear_args()).await
    }

    async fn install_hard_block(&self) -> Result<(), FaultError> {
        self.run(self.hard_block_args()).await
    }

    async fn install_probabilistic_drop(&self, probability: f64) -> Result<(), FaultError> {
        let args = self.drop_args(probability)?;
        self.run(args).await
    }
}
