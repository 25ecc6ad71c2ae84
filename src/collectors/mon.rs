use crate::error::{CephError, CephResult};
use serde::Serialize;
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

pub const PREFIX_HEALTH:         &str = "health";
pub const PREFIX_VERSION:        &str = "version";
pub const PREFIX_POOL_LS:        &str = "osd pool ls";
pub const PREFIX_POOL_GET:       &str = "osd pool get";
pub const PREFIX_DF:             &str = "df";
pub const PREFIX_CRUSH_RULE_DUMP: &str = "osd crush rule dump";
pub const PREFIX_OSD_DF:         &str = "osd df";

/// A structured monitor command, in the shape the monitor's JSON interface takes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonRequest {
    pub prefix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool:   Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub var:    Option<String>,
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_method: Option<String>,
}

impl MonRequest {
    pub fn new(prefix: &str) -> Self {
        MonRequest {
            prefix: prefix.to_string(),
            pool:   None,
            var:    None,
            format: "json".to_string(),
            output_method: None,
        }
    }

    pub fn pool(mut self, pool: &str) -> Self {
        self.pool = Some(pool.to_string());
        self
    }

    pub fn var(mut self, var: &str) -> Self {
        self.var = Some(var.to_string());
        self
    }

    pub fn output_method(mut self, method: &str) -> Self {
        self.output_method = Some(method.to_string());
        self
    }

    pub fn to_json(&self) -> CephResult<String> {
        serde_json::to_string(self).map_err(|e| CephError::decode(&self.prefix, e))
    }

    /// Positional form for the `ceph` CLI: prefix words, then pool, var, output method.
    pub fn argv(&self) -> Vec<String> {
        let mut args: Vec<String> = self.prefix.split_whitespace().map(str::to_string).collect();
        args.extend(self.pool.iter().cloned());
        args.extend(self.var.iter().cloned());
        args.extend(self.output_method.iter().cloned());
        args
    }

    /// Short label for logs and error messages: "osd pool get rbd crush_rule".
    pub fn label(&self) -> String {
        self.argv().join(" ")
    }
}

/// The monitor connection the capacity engine drives.
pub trait MonTransport {
    fn connect(&mut self) -> CephResult<()>;
    /// Run one command and return the raw JSON reply.
    fn mon_command(&self, req: &MonRequest) -> CephResult<Vec<u8>>;
    fn shutdown(&mut self);
}

/// Talks to the cluster through the `ceph` admin binary.
#[derive(Debug, Clone)]
pub struct CephCli {
    bin:  String,
    conf: PathBuf,
    user: String,
}

impl CephCli {
    pub fn new(bin: impl Into<String>, conf: PathBuf, user: impl Into<String>) -> Self {
        CephCli { bin: bin.into(), conf, user: user.into() }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.arg("--conf").arg(&self.conf);
        // "client.admin" is a full entity name, "admin" a bare id
        if self.user.contains('.') {
            cmd.arg("--name").arg(&self.user);
        } else {
            cmd.arg("--id").arg(&self.user);
        }
        cmd.args(["--format", "json"]);
        cmd
    }
}

impl MonTransport for CephCli {
    fn connect(&mut self) -> CephResult<()> {
        if !self.conf.is_file() {
            return Err(CephError::Transport(format!(
                "cluster config {} not readable", self.conf.display()
            )));
        }
        debug!(conf = %self.conf.display(), user = %self.user, "connect");
        self.mon_command(&MonRequest::new(PREFIX_HEALTH)).map(|_| ())
    }

    fn mon_command(&self, req: &MonRequest) -> CephResult<Vec<u8>> {
        let request = req.to_json()?;
        debug!(%request, "mon command");
        let out = self.command()
            .args(req.argv())
            .output()
            .map_err(|e| CephError::Transport(format!("{} not runnable: {}", self.bin, e)))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(CephError::Transport(format!(
                "`{}` failed ({}): {}", req.label(), out.status, stderr.trim()
            )));
        }
        Ok(out.stdout)
    }

    fn shutdown(&mut self) {
        debug!("disconnect");
    }
}
