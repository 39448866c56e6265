use audit_policy::Level;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "audit-gateway",
    version,
    about = "Auditing reverse proxy for a management API server"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Listen address (overrides config file setting)
    #[arg(long)]
    pub listen: Option<String>,

    /// Upstream API server address (overrides config file setting)
    #[arg(long)]
    pub upstream: Option<String>,

    /// Audit log file (overrides config file setting)
    #[arg(long)]
    pub audit_log: Option<PathBuf>,

    /// Default audit level: Null, Metadata, Request, RequestResponse or 0-3
    #[arg(long, env = "AUDIT_LEVEL")]
    pub audit_level: Option<Level>,

    /// Directory of audit policy YAML files (overrides config file setting)
    #[arg(long)]
    pub policy_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides() {
        let cli = Cli::try_parse_from([
            "audit-gateway",
            "--config",
            "/etc/audit/config.yaml",
            "--audit-level",
            "RequestResponse",
            "--policy-dir",
            "/etc/audit/policies",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("/etc/audit/config.yaml"));
        assert_eq!(cli.audit_level, Some(Level::RequestResponse));
        assert_eq!(cli.policy_dir, Some(PathBuf::from("/etc/audit/policies")));
        assert!(cli.listen.is_none());
    }

    #[test]
    fn numeric_level_is_accepted() {
        let cli = Cli::try_parse_from(["audit-gateway", "--audit-level", "2"]).unwrap();
        assert_eq!(cli.audit_level, Some(Level::Request));
    }

    #[test]
    fn unknown_level_is_rejected() {
        assert!(Cli::try_parse_from(["audit-gateway", "--audit-level", "verbose"]).is_err());
    }
}
