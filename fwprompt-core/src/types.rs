//! Connection snapshots, match criteria and rule descriptors

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operand names understood by the enforcement engine
pub mod operand {
    pub const PROCESS_PATH: &str = "process.path";
    pub const PROCESS_COMMAND: &str = "process.command";
    pub const USER_ID: &str = "user.id";
    pub const DEST_PORT: &str = "dest.port";
    pub const DEST_IP: &str = "dest.ip";
    pub const DEST_HOST: &str = "dest.host";
    pub const DEST_NETWORK: &str = "dest.network";
}

/// Snapshot of an outbound connection attempt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    pub process_id: u32,
    pub process_path: String,
    #[serde(default)]
    pub process_args: Vec<String>,
    #[serde(default)]
    pub process_cwd: String,
    /// Negative when the owner is unknown
    pub user_id: i64,
    #[serde(default)]
    pub src_ip: String,
    pub dst_ip: String,
    #[serde(default)]
    pub dst_host: String,
    pub dst_port: u16,
    #[serde(default)]
    pub protocol: String,
}

impl ConnectionDescriptor {
    /// Command line as the enforcement engine sees it
    pub fn command_line(&self) -> String {
        self.process_args.join(" ")
    }

    /// Destination shown to the user: the host when known, else the IP
    pub fn destination(&self) -> &str {
        if self.dst_host.is_empty() {
            &self.dst_ip
        } else {
            &self.dst_host
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Allow,
    Deny,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Allow => "allow",
            Action::Deny => "deny",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow" => Ok(Action::Allow),
            "deny" => Ok(Action::Deny),
            other => Err(ValidationError::UnknownAction {
                value: other.to_string(),
            }),
        }
    }
}

/// How long a rule stays in force
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DurationOption {
    #[serde(rename = "once")]
    Once,
    #[serde(rename = "30s")]
    ThirtySeconds,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "until restart")]
    UntilRestart,
    #[serde(rename = "always")]
    Always,
}

/// (option, rule value, interactive label), in selector order
const DURATIONS: [(DurationOption, &str, &str); 8] = [
    (DurationOption::Once, "once", "once"),
    (DurationOption::ThirtySeconds, "30s", "30s"),
    (DurationOption::FiveMinutes, "5m", "5m"),
    (DurationOption::FifteenMinutes, "15m", "15m"),
    (DurationOption::ThirtyMinutes, "30m", "30m"),
    (DurationOption::OneHour, "1h", "1h"),
    (DurationOption::UntilRestart, "until restart", "for this session"),
    (DurationOption::Always, "always", "forever"),
];

impl DurationOption {
    /// Number of entries in the duration selector
    pub const COUNT: usize = DURATIONS.len();

    /// Option shown at selector position `index`
    pub fn from_index(index: usize) -> Option<Self> {
        DURATIONS.get(index).map(|(option, _, _)| *option)
    }

    pub fn index(self) -> usize {
        DURATIONS
            .iter()
            .position(|(option, _, _)| *option == self)
            .unwrap_or(0)
    }

    /// Value stored in a rule
    pub fn as_str(self) -> &'static str {
        DURATIONS[self.index()].1
    }

    /// Text shown in the duration selector
    pub fn label(self) -> &'static str {
        DURATIONS[self.index()].2
    }

    /// Parse a configured default; accepts both labels and rule values
    pub fn from_setting(value: &str) -> Option<Self> {
        DURATIONS
            .iter()
            .find(|(_, rule_value, label)| *label == value || *rule_value == value)
            .map(|(option, _, _)| *option)
    }

    pub fn all() -> impl Iterator<Item = DurationOption> {
        DURATIONS.iter().map(|(option, _, _)| *option)
    }
}

impl fmt::Display for DurationOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Matching mode of a criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorType {
    Simple,
    Regexp,
    Network,
    List,
}

impl OperatorType {
    pub fn as_str(self) -> &'static str {
        match self {
            OperatorType::Simple => "simple",
            OperatorType::Regexp => "regexp",
            OperatorType::Network => "network",
            OperatorType::List => "list",
        }
    }
}

impl fmt::Display for OperatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `{type, operand, data}` triple.
///
/// Field order is part of the list-operator wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    #[serde(rename = "type")]
    pub kind: OperatorType,
    pub operand: String,
    pub data: String,
}

impl Operator {
    pub fn new(kind: OperatorType, operand: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            kind,
            operand: operand.into(),
            data: data.into(),
        }
    }

    pub fn simple(operand: impl Into<String>, data: impl Into<String>) -> Self {
        Self::new(OperatorType::Simple, operand, data)
    }
}

/// Connection attribute a candidate was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    ProcPath,
    ProcArgs,
    UserId,
    DstPort,
    DstIp,
    DstHost,
    DstNetwork,
    RegexHost,
    RegexIp,
}

/// A selectable match criterion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub field: Field,
    pub label: String,
    pub operator: Operator,
}

impl Candidate {
    pub fn new(field: Field, label: impl Into<String>, operator: Operator) -> Self {
        Self {
            field,
            label: label.into(),
            operator,
        }
    }
}

/// Extra criteria combined with the primary one in advanced mode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraCriteria {
    pub dst_ip: Option<Candidate>,
    pub dst_port: Option<Candidate>,
    pub user_id: Option<Candidate>,
}

impl ExtraCriteria {
    /// Selected extras in list order, each tagged with the field it stands for
    pub(crate) fn in_order(&self) -> [(Field, Option<&Candidate>); 3] {
        [
            (Field::DstIp, self.dst_ip.as_ref()),
            (Field::DstPort, self.dst_port.as_ref()),
            (Field::UserId, self.user_id.as_ref()),
        ]
    }
}

/// Resolved outcome of a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    pub duration: DurationOption,
    pub primary: Candidate,
    pub extras: ExtraCriteria,
    pub advanced: bool,
}

impl Decision {
    /// Simple-mode decision on a single criterion
    pub fn simple(action: Action, duration: DurationOption, primary: Candidate) -> Self {
        Self {
            action,
            duration,
            primary,
            extras: ExtraCriteria::default(),
            advanced: false,
        }
    }
}

/// Persistable rule handed back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub enabled: bool,
    pub action: Action,
    pub duration: DurationOption,
    pub operator: Operator,
}
