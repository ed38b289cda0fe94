//! Turns decisions into persistable rules

use super::slug::{append_slug, slugify};
use crate::error::InvalidRule;
use crate::types::{Decision, Operator, OperatorType, Rule};
use serde::Serialize;
use serde_json::ser::Formatter;
use std::io;

/// Longest rule name produced
pub const MAX_NAME_LEN: usize = 128;

pub struct RuleBuilder;

impl RuleBuilder {
    /// Build the rule for a decision.
    ///
    /// Fails when the primary criterion, or any extra criterion that would
    /// be included, has empty data.
    ///
    /// Names look like `allow-once-simple-dest-port-443`. In advanced mode
    /// the operator becomes a `list` whose data is a JSON array of the
    /// selected extras (dst-ip, dst-port, user-id) followed by the primary
    /// criterion.
    pub fn build(decision: &Decision) -> Result<Rule, InvalidRule> {
        let primary = &decision.primary.operator;
        require_data(primary)?;

        let mode = if decision.advanced { "list" } else { "simple" };
        let base = slugify(&format!("{} {}", decision.action, decision.duration));
        let mut name = append_slug(
            &format!("{}-{}", base, mode),
            &format!("{} {}", primary.operand, primary.data),
        );
        name.truncate(MAX_NAME_LEN);

        let mut operator = primary.clone();

        if decision.advanced {
            let mut items = Vec::new();

            for (field, extra) in decision.extras.in_order() {
                let Some(extra) = extra.filter(|_| decision.primary.field != field) else {
                    continue;
                };
                require_data(&extra.operator)?;
                name = append_slug(&name, &extra.operator.data);
                items.push(extra.operator.clone());
            }

            items.push(primary.clone());
            operator = Operator {
                kind: OperatorType::List,
                operand: String::new(),
                data: encode_list(&items)?,
            };
        }

        name.truncate(MAX_NAME_LEN);

        Ok(Rule {
            name,
            enabled: true,
            action: decision.action,
            duration: decision.duration,
            operator,
        })
    }
}

/// Encode list items as the JSON array consumed by the enforcement engine.
///
/// Stored rules are compared byte for byte, so the layout is fixed:
/// `", "` and `": "` separators and non-ASCII escaped as `\uXXXX`.
pub fn encode_list(items: &[Operator]) -> Result<String, InvalidRule> {
    let mut out = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut out, RuleJsonFormatter);
    items
        .serialize(&mut ser)
        .map_err(|e| InvalidRule::ListEncoding(e.to_string()))?;
    String::from_utf8(out).map_err(|e| InvalidRule::ListEncoding(e.to_string()))
}

/// Spaced separators, ASCII-only strings
struct RuleJsonFormatter;

impl Formatter for RuleJsonFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, c) in fragment.char_indices() {
            // Printable ASCII passes through; DEL and everything above is escaped
            if (' '..='~').contains(&c) {
                continue;
            }
            writer.write_all(fragment[start..i].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = i + c.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

fn require_data(operator: &Operator) -> Result<(), InvalidRule> {
    if operator.data.is_empty() {
        return Err(InvalidRule::EmptyData {
            operand: operator.operand.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, Candidate, DurationOption, ExtraCriteria, Field};

    fn candidate(field: Field, kind: OperatorType, operand: &str, data: &str) -> Candidate {
        Candidate::new(field, "", Operator::new(kind, operand, data))
    }

    fn port(data: &str) -> Candidate {
        candidate(Field::DstPort, OperatorType::Simple, "dest.port", data)
    }

    fn ip(data: &str) -> Candidate {
        candidate(Field::DstIp, OperatorType::Simple, "dest.ip", data)
    }

    fn user(data: &str) -> Candidate {
        candidate(Field::UserId, OperatorType::Simple, "user.id", data)
    }

    fn decode(data: &str) -> Vec<serde_json::Value> {
        serde_json::from_str(data).unwrap()
    }

    #[test]
    fn test_simple_rule() {
        let decision = Decision::simple(Action::Allow, DurationOption::Once, port("443"));
        let rule = RuleBuilder::build(&decision).unwrap();

        assert!(rule.enabled);
        assert_eq!(rule.action, Action::Allow);
        assert_eq!(rule.duration, DurationOption::Once);
        assert_eq!(rule.operator, Operator::simple("dest.port", "443"));
        assert!(rule.name.starts_with("allow-once-simple-dest-port-443"));
    }

    #[test]
    fn test_name_uses_rule_duration_value() {
        let decision = Decision::simple(Action::Deny, DurationOption::UntilRestart, ip("10.0.0.1"));
        let rule = RuleBuilder::build(&decision).unwrap();
        assert_eq!(rule.name, "deny-until-restart-simple-dest-ip-10-0-0-1");
    }

    #[test]
    fn test_name_truncated() {
        let path = format!("/opt/{}", "x".repeat(300));
        let primary = candidate(Field::ProcPath, OperatorType::Simple, "process.path", &path);
        let rule = RuleBuilder::build(&Decision::simple(Action::Allow, DurationOption::Always, primary))
            .unwrap();

        assert_eq!(rule.name.len(), MAX_NAME_LEN);
        assert!(rule.name.starts_with("allow-always-simple-process-path-opt-xxx"));
        assert_eq!(rule.operator.data, path);
    }

    #[test]
    fn test_empty_data_is_invalid() {
        for advanced in [false, true] {
            let decision = Decision {
                advanced,
                ..Decision::simple(Action::Allow, DurationOption::Once, ip(""))
            };
            assert_eq!(
                RuleBuilder::build(&decision),
                Err(InvalidRule::EmptyData {
                    operand: "dest.ip".to_string()
                })
            );
        }
    }

    #[test]
    fn test_list_rule() {
        let decision = Decision {
            action: Action::Allow,
            duration: DurationOption::Once,
            primary: ip("1.2.3.4"),
            extras: ExtraCriteria {
                dst_port: Some(port("80")),
                ..Default::default()
            },
            advanced: true,
        };
        let rule = RuleBuilder::build(&decision).unwrap();

        assert_eq!(rule.operator.kind, OperatorType::List);
        assert_eq!(rule.operator.operand, "");
        assert_eq!(
            rule.operator.data,
            r#"[{"type": "simple", "operand": "dest.port", "data": "80"}, {"type": "simple", "operand": "dest.ip", "data": "1.2.3.4"}]"#
        );
        assert_eq!(rule.name, "allow-once-list-dest-ip-1-2-3-4-80");
    }

    #[test]
    fn test_list_escapes_non_ascii() {
        let primary = candidate(
            Field::ProcPath,
            OperatorType::Simple,
            "process.path",
            "/home/jürgen/app",
        );
        let decision = Decision {
            action: Action::Allow,
            duration: DurationOption::Once,
            primary,
            extras: ExtraCriteria {
                dst_port: Some(port("80")),
                ..Default::default()
            },
            advanced: true,
        };
        let rule = RuleBuilder::build(&decision).unwrap();

        assert_eq!(
            rule.operator.data,
            r#"[{"type": "simple", "operand": "dest.port", "data": "80"}, {"type": "simple", "operand": "process.path", "data": "/home/j\u00fcrgen/app"}]"#
        );
        assert!(rule.operator.data.is_ascii());
        assert_eq!(decode(&rule.operator.data)[1]["data"], "/home/jürgen/app");
        assert_eq!(rule.name, "allow-once-list-process-path-home-jurgen-app-80");
    }

    #[test]
    fn test_encode_list_escapes() {
        let items = [
            Operator::simple("process.path", "/tmp/\u{1f600}\u{7f}"),
            Operator::simple("process.command", "say \"hi\"\n"),
        ];
        assert_eq!(
            encode_list(&items).unwrap(),
            r#"[{"type": "simple", "operand": "process.path", "data": "/tmp/\ud83d\ude00\u007f"}, {"type": "simple", "operand": "process.command", "data": "say \"hi\"\n"}]"#
        );
        assert_eq!(encode_list(&[]).unwrap(), "[]");
    }

    #[test]
    fn test_list_order_and_primary_last() {
        let network = candidate(
            Field::DstNetwork,
            OperatorType::Network,
            "dest.network",
            "10.0.0.0/8",
        );
        let primary = candidate(Field::ProcPath, OperatorType::Simple, "process.path", "/bin/nc");
        let decision = Decision {
            action: Action::Deny,
            duration: DurationOption::OneHour,
            primary,
            extras: ExtraCriteria {
                dst_ip: Some(network),
                dst_port: Some(port("22")),
                user_id: Some(user("1000")),
            },
            advanced: true,
        };
        let rule = RuleBuilder::build(&decision).unwrap();

        let items = decode(&rule.operator.data);
        let operands: Vec<_> = items.iter().map(|i| i["operand"].as_str().unwrap()).collect();
        assert_eq!(operands, ["dest.network", "dest.port", "user.id", "process.path"]);
        assert_eq!(items[0]["type"], "network");
        assert_eq!(items[0]["data"], "10.0.0.0/8");
        assert_eq!(rule.name, "deny-1h-list-process-path-bin-nc-10-0-0-0-8-22-1000");
    }

    #[test]
    fn test_extra_matching_primary_field_is_skipped() {
        let decision = Decision {
            action: Action::Allow,
            duration: DurationOption::Once,
            primary: port("443"),
            extras: ExtraCriteria {
                dst_port: Some(port("443")),
                user_id: Some(user("0")),
                ..Default::default()
            },
            advanced: true,
        };
        let rule = RuleBuilder::build(&decision).unwrap();

        let items = decode(&rule.operator.data);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["operand"], "user.id");
        assert_eq!(items[1]["operand"], "dest.port");
        assert_eq!(rule.name, "allow-once-list-dest-port-443-0");
    }

    #[test]
    fn test_extras_ignored_in_simple_mode() {
        let decision = Decision {
            extras: ExtraCriteria {
                dst_port: Some(port("80")),
                ..Default::default()
            },
            ..Decision::simple(Action::Allow, DurationOption::Once, ip("1.2.3.4"))
        };
        let rule = RuleBuilder::build(&decision).unwrap();
        assert_eq!(rule.operator, Operator::simple("dest.ip", "1.2.3.4"));
        assert_eq!(rule.name, "allow-once-simple-dest-ip-1-2-3-4");
    }

    #[test]
    fn test_empty_extra_is_invalid() {
        let decision = Decision {
            action: Action::Allow,
            duration: DurationOption::Once,
            primary: ip("1.2.3.4"),
            extras: ExtraCriteria {
                user_id: Some(user("")),
                ..Default::default()
            },
            advanced: true,
        };
        assert!(matches!(
            RuleBuilder::build(&decision),
            Err(InvalidRule::EmptyData { .. })
        ));
    }

    #[test]
    fn test_advanced_without_extras() {
        let decision = Decision {
            advanced: true,
            ..Decision::simple(Action::Allow, DurationOption::Once, port("53"))
        };
        let rule = RuleBuilder::build(&decision).unwrap();
        let items = decode(&rule.operator.data);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["data"], "53");
        assert_eq!(rule.name, "allow-once-list-dest-port-53");
    }
}
