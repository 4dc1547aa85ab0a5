// command.rs — Deterministic command parsing.
//
// The operator surface accepts a compact command grammar:
//
//   <clause> [; <clause>]...
//   clause := <verb>[!] <target> [<timeout_ms>]
//
// Verbs come from a fixed read/write table. A `!` suffix marks the step as
// approval-scoped. The optional trailing integer overrides the default step
// timeout. Examples:
//
//   "read fs://workspace/src/main.rs"
//   "read fs://workspace/a.rs; write! fs://workspace/b.rs 15000"
//
// Parsing is deterministic: the same command text always yields the same
// steps, capabilities, and flags (only the plan id and timestamp differ).

use std::collections::BTreeSet;

use crate::error::PlanError;
use crate::plan::{Plan, Step};

/// Verbs that only read. These never trigger approval gating.
const READ_VERBS: &[&str] = &["read", "list", "get", "fetch", "search", "stat"];

/// Verbs with side effects. These are the steps policy gates.
const WRITE_VERBS: &[&str] = &["write", "create", "update", "delete", "apply", "send", "post"];

/// Default per-step timeout when a clause does not specify one.
const DEFAULT_STEP_TIMEOUT_MS: u64 = 30_000;

/// Normalize command text: trim, case-fold, collapse internal whitespace.
///
/// Fingerprinting uses this so that two commands differing only in
/// formatting identify the same operation class.
pub fn normalize_command(command: &str) -> String {
    command
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a command into a [`Plan`].
///
/// Returns a structural [`PlanError`] for empty commands, unknown verbs,
/// missing targets, or malformed timeouts. Targets are *not* validated
/// here — an unparseable target surfaces later as an invalid domain in
/// feature extraction, which the scorer hard-blocks.
pub fn parse_command(command: &str) -> Result<Plan, PlanError> {
    let normalized = normalize_command(command);
    if normalized.is_empty() {
        return Err(PlanError::EmptyCommand);
    }

    let mut steps = Vec::new();
    let mut capabilities = BTreeSet::new();

    for (index, clause) in normalized.split(';').enumerate() {
        let clause = clause.trim();
        if clause.is_empty() {
            continue;
        }

        let mut tokens = clause.split_whitespace();
        // split(';') on a non-empty clause always yields at least one token.
        let verb_token = tokens.next().unwrap_or_default();
        let (verb, approval_scoped) = match verb_token.strip_suffix('!') {
            Some(stripped) => (stripped, true),
            None => (verb_token, false),
        };

        let read_only = if READ_VERBS.contains(&verb) {
            true
        } else if WRITE_VERBS.contains(&verb) {
            false
        } else {
            return Err(PlanError::UnknownVerb {
                verb: verb.to_string(),
                clause: clause.to_string(),
            });
        };

        let target = tokens.next().ok_or_else(|| PlanError::MissingTarget {
            clause: clause.to_string(),
        })?;

        let timeout_ms = match tokens.next() {
            Some(token) => token
                .parse::<u64>()
                .map_err(|_| PlanError::InvalidTimeout {
                    token: token.to_string(),
                    clause: clause.to_string(),
                })?,
            None => DEFAULT_STEP_TIMEOUT_MS,
        };

        if let Some(extra) = tokens.next() {
            return Err(PlanError::UnexpectedToken {
                token: extra.to_string(),
                clause: clause.to_string(),
            });
        }

        // The capability a step needs is its target scheme ("fs", "mail"...).
        // Targets without a scheme contribute no capability; they will show
        // up as invalid domains at scoring time.
        let adapter = target.split_once("://").map(|(s, _)| s).unwrap_or("");
        if !adapter.is_empty() {
            capabilities.insert(adapter.to_string());
        }

        steps.push(Step {
            step_id: format!("step-{}", index + 1),
            action: verb.to_string(),
            adapter: adapter.to_string(),
            target: target.to_string(),
            read_only,
            approval_scoped,
            timeout_ms,
            idempotency_key: None,
        });
    }

    if steps.is_empty() {
        return Err(PlanError::EmptyCommand);
    }

    Ok(Plan::new(steps, capabilities.into_iter().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_collapses_formatting() {
        assert_eq!(
            normalize_command("  Read   fs://Workspace/a.rs  "),
            "read fs://workspace/a.rs"
        );
        assert_eq!(normalize_command("READ\t fs://x/a"), "read fs://x/a");
    }

    #[test]
    fn parses_single_read_clause() {
        let plan = parse_command("read fs://workspace/src/main.rs").unwrap();
        assert_eq!(plan.step_count(), 1);
        let step = &plan.steps[0];
        assert_eq!(step.action, "read");
        assert!(step.read_only);
        assert!(!step.approval_scoped);
        assert_eq!(step.timeout_ms, DEFAULT_STEP_TIMEOUT_MS);
        assert_eq!(plan.required_capabilities, vec!["fs".to_string()]);
    }

    #[test]
    fn parses_multi_clause_with_flags_and_timeout() {
        let plan =
            parse_command("read fs://workspace/a.rs; write! mail://outbox/daily 15000").unwrap();
        assert_eq!(plan.step_count(), 2);
        assert!(plan.steps[0].read_only);
        assert!(!plan.steps[1].read_only);
        assert!(plan.steps[1].approval_scoped);
        assert_eq!(plan.steps[1].timeout_ms, 15_000);
        assert_eq!(
            plan.required_capabilities,
            vec!["fs".to_string(), "mail".to_string()]
        );
    }

    #[test]
    fn step_ids_are_ordinal() {
        let plan = parse_command("read fs://w/a; read fs://w/b").unwrap();
        assert_eq!(plan.steps[0].step_id, "step-1");
        assert_eq!(plan.steps[1].step_id, "step-2");
    }

    #[test]
    fn empty_command_is_structural_error() {
        assert!(matches!(parse_command("   "), Err(PlanError::EmptyCommand)));
        assert!(matches!(parse_command(" ; ; "), Err(PlanError::EmptyCommand)));
    }

    #[test]
    fn unknown_verb_is_structural_error() {
        match parse_command("frobnicate fs://w/a") {
            Err(PlanError::UnknownVerb { verb, .. }) => assert_eq!(verb, "frobnicate"),
            other => panic!("expected UnknownVerb, got {:?}", other),
        }
    }

    #[test]
    fn missing_target_is_structural_error() {
        assert!(matches!(
            parse_command("read"),
            Err(PlanError::MissingTarget { .. })
        ));
    }

    #[test]
    fn bad_timeout_is_structural_error() {
        assert!(matches!(
            parse_command("read fs://w/a soon"),
            Err(PlanError::InvalidTimeout { .. })
        ));
    }

    #[test]
    fn unparseable_target_is_accepted_at_parse_time() {
        // Structural parsing does not judge targets; the scorer does.
        let plan = parse_command("write not-a-target").unwrap();
        assert!(plan.domains().is_invalid());
        assert!(plan.required_capabilities.is_empty());
    }

    #[test]
    fn parsing_is_deterministic() {
        let a = parse_command("Read fs://W/a;  write! fs://w/b").unwrap();
        let b = parse_command("read fs://w/a; write! fs://w/b").unwrap();
        assert_eq!(a.steps, b.steps);
        assert_eq!(a.required_capabilities, b.required_capabilities);
    }
}
