// fingerprint.rs — Stable operation-class identity.
//
// Two plans with the same fingerprint are "the same operation class" for
// trust purposes. The fingerprint hashes four normalized inputs:
//
//   1. the command text (trimmed, case-folded, whitespace-collapsed)
//   2. the policy version string (trimmed)
//   3. the autonomy mode (normalized enum form)
//   4. the capability set (sorted, de-duplicated)
//
// Formatting differences must never change the fingerprint; a policy or
// mode change must always change it.

use sha2::{Digest, Sha256};

use gov_plan::normalize_command;
use gov_policy::AutonomyMode;

/// Compute the fingerprint for an operation class.
pub fn compute_fingerprint(
    command: &str,
    policy_version: &str,
    mode: AutonomyMode,
    capabilities: &[String],
) -> String {
    let mut caps: Vec<String> = capabilities.iter().map(|c| c.trim().to_string()).collect();
    caps.sort();
    caps.dedup();

    // Field separator is a newline; none of the normalized inputs can
    // contain one, so the concatenation is unambiguous.
    let material = format!(
        "{}\n{}\n{}\n{}",
        normalize_command(command),
        policy_version.trim(),
        mode.as_str(),
        caps.join(",")
    );

    let mut hasher = Sha256::new();
    hasher.update(material.as_bytes());
    format!("{:x}", hasher.finalize())
}
