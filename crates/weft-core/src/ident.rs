// SPDX-License-Identifier: Apache-2.0
//! Identifier and hashing utilities.
use blake3::Hasher;

/// Canonical 256-bit hash used for rule ids and canonical graph digests.
pub type Hash = [u8; 32];

/// Produces a stable, domain-separated rule identifier (prefix `b"rule:"`)
/// using BLAKE3.
///
/// Rule ids are derived from the rule name, so two rules with the same name
/// collide by construction; the explorer keys transitions by name and treats
/// the id as a stable fingerprint for logs and telemetry.
#[must_use]
pub fn make_rule_id(name: &str) -> Hash {
    let mut hasher = Hasher::new();
    hasher.update(b"rule:");
    hasher.update(name.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_ids_are_stable_and_name_separated() {
        assert_eq!(make_rule_id("flip"), make_rule_id("flip"));
        assert_ne!(make_rule_id("flip"), make_rule_id("flop"));
    }
}
