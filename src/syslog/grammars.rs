//! Program → candidate grammar table
//!
//! Order inside each list matters: the extractor stops at the first grammar
//! that matches, so stricter grammars come before looser ones.

use phf::phf_map;

const SU_GRAMMARS: &[&str] = &["SU1", "SU2", "SU3"];
const SUDO_GRAMMARS: &[&str] = &["SUDO1", "SUDO2", "SUDO3"];
const SSHD_GRAMMARS: &[&str] = &["SSH1", "SSH2", "SSH3"];

static PROGRAM_GRAMMARS: phf::Map<&'static str, &'static [&'static str]> = phf_map! {
    "su" => SU_GRAMMARS,
    "sudo" => SUDO_GRAMMARS,
    "sshd" => SSHD_GRAMMARS,
};

/// Ordered candidate grammars for `program` (case-sensitive)
pub fn candidates(program: &str) -> Option<&'static [&'static str]> {
    PROGRAM_GRAMMARS.get(program).copied()
}

/// Every program with inner grammars
pub fn programs() -> impl Iterator<Item = &'static str> {
    PROGRAM_GRAMMARS.keys().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_programs() {
        assert_eq!(candidates("su"), Some(SU_GRAMMARS));
        assert_eq!(candidates("sshd").map(|c| c[0]), Some("SSH1"));
        assert_eq!(programs().count(), 3);
        assert!(programs().all(|program| candidates(program).is_some()));
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        assert!(candidates("SSHD").is_none());
        assert!(candidates("httpd").is_none());
    }
}
