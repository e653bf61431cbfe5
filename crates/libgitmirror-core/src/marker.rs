//! Standard-hash markers embedded in mirror commit messages
//!
//! Every commit the engine produces ends with a trailer line
//! `Mirror-Standard-Hash: <hash>` naming the standard commit it replays.
//! The mirror's own history is the only checkpoint between runs.

use std::sync::OnceLock;

use regex::Regex;

/// Trailer key carried by every mirror-produced commit
pub const MARKER_KEY: &str = "Mirror-Standard-Hash";

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^Mirror-Standard-Hash:[ \t]*([0-9a-fA-F]{40}|[0-9a-fA-F]{64})[ \t]*$")
            .expect("marker pattern is valid")
    })
}

fn marker_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^Mirror-Standard-Hash:.*(\r?\n)?").expect("marker line pattern is valid")
    })
}

/// Extract the standard hash from a mirror commit message.
///
/// Returns `None` when the message carries no marker or markers naming more
/// than one distinct hash.
pub fn extract(message: &str) -> Option<String> {
    let mut found: Option<String> = None;
    for caps in marker_regex().captures_iter(message) {
        let hash = caps[1].to_ascii_lowercase();
        match &found {
            Some(existing) if *existing != hash => return None,
            _ => found = Some(hash),
        }
    }
    found
}

/// Append the marker for `standard_hash` to a commit message.
///
/// Marker lines already present (e.g. when the standard repository is itself
/// a mirror) are dropped first so the result carries exactly one.
pub fn embed(message: &str, standard_hash: &str) -> String {
    let stripped = marker_line_regex().replace_all(message, "");
    let body = stripped.trim_end();
    if body.is_empty() {
        format!("{}: {}\n", MARKER_KEY, standard_hash)
    } else {
        format!("{}\n\n{}: {}\n", body, MARKER_KEY, standard_hash)
    }
}
