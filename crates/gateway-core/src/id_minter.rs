// Derives stable, client-facing message ids and thinking-block signatures
// from an upstream id. Both are pure functions of the input id so that a
// retried, identical request yields identical output.

use rand::Rng;
use regex::Regex;
use std::sync::OnceLock;

fn prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z]+-([A-Za-z0-9_\-]+)").unwrap())
}

/// The portion of `id` after its first `<letters>-` prefix, or `id` itself
/// if no such prefix is present. This suffix is reused both as the
/// client-facing message id and as a thinking-block signature.
pub fn suffix_of(id: &str) -> String {
    match prefix_re().captures(id) {
        Some(caps) => caps[1].to_string(),
        None => id.to_string(),
    }
}

/// `msg_<suffix>`, or `msg_<random 9-char suffix>` if no upstream id was
/// available at all.
pub fn mint(id: Option<&str>) -> String {
    match id {
        Some(id) => format!("msg_{}", suffix_of(id)),
        None => format!("msg_{}", random_suffix()),
    }
}

/// The signature value for a synthesized `thinking` block: the same suffix
/// derivation `mint` uses, without the `msg_` prefix.
pub fn signature(id: Option<&str>) -> String {
    match id {
        Some(id) => suffix_of(id),
        None => random_suffix(),
    }
}

fn random_suffix() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::rng();
    (0..9)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_is_deterministic() {
        assert_eq!(mint(Some("chatcmpl-abc")), mint(Some("chatcmpl-abc")));
    }

    #[test]
    fn mint_strips_letters_dash_prefix() {
        assert_eq!(mint(Some("chatcmpl-abc")), "msg_abc");
    }

    #[test]
    fn mint_keeps_whole_id_when_no_prefix_matches() {
        assert_eq!(mint(Some("12345")), "msg_12345");
    }

    #[test]
    fn mint_synthesizes_a_random_suffix_when_id_missing() {
        let minted = mint(None);
        assert!(minted.starts_with("msg_"));
        assert_eq!(minted.len(), "msg_".len() + 9);
    }

    #[test]
    fn signature_matches_the_suffix_used_for_minting() {
        assert_eq!(signature(Some("chatcmpl-abc")), "abc");
        assert_eq!(mint(Some("chatcmpl-abc")), format!("msg_{}", signature(Some("chatcmpl-abc"))));
    }
}
