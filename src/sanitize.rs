//! # Error Message Sanitization
//!
//! Driver errors frequently echo back the submitted payload: addresses, raw
//! transaction hex, occasionally key material. Nothing address-like or
//! key-sized may leave the core through a tracer hook or log line, so every
//! failure message passes through [`sanitize_error`] first.
//!
//! Masking keeps a six-character prefix for correlation; the rest of the hex
//! run is dropped.

/// Minimum length of a `0x`-prefixed hex run treated as address-like.
const PREFIXED_HEX_MIN: usize = 8;

/// Minimum length of a bare hex run treated as potential key material.
const BARE_HEX_MIN: usize = 40;

/// Number of leading hex characters preserved in a masked run.
const MASK_PREFIX_LEN: usize = 6;

fn is_hex_digit(c: char) -> bool {
    c.is_ascii_hexdigit()
}

fn mask_run(out: &mut String, run: &str) {
    let keep = MASK_PREFIX_LEN.min(run.len());
    out.push_str(&run[..keep]);
    out.push_str("[masked]");
}

/// Mask address-like and key-sized hex substrings in a failure message.
///
/// Two shapes are masked: `0x`-prefixed hex of [`PREFIXED_HEX_MIN`] or more
/// digits, and bare hex runs of [`BARE_HEX_MIN`] or more characters. Shorter
/// runs (error codes, short ids) pass through untouched.
pub fn sanitize_error(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let chars: Vec<char> = message.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        // The low-threshold `0x` rule only applies at a word boundary, so an
        // identifier that merely contains "0x" stays intact.
        let word_boundary = i == 0 || !chars[i - 1].is_ascii_alphanumeric();
        let prefixed = word_boundary
            && chars[i] == '0'
            && i + 1 < chars.len()
            && (chars[i + 1] == 'x' || chars[i + 1] == 'X');

        if prefixed {
            let run_start = i + 2;
            let mut run_end = run_start;
            while run_end < chars.len() && is_hex_digit(chars[run_end]) {
                run_end += 1;
            }
            let run: String = chars[run_start..run_end].iter().collect();
            if run.len() >= PREFIXED_HEX_MIN {
                out.push(chars[i]);
                out.push(chars[i + 1]);
                mask_run(&mut out, &run);
                i = run_end;
                continue;
            }
        }

        if is_hex_digit(chars[i]) {
            let run_start = i;
            let mut run_end = run_start;
            while run_end < chars.len() && is_hex_digit(chars[run_end]) {
                run_end += 1;
            }
            let run: String = chars[run_start..run_end].iter().collect();
            // Key-sized runs are masked even when glued to surrounding word
            // characters; the length floor alone protects ordinary prose
            // ("dead", "feed", short error codes).
            if run.len() >= BARE_HEX_MIN {
                mask_run(&mut out, &run);
            } else {
                out.push_str(&run);
            }
            i = run_end;
            continue;
        }

        out.push(chars[i]);
        i += 1;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_prefixed_address() {
        let message = "insufficient funds for 0x52908400098527886E0F7030069857D2E4169EE7";
        let sanitized = sanitize_error(message);
        assert!(!sanitized.contains("52908400098527886E0F7030069857D2E4169EE7"));
        assert!(sanitized.contains("0x529084[masked]"));
        assert!(sanitized.starts_with("insufficient funds for "));
    }

    #[test]
    fn masks_bare_long_hex() {
        let secret = "a".repeat(64);
        let message = format!("rejected key {secret} by node");
        let sanitized = sanitize_error(&message);
        assert!(!sanitized.contains(&secret));
        assert!(sanitized.contains("aaaaaa[masked]"));
        assert!(sanitized.ends_with(" by node"));
    }

    #[test]
    fn keeps_short_hex_codes() {
        let message = "error code 0xdead at offset 12";
        assert_eq!(sanitize_error(message), message);
    }

    #[test]
    fn keeps_ordinary_words_containing_hex_letters() {
        let message = "deadline exceeded while decoding feedback";
        assert_eq!(sanitize_error(message), message);
    }

    #[test]
    fn masks_long_hex_embedded_in_a_word() {
        let secret = "ab".repeat(32);
        let message = format!("rejected raw txhash{secret}");
        let sanitized = sanitize_error(&message);
        assert!(!sanitized.contains(&secret));
        assert!(sanitized.contains("[masked]"));
    }

    #[test]
    fn masks_long_hex_with_trailing_word_char() {
        let secret = "0123456789abcdef".repeat(4);
        let sanitized = sanitize_error(&format!("{secret}z"));
        assert!(!sanitized.contains(&secret));
        assert!(sanitized.ends_with('z'));
        assert!(sanitized.contains("012345[masked]"));
    }

    #[test]
    fn masks_multiple_runs_in_one_message() {
        let message = "transfer 0x1234567890abcdef to 0xfedcba0987654321 failed";
        let sanitized = sanitize_error(message);
        assert!(!sanitized.contains("1234567890abcdef"));
        assert!(!sanitized.contains("fedcba0987654321"));
        assert_eq!(sanitized.matches("[masked]").count(), 2);
    }

    #[test]
    fn forty_char_hex_never_survives_verbatim() {
        let token: String = "0123456789abcdef".repeat(3);
        assert!(token.len() >= 40);
        let sanitized = sanitize_error(&format!("raw tx {token}"));
        assert!(!sanitized.contains(&token));
    }
}
