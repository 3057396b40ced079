//! Newline-oriented micro-preset text format.
//!
//! Each non-empty, non-`#` line is one effect command:
//!
//! ```text
//! EFFECT_TOKEN [key=value]* [bare_token]*
//! ```
//!
//! Values auto-type (bool words, `#`/`0x` hex, digits, floats, strings);
//! bare tokens become boolean flags, except under `Misc / Comment` where
//! they accumulate into the comment text.

use crate::params::ParamBlock;
use crate::registry::normalize_legacy_token;

use super::{EffectCommand, ParsedPreset};

/// Dialog-control tokens that leak into hand-stripped legacy presets; they
/// are ignored with a warning instead of becoming bogus effects.
const UI_PREFIX_TOKENS: [&str; 12] = [
    "BUTTON", "CHECK", "EDIT", "SLIDER", "RADIO", "VIS_", "L_", "DEBUGREG_", "QUAL",
    "TRANS_CHECK", "TRANS_SLIDER", "SCROLLBAR",
];
const UI_EXACT_TOKENS: [&str; 16] = [
    "TAB1",
    "LIST1",
    "HELPBTN",
    "CHOOSEFONT",
    "EFFECTRECT",
    "EFFECTS",
    "EFNAME",
    "SETTINGS",
    "VERSTR",
    "THREADSBORDER",
    "REMSEL",
    "EXCLUDE",
    "NEWRESET",
    "HRESET",
    "VRESET",
    "SA",
];

fn is_ui_token(token_upper: &str) -> bool {
    UI_PREFIX_TOKENS
        .iter()
        .any(|prefix| token_upper.starts_with(prefix))
        || UI_EXACT_TOKENS.contains(&token_upper)
}

/// Strip a `#` comment, honoring quotes; a `#` directly after `=` is data
/// (hex color values).
fn strip_comment(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut in_quote = false;
    let mut quote_char = '\0';
    for (i, &ch) in chars.iter().enumerate() {
        if in_quote {
            if ch == quote_char {
                in_quote = false;
            }
            continue;
        }
        match ch {
            '"' | '\'' => {
                in_quote = true;
                quote_char = ch;
            }
            '#' => {
                // Walk back over whitespace to find what precedes the hash.
                let mut pos = i;
                while pos > 0 && chars[pos - 1].is_whitespace() {
                    pos -= 1;
                }
                let treat_as_comment = pos == 0 || chars[pos - 1] != '=';
                if treat_as_comment {
                    return chars[..i].iter().collect();
                }
            }
            _ => {}
        }
    }
    line.to_string()
}

/// Whitespace tokenizer. Quotes group content into the current token (so
/// `key="a b"` stays one token) without appearing in the output.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut started = false;
    let mut in_quote = false;
    let mut quote_char = '\0';
    for ch in line.chars() {
        if in_quote {
            if ch == quote_char {
                in_quote = false;
            } else {
                current.push(ch);
            }
        } else if ch.is_whitespace() {
            if started {
                tokens.push(std::mem::take(&mut current));
                started = false;
            }
        } else if ch == '"' || ch == '\'' {
            in_quote = true;
            quote_char = ch;
            started = true;
        } else {
            current.push(ch);
            started = true;
        }
    }
    if started {
        tokens.push(current);
    }
    tokens
}

fn parse_int_radix(text: &str, radix: u32) -> Option<i32> {
    // Accept values that overflow i32 by wrapping through i64, the way the
    // legacy color constants (0xFFRRGGBB) expect.
    i64::from_str_radix(text, radix).ok().map(|v| v as i32)
}

/// Auto-type a `key=value` assignment.
fn assign_value(params: &mut ParamBlock, key: &str, value: &str) {
    if value.is_empty() {
        params.set_bool(key, true);
        return;
    }
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" => {
            params.set_bool(key, true);
            return;
        }
        "false" | "off" | "no" => {
            params.set_bool(key, false);
            return;
        }
        _ => {}
    }

    let (numeric, radix) = if let Some(rest) = value.strip_prefix('#') {
        (rest, 16)
    } else if let Some(rest) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        (rest, 16)
    } else {
        (value, 10)
    };
    if !numeric.is_empty() {
        if let Some(parsed) = parse_int_radix(numeric, radix) {
            params.set_int(key, parsed);
            return;
        }
    }
    if value.contains('.') {
        if let Ok(parsed) = value.parse::<f32>() {
            params.set_float(key, parsed);
            return;
        }
    }
    params.set_string(key, value);
}

fn is_comment_key(key: &str) -> bool {
    matches!(key, "comment" | "text" | "message" | "msg")
}

pub fn parse_micro_preset(text: &str) -> ParsedPreset {
    let mut preset = ParsedPreset::default();
    for raw_line in text.lines() {
        let line = strip_comment(raw_line.trim_end_matches('\r'));
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let tokens = tokenize(trimmed);
        let Some(effect_token) = tokens.first() else {
            continue;
        };
        if is_ui_token(&effect_token.to_ascii_uppercase()) {
            preset.warn(format!("ignored token: {effect_token}"));
            continue;
        }

        let effect_key = normalize_legacy_token(effect_token);
        let is_comment_effect = effect_key == "misc_comment";

        let mut params = ParamBlock::new();
        let mut explicit_comment = String::new();
        let mut inline_comment = String::new();
        let mut comment_key_seen = false;
        let mut awaiting_comment_value = false;

        for token in &tokens[1..] {
            if is_comment_effect && awaiting_comment_value {
                if !explicit_comment.is_empty() {
                    explicit_comment.push(' ');
                }
                explicit_comment.push_str(token);
                awaiting_comment_value = false;
                continue;
            }
            match token.split_once('=') {
                None => {
                    if is_comment_effect {
                        if !inline_comment.is_empty() {
                            inline_comment.push(' ');
                        }
                        inline_comment.push_str(token);
                    } else {
                        params.set_bool(&token.to_ascii_lowercase(), true);
                    }
                }
                Some((key, value)) => {
                    let key = key.to_ascii_lowercase();
                    if is_comment_effect {
                        if is_comment_key(&key) {
                            comment_key_seen = true;
                            if value.is_empty() {
                                awaiting_comment_value = true;
                            } else {
                                if !explicit_comment.is_empty() {
                                    explicit_comment.push(' ');
                                }
                                explicit_comment.push_str(value);
                            }
                        } else {
                            if !inline_comment.is_empty() {
                                inline_comment.push(' ');
                            }
                            inline_comment.push_str(token);
                        }
                        continue;
                    }
                    assign_value(&mut params, &key, value);
                }
            }
        }

        if is_comment_effect {
            let mut combined = explicit_comment;
            if !inline_comment.is_empty() {
                if !combined.is_empty() {
                    combined.push(' ');
                }
                combined.push_str(&inline_comment);
            }
            if comment_key_seen || !combined.is_empty() {
                params.set_string("comment", combined);
            }
        }

        preset.effects.push(EffectCommand::new(effect_key, params));
    }
    preset
}
