//! Binary Nullsoft-style preset reader.
//!
//! Layout: ASCII magic `"Nullsoft AVS Preset "` + version + 0x1A, then one
//! render-list chunk. The chunk opens with a mode byte (top bit pulls four
//! more little-endian bytes; the top 8 bits of the result declare an
//! extended-data byte count stored as "payload + 4" — a legacy quirk this
//! parser mirrors), followed by effect records: `effectId: u32`, a 32-byte
//! ASCII identifier when `effectId >= 16384` (except the nested-list
//! sentinel), `payloadLen: u32`, payload bytes.

use crate::params::ParamBlock;
use crate::registry::{effect_name_for_id, normalize_legacy_token};

use super::{EffectCommand, ParsedPreset};

pub const MAGIC_PREFIX: &[u8] = b"Nullsoft AVS Preset ";
const MAGIC_TERMINATOR: u8 = 0x1A;
const KNOWN_VERSIONS: [&str; 2] = ["0.2", "0.1"];

/// APE effects carry a 32-byte identifier after the ID.
const APE_ID_BASE: u32 = 16384;
const APE_ID_LENGTH: usize = 32;
/// Sentinel for a nested render list.
const LIST_ID: u32 = 0xFFFF_FFFE;
const COMMENT_ID: u32 = 21;

pub fn is_known_version(version: &str) -> bool {
    KNOWN_VERSIONS.contains(&version)
}

/// Returns `(version, body offset)` when the magic matches.
pub fn parse_magic_header(data: &[u8]) -> Option<(String, usize)> {
    if data.len() <= MAGIC_PREFIX.len() || !data.starts_with(MAGIC_PREFIX) {
        return None;
    }
    let rest = &data[MAGIC_PREFIX.len()..];
    let terminator = rest.iter().position(|&b| b == MAGIC_TERMINATOR)?;
    let version = String::from_utf8_lossy(&rest[..terminator]).into_owned();
    Some((version, MAGIC_PREFIX.len() + terminator + 1))
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn read_byte(&mut self, limit: usize) -> Option<u8> {
        if self.pos >= limit || self.pos >= self.data.len() {
            return None;
        }
        let value = self.data[self.pos];
        self.pos += 1;
        Some(value)
    }

    fn read_u32(&mut self, limit: usize) -> Option<u32> {
        if self.pos + 4 > limit || self.pos + 4 > self.data.len() {
            return None;
        }
        let bytes = &self.data[self.pos..self.pos + 4];
        self.pos += 4;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn has(&self, limit: usize, amount: usize) -> bool {
        self.pos + amount <= limit && self.pos + amount <= self.data.len()
    }
}

fn describe_effect(effect_id: u32) -> String {
    match effect_name_for_id(effect_id) {
        Some(name) => format!("{effect_id} ({name})"),
        None => effect_id.to_string(),
    }
}

fn parse_comment(payload: &[u8]) -> Option<String> {
    if payload.len() < 4 {
        return None;
    }
    let raw_len = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
    let available = payload.len() - 4;
    let take = raw_len.min(available);
    let mut text = String::from_utf8_lossy(&payload[4..4 + take]).into_owned();
    if text.ends_with('\0') {
        text.pop();
    }
    Some(text)
}

fn parse_render_list(
    reader: &mut Reader<'_>,
    chunk_end: usize,
    preset: &mut ParsedPreset,
    depth: usize,
) -> Vec<EffectCommand> {
    let mut chain = Vec::new();
    if depth > 16 {
        preset.warn("render list nesting too deep");
        reader.pos = chunk_end;
        return chain;
    }
    if reader.pos >= chunk_end {
        return chain;
    }

    let Some(mode_byte) = reader.read_byte(chunk_end) else {
        preset.warn("incomplete preset header");
        reader.pos = chunk_end;
        return chain;
    };
    let mut mode = u32::from(mode_byte);
    if mode_byte & 0x80 != 0 {
        let Some(ext) = reader.read_u32(chunk_end) else {
            preset.warn("corrupt preset mode");
            reader.pos = chunk_end;
            return chain;
        };
        mode = u32::from(mode_byte & 0x7F) | ext;
    }
    let extended_size = (mode >> 24) & 0xFF;
    if extended_size > 0 {
        // The legacy writer stores "size of extended data + 4"; consume the
        // declared fields explicitly to stay aligned with the payload.
        let declared = if extended_size >= 4 {
            (extended_size - 4) as usize
        } else {
            0
        };
        if !reader.has(chunk_end, declared) {
            preset.warn("truncated extended preset data");
            reader.pos = chunk_end;
            return chain;
        }
        let values_to_read = (declared / 4).min(8);
        for _ in 0..values_to_read {
            if reader.read_u32(chunk_end).is_none() {
                preset.warn("incomplete extended preset data");
                reader.pos = chunk_end;
                return chain;
            }
        }
        let consumed = values_to_read * 4;
        if declared > consumed {
            reader.pos += declared - consumed;
        }
    }

    while reader.has(chunk_end, 8) {
        let Some(effect_id) = reader.read_u32(chunk_end) else {
            preset.warn("truncated effect header");
            reader.pos = chunk_end;
            break;
        };

        let mut ape_id = String::new();
        if effect_id >= APE_ID_BASE && effect_id != LIST_ID {
            if !reader.has(chunk_end, APE_ID_LENGTH) {
                preset.warn("truncated APE effect identifier");
                reader.pos = chunk_end;
                break;
            }
            let raw = &reader.data[reader.pos..reader.pos + APE_ID_LENGTH];
            let end = raw.iter().position(|&b| b == 0).unwrap_or(APE_ID_LENGTH);
            ape_id = String::from_utf8_lossy(&raw[..end]).into_owned();
            reader.pos += APE_ID_LENGTH;
        }

        let Some(payload_len) = reader.read_u32(chunk_end) else {
            preset.warn("truncated effect payload length");
            reader.pos = chunk_end;
            break;
        };
        let payload_start = reader.pos;
        let payload_end = payload_start + payload_len as usize;
        if payload_end > chunk_end || payload_end > reader.data.len() {
            preset.warn("truncated effect payload");
            reader.pos = chunk_end;
            break;
        }
        let payload = &reader.data[payload_start..payload_end];

        if effect_id == COMMENT_ID {
            let mut params = ParamBlock::new();
            match parse_comment(payload) {
                Some(text) => params.set_string("comment", text),
                None => preset.warn("malformed comment payload"),
            }
            chain.push(EffectCommand::new("misc_comment", params));
        } else if effect_id == LIST_ID {
            let mut nested_reader = Reader {
                data: reader.data,
                pos: payload_start,
            };
            let children = parse_render_list(&mut nested_reader, payload_end, preset, depth + 1);
            let mut command = EffectCommand::new("render_list", ParamBlock::new());
            command.children = children;
            chain.push(command);
        } else {
            let name = if ape_id.is_empty() {
                effect_name_for_id(effect_id).map(str::to_string)
            } else {
                Some(ape_id.clone())
            };
            match name {
                Some(name) if !name.is_empty() && ape_id.is_empty() => {
                    let mut command = EffectCommand::new(normalize_legacy_token(&name), ParamBlock::new());
                    command.raw_payload = payload.to_vec();
                    chain.push(command);
                }
                Some(name) if !name.is_empty() => {
                    // APE plugin: runtime-loaded natives are out of scope,
                    // so the chunk survives as a placeholder.
                    preset.warn(format!("unsupported APE effect: '{name}'"));
                    let mut command = EffectCommand::new(normalize_legacy_token(&name), ParamBlock::new());
                    command.raw_payload = payload.to_vec();
                    command.unknown = true;
                    chain.push(command);
                }
                _ => {
                    preset.warn(format!(
                        "unsupported effect index: {}",
                        describe_effect(effect_id)
                    ));
                    let mut command =
                        EffectCommand::new(format!("effect:{effect_id}"), ParamBlock::new());
                    command.raw_payload = payload.to_vec();
                    command.unknown = true;
                    chain.push(command);
                }
            }
        }

        reader.pos = payload_end;
    }

    if reader.pos < chunk_end {
        reader.pos = chunk_end;
    }
    chain
}

/// Parse the body that follows the magic header.
pub fn parse_binary_preset(body: &[u8]) -> ParsedPreset {
    let mut preset = ParsedPreset::default();
    let mut reader = Reader { data: body, pos: 0 };
    let chain = parse_render_list(&mut reader, body.len(), &mut preset, 0);
    preset.effects = chain;
    preset
}
