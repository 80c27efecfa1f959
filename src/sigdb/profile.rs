//! Architecture profile definitions and window scoring.
//!
//! A profile is one entry of the signature database: the byte/opcode
//! patterns and structural heuristics needed to score a window of bytes
//! against one architecture variant. Profiles are parsed from JSON files in
//! the `languages` directory and are read-only after load.

use crate::arch::{Arch, Bitness, CodeInfo, Endianness};
use memchr::memmem;
use serde::Deserialize;

/// Opcode density at which the density component of a byte-stream score
/// saturates. Real instruction streams sit well above this; text and random
/// data sit well below.
const DENSITY_SATURATION: f64 = 0.3;

/// What a matching word rule tells the routine scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Contributes to scoring only.
    Generic,
    /// Function entry shape; a hit mid-routine starts a new routine.
    Prologue,
    /// Return instruction; ends the current routine.
    Return,
    /// Call with an extractable relative target.
    Call,
    /// Unconditional or conditional branch with an extractable target.
    Branch,
}

/// A masked word pattern with a scoring weight.
#[derive(Debug, Clone)]
pub struct WordRule {
    pub mask: u64,
    pub value: u64,
    pub weight: f32,
    pub kind: RuleKind,
}

impl WordRule {
    #[inline]
    pub fn matches(&self, word: u64) -> bool {
        word & self.mask == self.value
    }
}

/// How to extract a relative call/branch immediate from a matched word.
#[derive(Debug, Clone)]
pub struct CallImm {
    /// Bits of the word holding the immediate.
    pub mask: u64,
    /// Left shift applied to the immediate (instruction granularity).
    pub shift: u32,
    /// Whether the immediate is sign-extended from the mask width.
    pub signed: bool,
    /// Offset of the architectural PC relative to the instruction start.
    pub pc_bias: i64,
}

impl CallImm {
    /// Decode the displacement in bytes encoded in `word`.
    pub fn displacement(&self, word: u64) -> i64 {
        let raw = word & self.mask;
        let width = 64 - self.mask.leading_zeros();
        let value = if self.signed && width > 0 && width < 64 {
            let sign_bit = 1u64 << (width - 1);
            if raw & sign_bit != 0 {
                (raw | !((1u64 << width) - 1)) as i64
            } else {
                raw as i64
            }
        } else {
            raw as i64
        };
        value << self.shift
    }
}

/// A named signature set for one architecture variant.
#[derive(Debug, Clone)]
pub struct ArchitectureProfile {
    pub name: String,
    pub info: CodeInfo,
    /// Instruction granularity in bytes: 1 (byte stream), 2, or 4.
    pub alignment: usize,
    /// Membership table for indicative opcode bytes (byte-stream scoring).
    opcode_set: [bool; 256],
    opcode_count: usize,
    /// Function-prologue byte shapes.
    pub prologues: Vec<Vec<u8>>,
    /// Return-instruction byte shapes (byte-stream walking).
    pub returns: Vec<Vec<u8>>,
    /// Masked word patterns (fixed-width architectures).
    pub word_rules: Vec<WordRule>,
    /// Relative immediate extraction for `Call`/`Branch` rule hits.
    pub call_imm: Option<CallImm>,
}

impl ArchitectureProfile {
    /// Score a candidate window against this profile.
    ///
    /// Returns a confidence in `[0, 1]`. The formula is deterministic and
    /// independent of the aggressive flag; mode only changes the acceptance
    /// threshold applied by the matcher.
    pub fn score(&self, window: &[u8]) -> f32 {
        if window.is_empty() {
            return 0.0;
        }
        if self.alignment >= 2 {
            self.score_words(window)
        } else {
            self.score_bytes(window)
        }
    }

    fn score_bytes(&self, window: &[u8]) -> f32 {
        if self.opcode_count == 0 && self.prologues.is_empty() {
            return 0.0;
        }
        let hits = window.iter().filter(|&&b| self.opcode_set[b as usize]).count();
        let density = hits as f64 / window.len() as f64;
        let density_component = (density / DENSITY_SATURATION).min(1.0) as f32;

        let mut prologue_hits = 0usize;
        for pat in &self.prologues {
            prologue_hits += memmem::find_iter(window, pat.as_slice()).count();
        }
        let prologue_component = (prologue_hits as f32 * 0.5).min(1.0);

        0.5 * prologue_component + 0.5 * density_component
    }

    fn score_words(&self, window: &[u8]) -> f32 {
        let width = self.alignment;
        let count = window.len() / width;
        if count == 0 {
            return 0.0;
        }
        let all_ones = (1u64 << (width * 8)) - 1;
        let mut sum = 0.0f32;
        for chunk in window.chunks_exact(width) {
            let word = read_word(chunk, self.info.endianness);
            // Padding words carry no evidence either way.
            if word == 0 || word == all_ones {
                continue;
            }
            let mut best = 0.0f32;
            for rule in &self.word_rules {
                if rule.matches(word) && rule.weight > best {
                    best = rule.weight;
                }
            }
            sum += best;
        }
        (sum / count as f32).clamp(0.0, 1.0)
    }

    /// First non-generic rule matching `word`, in profile order.
    pub fn classify_word(&self, word: u64) -> Option<&WordRule> {
        self.word_rules
            .iter()
            .find(|r| r.kind != RuleKind::Generic && r.matches(word))
    }
}

/// Read one instruction word in the profile's byte order.
#[inline]
pub fn read_word(chunk: &[u8], endianness: Endianness) -> u64 {
    let mut word = 0u64;
    match endianness {
        Endianness::Little => {
            for &b in chunk.iter().rev() {
                word = (word << 8) | b as u64;
            }
        }
        Endianness::Big => {
            for &b in chunk {
                word = (word << 8) | b as u64;
            }
        }
    }
    word
}

// ---------------------------------------------------------------------------
// JSON schema
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawProfile {
    name: String,
    architecture: String,
    bitness: u32,
    endianness: String,
    alignment: usize,
    #[serde(default)]
    opcode_bytes: Vec<String>,
    #[serde(default)]
    prologues: Vec<String>,
    #[serde(default)]
    returns: Vec<String>,
    #[serde(default)]
    word_rules: Vec<RawWordRule>,
    #[serde(default)]
    call_imm: Option<RawCallImm>,
}

#[derive(Debug, Deserialize)]
struct RawWordRule {
    mask: String,
    value: String,
    weight: f32,
    #[serde(default)]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCallImm {
    mask: String,
    shift: u32,
    signed: bool,
    pc_bias: i64,
}

fn parse_hex_word(s: &str) -> Result<u64, String> {
    let trimmed = s.trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(trimmed, 16).map_err(|e| format!("bad hex word {:?}: {}", s, e))
}

fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, String> {
    if s.is_empty() || s.len() % 2 != 0 {
        return Err(format!("bad hex byte string {:?}", s));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16)
                .map_err(|e| format!("bad hex byte string {:?}: {}", s, e))
        })
        .collect()
}

fn parse_rule_kind(s: Option<&str>) -> Result<RuleKind, String> {
    match s.unwrap_or("generic") {
        "generic" => Ok(RuleKind::Generic),
        "prologue" => Ok(RuleKind::Prologue),
        "return" => Ok(RuleKind::Return),
        "call" => Ok(RuleKind::Call),
        "branch" => Ok(RuleKind::Branch),
        other => Err(format!("unknown rule kind {:?}", other)),
    }
}

impl ArchitectureProfile {
    /// Parse a profile from JSON text. Any structural or semantic problem is
    /// reported as a string; the database maps it to `CorruptSignature`.
    pub fn parse(json: &str) -> Result<Self, String> {
        let raw: RawProfile = serde_json::from_str(json).map_err(|e| e.to_string())?;

        let arch: Arch = raw.architecture.parse()?;
        let bitness = Bitness::from_u32(raw.bitness)
            .ok_or_else(|| format!("bad bitness {}", raw.bitness))?;
        let endianness = match raw.endianness.as_str() {
            "little" => Endianness::Little,
            "big" => Endianness::Big,
            other => return Err(format!("bad endianness {:?}", other)),
        };
        if !matches!(raw.alignment, 1 | 2 | 4) {
            return Err(format!("bad alignment {}", raw.alignment));
        }

        let mut opcode_set = [false; 256];
        let mut opcode_count = 0usize;
        for s in &raw.opcode_bytes {
            let b = parse_hex_word(s)?;
            if b > 0xFF {
                return Err(format!("opcode byte out of range: {:?}", s));
            }
            if !opcode_set[b as usize] {
                opcode_set[b as usize] = true;
                opcode_count += 1;
            }
        }

        let prologues = raw
            .prologues
            .iter()
            .map(|s| parse_hex_bytes(s))
            .collect::<Result<Vec<_>, _>>()?;
        let returns = raw
            .returns
            .iter()
            .map(|s| parse_hex_bytes(s))
            .collect::<Result<Vec<_>, _>>()?;

        let mut word_rules = Vec::with_capacity(raw.word_rules.len());
        for r in &raw.word_rules {
            if !(0.0..=1.0).contains(&r.weight) {
                return Err(format!("rule weight out of range: {}", r.weight));
            }
            word_rules.push(WordRule {
                mask: parse_hex_word(&r.mask)?,
                value: parse_hex_word(&r.value)?,
                weight: r.weight,
                kind: parse_rule_kind(r.kind.as_deref())?,
            });
        }

        let call_imm = match &raw.call_imm {
            Some(c) => Some(CallImm {
                mask: parse_hex_word(&c.mask)?,
                shift: c.shift,
                signed: c.signed,
                pc_bias: c.pc_bias,
            }),
            None => None,
        };

        Ok(Self {
            name: raw.name,
            info: CodeInfo {
                arch,
                bitness,
                endianness,
            },
            alignment: raw.alignment,
            opcode_set,
            opcode_count,
            prologues,
            returns,
            word_rules,
            call_imm,
        })
    }
}
