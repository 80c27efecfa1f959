//! Architecture vocabulary shared by the signature database, matcher, and
//! routine scanner.
//!
//! The string forms follow the original scanner terminology ("Intel", "Arm",
//! "Risc-V", ..., "Code" for generic code, "Alien" for byte streams detected
//! as code but not attributable to a known family).

pub mod matcher;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// CPU architecture tag for a code region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arch {
    /// Code-like bytes with no family-specific signature ("Code").
    GenericCode,
    Intel,
    Arm,
    Mips,
    Ppc,
    M68k,
    Sparc,
    Avr32,
    Sh4,
    Arc,
    RiscV,
    Esp,
    /// Detected as code but unknown to every loaded profile ("Alien").
    Alien,
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Arch::GenericCode => "Code",
            Arch::Intel => "Intel",
            Arch::Arm => "Arm",
            Arch::Mips => "Mips",
            Arch::Ppc => "PPC",
            Arch::M68k => "M68k",
            Arch::Sparc => "Sparc",
            Arch::Avr32 => "Avr32",
            Arch::Sh4 => "Sh4",
            Arch::Arc => "Arc",
            Arch::RiscV => "Risc-V",
            Arch::Esp => "ESP",
            Arch::Alien => "Alien",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Code" => Ok(Arch::GenericCode),
            "Intel" => Ok(Arch::Intel),
            "Arm" => Ok(Arch::Arm),
            "Mips" => Ok(Arch::Mips),
            "PPC" => Ok(Arch::Ppc),
            "M68k" => Ok(Arch::M68k),
            "Sparc" => Ok(Arch::Sparc),
            "Avr32" => Ok(Arch::Avr32),
            "Sh4" => Ok(Arch::Sh4),
            "Arc" => Ok(Arch::Arc),
            "Risc-V" => Ok(Arch::RiscV),
            "ESP" => Ok(Arch::Esp),
            "Alien" => Ok(Arch::Alien),
            other => Err(format!("unknown architecture tag: {:?}", other)),
        }
    }
}

/// Instruction-set bitness of a code region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bitness {
    Bits16,
    Bits32,
    Bits64,
}

impl Bitness {
    /// Numeric form used at the external boundary (16/32/64).
    pub fn as_u32(self) -> u32 {
        match self {
            Bitness::Bits16 => 16,
            Bitness::Bits32 => 32,
            Bitness::Bits64 => 64,
        }
    }

    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            16 => Some(Bitness::Bits16),
            32 => Some(Bitness::Bits32),
            64 => Some(Bitness::Bits64),
            _ => None,
        }
    }
}

/// Byte order of a code region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endianness {
    Little,
    Big,
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endianness::Little => write!(f, "le"),
            Endianness::Big => write!(f, "be"),
        }
    }
}

/// The architecture facts attached to a code region.
///
/// These three fields are only ever set jointly: bitness and endianness are
/// derived together with the architecture match, never guessed on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeInfo {
    pub arch: Arch,
    pub bitness: Bitness,
    pub endianness: Endianness,
}

impl fmt::Display for CodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.arch, self.bitness.as_u32(), self.endianness)
    }
}
