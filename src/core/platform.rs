// This module models the supported hardware generations and the per-platform feature matrix
// the encoder consults. Platform is the closed set of targets ordered by release, and
// PlatformGen groups them into encoding generations. PlatformFeatures is resolved exactly
// once per kernel and carries every generation-specific switch the translator, the send
// descriptor encoder and the dependency encoder need: unified send, binary movi, the window
// of the 16-bit send type workaround, the software scoreboard encode mode with its token
// count and maximum distance, register-sourced calla and accumulator write-enable encoding.
// Keeping these in one struct keeps the scoreboard validity check auditable.

//! Platform identifiers and the per-platform feature matrix.

use std::fmt;

/// Target platform, ordered by release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Platform {
    Bdw,
    Chv,
    Skl,
    Bxt,
    Icllp,
    Tgllp,
    XeHpSdv,
}

/// Encoding generation of a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlatformGen {
    Gen8,
    Gen9,
    Gen11,
    Xe,
    XeHp,
}

impl Platform {
    pub const ALL: [Platform; 7] = [
        Platform::Bdw,
        Platform::Chv,
        Platform::Skl,
        Platform::Bxt,
        Platform::Icllp,
        Platform::Tgllp,
        Platform::XeHpSdv,
    ];

    pub fn generation(self) -> PlatformGen {
        match self {
            Platform::Bdw | Platform::Chv => PlatformGen::Gen8,
            Platform::Skl | Platform::Bxt => PlatformGen::Gen9,
            Platform::Icllp => PlatformGen::Gen11,
            Platform::Tgllp => PlatformGen::Xe,
            Platform::XeHpSdv => PlatformGen::XeHp,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Platform::Bdw => "bdw",
            Platform::Chv => "chv",
            Platform::Skl => "skl",
            Platform::Bxt => "bxt",
            Platform::Icllp => "icllp",
            Platform::Tgllp => "tgllp",
            Platform::XeHpSdv => "xehp-sdv",
        }
    }

    pub fn features(self) -> PlatformFeatures {
        PlatformFeatures::for_platform(self)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How software scoreboard annotations are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwsbEncodeMode {
    /// No scoreboard field exists (hardware hazard detection).
    Invalid,
    /// One in-order ALU pipe; every distance counts against it.
    SingleDistPipe,
    /// Integer, float and long pipes tracked separately.
    ThreeDistPipe,
}

impl SwsbEncodeMode {
    pub fn is_multi_pipe(self) -> bool {
        matches!(self, SwsbEncodeMode::ThreeDistPipe)
    }
}

/// Feature matrix resolved once per platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformFeatures {
    pub platform: Platform,
    pub generation: PlatformGen,
    /// Split and unary sends share one opcode; function id and EOT live in the instruction.
    pub unified_send: bool,
    /// `movi` carries an explicit (null) second source.
    pub binary_movi: bool,
    /// Sends with a register descriptor and 16-bit payload need an explicit HF type.
    pub send_half_type_workaround: bool,
    pub swsb_mode: SwsbEncodeMode,
    /// Number of scoreboard tokens (SBIDs).
    pub swsb_tokens: u8,
    /// Largest encodable register distance.
    pub swsb_max_distance: u8,
    pub supports_calla_reg_src: bool,
    pub encodes_acc_wr_en: bool,
}

impl PlatformFeatures {
    pub fn for_platform(platform: Platform) -> Self {
        let generation = platform.generation();
        let swsb_mode = match generation {
            PlatformGen::Gen8 | PlatformGen::Gen9 | PlatformGen::Gen11 => SwsbEncodeMode::Invalid,
            PlatformGen::Xe => SwsbEncodeMode::SingleDistPipe,
            PlatformGen::XeHp => SwsbEncodeMode::ThreeDistPipe,
        };
        Self {
            platform,
            generation,
            unified_send: generation >= PlatformGen::Xe,
            binary_movi: platform >= Platform::Icllp,
            send_half_type_workaround: platform >= Platform::Skl && platform < Platform::Icllp,
            swsb_mode,
            swsb_tokens: 16,
            swsb_max_distance: 7,
            supports_calla_reg_src: generation >= PlatformGen::XeHp,
            encodes_acc_wr_en: generation < PlatformGen::XeHp,
        }
    }

    pub fn has_swsb(&self) -> bool {
        self.swsb_mode != SwsbEncodeMode::Invalid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generations_follow_release_order() {
        let gens: Vec<_> = Platform::ALL.iter().map(|p| p.generation()).collect();
        assert!(gens.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn half_type_workaround_window() {
        assert!(!Platform::Bdw.features().send_half_type_workaround);
        assert!(Platform::Skl.features().send_half_type_workaround);
        assert!(Platform::Bxt.features().send_half_type_workaround);
        assert!(!Platform::Icllp.features().send_half_type_workaround);
    }

    #[test]
    fn scoreboard_modes() {
        assert!(!Platform::Icllp.features().has_swsb());
        assert_eq!(Platform::Tgllp.features().swsb_mode, SwsbEncodeMode::SingleDistPipe);
        assert!(Platform::XeHpSdv.features().swsb_mode.is_multi_pipe());
    }
}
