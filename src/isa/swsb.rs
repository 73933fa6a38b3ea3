//! Software scoreboard annotation of the target encoding.
//!
//! [`Swsb::verify`] is the platform validity check: it answers whether a
//! {instruction class, distance, token} combination is encodable at all with
//! the encode mode and limits of a platform's feature matrix. [`Swsb::encode`] packs a verified annotation into the
//! 8-bit dependency field.

use crate::core::platform::{PlatformFeatures, SwsbEncodeMode};

/// Scoreboard instruction class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstType {
    Math,
    Dpas,
    Send,
    Others,
}

impl InstType {
    /// Out-of-order completing instruction classes.
    pub fn is_out_of_order(self) -> bool {
        !matches!(self, InstType::Others)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DistType {
    #[default]
    NoDist,
    RegDist,
    RegDistAll,
    RegDistInt,
    RegDistFloat,
    RegDistLong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TokenType {
    #[default]
    NoToken,
    Set,
    /// Wait until the token's sources were read.
    Src,
    /// Wait until the token's destination was written.
    Dst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Swsb {
    pub dist_type: DistType,
    pub min_dist: u8,
    pub token_type: TokenType,
    pub sbid: u8,
}

impl Swsb {
    pub fn has_dist(&self) -> bool {
        self.dist_type != DistType::NoDist
    }

    pub fn has_token(&self) -> bool {
        self.token_type != TokenType::NoToken
    }

    pub fn has_swsb(&self) -> bool {
        self.has_dist() || self.has_token()
    }

    pub fn verify(&self, features: &PlatformFeatures, inst_type: InstType) -> Result<(), String> {
        if !self.has_swsb() {
            return Ok(());
        }
        let mode = features.swsb_mode;
        if mode == SwsbEncodeMode::Invalid {
            return Err("platform has no software scoreboard".to_string());
        }
        let max_dist = features.swsb_max_distance;
        if self.has_dist() && (self.min_dist == 0 || self.min_dist > max_dist) {
            return Err(format!("distance {} outside 1..={max_dist}", self.min_dist));
        }
        if self.has_token() && self.sbid >= features.swsb_tokens {
            return Err(format!(
                "token ${} outside the {} scoreboard ids",
                self.sbid, features.swsb_tokens
            ));
        }
        if !mode.is_multi_pipe() && !matches!(self.dist_type, DistType::NoDist | DistType::RegDist) {
            return Err(format!("{:?} needs multiple distance pipes", self.dist_type));
        }
        if self.token_type == TokenType::Set && !inst_type.is_out_of_order() {
            return Err(format!("{inst_type:?} instruction cannot set a token"));
        }
        if self.has_dist() && self.has_token() {
            let allowed = (inst_type.is_out_of_order() && self.token_type == TokenType::Set)
                || (inst_type == InstType::Others && self.token_type == TokenType::Dst);
            if !allowed {
                return Err(format!(
                    "distance with {:?} token is not encodable on {inst_type:?}",
                    self.token_type
                ));
            }
            if mode.is_multi_pipe()
                && !matches!(self.dist_type, DistType::RegDist | DistType::RegDistAll)
            {
                return Err(format!("{:?} cannot be combined with a token", self.dist_type));
            }
        }
        Ok(())
    }

    /// 8-bit dependency field.
    ///
    /// Distance only: `pipe << 3 | dist`. Token only: `0x40 | role << 4 | sbid`.
    /// Both: `0x80 | dist << 4 | sbid`.
    pub fn encode(&self) -> u8 {
        let pipe = match self.dist_type {
            DistType::NoDist | DistType::RegDist => 0,
            DistType::RegDistAll => 1,
            DistType::RegDistInt => 2,
            DistType::RegDistFloat => 3,
            DistType::RegDistLong => 4,
        };
        let role = match self.token_type {
            TokenType::NoToken | TokenType::Set => 0,
            TokenType::Src => 1,
            TokenType::Dst => 2,
        };
        match (self.has_dist(), self.has_token()) {
            (false, false) => 0,
            (true, false) => (pipe << 3) | self.min_dist,
            (false, true) => 0x40 | (role << 4) | self.sbid,
            (true, true) => 0x80 | (self.min_dist << 4) | self.sbid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::Platform;

    fn skl() -> PlatformFeatures {
        Platform::Skl.features()
    }

    fn tgl() -> PlatformFeatures {
        Platform::Tgllp.features()
    }

    fn xehp() -> PlatformFeatures {
        Platform::XeHpSdv.features()
    }

    fn dist(dist_type: DistType, min_dist: u8) -> Swsb {
        Swsb { dist_type, min_dist, ..Swsb::default() }
    }

    #[test]
    fn empty_annotation_is_always_valid() {
        assert!(Swsb::default().verify(&skl(), InstType::Others).is_ok());
    }

    #[test]
    fn single_pipe_rejects_typed_distance() {
        let sw = dist(DistType::RegDistFloat, 2);
        assert!(sw.verify(&tgl(), InstType::Others).is_err());
        assert!(sw.verify(&xehp(), InstType::Others).is_ok());
    }

    #[test]
    fn set_token_on_in_order_instruction_is_rejected() {
        let sw = Swsb { token_type: TokenType::Set, sbid: 3, ..Swsb::default() };
        assert!(sw.verify(&tgl(), InstType::Others).is_err());
        assert!(sw.verify(&tgl(), InstType::Send).is_ok());
    }

    #[test]
    fn combined_distance_and_token() {
        let sw = Swsb { token_type: TokenType::Dst, sbid: 1, ..dist(DistType::RegDist, 1) };
        assert!(sw.verify(&tgl(), InstType::Others).is_ok());
        assert!(sw.verify(&tgl(), InstType::Send).is_err());

        let sw = Swsb { token_type: TokenType::Set, sbid: 1, ..dist(DistType::RegDistInt, 1) };
        assert!(sw.verify(&xehp(), InstType::Send).is_err());
    }

    #[test]
    fn limits_come_from_the_feature_matrix() {
        let sw = Swsb { token_type: TokenType::Set, sbid: 10, ..Swsb::default() };
        assert!(sw.verify(&tgl(), InstType::Send).is_ok());
        let small = PlatformFeatures { swsb_tokens: 8, ..tgl() };
        assert!(sw.verify(&small, InstType::Send).is_err());

        let sw = dist(DistType::RegDist, 7);
        assert!(sw.verify(&tgl(), InstType::Others).is_ok());
        let short = PlatformFeatures { swsb_max_distance: 4, ..tgl() };
        assert!(sw.verify(&short, InstType::Others).is_err());
        assert!(dist(DistType::RegDist, 0).verify(&tgl(), InstType::Others).is_err());
    }

    #[test]
    fn field_encoding() {
        assert_eq!(dist(DistType::RegDist, 3).encode(), 0x03);
        assert_eq!(dist(DistType::RegDistLong, 1).encode(), (4 << 3) | 1);
        let tok = Swsb { token_type: TokenType::Src, sbid: 5, ..Swsb::default() };
        assert_eq!(tok.encode(), 0x55);
        let both = Swsb { token_type: TokenType::Set, sbid: 2, ..dist(DistType::RegDist, 1) };
        assert_eq!(both.encode(), 0x92);
    }
}
