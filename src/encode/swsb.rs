//! Software scoreboard annotation encoding.
//!
//! The scheduler already assigned token ids and distances; this only
//! re-expresses them in the target form and runs the platform validity check
//! before the instruction is final.

use log::trace;

use crate::core::error::{EmitError, EmitResult};
use crate::core::platform::PlatformFeatures;
use crate::isa::{DistType, InstType, Swsb, TokenType};
use crate::mir::{DistanceType, Instruction, SwsbAnnotation, TokenKind};

/// Translate the scheduler annotation of `inst`, an instruction of class `inst_type`.
///
/// Platforms without a software scoreboard carry no dependency field, so
/// any annotation is dropped there.
pub fn encode_swsb(
    inst: &Instruction,
    inst_type: InstType,
    features: &PlatformFeatures,
) -> EmitResult<Swsb> {
    if !features.has_swsb() {
        if !inst.swsb.is_empty() {
            trace!("dropping scoreboard annotation at {} on {}", inst.position, features.platform);
        }
        return Ok(Swsb::default());
    }

    let swsb = translate(&inst.swsb, features);
    swsb.verify(features, inst_type).map_err(|reason| {
        EmitError::InvalidDependencyEncoding {
            position: inst.position,
            opcode: inst.opcode.name(),
            reason,
        }
    })?;
    Ok(swsb)
}

fn translate(annotation: &SwsbAnnotation, features: &PlatformFeatures) -> Swsb {
    let mut swsb = Swsb::default();
    if let Some(token) = annotation.token {
        swsb.token_type = match token.kind {
            TokenKind::Set => TokenType::Set,
            TokenKind::AfterRead => TokenType::Src,
            TokenKind::AfterWrite => TokenType::Dst,
        };
        swsb.sbid = token.id;
    }
    if annotation.distance != 0 {
        swsb.dist_type = if features.swsb_mode.is_multi_pipe() {
            dist_type(annotation.distance_type)
        } else {
            DistType::RegDist
        };
        swsb.min_dist = annotation.distance;
    }
    swsb
}

fn dist_type(ty: DistanceType) -> DistType {
    match ty {
        DistanceType::Dist => DistType::RegDist,
        DistanceType::DistAll => DistType::RegDistAll,
        DistanceType::DistInt => DistType::RegDistInt,
        DistanceType::DistFloat => DistType::RegDistFloat,
        DistanceType::DistLong => DistType::RegDistLong,
    }
}
