//! Total decoders from read-only call results to plain records.
//!
//! None of these functions fail: malformed or unexpected shapes degrade
//! field by field to `0`, `false` or "absent".

use crate::clarity::ClarityValue;
use itertools::Itertools;

/// Placeholder principal the leaderboard contract stores in unused slots.
pub const EMPTY_PRINCIPAL: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GameState {
    pub x: u64,
    pub y: u64,
    pub score: u64,
    pub alive: bool,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LeaderboardEntry {
    pub who: String,
    pub score: u64,
}

fn unwrap_layer(value: &ClarityValue) -> &ClarityValue {
    match value {
        ClarityValue::OptionalSome(inner) | ClarityValue::ResponseOk(inner) => inner,
        other => other,
    }
}

pub fn uint_field(value: Option<&ClarityValue>) -> u64 {
    let Some(value) = value else {
        return 0;
    };
    match unwrap_layer(value) {
        ClarityValue::UInt(n) => u64::try_from(*n).unwrap_or(0),
        ClarityValue::Int(n) => u64::try_from(*n).unwrap_or(0),
        ClarityValue::StringAscii(s) | ClarityValue::StringUtf8(s) => {
            s.trim().parse::<u64>().unwrap_or(0)
        }
        _ => 0,
    }
}

pub fn bool_field(value: Option<&ClarityValue>) -> bool {
    let Some(value) = value else {
        return false;
    };
    match unwrap_layer(value) {
        ClarityValue::Bool(b) => *b,
        ClarityValue::UInt(n) => *n != 0,
        ClarityValue::Int(n) => *n != 0,
        _ => false,
    }
}

pub fn principal_field(value: Option<&ClarityValue>) -> Option<String> {
    match unwrap_layer(value?) {
        ClarityValue::Principal(p) => Some(p.to_string()),
        ClarityValue::StringAscii(s) | ClarityValue::StringUtf8(s) => Some(s.clone()),
        _ => None,
    }
}

/// `none` and any non-tuple shape mean "no game in progress".
pub fn game_state(value: &ClarityValue) -> Option<GameState> {
    let tuple = unwrap_layer(value);
    if !matches!(tuple, ClarityValue::Tuple(_)) {
        return None;
    }
    Some(GameState {
        x: uint_field(tuple.field("x")),
        y: uint_field(tuple.field("y")),
        score: uint_field(tuple.field("score")),
        alive: bool_field(tuple.field("alive")),
    })
}

pub fn best_score(value: &ClarityValue) -> u64 {
    uint_field(Some(value))
}

/// Drops the placeholder principal and non-positive scores, then orders by
/// score ascending (a lower reaction time ranks higher).
pub fn leaderboard(value: &ClarityValue) -> Vec<LeaderboardEntry> {
    let ClarityValue::List(items) = unwrap_layer(value) else {
        return Vec::new();
    };
    items
        .iter()
        .map(unwrap_layer)
        .filter_map(|tuple| {
            let who = tuple.field("who")?;
            let score = tuple.field("score")?;
            Some((principal_field(Some(who)), uint_field(Some(score))))
        })
        .filter_map(|(who, score)| match who {
            Some(who) if who != EMPTY_PRINCIPAL && score > 0 => {
                Some(LeaderboardEntry { who, score })
            }
            _ => None,
        })
        .sorted_by_key(|entry| entry.score)
        .collect()
}
