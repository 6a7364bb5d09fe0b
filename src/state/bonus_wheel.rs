use rand::Rng;

/// One slice of the bonus wheel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelSegment {
    /// Multiplier applied to the final round score.
    pub multiplier: f64,
    /// Message shown to the player.
    pub message: &'static str,
    /// Relative chance of landing on this slice.
    pub weight: u32,
}

/// The fixed wheel; weights add up to [`TOTAL_WEIGHT`].
pub const WHEEL: [WheelSegment; 7] = [
    WheelSegment {
        multiplier: 1.5,
        message: "Lucky spin! +50% bonus!",
        weight: 30,
    },
    WheelSegment {
        multiplier: 2.0,
        message: "Great spin! Double points!",
        weight: 20,
    },
    WheelSegment {
        multiplier: 3.0,
        message: "Amazing! Triple points!",
        weight: 10,
    },
    WheelSegment {
        multiplier: 5.0,
        message: "JACKPOT! 5x multiplier!",
        weight: 5,
    },
    WheelSegment {
        multiplier: 10.0,
        message: "LEGENDARY! 10x multiplier!",
        weight: 1,
    },
    WheelSegment {
        multiplier: 0.5,
        message: "Oops! Half points...",
        weight: 15,
    },
    WheelSegment {
        multiplier: 1.0,
        message: "No change. Better luck next time!",
        weight: 19,
    },
];

/// Sum of every segment weight.
pub const TOTAL_WEIGHT: u32 = 100;

/// Segment selected by a roll in `0..TOTAL_WEIGHT`.
///
/// Rolls past the end clamp to the last segment.
pub fn segment_for_roll(roll: u32) -> &'static WheelSegment {
    let mut cumulative = 0;
    for segment in &WHEEL {
        cumulative += segment.weight;
        if roll < cumulative {
            return segment;
        }
    }
    &WHEEL[WHEEL.len() - 1]
}

/// Spin the wheel with the provided random source.
pub fn spin<R: Rng>(rng: &mut R) -> &'static WheelSegment {
    segment_for_roll(rng.random_range(0..TOTAL_WEIGHT))
}
