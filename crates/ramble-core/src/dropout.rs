use serde::{Deserialize, Serialize};

/// Victim-selection policy for eviction. Closed set, dispatched by `match`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dropout {
    None,
    All,
    LeastUsed,
    Random,
    RandomWeighted,
}

impl Dropout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dropout::None => "none",
            Dropout::All => "all",
            Dropout::LeastUsed => "least_used",
            Dropout::Random => "random",
            Dropout::RandomWeighted => "random_weighted",
        }
    }

    /// Parse a wire/config string, defaulting to `None` on garbage.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "all" => Dropout::All,
            "least_used" => Dropout::LeastUsed,
            "random" => Dropout::Random,
            "random_weighted" => Dropout::RandomWeighted,
            _ => Dropout::None,
        }
    }
}

/// Weight-decay curve applied to every edge before victim selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropoutCurve {
    Decrement,
    Half,
    Log2,
    Log10,
    SquareRoot,
}

impl DropoutCurve {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropoutCurve::Decrement => "decrement",
            DropoutCurve::Half => "half",
            DropoutCurve::Log2 => "log2",
            DropoutCurve::Log10 => "log10",
            DropoutCurve::SquareRoot => "square_root",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "half" => DropoutCurve::Half,
            "log2" => DropoutCurve::Log2,
            "log10" => DropoutCurve::Log10,
            "square_root" => DropoutCurve::SquareRoot,
            _ => DropoutCurve::Decrement,
        }
    }

    /// Apply the curve to a single weight. Log curves clamp weights at or
    /// below 1 to zero instead of going negative.
    pub fn apply(&self, weight: f64) -> f64 {
        match self {
            DropoutCurve::Decrement => weight - 1.0,
            DropoutCurve::Half => weight / 2.0,
            DropoutCurve::Log2 => {
                if weight > 1.0 {
                    weight.log2()
                } else {
                    0.0
                }
            }
            DropoutCurve::Log10 => {
                if weight > 1.0 {
                    weight.log10()
                } else {
                    0.0
                }
            }
            DropoutCurve::SquareRoot => weight.sqrt(),
        }
    }
}
