//! Letter grades
//!
//! All grade <-> numeric conversions go through [`GRADE_TABLE`]. The per-analyzer
//! score -> grade lookups (pace, filler, STAR) are separate tables that live next to
//! their analyzers; they only ever produce a `Grade`, never a numeric value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Letter grade, ordered from worst (`D`) to best (`A`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "D")]
    D,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "A")]
    A,
}

/// Grade -> numeric equivalent, best first.
pub const GRADE_TABLE: [(Grade, f64); 6] = [
    (Grade::A, 4.0),
    (Grade::BPlus, 3.5),
    (Grade::B, 3.0),
    (Grade::CPlus, 2.5),
    (Grade::C, 2.0),
    (Grade::D, 1.0),
];

impl Grade {
    /// Numeric equivalent used for trend arithmetic
    pub fn numeric(self) -> f64 {
        GRADE_TABLE
            .iter()
            .find(|(g, _)| *g == self)
            .map(|(_, v)| *v)
            .unwrap_or(1.0)
    }

    /// Highest grade whose numeric value does not exceed `value`
    pub fn from_numeric(value: f64) -> Self {
        GRADE_TABLE
            .iter()
            .find(|(_, v)| value >= *v)
            .map(|(g, _)| *g)
            .unwrap_or(Grade::D)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::D => "D",
        }
    }
}

impl Default for Grade {
    fn default() -> Self {
        Grade::B
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A" => Ok(Grade::A),
            "B+" => Ok(Grade::BPlus),
            "B" => Ok(Grade::B),
            "C+" => Ok(Grade::CPlus),
            "C" => Ok(Grade::C),
            "D" => Ok(Grade::D),
            other => Err(format!("unknown grade: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_round_trip() {
        for (grade, value) in GRADE_TABLE {
            assert_eq!(grade.numeric(), value);
            assert_eq!(Grade::from_numeric(value), grade);
        }
    }

    #[test]
    fn test_from_numeric_between_steps() {
        assert_eq!(Grade::from_numeric(3.7), Grade::BPlus);
        assert_eq!(Grade::from_numeric(2.1), Grade::C);
        assert_eq!(Grade::from_numeric(0.0), Grade::D);
        assert_eq!(Grade::from_numeric(9.0), Grade::A);
    }

    #[test]
    fn test_ordering() {
        assert!(Grade::A > Grade::BPlus);
        assert!(Grade::CPlus > Grade::C);
        assert!(Grade::D < Grade::C);
    }

    #[test]
    fn test_parse_and_serde() {
        assert_eq!("b+".parse::<Grade>().unwrap(), Grade::BPlus);
        assert!("E".parse::<Grade>().is_err());

        let json = serde_json::to_string(&Grade::CPlus).unwrap();
        assert_eq!(json, "\"C+\"");
        let back: Grade = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Grade::CPlus);
    }
}
