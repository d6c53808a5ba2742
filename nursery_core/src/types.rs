//! Core domain types shared across the nursery modules.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of sleep being tracked
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SleepType {
    Nap,
    Night,
}

impl SleepType {
    /// Human readable label used in notifications
    pub fn label(self) -> &'static str {
        match self {
            SleepType::Nap => "Nap",
            SleepType::Night => "Night sleep",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SleepType::Nap => "nap",
            SleepType::Night => "night",
        }
    }
}

impl fmt::Display for SleepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SleepType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nap" => Ok(SleepType::Nap),
            "night" => Ok(SleepType::Night),
            other => Err(Error::InvalidInput(format!(
                "unknown sleep type '{}' (expected nap or night)",
                other
            ))),
        }
    }
}

/// Sex of the child as recorded on the baby profile
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
    Other,
}

impl FromStr for Sex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" | "boy" | "m" => Ok(Sex::Male),
            "female" | "girl" | "f" => Ok(Sex::Female),
            "other" => Ok(Sex::Other),
            other => Err(Error::InvalidInput(format!("unknown sex '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sleep_type_parse_and_labels() {
        assert_eq!("Nap".parse::<SleepType>().unwrap(), SleepType::Nap);
        assert_eq!(" night ".parse::<SleepType>().unwrap(), SleepType::Night);
        assert!("siesta".parse::<SleepType>().is_err());

        assert_eq!(SleepType::Nap.label(), "Nap");
        assert_eq!(SleepType::Night.label(), "Night sleep");
    }

    #[test]
    fn test_sleep_type_serde_snake_case() {
        let json = serde_json::to_string(&SleepType::Night).unwrap();
        assert_eq!(json, "\"night\"");
    }

    #[test]
    fn test_sex_parse() {
        assert_eq!("boy".parse::<Sex>().unwrap(), Sex::Male);
        assert_eq!("Female".parse::<Sex>().unwrap(), Sex::Female);
        assert_eq!("other".parse::<Sex>().unwrap(), Sex::Other);
        assert!("unknown".parse::<Sex>().is_err());
    }
}
