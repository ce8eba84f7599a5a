// TriageCrab - GPL-3.0-or-later
// This file is part of TriageCrab.
//
// Copyright (C) 2025 Daniel Freiermuth
//
// TriageCrab is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// TriageCrab is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with TriageCrab.  If not, see <https://www.gnu.org/licenses/>.

//! Account identifier classification.

use crate::parser::event::AccountClass;
use fancy_regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ANONYMOUS_PATTERN: &str = r"(?i)^anonymous( logon)?\$?$";
pub const DEFAULT_MACHINE_SUFFIX: &str = "$";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Anonymous,
    Machine,
    Human,
}

impl SubjectKind {
    /// Anonymous logons are baselined with the human population
    pub const fn account_class(self) -> AccountClass {
        match self {
            Self::Machine => AccountClass::Machine,
            Self::Anonymous | Self::Human => AccountClass::Human,
        }
    }

    pub const fn is_anonymous(self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

/// Decides whether a subject is anonymous, a machine/service account or a person
#[derive(Debug, Clone)]
pub struct SubjectClassifier {
    anonymous: Regex,
    machine_suffix: String,
}

impl SubjectClassifier {
    pub fn new(anonymous_pattern: &str, machine_suffix: &str) -> Result<Self, fancy_regex::Error> {
        Ok(Self {
            anonymous: Regex::new(anonymous_pattern)?,
            machine_suffix: machine_suffix.to_string(),
        })
    }

    /// Classifier for the built-in anonymous pattern and `$` suffix
    pub fn with_defaults() -> Result<Self, fancy_regex::Error> {
        Self::new(DEFAULT_ANONYMOUS_PATTERN, DEFAULT_MACHINE_SUFFIX)
    }

    pub fn classify(&self, subject_id: &str) -> SubjectKind {
        let subject = subject_id.trim();
        // A pattern that fails on backtracking limits is treated as no match
        if self.anonymous.is_match(subject).unwrap_or(false) {
            SubjectKind::Anonymous
        } else if !self.machine_suffix.is_empty() && subject.ends_with(&self.machine_suffix) {
            SubjectKind::Machine
        } else {
            SubjectKind::Human
        }
    }
}
