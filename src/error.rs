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

//! Error taxonomy of the analytical stages.
//!
//! None of these abort a batch: each one marks a single unit of work
//! (one account class, one event, one forecast metric) as unavailable.

use crate::parser::event::AccountClass;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// Population too small to compute a mean and a deviation
    DegenerateBaseline {
        class: Option<AccountClass>,
        population: usize,
    },
    /// Not enough closed history for a forecast or interval estimate
    InsufficientHistory {
        subject: &'static str,
        required: usize,
        available: usize,
    },
    /// Event kind outside the fixed enumeration
    UnrecognizedEventKind(String),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DegenerateBaseline {
                class: Some(class),
                population,
            } => write!(
                f,
                "degenerate baseline for {class} accounts: {population} event(s), need at least 2"
            ),
            Self::DegenerateBaseline {
                class: None,
                population,
            } => write!(
                f,
                "degenerate combined baseline: {population} event(s), need at least 2"
            ),
            Self::InsufficientHistory {
                subject,
                required,
                available,
            } => write!(
                f,
                "insufficient history for {subject}: {available} available, {required} required"
            ),
            Self::UnrecognizedEventKind(kind) => write!(f, "unrecognized event kind: {kind}"),
        }
    }
}

impl std::error::Error for AnalysisError {}

pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;
