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

//! `TriageCrab` - batch threat triage for Windows security events.
//!
//! Events are scored against per-account-class baselines, grouped into
//! named threat behaviours, annotated with an attack stage and an
//! investigation priority, and rolled up into a short-horizon forecast.
//! [`core::Pipeline`] runs all stages over one batch.

pub mod annotate;
pub mod anomaly;
pub mod cluster;
pub mod config;
pub mod core;
pub mod error;
pub mod forecast;
pub mod parser;
