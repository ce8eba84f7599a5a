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

//! Analyst knowledge per event kind: display name, ATT&CK techniques and
//! first investigation steps.

use crate::parser::event::EventKind;

pub struct Playbook {
    pub name: &'static str,
    pub techniques: &'static [&'static str],
    pub investigation_steps: &'static [&'static str],
}

const LOGON_SUCCESS: Playbook = Playbook {
    name: "Successful Account Logon",
    techniques: &["T1078", "T1110", "T1021"],
    investigation_steps: &[
        "Verify logon location against the account's normal pattern",
        "Check for corresponding logoff events",
        "Review source address geolocation",
    ],
};

const LOGON_FAILURE: Playbook = Playbook {
    name: "Failed Account Logon",
    techniques: &["T1110.001", "T1110.003", "T1078"],
    investigation_steps: &[
        "Count failures per account and source address",
        "Check for subsequent successful logons",
        "Correlate with threat intelligence",
    ],
};

const LOGOFF: Playbook = Playbook {
    name: "Account Logoff",
    techniques: &["T1078", "T1021"],
    investigation_steps: &[
        "Correlate with logon events",
        "Review activity between logon and logoff",
    ],
};

const PRIVILEGE_ASSIGNED: Playbook = Playbook {
    name: "Special Privileges Assigned",
    techniques: &["T1078.003", "T1068", "T1134"],
    investigation_steps: &[
        "Verify the privilege assignment was authorized",
        "Review subsequent activity with elevated privileges",
    ],
};

const PROCESS_START: Playbook = Playbook {
    name: "New Process Created",
    techniques: &["T1059", "T1055", "T1106"],
    investigation_steps: &[
        "Analyze command line arguments",
        "Check the process hash against known malware",
        "Review the parent process relationship",
    ],
};

const PROCESS_STOP: Playbook = Playbook {
    name: "Process Terminated",
    techniques: &["T1562", "T1489", "T1070"],
    investigation_steps: &[
        "Identify what terminated the process",
        "Check whether the process was security relevant",
    ],
};

const UNRECOGNIZED: Playbook = Playbook {
    name: "Unrecognized Event",
    techniques: &[],
    investigation_steps: &["Research the event ID"],
};

pub fn for_kind(kind: &EventKind) -> &'static Playbook {
    match kind {
        EventKind::LogonSuccess => &LOGON_SUCCESS,
        EventKind::LogonFailure => &LOGON_FAILURE,
        EventKind::Logoff => &LOGOFF,
        EventKind::PrivilegeAssigned => &PRIVILEGE_ASSIGNED,
        EventKind::ProcessStart => &PROCESS_START,
        EventKind::ProcessStop => &PROCESS_STOP,
        EventKind::Unrecognized(_) => &UNRECOGNIZED,
    }
}

/// Urgency prefix for an investigation priority
pub const fn urgency(priority: u8) -> &'static str {
    match priority {
        5 => "Immediate",
        4 => "Within 1 hour",
        3 => "Within 24 hours",
        2 => "Routine review",
        _ => "Monitor",
    }
}
