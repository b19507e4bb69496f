// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Closed wire vocabularies shared by stores, services, and handlers.

use std::fmt;

/// Fleet hardware classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Mobile,
    Kiosk,
    Rpi,
    FingerprintTerminal,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mobile => "MOBILE",
            Self::Kiosk => "KIOSK",
            Self::Rpi => "RPI",
            Self::FingerprintTerminal => "FINGERPRINT_TERMINAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MOBILE" => Some(Self::Mobile),
            "KIOSK" => Some(Self::Kiosk),
            "RPI" => Some(Self::Rpi),
            "FINGERPRINT_TERMINAL" => Some(Self::FingerprintTerminal),
            _ => None,
        }
    }
}

/// Sensor capabilities a device may advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Face,
    Fingerprint,
    Liveness,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Face => "FACE",
            Self::Fingerprint => "FINGERPRINT",
            Self::Liveness => "LIVENESS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "FACE" => Some(Self::Face),
            "FINGERPRINT" => Some(Self::Fingerprint),
            "LIVENESS" => Some(Self::Liveness),
            _ => None,
        }
    }
}

/// Attendance event kinds (`A2` token).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    In,
    Out,
    BreakStart,
    BreakEnd,
    OvertimeIn,
    OvertimeOut,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "IN",
            Self::Out => "OUT",
            Self::BreakStart => "BREAK_START",
            Self::BreakEnd => "BREAK_END",
            Self::OvertimeIn => "OVERTIME_IN",
            Self::OvertimeOut => "OVERTIME_OUT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "IN" => Some(Self::In),
            "OUT" => Some(Self::Out),
            "BREAK_START" => Some(Self::BreakStart),
            "BREAK_END" => Some(Self::BreakEnd),
            "OVERTIME_IN" => Some(Self::OvertimeIn),
            "OVERTIME_OUT" => Some(Self::OvertimeOut),
            _ => None,
        }
    }
}

/// Terminal status of one ingested event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Processed,
    Duplicate,
    Rejected,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Duplicate => "duplicate",
            Self::Rejected => "rejected",
        }
    }
}

/// Command queue states. `Completed` and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Pending,
    Completed,
    Expired,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

/// Per-device firmware rollout states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareState {
    Checking,
    Downloading,
    Applied,
    Failed,
}

impl FirmwareState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::Downloading => "downloading",
            Self::Applied => "applied",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "checking" => Some(Self::Checking),
            "downloading" => Some(Self::Downloading),
            "applied" => Some(Self::Applied),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),+) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    )+};
}

display_as_str!(DeviceType, Capability, EventType, EventStatus, CommandStatus, FirmwareState);

/// Render a capability subset the way the wire carries it (`;`-joined).
pub fn capabilities_to_str(caps: &[Capability]) -> String {
    caps.iter().map(Capability::as_str).collect::<Vec<_>>().join(";")
}

/// Parse a `;`-joined capability list, ignoring unknown entries.
pub fn capabilities_from_str(raw: &str) -> Vec<Capability> {
    raw.split(';').filter_map(Capability::parse).collect()
}
