// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process typed hook bus.
//!
//! One handler list per event kind; `emit` fans out on spawned tasks and
//! awaits them all. A failing (or panicking) subscriber is logged and never
//! affects siblings or the emitter.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use futures_util::future::join_all;

/// Domain events published by the core subsystems.
#[derive(Debug, Clone)]
pub enum HookEvent {
    EventIngested { event_id: String, device_id: String, employee_id: String },
    DuplicateEvent { event_id: String, device_id: String },
    InvalidEvent { device_id: String, reason: String },
    DeviceRegistered { device_id: String },
    DeviceHeartbeat { device_id: String },
    DeviceCommand { command_id: String, device_id: String },
    CommandAcknowledged { command_id: String, device_id: String, status: String },
    DeviceRevoked { device_id: String },
    FirmwareFailure { device_id: String, version: String, message: String },
    ReportGenerated { report_id: String, company_id: String },
}

/// Discriminant used for subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    EventIngested,
    DuplicateEvent,
    InvalidEvent,
    DeviceRegistered,
    DeviceHeartbeat,
    DeviceCommand,
    CommandAcknowledged,
    DeviceRevoked,
    FirmwareFailure,
    ReportGenerated,
}

impl HookEvent {
    pub fn kind(&self) -> HookKind {
        match self {
            Self::EventIngested { .. } => HookKind::EventIngested,
            Self::DuplicateEvent { .. } => HookKind::DuplicateEvent,
            Self::InvalidEvent { .. } => HookKind::InvalidEvent,
            Self::DeviceRegistered { .. } => HookKind::DeviceRegistered,
            Self::DeviceHeartbeat { .. } => HookKind::DeviceHeartbeat,
            Self::DeviceCommand { .. } => HookKind::DeviceCommand,
            Self::CommandAcknowledged { .. } => HookKind::CommandAcknowledged,
            Self::DeviceRevoked { .. } => HookKind::DeviceRevoked,
            Self::FirmwareFailure { .. } => HookKind::FirmwareFailure,
            Self::ReportGenerated { .. } => HookKind::ReportGenerated,
        }
    }
}

impl HookKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EventIngested => "onEventIngested",
            Self::DuplicateEvent => "onDuplicateEvent",
            Self::InvalidEvent => "onInvalidEvent",
            Self::DeviceRegistered => "onDeviceRegistered",
            Self::DeviceHeartbeat => "onDeviceHeartbeat",
            Self::DeviceCommand => "onDeviceCommand",
            Self::CommandAcknowledged => "onCommandAcknowledged",
            Self::DeviceRevoked => "onDeviceRevoked",
            Self::FirmwareFailure => "onFirmwareFailure",
            Self::ReportGenerated => "onReportGenerated",
        }
    }
}

type HookFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
type Handler = Arc<dyn Fn(HookEvent) -> HookFuture + Send + Sync>;

/// Publish/subscribe hub handed to every subsystem through [`crate::state::Deps`].
#[derive(Default)]
pub struct HookBus {
    handlers: RwLock<HashMap<HookKind, Vec<Handler>>>,
}

impl HookBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for one event kind.
    pub fn subscribe<F, Fut>(&self, kind: HookKind, handler: F)
    where
        F: Fn(HookEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |event| Box::pin(handler(event)));
        if let Ok(mut map) = self.handlers.write() {
            map.entry(kind).or_default().push(handler);
        }
    }

    /// Fan an event out to all subscribers of its kind and await them.
    ///
    /// Each subscriber runs on its own task so a panic in one cannot take
    /// down another or the emitter.
    pub async fn emit(&self, event: HookEvent) {
        let kind = event.kind();
        let handlers: Vec<Handler> = match self.handlers.read() {
            Ok(map) => map.get(&kind).cloned().unwrap_or_default(),
            Err(_) => Vec::new(),
        };
        if handlers.is_empty() {
            return;
        }

        let tasks = handlers.into_iter().map(|handler| {
            let event = event.clone();
            tokio::spawn(async move { handler(event).await })
        });

        for outcome in join_all(tasks).await {
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::warn!(hook = kind.as_str(), err = %err, "hook subscriber failed");
                }
                Err(join_err) => {
                    tracing::error!(hook = kind.as_str(), err = %join_err, "hook subscriber panicked");
                }
            }
        }
    }
}

impl std::fmt::Debug for HookBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.handlers.read().map(|m| m.len()).unwrap_or(0);
        f.debug_struct("HookBus").field("kinds_subscribed", &count).finish()
    }
}

#[cfg(test)]
#[path = "hooks_tests.rs"]
mod tests;
