//! TubeGuard Core Library
//!
//! This crate provides the mutation-driven modification engine behind the
//! TubeGuard content script. It keeps a small set of feature flags, reacts to
//! DOM changes, and idempotently applies or reverts each feature's page
//! transformation.
//!
//! # Architecture
//!
//! The engine never touches a browser API directly. It talks to the page
//! through the [`Dom`] trait and to the host's timer queue through the
//! [`Scheduler`] trait, and it receives everything asynchronous (mutation
//! batches, timer expiries, DOM events, commands, the settings snapshot) as
//! explicit calls on [`Engine`]. Idempotence between passes is carried by tags
//! on the nodes themselves, so the engine holds no node references for work it
//! has already done.
//!
//! # Modules
//!
//! - `selector`: CSS-subset selector parser and matcher
//! - `catalog`: Named selector groups shared by all feature modules
//! - `dom`: Host abstractions, the in-memory DOM and the manual scheduler
//! - `modules`: Thumbnail blur, shorts suppression, hover pause, popup dismissal
//! - `reminder`: Watch-time reminder state machine
//! - `detector`: Mutation/tick change detection
//! - `engine`: Dispatcher, command handling and settings reconciliation
//! - `settings`: Settings snapshot and command wire types
//! - `config`: Engine configuration
//! - `sim`: Deterministic driver over the in-memory host
//! - `types`: Shared type definitions

pub mod catalog;
pub mod config;
pub mod detector;
pub mod dom;
pub mod engine;
pub mod modules;
pub mod reminder;
pub mod selector;
pub mod settings;
pub mod sim;
pub mod types;

// Re-export commonly used types
pub use catalog::{Category, SelectorCatalog};
pub use config::EngineConfig;
pub use detector::ObserverKind;
pub use dom::{Dom, DomError, Scheduler};
pub use engine::{Engine, EngineError, PassReport};
pub use reminder::ReminderState;
pub use selector::{Selector, SelectorError};
pub use settings::{Command, CommandAck, CommandMessage, SettingsError, SettingsSnapshot, SETTINGS_KEYS};
pub use sim::Simulation;
pub use types::{DomEvent, Feature, FeatureFlags, Features, Listener, TimerId};
