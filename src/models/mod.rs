// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Model registry system
//!
//! Holds the models offered by the chat service and their capability flags.
//! The listing is fetched once from the remote endpoint and cached; lookups
//! never fail and return a zero-value definition for unknown names, so
//! capability checks degrade to "plain text model" instead of aborting a turn.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use polain::models::ModelRegistry;
//!
//! let registry = ModelRegistry::new();
//! registry.load().await?;
//!
//! if registry.lookup("deepseek-reasoning").reasoning {
//!     // split <think> blocks out of the answer
//! }
//! ```

pub mod loader;
pub mod schema;

pub use loader::ModelRegistry;
pub use schema::ModelDefinition;
