// SPDX-License-Identifier: MIT OR Apache-2.0
//! Memory window assembly: turns a conversation's resource graph and
//! memory log into a bounded `(messages, tools)` prompt window.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod model_budget;
mod window;

pub use model_budget::{DEFAULT_BUDGET, budget_for_model};
pub use window::{Window, WindowBuilder};
