//! Wind Bid Optimizer
//!
//! Risk-averse day-ahead bidding for a wind producer. Given a day-ahead price
//! forecast and a discrete scenario set of wind production and imbalance price
//! ratios, the optimizer finds the hourly bid that maximizes
//! `(1 - beta) * E[profit] + beta * CVaR_alpha[profit]`.
//!
//! The pipeline is strictly sequential:
//! 1. [`optimizer::build_model`] turns validated inputs into an explicit [`lp::LinearProgram`]
//! 2. an [`optimizer::LpSolver`] solves it (`good_lp` backed by default)
//! 3. [`optimizer::extract()`] turns the raw solution into a [`optimizer::BiddingResult`]
//!
//! [`optimizer::BidOptimizer`] wires the three steps together.

pub mod config;
pub mod domain;
pub mod error;
pub mod lp;
pub mod optimizer;
pub mod telemetry;

pub use error::OptimizationError;
pub use optimizer::{BidOptimizer, BiddingResult};
