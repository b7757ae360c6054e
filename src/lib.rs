// Vital-sign data model
pub mod vitals;

// Control-surface error taxonomy
pub mod error;

// Simulation: clock, stochastic model, scenarios, tick orchestrator
pub mod simulator;

// Durable reading sink and retention
pub mod storage;

// Historical queries over stored readings
pub mod history;

// Batched real-time distribution
pub mod distribution;

// Simulator output wiring (store + distributor)
pub mod pipeline;

// Token extraction and identities
pub mod auth;

// Configuration
pub mod config;

// HTTP and WebSocket APIs
pub mod api;
