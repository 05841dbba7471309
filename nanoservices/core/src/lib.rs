//! etlflow_core: metadata-driven dataflow engine
//!
//! A dataflow document declares sources (JSON files matched by a glob),
//! transformations (`validate_fields`, `add_fields`) and sinks. The engine
//! validates the document, resolves each dataflow into an execution plan
//! once, and runs it on demand, emitting lineage events for every stage and
//! every written record.
//!
//! Basic usage:
//!
//! ```no_run
//! use etlflow_core::engine::EtlEngine;
//! use etlflow_core::events::bus::EventBus;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let (events, mut rx) = EventBus::new(1024).split();
//! let engine = EtlEngine::from_path("metadata.yaml")?.lineage(events);
//! tokio::spawn(async move {
//!     while let Some(event) = rx.recv().await {
//!         println!("{}", serde_json::to_string(&event).unwrap());
//!     }
//! });
//! let execution = engine.run_dataflow("people").await?;
//! println!("{:?}", execution.status);
//! # Ok(())
//! # }
//! ```

pub mod sources;
pub mod destinations;
pub mod transforms;
pub mod dag;
pub mod events;
pub mod store;
pub mod executor;
pub mod config;
pub mod builder;
pub mod engine;

pub mod logging;

pub mod metrics;
