//! # sensorthings: validation core for a sensor-observation resource graph
//!
//! The SensorThings data model describes sensing as a graph of eight entity
//! kinds: Things carry Sensors that produce Datastreams of Observations about
//! ObservedProperties of FeaturesOfInterest, and Things move between Locations,
//! which is recorded as HistoricalLocations.
//!
//! This crate is the part of such a service that has real algorithmic content:
//!
//! - **Document coercion**: untyped JSON documents are read through
//!   [`Document`], whose accessors distinguish *absent*, *present* and
//!   *wrong shape* instead of conflating them.
//! - **Time parsing**: ISO-8601 instants and `begin/end` intervals, normalized
//!   to UTC ([`parse_interval_or_instant`]).
//! - **Result dispatch**: a Datastream's [`ObservationType`] fixes the shape of
//!   every Observation's result ([`ObservationResult`]); a mismatch is rejected,
//!   never coerced.
//! - **Creation** ([`Create`]) and **partial update** ([`Patch`], [`update`])
//!   for every entity kind, with change tracking so that a patch which changes
//!   nothing is never persisted.
//! - **dataArray ingestion** ([`DataArrayIngestor`]): columnar batches of
//!   Observations with per-row failure isolation.
//!
//! Network transport, query parsing, pagination and persistence engines are
//! not part of this crate. Persistence is reached through the [`DataStore`]
//! trait; [`InMemoryDataStore`] backs the loader binary and the tests.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ EntityService / DataArrayIngestor       │
//! ├─────────────────────────────────────────┤
//! │ Create            Patch + ChangeSet     │
//! ├─────────────────────────────────────────┤
//! │ Result dispatch   Parameter merging     │
//! ├─────────────────────────────────────────┤
//! │ Document coercion   Time parsing        │
//! ├─────────────────────────────────────────┤
//! │ DataStore (trait-based collaborator)    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Usage Examples
//!
//! ```rust
//! use sensorthings::{
//!     Datastream, EntityService, InMemoryDataStore, ObservedProperty, Sensor, ServiceConfig,
//!     Thing, ERROR_SENTINEL,
//! };
//! use serde_json::json;
//!
//! let service = EntityService::new(InMemoryDataStore::new(), &ServiceConfig::default());
//! let thing: Thing = service
//!     .create(&json!({"name": "weather station", "description": "on the roof"}))
//!     .unwrap();
//! let sensor: Sensor = service
//!     .create(&json!({
//!         "name": "TMP36",
//!         "description": "analog temperature sensor",
//!         "encodingType": "application/pdf",
//!         "metadata": "http://example.org/tmp36.pdf",
//!     }))
//!     .unwrap();
//! let property: ObservedProperty = service
//!     .create(&json!({
//!         "name": "air temperature",
//!         "definition": "http://dbpedia.org/page/Temperature",
//!         "description": "temperature of the air",
//!     }))
//!     .unwrap();
//! let datastream: Datastream = service
//!     .create(&json!({
//!         "name": "roof temperature",
//!         "description": "air temperature on the roof",
//!         "unitOfMeasurement": {
//!             "name": "degree Celsius",
//!             "symbol": "°C",
//!             "definition": "http://unitsofmeasure.org/ucum.html#para-30",
//!         },
//!         "observationType": "http://www.opengis.net/def/observationType/OGC-OM/2.0/OM_Measurement",
//!         "Thing": {"@iot.id": thing.id.to_string()},
//!         "Sensor": {"@iot.id": sensor.id.to_string()},
//!         "ObservedProperty": {"@iot.id": property.id.to_string()},
//!     }))
//!     .unwrap();
//!
//! let outcomes = service
//!     .ingest_data_array(&json!([{
//!         "Datastream": {"@iot.id": datastream.id.to_string()},
//!         "components": ["phenomenonTime", "result"],
//!         "dataArray@iot.count": 2,
//!         "dataArray": [
//!             ["2017-01-13T10:20:00Z", 21.5],
//!             ["2017-01-13T10:21:00Z", true],
//!         ],
//!     }]))
//!     .unwrap();
//! assert_eq!(outcomes.len(), 2);
//! assert!(outcomes[0].starts_with("http://localhost:8080/v1.1/Observations("));
//! assert_eq!(outcomes[1], ERROR_SENTINEL);
//! ```

mod config;
mod create;
mod data_array;
mod data_store;
mod document;
mod entity;
mod errors;
mod geometry;
mod linker;
mod observation;
mod parameters;
mod patch;
mod service;
mod temporal;
mod test_utils;

/// Command-line interface utilities for program termination and output formatting.
///
/// This module provides common CLI utilities for sensorthings binaries, including
/// error handling, formatted output, and program termination functions.
pub mod cli_utils;

pub use config::{DEFAULT_API_VERSION, DEFAULT_SERVICE_ROOT, ServiceConfig};
pub use create::{Create, create, replacement};
pub use data_array::{
    CellValue, ComponentSchema, DataArrayComponent, DataArrayElement, DataArrayIngestor,
    ERROR_SENTINEL, Reference,
};
pub use data_store::{DataStore, InMemoryDataStore, ensure_exists, find};
pub use document::{Document, ID_KEY, exact_i64, is_valid_uri, value_type};
pub use entity::{
    Datastream, EncodingType, Entity, EntityKind, EntityRecord, FeatureOfInterest,
    HistoricalLocation, Location, Observation, ObservedProperty, Sensor, Thing, UnitOfMeasurement,
};
pub use errors::{DataStoreError, Error, InvalidError, TimeParseError};
pub use geometry::{Geometry, GeometryType};
pub use linker::{SelfLinker, ServiceRootLinker};
pub use observation::{
    ObservationResult, ObservationType, RESULT_FIELD, extract_optional_result, extract_result,
};
pub use parameters::{ParameterMap, merge_parameter_object, merge_parameters};
pub use patch::{Association, ChangeSet, Patch, Patcher, Updated, update};
pub use service::EntityService;
pub use temporal::{
    TimeInterval, TimeValue, parse_instant, parse_interval, parse_interval_or_instant,
};
