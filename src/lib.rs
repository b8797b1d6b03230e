pub mod network;

pub use network::{Network, NetworkBuilder};

pub mod transit;

pub use transit::{AccessEgress, Transfer, TransitDataProvider};

pub mod cost;
pub mod slack;
pub mod trip_search;
pub mod constrained;
pub mod pareto;
pub mod pass_through;
pub mod via;
pub mod calculator;

pub mod request;

pub use request::{RaptorProfile, RaptorRequest, SearchDirection};

pub mod error;

pub use error::{RaptorError, RaptorResult};

pub mod journey;

pub use journey::{Path, PathLeg};

pub mod heuristic;

pub mod service;

pub use service::{raptor_search, RaptorResponse, RaptorService};

pub mod utils;
mod destination;
mod raptor;
mod multicriteria;
