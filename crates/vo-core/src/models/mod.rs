pub mod config;
pub mod deploy;
pub mod descriptor;
pub mod service;
pub mod status;

pub use config::{HealthPolicy, ToolkitConfig, UnitNaming};
pub use deploy::{DeployReport, DeployStage, DeployStatus};
pub use descriptor::{DatabaseSpec, DeployDescriptor};
pub use service::{
    merge, ConfigMap, ServiceConfig, ServiceState, ServiceStructure, StateMap, StructureMap,
};
pub use status::{Health, ServiceStatus, StatusSummary, UnitMatch, UnitState};
