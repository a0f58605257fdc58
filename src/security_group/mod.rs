mod data_source;
mod resource;
pub(crate) mod rules;
pub(crate) mod state;

pub use data_source::{SecurityGroupDataSource, SecurityGroupsDataSource};
pub use resource::SecurityGroupResource;
