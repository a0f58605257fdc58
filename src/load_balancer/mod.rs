mod data_source;
mod resource;
mod state;

pub use data_source::{LoadBalancerDataSource, LoadBalancersDataSource};
pub use resource::LoadBalancerResource;
