mod data_source;
mod resource;
mod state;

pub use data_source::{LoadBalancerRuleDataSource, LoadBalancerRulesDataSource};
pub use resource::LoadBalancerRuleResource;
