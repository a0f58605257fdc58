mod data_source;
mod resource;
mod state;

pub use data_source::{SecurityGroupRuleDataSource, SecurityGroupRulesDataSource};
pub use resource::SecurityGroupRuleResource;
