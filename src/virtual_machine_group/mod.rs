mod data_source;
mod resource;
mod state;

pub use data_source::{VirtualMachineGroupDataSource, VirtualMachineGroupsDataSource};
pub use resource::VirtualMachineGroupResource;
