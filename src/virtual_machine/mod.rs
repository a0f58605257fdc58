mod data_source;
mod delete;
mod resource;
mod state;

pub use data_source::VirtualMachineDataSource;
pub use resource::VirtualMachineResource;
