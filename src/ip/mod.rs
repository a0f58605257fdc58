mod data_source;
mod resource;
mod state;

pub use data_source::IpDataSource;
pub use resource::IpResource;
