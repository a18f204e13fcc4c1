pub mod deploy_service;

pub use deploy_service::DeployService;
