pub mod auth;
pub mod error;
pub mod routes;

pub type DeploymentImpl = local_deployment::LocalDeployment;
