/// User provided input was invalid. These are the only failures that abort
/// a run; everything external (DNS, disk probes) degrades to a fallback
/// inside the component that owns it.
#[derive(Debug, Eq, thiserror::Error, PartialEq)]
pub enum InvalidInputError {
    #[error("Failed to load Terraform inventory from '{path}' (run 'make terraform-apply' first)")]
    LoadTerraformInventory { path: String },

    #[error("Failed to parse Terraform inventory")]
    ParseTerraformInventory,

    #[error("No control plane VMs found in Terraform output")]
    NoControlPlane,

    #[error("Malformed resource id '{id}' for node '{node}'")]
    MalformedResourceId { node: String, id: String },

    #[error("Failed to load generator configuration from '{path}'")]
    LoadGeneratorConfig { path: String },

    #[error("Failed to parse generator configuration")]
    ParseGeneratorConfig,
}
