// src/models.rs

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// --- RAW CONFIGURATION MODELS (AS DECODED FROM HCL) ---
// Labeled blocks such as `pre_hook "fmt" { ... }` decode to maps keyed by label.
// `IndexMap` keeps them in declaration order.

fn is_false(value: &bool) -> bool {
    !*value
}

/// A whole configuration file, in either layout.
///
/// The current layout nests everything under `terragrunt`; the legacy layout puts
/// the same blocks at the top level. Other top-level attributes are Terraform
/// variables and are ignored.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terragrunt: Option<ConfigBody>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<IncludeBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terraform: Option<TerraformBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_state: Option<RemoteStateBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<DependenciesBlock>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub pre_hook: IndexMap<String, HookBlock>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub post_hook: IndexMap<String, HookBlock>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub extra_command: IndexMap<String, ExtraCommandBlock>,
}

impl ConfigFile {
    /// The blocks declared at the top level (legacy layout).
    pub fn into_legacy_body(self) -> ConfigBody {
        ConfigBody {
            include: self.include,
            terraform: self.terraform,
            remote_state: self.remote_state,
            dependencies: self.dependencies,
            pre_hook: self.pre_hook,
            post_hook: self.post_hook,
            extra_command: self.extra_command,
        }
    }
}

/// The wrapper settings of one configuration file.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ConfigBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<IncludeBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terraform: Option<TerraformBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_state: Option<RemoteStateBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<DependenciesBlock>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub pre_hook: IndexMap<String, HookBlock>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub post_hook: IndexMap<String, HookBlock>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub extra_command: IndexMap<String, ExtraCommandBlock>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct IncludeBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct TerraformBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub extra_arguments: IndexMap<String, ExtraArgumentsBlock>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RemoteStateBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub config: IndexMap<String, hcl::Value>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct DependenciesBlock {
    pub paths: Vec<String>,
}

/// Attributes accepted by every extension block.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ExtensionFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<Vec<String>>,
    #[serde(skip_serializing_if = "is_false")]
    pub disabled: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct HookBlock {
    #[serde(flatten)]
    pub common: ExtensionFields,
    pub command: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub on_commands: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expand_args: Option<bool>,
    #[serde(skip_serializing_if = "is_false")]
    pub ignore_error: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ExtraArgumentsBlock {
    #[serde(flatten)]
    pub common: ExtensionFields,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required_var_files: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub optional_var_files: Vec<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ExtraCommandBlock {
    #[serde(flatten)]
    pub common: ExtensionFields,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expand_args: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_state: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub act_as: Option<String>,
    #[serde(rename = "version", skip_serializing_if = "Option::is_none")]
    pub version_arg: Option<String>,
}
