//! Deployment specs and constructor argument resolution.

use std::collections::{HashMap, HashSet};

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, B256, Bytes, U256},
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{DeployError, DeploymentResult};

/// A concrete constructor argument value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgValue {
    Address(Address),
    /// Accepts a plain integer, or a decimal or `0x` hex string for values above `u64::MAX`.
    #[serde(deserialize_with = "deserialize_uint")]
    Uint(U256),
    Bool(bool),
    String(String),
    Bytes(Bytes),
    Bytes32(B256),
}

fn deserialize_uint<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum UintRepr {
        Int(u64),
        Big(U256),
    }

    match UintRepr::deserialize(deserializer) {
        Ok(UintRepr::Int(value)) => Ok(U256::from(value)),
        Ok(UintRepr::Big(value)) => Ok(value),
        Err(_) => Err(serde::de::Error::custom(
            "invalid uint: expected a non-negative integer, or a decimal or 0x-prefixed hex string",
        )),
    }
}

impl ArgValue {
    /// The ABI value this argument encodes to.
    pub fn to_sol_value(&self) -> DynSolValue {
        match self {
            Self::Address(address) => DynSolValue::Address(*address),
            Self::Uint(value) => DynSolValue::Uint(*value, 256),
            Self::Bool(value) => DynSolValue::Bool(*value),
            Self::String(value) => DynSolValue::String(value.clone()),
            Self::Bytes(value) => DynSolValue::Bytes(value.to_vec()),
            Self::Bytes32(value) => DynSolValue::FixedBytes(*value, 32),
        }
    }
}

/// ABI-encode constructor arguments, ready to be appended to creation bytecode.
pub fn encode_constructor_args(args: &[ArgValue]) -> Vec<u8> {
    if args.is_empty() {
        return Vec::new();
    }

    DynSolValue::Tuple(args.iter().map(ArgValue::to_sol_value).collect()).abi_encode_params()
}

/// One constructor argument as written in a deployment plan.
///
/// In TOML, `{ ref = "Factory" }` refers to the address of the `Factory`
/// deployment, anything else is a literal such as `{ address = "0x..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstructorArg {
    /// The address produced by an earlier deployment in the same run.
    Ref(String),
    #[serde(untagged)]
    Literal(ArgValue),
}

impl ConstructorArg {
    /// Shorthand for a reference to another deployment.
    pub fn reference(name: impl Into<String>) -> Self {
        Self::Ref(name.into())
    }

    /// The name of the deployment this argument depends on, if any.
    pub fn dependency(&self) -> Option<&str> {
        match self {
            Self::Ref(name) => Some(name),
            Self::Literal(_) => None,
        }
    }
}

impl From<ArgValue> for ConstructorArg {
    fn from(value: ArgValue) -> Self {
        Self::Literal(value)
    }
}

/// Describes one contract to deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    /// Identifier of this deployment, unique within a run.
    pub name: String,
    /// Artifact name of the contract. Defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
    /// Constructor arguments, in declaration order.
    #[serde(default)]
    pub args: Vec<ConstructorArg>,
}

impl DeploymentSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contract: None,
            args: Vec::new(),
        }
    }

    /// Deploy the artifact `contract` under this spec's name.
    pub fn contract(mut self, contract: impl Into<String>) -> Self {
        self.contract = Some(contract.into());
        self
    }

    /// Append a constructor argument.
    pub fn arg(mut self, arg: impl Into<ConstructorArg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// The artifact name to instantiate.
    pub fn contract_name(&self) -> &str {
        self.contract.as_deref().unwrap_or(&self.name)
    }

    /// Names of the deployments this spec depends on.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter_map(ConstructorArg::dependency)
    }

    /// Resolve every argument against the results produced so far.
    pub fn resolve_args(
        &self,
        results: &HashMap<String, DeploymentResult>,
    ) -> Result<Vec<ArgValue>, DeployError> {
        self.args
            .iter()
            .map(|arg| match arg {
                ConstructorArg::Literal(value) => Ok(value.clone()),
                ConstructorArg::Ref(name) => results
                    .get(name)
                    .map(|result| ArgValue::Address(result.address))
                    .ok_or_else(|| DeployError::UnresolvedDependency(name.clone())),
            })
            .collect()
    }
}

/// Check a plan before anything is submitted.
///
/// Names must be unique and every reference must point at a spec listed
/// earlier. On failure, returns the index of the offending spec with the error.
pub fn validate_plan(specs: &[DeploymentSpec]) -> Result<(), (usize, DeployError)> {
    let mut seen = HashSet::new();

    for (index, spec) in specs.iter().enumerate() {
        if let Some(missing) = spec.dependencies().find(|dep| !seen.contains(dep)) {
            return Err((index, DeployError::UnresolvedDependency(missing.to_string())));
        }

        if !seen.insert(spec.name.as_str()) {
            return Err((index, DeployError::DuplicateSpec(spec.name.clone())));
        }
    }

    Ok(())
}
