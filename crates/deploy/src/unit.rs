//! Declarative deployment units.

use std::collections::BTreeSet;

use alloy_core::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// A concrete constructor argument, ready for ABI encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbiValue {
    Address(Address),
    Uint(U256),
    Bool(bool),
    Bytes32(B256),
    String(String),
}

impl AbiValue {
    /// Whether this value can be passed for a constructor input of the given solidity type.
    pub fn matches_type(&self, ty: &str) -> bool {
        match self {
            AbiValue::Address(_) => ty == "address",
            AbiValue::Uint(value) => uint_bits(ty).is_some_and(|bits| value.bit_len() <= bits),
            AbiValue::Bool(_) => ty == "bool",
            AbiValue::Bytes32(_) => ty == "bytes32",
            AbiValue::String(_) => ty == "string",
        }
    }
}

/// Width of a scalar `uint<N>` type. Bare `uint` is `uint256`; arrays are not scalars.
fn uint_bits(ty: &str) -> Option<usize> {
    let bits = ty.strip_prefix("uint")?;
    if bits.is_empty() {
        return Some(256);
    }
    if !bits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let bits: usize = bits.parse().ok()?;
    (bits % 8 == 0 && (8..=256).contains(&bits)).then_some(bits)
}

/// A single constructor slot of a [`DeploymentUnit`].
///
/// In TOML manifests a slot is written as a one-key table, e.g.
/// `{ address_of = "EduChain" }` or `{ uint = "1000" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructorArg {
    /// Placeholder for the confirmed address of another unit.
    AddressOf(String),
    /// A literal value passed through unchanged.
    #[serde(untagged)]
    Literal(AbiValue),
}

/// A named deployment request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentUnit {
    /// Unique, stable identifier. Also the contract name looked up in the artifact source.
    pub name: String,
    /// Units whose confirmed address this unit's constructor requires.
    #[serde(default, rename = "depends_on")]
    pub dependencies: BTreeSet<String>,
    /// Ordered constructor slots.
    #[serde(default, rename = "constructor")]
    pub constructor_template: Vec<ConstructorArg>,
}

impl DeploymentUnit {
    /// Create a unit with no dependencies and no constructor arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: BTreeSet::new(),
            constructor_template: Vec::new(),
        }
    }

    /// Declare a dependency without passing its address to the constructor.
    pub fn depends_on(mut self, unit: impl Into<String>) -> Self {
        self.dependencies.insert(unit.into());
        self
    }

    /// Append a constructor slot filled with the confirmed address of `unit`.
    ///
    /// The referenced unit is added to the dependency set.
    pub fn address_of(mut self, unit: impl Into<String>) -> Self {
        let unit = unit.into();
        self.dependencies.insert(unit.clone());
        self.constructor_template.push(ConstructorArg::AddressOf(unit));
        self
    }

    /// Append a literal constructor slot.
    pub fn literal(mut self, value: AbiValue) -> Self {
        self.constructor_template.push(ConstructorArg::Literal(value));
        self
    }

    /// Names referenced by placeholder slots, in template order.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.constructor_template.iter().filter_map(|arg| match arg {
            ConstructorArg::AddressOf(unit) => Some(unit.as_str()),
            ConstructorArg::Literal(_) => None,
        })
    }

    /// Add every placeholder target to the dependency set.
    ///
    /// Manifests may omit `depends_on` for units already referenced through `address_of`.
    pub fn normalized(mut self) -> Self {
        let referenced: Vec<String> = self.placeholders().map(str::to_owned).collect();
        self.dependencies.extend(referenced);
        self
    }

    /// The key this unit's address is published under (`EduChain` -> `eduChain`).
    pub fn output_key(&self) -> String {
        output_key(&self.name)
    }
}

/// Lower-camel-case logical name of a unit.
pub fn output_key(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `EduChain`, then `BugBounty` constructed with its address.
pub fn default_units() -> Vec<DeploymentUnit> {
    vec![
        DeploymentUnit::new("EduChain"),
        DeploymentUnit::new("BugBounty").address_of("EduChain"),
    ]
}
