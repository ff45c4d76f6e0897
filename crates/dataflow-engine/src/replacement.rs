//! Module replacement filter
//!
//! Finds module types that could stand in for an existing module without
//! losing any of its connections. Every description in the catalog is
//! expanded into the set of connection patterns it can realize, and the
//! filter maps each pattern back to the descriptions that produce it.
//! Lookups are then a single hash lookup.

use std::collections::{BTreeMap, HashMap};

use crate::descriptor::{ModuleDescription, PortDescription};
use crate::module::Module;
use crate::types::{Datatype, ModuleTypeId, PortDirection};

/// Default number of ports a dynamic group contributes to enumeration
pub const DEFAULT_DYNAMIC_EXPANSION: usize = 3;

/// Connected-port signature: how many connected ports of each datatype a
/// module has per direction. Zero counts are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectedPortInfo {
    inputs: BTreeMap<Datatype, usize>,
    outputs: BTreeMap<Datatype, usize>,
}

impl ConnectedPortInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, datatype: impl Into<Datatype>, count: usize) -> Self {
        self.add(PortDirection::Input, datatype.into(), count);
        self
    }

    pub fn with_output(mut self, datatype: impl Into<Datatype>, count: usize) -> Self {
        self.add(PortDirection::Output, datatype.into(), count);
        self
    }

    /// Signature of a live module: each connected port counts once
    pub fn from_module(module: &Module) -> Self {
        let mut info = Self::new();
        for port in module.input_ports().iter().chain(module.output_ports()) {
            if port.is_connected() {
                info.add(port.direction(), port.datatype().clone(), 1);
            }
        }
        info
    }

    pub fn count(&self, direction: PortDirection, datatype: &Datatype) -> usize {
        self.side(direction).get(datatype).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }

    fn side(&self, direction: PortDirection) -> &BTreeMap<Datatype, usize> {
        match direction {
            PortDirection::Input => &self.inputs,
            PortDirection::Output => &self.outputs,
        }
    }

    fn add(&mut self, direction: PortDirection, datatype: Datatype, count: usize) {
        if count == 0 {
            return;
        }
        let side = match direction {
            PortDirection::Input => &mut self.inputs,
            PortDirection::Output => &mut self.outputs,
        };
        *side.entry(datatype).or_insert(0) += count;
    }
}

/// Precomputed signature -> descriptions lookup
#[derive(Debug, Clone, Default)]
pub struct ModuleReplacementFilter {
    entries: HashMap<ConnectedPortInfo, BTreeMap<ModuleTypeId, ModuleDescription>>,
}

impl ModuleReplacementFilter {
    /// Descriptions that can realize `signature`, ordered by type id
    ///
    /// A miss yields an empty list.
    pub fn find_replacements(&self, signature: &ConnectedPortInfo) -> Vec<&ModuleDescription> {
        self.entries
            .get(signature)
            .map(|set| set.values().collect())
            .unwrap_or_default()
    }

    /// Whether `type_id` is registered under `signature`
    pub fn accepts(&self, signature: &ConnectedPortInfo, type_id: &ModuleTypeId) -> bool {
        self.entries
            .get(signature)
            .is_some_and(|set| set.contains_key(type_id))
    }

    /// Number of distinct signatures
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds a `ModuleReplacementFilter` from a set of descriptions
#[derive(Debug, Clone)]
pub struct ModuleReplacementFilterBuilder {
    descriptions: Vec<ModuleDescription>,
    dynamic_expansion: usize,
}

impl ModuleReplacementFilterBuilder {
    pub fn new(descriptions: impl IntoIterator<Item = ModuleDescription>) -> Self {
        Self {
            descriptions: descriptions.into_iter().collect(),
            dynamic_expansion: DEFAULT_DYNAMIC_EXPANSION,
        }
    }

    /// How many ports each dynamic group may absorb during enumeration
    pub fn with_dynamic_expansion(mut self, expansion: usize) -> Self {
        self.dynamic_expansion = expansion;
        self
    }

    pub fn build(self) -> ModuleReplacementFilter {
        let mut filter = ModuleReplacementFilter::default();
        for description in &self.descriptions {
            for signature in self.signatures(description) {
                filter
                    .entries
                    .entry(signature)
                    .or_default()
                    .insert(description.type_id.clone(), description.clone());
            }
        }
        log::debug!(
            "Built replacement filter: {} descriptions, {} signatures",
            self.descriptions.len(),
            filter.len()
        );
        filter
    }

    /// Every distinct signature obtainable by connecting a subset of the
    /// description's ports.
    ///
    /// Subsets collapse to per-datatype counts, so the distinct results of
    /// the power set are exactly the products of `0..=n` for each
    /// (direction, datatype) that has `n` ports.
    fn signatures(&self, description: &ModuleDescription) -> Vec<ConnectedPortInfo> {
        let mut capacity: BTreeMap<(PortDirection, Datatype), usize> = BTreeMap::new();
        let sides = [
            (PortDirection::Input, &description.inputs),
            (PortDirection::Output, &description.outputs),
        ];
        for (direction, templates) in sides {
            for template in templates {
                *capacity
                    .entry((direction, template.datatype.clone()))
                    .or_insert(0) += self.port_count(template);
            }
        }

        let mut signatures = vec![ConnectedPortInfo::new()];
        for ((direction, datatype), max) in capacity {
            signatures = signatures
                .into_iter()
                .flat_map(|base| {
                    let datatype = datatype.clone();
                    (0..=max).map(move |count| {
                        let mut next = base.clone();
                        next.add(direction, datatype.clone(), count);
                        next
                    })
                })
                .collect();
        }
        signatures
    }

    fn port_count(&self, template: &PortDescription) -> usize {
        if template.dynamic {
            self.dynamic_expansion
        } else {
            1
        }
    }
}
