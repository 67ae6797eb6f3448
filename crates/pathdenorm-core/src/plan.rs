//! Compiled traversal plan.
//!
//! A `Schema` names entity types by registry key; the plan resolves those
//! names once into an arena of nodes addressed by `NodeId`. Each registry key
//! compiles to exactly one node, so cyclic schemas compile to cyclic plans
//! and per-node state (the selector's cache slots) is a plain `Vec` indexed
//! by `NodeId`.

use std::collections::BTreeMap;

use ahash::AHashMap;

use crate::error::Result;
use crate::schema::{Discriminator, EntityRef, Members, Schema, SubSchema, Variants};

pub type NodeId = usize;

#[derive(Debug, Clone)]
pub struct EntityNode {
    /// Registry key; also the (possibly aliased) store bucket records are read from.
    pub bucket: String,
    /// Real entity type.
    pub entity: String,
    pub id_attribute: String,
    pub relations: BTreeMap<String, NodeId>,
}

#[derive(Debug, Clone)]
pub struct VariantNodes {
    pub variants: BTreeMap<String, NodeId>,
    pub discriminator: Discriminator,
}

impl VariantNodes {
    pub fn expected(&self) -> String {
        self.variants
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone)]
pub enum MemberNodes {
    Single(NodeId),
    Polymorphic(VariantNodes),
}

#[derive(Debug, Clone)]
pub enum PlanNode {
    Entity(EntityNode),
    Array(NodeId),
    PolymorphicArray(VariantNodes),
    Union(VariantNodes),
    Object(BTreeMap<String, NodeId>),
    Values(MemberNodes),
}

#[derive(Debug, Clone)]
pub struct Plan {
    nodes: Vec<PlanNode>,
    root: NodeId,
}

impl Plan {
    pub fn compile(schema: &Schema) -> Result<Self> {
        let mut compiler = Compiler {
            schema,
            nodes: Vec::new(),
            entities: AHashMap::new(),
        };
        let root = compiler.compile(&schema.root)?;
        Ok(Self {
            nodes: compiler.nodes,
            root,
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&PlanNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

struct Compiler<'a> {
    schema: &'a Schema,
    nodes: Vec<PlanNode>,
    entities: AHashMap<String, NodeId>,
}

impl Compiler<'_> {
    fn push(&mut self, node: PlanNode) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn compile(&mut self, node: &SubSchema) -> Result<NodeId> {
        let compiled = match node {
            SubSchema::Entity(reference) => return self.compile_entity(reference),
            SubSchema::Array(inner) => PlanNode::Array(self.compile(inner)?),
            SubSchema::PolymorphicArray(variants) => {
                PlanNode::PolymorphicArray(self.compile_variants(variants)?)
            }
            SubSchema::Union(variants) => PlanNode::Union(self.compile_variants(variants)?),
            SubSchema::Object(props) => PlanNode::Object(self.compile_map(props)?),
            SubSchema::Values(Members::Single(inner)) => {
                PlanNode::Values(MemberNodes::Single(self.compile(inner)?))
            }
            SubSchema::Values(Members::Polymorphic(variants)) => {
                PlanNode::Values(MemberNodes::Polymorphic(self.compile_variants(variants)?))
            }
        };
        Ok(self.push(compiled))
    }

    fn compile_map(&mut self, map: &BTreeMap<String, SubSchema>) -> Result<BTreeMap<String, NodeId>> {
        let mut compiled = BTreeMap::new();
        for (name, schema) in map {
            compiled.insert(name.clone(), self.compile(schema)?);
        }
        Ok(compiled)
    }

    fn compile_variants(&mut self, variants: &Variants) -> Result<VariantNodes> {
        Ok(VariantNodes {
            variants: self.compile_map(&variants.variants)?,
            discriminator: variants.discriminator.clone(),
        })
    }

    fn compile_entity(&mut self, reference: &EntityRef) -> Result<NodeId> {
        let registry_key = reference.registry_key();
        if let Some(&id) = self.entities.get(&registry_key) {
            return Ok(id);
        }

        let entity = self.schema.entity(&registry_key)?;
        // Reserve the slot first so cycles back to this type resolve to it.
        let id = self.push(PlanNode::Entity(EntityNode {
            bucket: registry_key.clone(),
            entity: entity.key.clone(),
            id_attribute: entity.id_attribute.clone(),
            relations: BTreeMap::new(),
        }));
        self.entities.insert(registry_key, id);

        let relations = self.compile_map(&entity.relations)?;
        if let Some(PlanNode::Entity(node)) = self.nodes.get_mut(id) {
            node.relations = relations;
        }
        Ok(id)
    }
}
