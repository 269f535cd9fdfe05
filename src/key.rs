use crate::value::Value;

/// One constituent property of a (possibly composite) key and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyProperty {
    pub name: String,
    pub value: Value,
}

/// The identifying properties of an object, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimaryKey {
    pub properties: Vec<KeyProperty>,
}

impl PrimaryKey {
    pub fn new<N, V>(properties: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<Value>,
    {
        Self {
            properties: properties
                .into_iter()
                .map(|(name, value)| KeyProperty {
                    name: name.into(),
                    value: value.into(),
                })
                .collect(),
        }
    }
}

/// Links a property on the owning object to a property on the related one.
/// `value` is the owner's current value, which the related objects must hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipProperty {
    pub owner_property: String,
    pub related_property: String,
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipKey {
    pub properties: Vec<RelationshipProperty>,
}

impl RelationshipKey {
    pub fn new(properties: impl IntoIterator<Item = RelationshipProperty>) -> Self {
        Self {
            properties: properties.into_iter().collect(),
        }
    }
}
