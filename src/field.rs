use std::fmt;

use crate::error::{Error, ParseError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum JoinType {
    #[default]
    Inner,
    LeftOuter,
}

/// A pair of storage fields equated by a join: `from_field` lives on the
///  join's source, `to_field` on its target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JoinField {
    pub from_field: String,
    pub to_field: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Join {
    pub from_source_name: String,
    pub to: Source,
    pub join_type: JoinType,
    /// Left empty by [QueryField::from_string]; the mapping layer fills these
    ///  in before the join is rendered.
    pub fields: Vec<JoinField>,
}

impl Join {
    pub fn add_field(&mut self, from_field: impl Into<String>, to_field: impl Into<String>) {
        self.fields.push(JoinField {
            from_field: from_field.into(),
            to_field: to_field.into(),
        });
    }
}

/// A named entity (table) reference, possibly joined to further sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Source {
    pub name: String,
    /// The storage-level name, used in SQL unless an alias is registered.
    pub entity_name: String,
    pub joins: Vec<Join>,
}

impl Source {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            entity_name: name.clone(),
            name,
            joins: Vec::new(),
        }
    }

    pub fn with_entity(name: impl Into<String>, entity_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_name: entity_name.into(),
            joins: Vec::new(),
        }
    }

    /// Builds a linear chain `a -> b -> c`, each hop an inner join without
    ///  join fields. Returns `None` for an empty path.
    pub fn from_path<'a>(path: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let mut names: Vec<&str> = path.into_iter().collect();
        let mut source = Self::new(names.pop()?);
        while let Some(name) = names.pop() {
            let mut parent = Self::new(name);
            parent.join_to(source, JoinType::Inner);
            source = parent;
        }
        Some(source)
    }

    /// Adds a join to `to` and returns it so the caller can add join fields.
    pub fn join_to(&mut self, to: Self, join_type: JoinType) -> &mut Join {
        self.joins.push(Join {
            from_source_name: self.name.clone(),
            to,
            join_type,
            fields: Vec::new(),
        });
        let last = self.joins.len() - 1;
        &mut self.joins[last]
    }

    /// The deepest source reached by following the first join at every level.
    /// For `A.B.Prop` this is `B`, the source that actually owns `Prop`.
    pub fn child_source_leaf(&self) -> &Self {
        let mut current = self;
        while let Some(join) = current.joins.first() {
            current = &join.to;
        }
        current
    }

    /// Dotted names along the first-join chain, e.g. `A.B`.
    pub fn path(&self) -> String {
        let mut path = self.name.clone();
        let mut current = self;
        while let Some(join) = current.joins.first() {
            path.push('.');
            path.push_str(&join.to.name);
            current = &join.to;
        }
        path
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Names a property (and the storage field behind it), optionally reached
///  through a source path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryField {
    pub property_name: String,
    pub field_name: String,
    pub source: Option<Source>,
}

impl QueryField {
    pub fn new(
        property_name: impl Into<String>,
        field_name: impl Into<String>,
        source: Option<Source>,
    ) -> Self {
        Self {
            property_name: property_name.into(),
            field_name: field_name.into(),
            source,
        }
    }

    /// A field whose storage name is its property name, with no source.
    pub fn from_property(property_name: impl Into<String>) -> Self {
        let property_name = property_name.into();
        Self {
            field_name: property_name.clone(),
            property_name,
            source: None,
        }
    }

    /// Parses `Prop` or `A.B.Prop`. The last segment is the property; every
    ///  earlier segment becomes a hop in the source chain.
    pub fn from_string(field_string: &str) -> Result<Self> {
        let field_string = field_string.trim();
        if field_string.is_empty() {
            return Err(Error::NullArgument("field_string"));
        }

        let mut segments = Vec::new();
        let mut offset = 0;
        for segment in field_string.split('.') {
            let name = segment.trim();
            if name.is_empty() {
                return Err(ParseError::UnexpectedToken {
                    found: ".".to_string(),
                    at: offset,
                }
                .into());
            }
            segments.push(name);
            offset += segment.len() + 1;
        }

        // split always yields at least one segment
        let property_name = segments.pop().unwrap_or_default();
        let mut field = Self::from_property(property_name);
        field.source = Source::from_path(segments);
        Ok(field)
    }

    pub fn set_source(&mut self, source: Source) {
        self.source = Some(source);
    }
}

impl fmt::Display for QueryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "{source}.")?;
        }
        f.write_str(&self.property_name)
    }
}
